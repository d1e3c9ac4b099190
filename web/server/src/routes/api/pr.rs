use axum::{
	Json,
	extract::{Path, State},
	http::StatusCode,
};
use hiro_api_model::pr::ApiPullRequest;
use hiro_backend_service::{
	BackendServices,
	pr::{PrRecord, PrUpsert},
};
use hiro_common_model::pr::AnalysisStatus;

use super::{
	auth::CurrentUser,
	error::{ApiResult, OptionExt},
	repo::{fetch_owned, parse_ref, split_full_name},
};

fn pr_to_api(record: PrRecord) -> ApiPullRequest {
	let analysis_status: AnalysisStatus = record.analysis_status().into();
	let risk_level = record.risk_level();
	ApiPullRequest {
		id: record.id.to_string(),
		repository: record.repository.to_string(),
		pr_number: record.pr_number,
		title: record.title,
		state: record.state,
		author: record.author,
		head_sha: record.head_sha,
		base_sha: record.base_sha,
		changed_files: record.changed_files.into_string_list(),
		additions: record.additions,
		deletions: record.deletions,
		analysis_status,
		has_tests: record.has_tests,
		risk_level,
		suggestions: record
			.suggestions
			.map(|list| list.into_string_list())
			.unwrap_or_default(),
		analyzed_at: record
			.analyzed_at
			.map(|at| at.assume_utc().unix_timestamp()),
		created_at: record.created_at.assume_utc().unix_timestamp(),
	}
}

pub async fn list_prs(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path(repo): Path<String>,
) -> ApiResult<Json<Vec<ApiPullRequest>>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	let prs = backend.pr.list_for_repo(record.id.0, 100).await?;
	Ok(Json(prs.into_iter().map(pr_to_api).collect()))
}

pub async fn get_pr(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path((repo, number)): Path<(String, i32)>,
) -> ApiResult<Json<ApiPullRequest>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	let pr = backend
		.pr
		.list_for_repo(record.id.0, 100)
		.await?
		.into_iter()
		.find(|pr| pr.pr_number == number)
		.or_api_error(StatusCode::NOT_FOUND, "pull request not found")?;
	Ok(Json(pr_to_api(pr)))
}

/// Re-syncs a pull request from GitHub and upserts the stored row.
pub async fn sync_pr(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path((repo, number)): Path<(String, i32)>,
) -> ApiResult<Json<ApiPullRequest>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	let client = backend.github_client_for_repo(&record).await?;
	let (owner, name) = split_full_name(&record);

	let pull = client.get_pull_request(owner, name, number as i64).await?;
	let files = client
		.pull_request_files(owner, name, number as i64)
		.await?;
	let changed_files: Vec<String> = files.into_iter().map(|file| file.filename).collect();

	let author = pull
		.user
		.as_ref()
		.map(|account| account.login.as_str())
		.unwrap_or_default();
	let id = backend
		.pr
		.upsert(
			record.id.0,
			PrUpsert {
				pr_number: number,
				title: &pull.title,
				state: &pull.state,
				head_sha: &pull.head.sha,
				base_sha: &pull.base.sha,
				author,
				changed_files: &changed_files,
				additions: pull.additions as i32,
				deletions: pull.deletions as i32,
			},
		)
		.await?;

	let pr = backend
		.pr
		.get(id)
		.await?
		.or_api_error(StatusCode::INTERNAL_SERVER_ERROR, "pull request vanished")?;
	Ok(Json(pr_to_api(pr)))
}
