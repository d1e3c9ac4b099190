use axum::{
	Json,
	extract::{Path, Query, State},
	http::StatusCode,
};
use hiro_api_model::repo::{
	ApiAvailableRepository, ApiContentEntry, ApiRepoSettings, ApiRepository, ConnectRepoRequest,
	UpdateSettingsRequest,
};
use hiro_backend_model::{repo::RepoRef, user::UserRef};
use hiro_backend_service::{
	BackendServices,
	github::{GithubError, parse_repo_url},
	repo::{NewRepository, RepoRecord, RepoSettingsUpdate},
	feed::NewFeedEntry,
};
use hiro_common_model::feed::ActionKind;
use serde::Deserialize;
use uuid::Uuid;

use super::{
	auth::CurrentUser,
	error::{ApiError, ApiResult, OptionExt},
};

pub(crate) fn parse_ref(id: &str) -> ApiResult<Uuid> {
	Uuid::parse_str(id)
		.map_err(|_| ApiError::CustomRef(StatusCode::BAD_REQUEST, "malformed resource id"))
}

/// Loads a repository and rejects callers other than its owner.
pub(crate) async fn fetch_owned(
	backend: &BackendServices,
	user: UserRef,
	id: RepoRef,
) -> ApiResult<RepoRecord> {
	let repo = backend
		.repo
		.get(id)
		.await?
		.or_api_error(StatusCode::NOT_FOUND, "repository not found")?;
	if repo.user_id.map(|owner| owner.0) != Some(user) {
		return Err(ApiError::CustomRef(
			StatusCode::FORBIDDEN,
			"not the repository owner",
		));
	}
	Ok(repo)
}

pub(crate) fn repo_to_api(record: RepoRecord) -> ApiRepository {
	let settings = record.settings();
	ApiRepository {
		id: record.id.to_string(),
		github_id: record.github_id,
		name: record.name,
		full_name: record.full_name,
		owner: record.owner,
		private: record.private,
		default_branch: record.default_branch,
		language: record.language,
		connected_via_app: record.installation_id.is_some(),
		settings: ApiRepoSettings {
			enabled: settings.enabled,
			auto_generate_tests: settings.auto_generate_tests,
			only_changed_files: settings.only_changed_files,
			max_prs_per_day: settings.max_prs_per_day,
			protected_dirs: settings.protected_dirs,
		},
		connected_at: record.created_at.assume_utc().unix_timestamp(),
	}
}

pub async fn list_repos(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
) -> ApiResult<Json<Vec<ApiRepository>>> {
	let repos = backend.repo.list_for_user(user).await?;
	Ok(Json(repos.into_iter().map(repo_to_api).collect()))
}

pub async fn connect_repo(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Json(request): Json<ConnectRepoRequest>,
) -> ApiResult<(StatusCode, Json<ApiRepository>)> {
	let (owner, name) = if request.github_url.contains("github.com") {
		parse_repo_url(&request.github_url)?
	} else {
		let (owner, name) = request
			.github_url
			.split_once('/')
			.ok_or(GithubError::InvalidRepoUrl(request.github_url.clone()))?;
		(owner.to_string(), name.trim_end_matches(".git").to_string())
	};

	let token = backend
		.user
		.access_token(user)
		.await?
		.or_api_error(StatusCode::BAD_REQUEST, "no github access token on file")?;
	let github = backend
		.github
		.user_client(token)
		.get_repository(&owner, &name)
		.await?;

	let id = backend
		.repo
		.connect(NewRepository {
			github_id: github.id,
			name: &github.name,
			full_name: &github.full_name,
			owner: &github.owner.login,
			private: github.private,
			default_branch: &github.default_branch,
			language: github.language.as_deref(),
			installation_id: None,
			user_id: Some(user),
		})
		.await?;

	backend
		.feed
		.push(NewFeedEntry {
			repository: id,
			kind: ActionKind::RepoConnected,
			title: &format!("Connected {}", github.full_name),
			description: github.description.as_deref(),
			pr_number: None,
			pr_url: None,
			risk_level: None,
			coverage_impact: None,
			metadata: None,
		})
		.await?;

	let record = backend
		.repo
		.get(id)
		.await?
		.or_api_error(StatusCode::INTERNAL_SERVER_ERROR, "repository vanished")?;
	Ok((StatusCode::CREATED, Json(repo_to_api(record))))
}

/// Live listing from GitHub, flagged with what is already connected.
pub async fn list_github_repos(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
) -> ApiResult<Json<Vec<ApiAvailableRepository>>> {
	let token = backend
		.user
		.access_token(user)
		.await?
		.or_api_error(StatusCode::BAD_REQUEST, "no github access token on file")?;
	let github_repos = backend
		.github
		.user_client(token)
		.list_user_repositories()
		.await?;

	let connected: Vec<i64> = backend
		.repo
		.list_for_user(user)
		.await?
		.into_iter()
		.map(|repo| repo.github_id)
		.collect();

	Ok(Json(
		github_repos
			.into_iter()
			.map(|repo| ApiAvailableRepository {
				connected: connected.contains(&repo.id),
				github_id: repo.id,
				full_name: repo.full_name,
				private: repo.private,
				language: repo.language,
			})
			.collect(),
	))
}

pub async fn get_repo(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path(repo): Path<String>,
) -> ApiResult<Json<ApiRepository>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	Ok(Json(repo_to_api(record)))
}

pub async fn update_repo_settings(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path(repo): Path<String>,
	Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<Json<ApiRepository>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;

	let mut update = RepoSettingsUpdate {
		enabled: request.enabled,
		auto_generate_tests: request.auto_generate_tests,
		only_changed_files: request.only_changed_files,
		max_prs_per_day: request.max_prs_per_day,
		protected_dirs: None,
	};
	if let Some(dirs) = &request.protected_dirs {
		update = update.protected_dirs(dirs);
	}
	backend.repo.update_settings(record.id.0, update).await?;

	let record = backend
		.repo
		.get(record.id.0)
		.await?
		.or_api_error(StatusCode::NOT_FOUND, "repository not found")?;
	Ok(Json(repo_to_api(record)))
}

pub async fn disconnect_repo(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path(repo): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	backend.repo.disconnect(record.id.0).await?;
	Ok(Json(serde_json::json!({ "disconnected": true })))
}

#[derive(Debug, Default, Deserialize)]
pub struct ContentsQuery {
	#[serde(default)]
	path: String,
}

pub async fn repo_contents(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path(repo): Path<String>,
	Query(query): Query<ContentsQuery>,
) -> ApiResult<Json<Vec<ApiContentEntry>>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	let client = backend.github_client_for_repo(&record).await?;
	let (owner, name) = split_full_name(&record);
	let entries = client.get_contents(owner, name, &query.path, None).await?;
	Ok(Json(
		entries
			.into_iter()
			.map(|entry| ApiContentEntry {
				name: entry.name,
				path: entry.path,
				kind: entry.kind,
			})
			.collect(),
	))
}

#[derive(Debug, Default, Deserialize)]
pub struct FilesQuery {
	#[serde(default)]
	folder: String,
}

/// Recursive code-file listing, with binary and config files skipped.
pub async fn repo_files(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path(repo): Path<String>,
	Query(query): Query<FilesQuery>,
) -> ApiResult<Json<Vec<String>>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	let client = backend.github_client_for_repo(&record).await?;
	let (owner, name) = split_full_name(&record);
	let files = client
		.file_paths_under(owner, name, &query.folder, None)
		.await?;
	Ok(Json(files))
}

pub(crate) fn split_full_name(record: &RepoRecord) -> (&str, &str) {
	record
		.full_name
		.split_once('/')
		.unwrap_or((record.owner.as_str(), record.name.as_str()))
}
