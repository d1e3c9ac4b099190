use axum::{
	Json,
	extract::{Path, Query, State},
	http::StatusCode,
};
use hiro_api_model::job::{
	ApiJob, ApiJobWithResults, ApiQueueStatus, ApiTestResult, CreateJobRequest,
};
use hiro_backend_model::bus::DispatchBusMessage;
use hiro_backend_service::job::{JobRecord, NewJob, TestResultRecord};
use hiro_common_model::job::{JobKind, JobStatus};
use kstring::KString;
use serde::Deserialize;

use crate::WebServices;

use super::{
	auth::CurrentUser,
	error::{ApiResult, OptionExt},
	repo::{fetch_owned, parse_ref},
};

/// Listing cap; the dashboard only ever shows the newest jobs.
const LIST_LIMIT: i64 = 50;

fn job_to_api(record: JobRecord) -> ApiJob {
	let kind = record.kind();
	let status = record.status();
	ApiJob {
		id: record.id.to_string(),
		repository: record.repository.to_string(),
		pull_request: record.pull_request.map(|pr| pr.to_string()),
		kind,
		status,
		progress: record.progress.clamp(0, 100) as u8,
		target_files: record.target_files.into_string_list(),
		created_at: record.created_at.assume_utc().unix_timestamp(),
		started_at: record
			.started_at
			.map(|at| at.assume_utc().unix_timestamp()),
		completed_at: record
			.completed_at
			.map(|at| at.assume_utc().unix_timestamp()),
	}
}

fn result_to_api(record: TestResultRecord) -> ApiTestResult {
	ApiTestResult {
		id: record.id.to_string(),
		job: record.job.to_string(),
		file_path: record.file_path,
		test_file_path: record.test_file_path,
		test_code: record.test_code,
		metadata: record.metadata,
		required_packages: record
			.required_packages
			.into_string_list()
			.into_iter()
			.map(KString::from_string)
			.collect(),
		test_framework: record.test_framework,
		created_at: record.created_at.assume_utc().unix_timestamp(),
	}
}

fn status_matches(status: &JobStatus, filter: &str) -> bool {
	let name = match status {
		JobStatus::Pending => "pending",
		JobStatus::Processing => "processing",
		JobStatus::Completed => "completed",
		JobStatus::Failed { .. } => "failed",
	};
	name == filter
}

#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
	repository: Option<String>,
	status: Option<String>,
}

pub async fn list_jobs(
	CurrentUser(user): CurrentUser,
	State(services): State<WebServices>,
	Query(query): Query<ListJobsQuery>,
) -> ApiResult<Json<Vec<ApiJobWithResults>>> {
	let backend = &services.backend;
	let jobs = match &query.repository {
		Some(repo) => {
			let record = fetch_owned(backend, user, parse_ref(repo)?).await?;
			backend.job.list_for_repo(record.id.0, LIST_LIMIT).await?
		}
		None => {
			let own: Vec<_> = backend
				.repo
				.list_for_user(user)
				.await?
				.into_iter()
				.map(|repo| repo.id)
				.collect();
			backend
				.job
				.list_recent(LIST_LIMIT)
				.await?
				.into_iter()
				.filter(|job| own.contains(&job.repository))
				.collect()
		}
	};

	let mut output = Vec::with_capacity(jobs.len());
	for job in jobs {
		if let Some(filter) = &query.status {
			if !status_matches(&job.status(), filter) {
				continue;
			}
		}
		let results = backend.job.results_for_job(job.id.0).await?;
		output.push(ApiJobWithResults {
			job: job_to_api(job),
			results: results.into_iter().map(result_to_api).collect(),
		});
	}
	Ok(Json(output))
}

pub async fn create_job(
	CurrentUser(user): CurrentUser,
	State(services): State<WebServices>,
	Json(request): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<ApiJob>)> {
	let backend = &services.backend;
	let record = fetch_owned(backend, user, parse_ref(&request.repository)?).await?;

	// An empty target list means the runner resolves the whole
	// repository itself.
	let target_files = match (&request.target_files, &request.target_folder) {
		(Some(files), _) if !files.is_empty() => files.clone(),
		(_, Some(folder)) => {
			let client = backend.github_client_for_repo(&record).await?;
			let (owner, name) = super::repo::split_full_name(&record);
			client.file_paths_under(owner, name, folder, None).await?
		}
		_ => Vec::new(),
	};

	let mut conn = backend.database.get().await?;
	let id = backend
		.job
		.create(
			&mut conn,
			NewJob {
				repository: record.id.0,
				pull_request: None,
				kind: JobKind::FullRepo,
				target_files: &target_files,
				metadata: None,
			},
		)
		.await?;
	drop(conn);

	services.bus.dispatch(DispatchBusMessage::ResumeJobRunner).await?;

	let job = backend
		.job
		.get(id)
		.await?
		.or_api_error(StatusCode::INTERNAL_SERVER_ERROR, "job vanished")?;
	Ok((StatusCode::CREATED, Json(job_to_api(job))))
}

pub async fn get_job(
	CurrentUser(user): CurrentUser,
	State(services): State<WebServices>,
	Path(job): Path<String>,
) -> ApiResult<Json<ApiJobWithResults>> {
	let backend = &services.backend;
	let record = backend
		.job
		.get(parse_ref(&job)?)
		.await?
		.or_api_error(StatusCode::NOT_FOUND, "job not found")?;
	// Ownership follows the job's repository.
	fetch_owned(backend, user, record.repository.0).await?;

	let results = backend.job.results_for_job(record.id.0).await?;
	Ok(Json(ApiJobWithResults {
		job: job_to_api(record),
		results: results.into_iter().map(result_to_api).collect(),
	}))
}

/// Wakes the worker fleet's job runners.
pub async fn process_queue(
	CurrentUser(_user): CurrentUser,
	State(services): State<WebServices>,
) -> ApiResult<Json<ApiQueueStatus>> {
	services
		.bus
		.dispatch(DispatchBusMessage::ResumeJobRunner)
		.await?;
	let pending = services.backend.job.count_pending().await?;
	Ok(Json(ApiQueueStatus { pending }))
}
