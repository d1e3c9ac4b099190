use axum::{
	Json,
	extract::{Path, Query, State},
	http::StatusCode,
};
use hiro_api_model::coverage::ApiCoverageSnapshot;
use hiro_backend_service::{BackendServices, coverage::SnapshotRecord};
use serde::Deserialize;

use super::{
	auth::CurrentUser,
	error::{ApiResult, OptionExt},
	repo::{fetch_owned, parse_ref},
};

fn snapshot_to_api(record: SnapshotRecord) -> ApiCoverageSnapshot {
	ApiCoverageSnapshot {
		id: record.id.to_string(),
		repository: record.repository.to_string(),
		overall_coverage: record.overall_coverage,
		file_coverage: record.file_coverage.0,
		total_files: record.total_files,
		tested_files: record.tested_files,
		created_at: record.created_at.assume_utc().unix_timestamp(),
	}
}

pub async fn latest_coverage(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path(repo): Path<String>,
) -> ApiResult<Json<ApiCoverageSnapshot>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	let snapshot = backend
		.coverage
		.latest(record.id.0)
		.await?
		.or_api_error(StatusCode::NOT_FOUND, "no coverage snapshot yet")?;
	Ok(Json(snapshot_to_api(snapshot)))
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
	limit: Option<i64>,
}

pub async fn coverage_history(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path(repo): Path<String>,
	Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<ApiCoverageSnapshot>>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	let limit = query.limit.unwrap_or(30).clamp(1, 100);
	let snapshots = backend.coverage.history(record.id.0, limit).await?;
	Ok(Json(snapshots.into_iter().map(snapshot_to_api).collect()))
}
