use axum::{
	Json,
	extract::{Path, Query, State},
};
use hiro_api_model::feed::ApiFeedEntry;
use hiro_backend_service::{BackendServices, feed::FeedRecord};
use serde::Deserialize;

use super::{
	auth::CurrentUser,
	error::ApiResult,
	repo::{fetch_owned, parse_ref},
};

const DEFAULT_LIMIT: i64 = 20;
const MAX_LIMIT: i64 = 100;

fn entry_to_api(record: FeedRecord) -> ApiFeedEntry {
	let kind = record.kind();
	let risk_level = record.risk_level();
	ApiFeedEntry {
		id: record.id.to_string(),
		repository: record.repository.to_string(),
		kind,
		title: record.title,
		description: record.description,
		pr_number: record.pr_number,
		pr_url: record.pr_url,
		risk_level,
		coverage_impact: record.coverage_impact,
		created_at: record.created_at.assume_utc().unix_timestamp(),
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
	limit: Option<i64>,
}

impl FeedQuery {
	fn limit(&self) -> i64 {
		self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
	}
}

/// Activity across all of the user's repositories.
pub async fn user_feed(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Vec<ApiFeedEntry>>> {
	let entries = backend.feed.list_for_user(user, query.limit()).await?;
	Ok(Json(entries.into_iter().map(entry_to_api).collect()))
}

pub async fn repo_feed(
	CurrentUser(user): CurrentUser,
	State(backend): State<BackendServices>,
	Path(repo): Path<String>,
	Query(query): Query<FeedQuery>,
) -> ApiResult<Json<Vec<ApiFeedEntry>>> {
	let record = fetch_owned(&backend, user, parse_ref(&repo)?).await?;
	let entries = backend
		.feed
		.list_for_repo(record.id.0, query.limit())
		.await?;
	Ok(Json(entries.into_iter().map(entry_to_api).collect()))
}
