use axum::{
	Json,
	extract::{FromRequestParts, Query, State},
	http::{HeaderMap, StatusCode, header, request::Parts},
	response::{AppendHeaders, IntoResponse, Redirect},
};
use hiro_api_model::user::ApiUser;
use hiro_backend_model::user::UserRef;
use hiro_backend_service::{session::SESSION_TTL_SECS, user::UserProfile};
use serde::Deserialize;
use tracing::info;

use crate::WebServices;

use super::error::{ApiError, ApiResult, OptionExt};

pub const SESSION_COOKIE: &str = "hiro_session";

/// The logged-in user, resolved from the session cookie.
pub struct CurrentUser(pub UserRef);

impl FromRequestParts<WebServices> for CurrentUser {
	type Rejection = ApiError;

	async fn from_request_parts(
		parts: &mut Parts,
		services: &WebServices,
	) -> Result<Self, Self::Rejection> {
		let token = session_token(&parts.headers).ok_or(ApiError::AuthRequired)?;
		match services.backend.session.lookup(&token).await? {
			Some(user) => Ok(Self(user)),
			None => Err(ApiError::AuthRequired),
		}
	}
}

fn session_token(headers: &HeaderMap) -> Option<String> {
	let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
	cookies.split(';').find_map(|cookie| {
		let (name, value) = cookie.trim().split_once('=')?;
		(name == SESSION_COOKIE).then(|| value.to_string())
	})
}

pub async fn login(State(services): State<WebServices>) -> ApiResult<Redirect> {
	let state = services.backend.session.issue_oauth_state().await?;
	Ok(Redirect::temporary(
		&services.backend.github.authorize_url(&state),
	))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
	code: String,
	state: String,
}

pub async fn callback(
	State(services): State<WebServices>,
	Query(query): Query<CallbackQuery>,
) -> ApiResult<impl IntoResponse> {
	if !services.backend.session.take_oauth_state(&query.state).await? {
		return Err(ApiError::CustomRef(
			StatusCode::BAD_REQUEST,
			"unknown or expired oauth state",
		));
	}

	let access_token = services.backend.github.exchange_code(&query.code).await?;
	let account = services
		.backend
		.github
		.user_client(&access_token)
		.authenticated_user()
		.await?;

	let github_id = account.id.to_string();
	let user = services
		.backend
		.user
		.upsert(
			UserProfile {
				github_id: &github_id,
				username: &account.login,
				email: account.email.as_deref(),
				avatar_url: account.avatar_url.as_deref(),
			},
			&access_token,
		)
		.await?;
	info!(%user, username = account.login, "user logged in");

	let token = services.backend.session.create(user).await?;
	let cookie = format!(
		"{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
		SESSION_COOKIE, token, SESSION_TTL_SECS
	);
	Ok((
		AppendHeaders([(header::SET_COOKIE, cookie)]),
		Redirect::to(&services.config.web.frontend_base),
	))
}

pub async fn logout(
	State(services): State<WebServices>,
	headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
	if let Some(token) = session_token(&headers) {
		services.backend.session.revoke(&token).await?;
	}
	let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE);
	Ok((
		AppendHeaders([(header::SET_COOKIE, cookie)]),
		Json(serde_json::json!({ "ok": true })),
	))
}

pub async fn me(
	CurrentUser(user): CurrentUser,
	State(services): State<WebServices>,
) -> ApiResult<Json<ApiUser>> {
	let record = services
		.backend
		.user
		.get(user)
		.await?
		.or_api_error(StatusCode::NOT_FOUND, "user not found")?;
	Ok(Json(ApiUser {
		id: record.id.to_string(),
		github_id: record.github_id,
		username: record.username,
		email: record.email,
		avatar_url: record.avatar_url,
		registered_at: record.created_at.assume_utc().unix_timestamp(),
	}))
}
