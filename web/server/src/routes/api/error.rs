use axum::{
	Json,
	http::StatusCode,
	response::{IntoResponse, Response},
};
use hiro_backend_service::{BackendError, github::GithubError, repo::RepoError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
	#[error(transparent)]
	BackendError(BackendError),

	#[error("api error: {1}")]
	CustomRef(StatusCode, &'static str),
	#[error("api error: {1}")]
	CustomString(StatusCode, String),

	#[error("authentication is required")]
	AuthRequired,
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let (status, message) = match self {
			ApiError::CustomRef(status, message) => (status, message.to_string()),
			ApiError::CustomString(status, message) => (status, message),
			ApiError::AuthRequired => (
				StatusCode::UNAUTHORIZED,
				"authentication is required".to_string(),
			),
			ApiError::BackendError(error) => (backend_error_status(&error), error.to_string()),
		};
		(status, Json(serde_json::json!({ "error": message }))).into_response()
	}
}

fn backend_error_status(error: &BackendError) -> StatusCode {
	match error {
		BackendError::RepoError(RepoError::AlreadyConnected(_)) => StatusCode::CONFLICT,
		BackendError::GithubError(GithubError::FileNotFound(_)) => StatusCode::NOT_FOUND,
		BackendError::GithubError(GithubError::InvalidRepoUrl(_)) => StatusCode::BAD_REQUEST,
		_ => StatusCode::INTERNAL_SERVER_ERROR,
	}
}

impl<T: Into<BackendError>> From<T> for ApiError {
	fn from(value: T) -> Self {
		Self::BackendError(value.into())
	}
}

pub(crate) type ApiResult<T> = Result<T, ApiError>;

pub(crate) trait IntoCustomApiError {
	fn into_custom_api_error(self, status: StatusCode) -> ApiError;
}

impl IntoCustomApiError for &'static str {
	fn into_custom_api_error(self, status: StatusCode) -> ApiError {
		ApiError::CustomRef(status, self)
	}
}
impl IntoCustomApiError for String {
	fn into_custom_api_error(self, status: StatusCode) -> ApiError {
		ApiError::CustomString(status, self)
	}
}

pub(crate) trait OptionExt<T> {
	fn or_api_error<M: IntoCustomApiError>(
		self,
		status: StatusCode,
		message: M,
	) -> Result<T, ApiError>;
}

impl<T> OptionExt<T> for Option<T> {
	fn or_api_error<M: IntoCustomApiError>(
		self,
		status: StatusCode,
		message: M,
	) -> Result<T, ApiError> {
		match self {
			Some(val) => Ok(val),
			None => Err(message.into_custom_api_error(status)),
		}
	}
}
