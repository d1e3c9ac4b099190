//! Hiro backend services.

use std::sync::Arc;

use config::BackendConfig;
use coverage::CoverageService;
use database::{DatabaseError, DatabaseService};
use feed::FeedService;
use github::{GithubError, GithubService};
use installation::InstallationService;
use job::{JobError, JobService};
use llm::{LlmError, LlmService};
use pr::PullRequestService;
use redis::{RedisError, RedisService};
use repo::{RepoError, RepoService};
use session::SessionService;
use thiserror::Error;
use user::UserService;

pub mod bus;
pub mod config;
pub mod coverage;
pub mod database;
pub mod feed;
pub mod github;
pub mod installation;
pub mod job;
pub mod llm;
pub mod pr;
pub mod redis;
pub mod repo;
pub mod session;
pub mod user;
pub mod webhook;

/// Service container for Hiro backends.
///
/// All services are wrapped with [`Arc`].
#[derive(Debug, Clone)]
pub struct BackendServices {
	pub config: Arc<BackendConfig>,
	pub redis: Arc<RedisService>,
	pub database: Arc<DatabaseService>,
	pub session: Arc<SessionService>,
	pub github: Arc<GithubService>,
	pub llm: Arc<LlmService>,
	pub user: Arc<UserService>,
	pub repo: Arc<RepoService>,
	pub installation: Arc<InstallationService>,
	pub pr: Arc<PullRequestService>,
	pub job: Arc<JobService>,
	pub coverage: Arc<CoverageService>,
	pub feed: Arc<FeedService>,
}

impl BackendServices {
	#[tracing::instrument(skip(config))]
	pub async fn new(config: BackendConfig) -> Result<Self> {
		let config = Arc::new(config);
		let redis = Arc::new(RedisService::new(&config.redis).await?);
		let database = Arc::new(DatabaseService::new(&config.database).await?);
		let session = Arc::new(SessionService::new(redis.clone()));
		let github = Arc::new(GithubService::new(config.github.clone())?);
		let llm = Arc::new(LlmService::new(config.llm.clone())?);
		let user = Arc::new(UserService::new(database.clone()));
		let repo = Arc::new(RepoService::new(database.clone()));
		let installation = Arc::new(InstallationService::new(database.clone()));
		let pr = Arc::new(PullRequestService::new(database.clone()));
		let job = Arc::new(JobService::new(database.clone()));
		let coverage = Arc::new(CoverageService::new(database.clone()));
		let feed = Arc::new(FeedService::new(database.clone()));

		Ok(Self {
			config,
			redis,
			database,
			session,
			github,
			llm,
			user,
			repo,
			installation,
			pr,
			job,
			coverage,
			feed,
		})
	}

	/// Picks the best available GitHub credentials for a repository.
	///
	/// App installations take precedence over the connecting user's OAuth
	/// token, matching the permissions GitHub grants each.
	pub async fn github_client_for_repo(
		&self,
		repo: &repo::RepoRecord,
	) -> Result<github::GithubClient> {
		if let Some(installation) = repo.installation_id {
			return Ok(self.github.installation_client(installation).await?);
		}
		if let Some(user_id) = repo.user_id {
			if let Some(token) = self.user.access_token(*user_id).await? {
				return Ok(self.github.user_client(token));
			}
		}
		Err(GithubError::NoCredentials(repo.full_name.clone()).into())
	}
}

/// Backend errors.
#[derive(Debug, Error)]
pub enum BackendError {
	#[error("JSON error: {0}")]
	JsonError(#[from] serde_json::Error),
	#[error(transparent)]
	DatabaseError(#[from] DatabaseError),
	#[error(transparent)]
	RedisError(#[from] RedisError),
	#[error(transparent)]
	GithubError(#[from] GithubError),
	#[error(transparent)]
	LlmError(#[from] LlmError),
	#[error(transparent)]
	RepoError(#[from] RepoError),
	#[error(transparent)]
	JobError(#[from] JobError),
}

/// A specialized [`Result`] for backend errors.
pub type Result<T, E = BackendError> = std::result::Result<T, E>;

impl From<diesel::result::Error> for BackendError {
	fn from(value: diesel::result::Error) -> Self {
		Self::DatabaseError(DatabaseError::QueryError(value))
	}
}

#[cfg(test)]
pub(crate) mod test {
	use crate::{
		config::BackendConfig,
		database::DatabaseConfig,
		github::GithubConfig,
		llm::LlmConfig,
		redis::RedisConfig,
	};

	use crate::*;

	pub async fn test_env() -> BackendServices {
		let config = BackendConfig {
			database: DatabaseConfig {
				url: "sqlite://:memory:".to_string(),
				max_connections: 1,
			},
			redis: RedisConfig {
				url: "redis://127.0.0.1".to_string(),
				max_connections: 1,
			},
			github: GithubConfig {
				client_id: "test-client".into(),
				client_secret: "test-secret".into(),
				webhook_secret: Some("It's a Secret to Everybody".into()),
				api_base: "http://127.0.0.1:1/api".into(),
				web_base: "http://127.0.0.1:1".into(),
				request_delay_ms: 0,
				app: None,
			},
			llm: LlmConfig {
				api_key: "test-key".into(),
				base_url: "http://127.0.0.1:1/openai/v1".into(),
				model: "test-model".into(),
				max_tokens: 4000,
			},
		};
		BackendServices::new(config).await.unwrap()
	}

	#[tokio::test]
	async fn test_init_services() {
		let env = test_env().await;
		assert!(env.job.fetch_and_start().await.unwrap().is_none());
		assert_eq!(env.job.count_pending().await.unwrap(), 0);
	}
}
