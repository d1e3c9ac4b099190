use hiro_backend_service::{
	config::BackendConfig, database::DatabaseConfig, github::GithubConfig, llm::LlmConfig,
	redis::RedisConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct WorkerConfig {
	pub http: HttpConfig,
	pub database: DatabaseConfig,
	pub redis: RedisConfig,
	pub github: GithubConfig,
	pub llm: LlmConfig,
	pub runners: usize,
}

impl TryFrom<WorkerConfig> for BackendConfig {
	type Error = anyhow::Error;

	fn try_from(config: WorkerConfig) -> Result<Self, Self::Error> {
		Ok(BackendConfig {
			database: config.database,
			redis: config.redis,
			github: config.github,
			llm: config.llm,
		})
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct HttpConfig {
	/// Address for the status endpoint to listen on.
	///
	/// Examples:
	/// - `unix://hiro-worker.socket`
	/// - `tcp://127.0.0.1:8001`
	pub listen: String,
}
