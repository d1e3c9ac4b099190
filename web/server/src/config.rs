use hiro_backend_service::{
	config::BackendConfig, database::DatabaseConfig, github::GithubConfig, llm::LlmConfig,
	redis::RedisConfig,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct HiroWebConfig {
	pub web: WebConfig,
	pub database: DatabaseConfig,
	pub redis: RedisConfig,
	pub github: GithubConfig,
	pub llm: LlmConfig,
}

impl TryFrom<HiroWebConfig> for BackendConfig {
	type Error = anyhow::Error;

	fn try_from(config: HiroWebConfig) -> Result<Self, Self::Error> {
		Ok(BackendConfig {
			database: config.database,
			redis: config.redis,
			github: config.github,
			llm: config.llm,
		})
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct WebConfig {
	/// Address for the web server to listen on.
	///
	/// Examples:
	/// - `unix://hiro.socket`
	/// - `tcp://127.0.0.1:8000`
	pub listen: String,
	/// Base URL of the dashboard frontend, used for post-login redirects.
	#[serde(default = "default_frontend_base")]
	pub frontend_base: String,
}

fn default_frontend_base() -> String {
	"/".into()
}
