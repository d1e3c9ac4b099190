use serde::{Deserialize, Serialize};

use crate::{
	database::DatabaseConfig, github::GithubConfig, llm::LlmConfig, redis::RedisConfig,
};

#[derive(Debug, PartialEq, Eq, Clone, Hash, Deserialize, Serialize)]
pub struct BackendConfig {
	pub database: DatabaseConfig,
	pub redis: RedisConfig,
	pub github: GithubConfig,
	pub llm: LlmConfig,
}
