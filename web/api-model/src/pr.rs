use hiro_common_model::pr::{AnalysisStatus, RiskLevel};
use serde::{Deserialize, Serialize};

use crate::UnixTime;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiPullRequest {
	pub id: String,
	pub repository: String,
	pub pr_number: i32,
	pub title: String,
	pub state: String,
	pub author: String,
	pub head_sha: String,
	pub base_sha: String,
	pub changed_files: Vec<String>,
	pub additions: i32,
	pub deletions: i32,
	pub analysis_status: AnalysisStatus,
	pub has_tests: Option<bool>,
	pub risk_level: Option<RiskLevel>,
	pub suggestions: Vec<String>,
	pub analyzed_at: Option<UnixTime>,
	pub created_at: UnixTime,
}
