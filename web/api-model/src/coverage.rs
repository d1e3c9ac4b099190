use serde::{Deserialize, Serialize};

use crate::UnixTime;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ApiCoverageSnapshot {
	pub id: String,
	pub repository: String,
	pub overall_coverage: f64,
	/// File path to coverage percentage.
	pub file_coverage: serde_json::Value,
	pub total_files: i32,
	pub tested_files: i32,
	pub created_at: UnixTime,
}
