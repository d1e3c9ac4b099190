use hiro_common_model::{feed::ActionKind, pr::RiskLevel};
use serde::{Deserialize, Serialize};

use crate::UnixTime;

#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct ApiFeedEntry {
	pub id: String,
	pub repository: String,
	pub kind: ActionKind,
	pub title: String,
	pub description: Option<String>,
	pub pr_number: Option<i32>,
	pub pr_url: Option<String>,
	pub risk_level: Option<RiskLevel>,
	pub coverage_impact: Option<f64>,
	pub created_at: UnixTime,
}
