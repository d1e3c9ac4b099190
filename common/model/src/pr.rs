use serde::{Deserialize, Serialize};

/// Analysis state of a tracked pull request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnalysisStatus {
	/// Recorded but not yet analyzed.
	Pending,
	/// An analysis (risk estimate plus review comment) is in flight.
	Analyzing,
	Completed,
	Failed,
}

/// Risk estimate for a set of changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
	Low,
	Medium,
	High,
}

impl RiskLevel {
	/// Classifies a change set by its total changed line count.
	pub fn from_total_changes(total: u64) -> Self {
		if total > 500 {
			Self::High
		} else if total > 100 {
			Self::Medium
		} else {
			Self::Low
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_risk_thresholds() {
		assert_eq!(RiskLevel::from_total_changes(0), RiskLevel::Low);
		assert_eq!(RiskLevel::from_total_changes(100), RiskLevel::Low);
		assert_eq!(RiskLevel::from_total_changes(101), RiskLevel::Medium);
		assert_eq!(RiskLevel::from_total_changes(500), RiskLevel::Medium);
		assert_eq!(RiskLevel::from_total_changes(501), RiskLevel::High);
	}
}
