use hiro_common_model::pr::{AnalysisStatus, RiskLevel};
use uuid::Uuid;

pub type PullRequestRef = Uuid;

/// Database representation of [AnalysisStatus].
///
/// Stored as a tiny unsigned column. Unknown values are decoded as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SqlAnalysisStatus {
	#[default]
	Pending = 0,
	Analyzing = 1,
	Completed = 2,
	Failed = 3,
}

impl From<u8> for SqlAnalysisStatus {
	fn from(value: u8) -> Self {
		Self::from(value as i16)
	}
}

impl From<i16> for SqlAnalysisStatus {
	fn from(value: i16) -> Self {
		match value {
			0 => Self::Pending,
			1 => Self::Analyzing,
			2 => Self::Completed,
			3 => Self::Failed,
			_ => Self::Failed,
		}
	}
}

impl From<SqlAnalysisStatus> for AnalysisStatus {
	fn from(value: SqlAnalysisStatus) -> Self {
		match value {
			SqlAnalysisStatus::Pending => Self::Pending,
			SqlAnalysisStatus::Analyzing => Self::Analyzing,
			SqlAnalysisStatus::Completed => Self::Completed,
			SqlAnalysisStatus::Failed => Self::Failed,
		}
	}
}

impl From<AnalysisStatus> for SqlAnalysisStatus {
	fn from(value: AnalysisStatus) -> Self {
		match value {
			AnalysisStatus::Pending => Self::Pending,
			AnalysisStatus::Analyzing => Self::Analyzing,
			AnalysisStatus::Completed => Self::Completed,
			AnalysisStatus::Failed => Self::Failed,
		}
	}
}

/// Database representation of [RiskLevel].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SqlRiskLevel {
	Low = 0,
	Medium = 1,
	High = 2,
}

impl From<i16> for SqlRiskLevel {
	fn from(value: i16) -> Self {
		match value {
			0 => Self::Low,
			1 => Self::Medium,
			2 => Self::High,
			_ => Self::High,
		}
	}
}

impl From<SqlRiskLevel> for RiskLevel {
	fn from(value: SqlRiskLevel) -> Self {
		match value {
			SqlRiskLevel::Low => Self::Low,
			SqlRiskLevel::Medium => Self::Medium,
			SqlRiskLevel::High => Self::High,
		}
	}
}

impl From<RiskLevel> for SqlRiskLevel {
	fn from(value: RiskLevel) -> Self {
		match value {
			RiskLevel::Low => Self::Low,
			RiskLevel::Medium => Self::Medium,
			RiskLevel::High => Self::High,
		}
	}
}
