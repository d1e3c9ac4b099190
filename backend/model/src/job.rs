use hiro_common_model::job::{JobKind, JobStatus};
use uuid::Uuid;

/// Unique identifier of a test job.
///
/// The ID must be a UUID v7, of which the timestamp is the time
/// when the job was created.
pub type JobRef = Uuid;

/// Database representation of [JobStatus].
///
/// Stored as a tiny unsigned column. Unknown values are decoded as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum SqlJobStatus {
	/// Waiting for a job runner to claim it.
	///
	/// Only jobs in this state may be claimed; the claim is an
	/// atomic conditional update, so two runners can never both
	/// win the same job.
	#[default]
	Pending = 0,
	/// Claimed by a runner.
	///
	/// `started_at` is set in the same update that enters this state.
	Processing = 1,
	Completed = 2,
	Failed = 3,
}

impl From<u8> for SqlJobStatus {
	fn from(value: u8) -> Self {
		Self::from(value as i16)
	}
}

impl From<i16> for SqlJobStatus {
	fn from(value: i16) -> Self {
		match value {
			0 => Self::Pending,
			1 => Self::Processing,
			2 => Self::Completed,
			3 => Self::Failed,
			_ => Self::Failed,
		}
	}
}

impl SqlJobStatus {
	pub fn into_common(&self, error: Option<String>) -> JobStatus {
		match self {
			SqlJobStatus::Pending => JobStatus::Pending,
			SqlJobStatus::Processing => JobStatus::Processing,
			SqlJobStatus::Completed => JobStatus::Completed,
			SqlJobStatus::Failed => JobStatus::Failed {
				error: error.unwrap_or_default(),
			},
		}
	}
}

/// Database representation of [JobKind].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SqlJobKind {
	/// [JobKind::PrAnalysis]
	PrAnalysis = 0,
	/// [JobKind::FullRepo]
	FullRepo = 1,
}

impl From<u8> for SqlJobKind {
	fn from(value: u8) -> Self {
		Self::from(value as i16)
	}
}

impl From<i16> for SqlJobKind {
	fn from(value: i16) -> Self {
		match value {
			0 => Self::PrAnalysis,
			1 => Self::FullRepo,
			_ => Self::FullRepo,
		}
	}
}

impl From<JobKind> for SqlJobKind {
	fn from(value: JobKind) -> Self {
		match value {
			JobKind::PrAnalysis => Self::PrAnalysis,
			JobKind::FullRepo => Self::FullRepo,
		}
	}
}

impl From<SqlJobKind> for JobKind {
	fn from(value: SqlJobKind) -> Self {
		match value {
			SqlJobKind::PrAnalysis => Self::PrAnalysis,
			SqlJobKind::FullRepo => Self::FullRepo,
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn test_status_decoding() {
		assert_eq!(SqlJobStatus::from(0i16), SqlJobStatus::Pending);
		assert_eq!(SqlJobStatus::from(2i16), SqlJobStatus::Completed);
		// unknown values must land in a terminal state
		assert_eq!(SqlJobStatus::from(42i16), SqlJobStatus::Failed);
	}

	#[test]
	fn test_status_into_common() {
		assert_eq!(
			SqlJobStatus::Failed.into_common(Some("boom".into())),
			hiro_common_model::job::JobStatus::Failed {
				error: "boom".into()
			}
		);
		assert_eq!(
			SqlJobStatus::Pending.into_common(None),
			hiro_common_model::job::JobStatus::Pending
		);
	}
}
