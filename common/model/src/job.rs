use serde::{Deserialize, Serialize};

/// What a test job was created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
	/// Test generation triggered by a pull request webhook.
	PrAnalysis,
	/// Test generation over a user-selected set of repository files.
	FullRepo,
}

/// Lifecycle state of a test job.
///
/// Jobs move `pending -> processing -> completed | failed`.
/// There are no retries; a failed job keeps its error message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobStatus {
	/// Waiting to be claimed by a job runner.
	Pending,
	/// Claimed by a runner; `progress` advances per processed file.
	Processing,
	Completed,
	Failed { error: String },
}

impl JobStatus {
	pub fn is_terminal(&self) -> bool {
		matches!(self, JobStatus::Completed | JobStatus::Failed { .. })
	}
}
