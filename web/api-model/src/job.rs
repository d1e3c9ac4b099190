use hiro_common_model::job::{JobKind, JobStatus};
use kstring::KString;
use serde::{Deserialize, Serialize};

use crate::UnixTime;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiJob {
	pub id: String,
	pub repository: String,
	pub pull_request: Option<String>,
	pub kind: JobKind,
	pub status: JobStatus,
	/// Share of target files processed, 0..=100.
	pub progress: u8,
	pub target_files: Vec<String>,
	pub created_at: UnixTime,
	pub started_at: Option<UnixTime>,
	pub completed_at: Option<UnixTime>,
}

/// Body of `POST /api/jobs`, for manually triggered test generation.
///
/// Either a folder or an explicit file list may be given; with
/// neither, the whole repository is targeted.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct CreateJobRequest {
	pub repository: String,
	pub target_folder: Option<String>,
	pub target_files: Option<Vec<String>>,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiTestResult {
	pub id: String,
	pub job: String,
	pub file_path: String,
	pub test_file_path: String,
	pub test_code: String,
	/// Markdown notes on how to run the tests.
	pub metadata: String,
	pub required_packages: Vec<KString>,
	pub test_framework: Option<String>,
	pub created_at: UnixTime,
}

/// A job together with the test files it produced so far.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiJobWithResults {
	#[serde(flatten)]
	pub job: ApiJob,
	pub results: Vec<ApiTestResult>,
}

/// Response of `POST /api/jobs/process`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiQueueStatus {
	pub pending: i64,
}
