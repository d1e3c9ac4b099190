use serde::{Deserialize, Serialize};

use crate::UnixTime;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiRepository {
	pub id: String,
	pub github_id: i64,
	pub name: String,
	pub full_name: String,
	pub owner: String,
	pub private: bool,
	pub default_branch: String,
	pub language: Option<String>,
	/// Whether the repository is reachable through an App installation.
	pub connected_via_app: bool,
	pub settings: ApiRepoSettings,
	pub connected_at: UnixTime,
}

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiRepoSettings {
	pub enabled: bool,
	pub auto_generate_tests: bool,
	pub only_changed_files: bool,
	pub max_prs_per_day: i32,
	pub protected_dirs: Vec<String>,
}

/// Body of `POST /api/repos`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ConnectRepoRequest {
	/// Repository URL, e.g. `https://github.com/octocat/hello-world`.
	pub github_url: String,
}

/// Body of `PATCH /api/repos/{repo}`; omitted fields keep their
/// current value.
#[derive(Debug, PartialEq, Eq, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSettingsRequest {
	pub enabled: Option<bool>,
	pub auto_generate_tests: Option<bool>,
	pub only_changed_files: Option<bool>,
	pub max_prs_per_day: Option<i32>,
	pub protected_dirs: Option<Vec<String>>,
}

/// One entry of `GET /api/repos/{repo}/contents`.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiContentEntry {
	pub name: String,
	pub path: String,
	/// `file` or `dir`, as reported by GitHub.
	pub kind: String,
}

/// A repository the user could connect, from the GitHub-side listing.
#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiAvailableRepository {
	pub github_id: i64,
	pub full_name: String,
	pub private: bool,
	pub language: Option<String>,
	/// Set when the repository is already connected.
	pub connected: bool,
}
