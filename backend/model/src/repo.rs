use uuid::Uuid;

pub type RepoRef = Uuid;

/// Per-repository automation settings.
///
/// These map one-to-one onto columns of the `repository` table and
/// drive how webhook events are turned into test jobs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoSettings {
	/// Disabled repositories are ignored by the webhook receiver
	/// and hidden from repository listings.
	pub enabled: bool,
	/// Enqueue a test generation job for every opened/updated PR.
	pub auto_generate_tests: bool,
	/// Restrict PR jobs to added/modified files.
	pub only_changed_files: bool,
	/// Upper bound on Hiro-created PRs per day.
	pub max_prs_per_day: i32,
	/// Path prefixes that must never be touched by generated tests.
	pub protected_dirs: Vec<String>,
}

impl Default for RepoSettings {
	fn default() -> Self {
		Self {
			enabled: true,
			auto_generate_tests: false,
			only_changed_files: true,
			max_prs_per_day: 3,
			protected_dirs: Vec::new(),
		}
	}
}
