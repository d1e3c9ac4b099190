use serde::{Deserialize, Serialize};

/// Kind of an action feed entry.
///
/// The feed is append-only; entries are never updated after insertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
	/// A repository was connected to Hiro.
	RepoConnected,
	/// A pull request was analyzed and a review comment was suggested.
	PrSuggestion,
	/// A test generation job finished and produced results.
	TestsGenerated,
	/// A coverage snapshot was refreshed.
	CoverageUpdated,
}
