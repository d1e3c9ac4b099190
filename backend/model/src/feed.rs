use hiro_common_model::feed::ActionKind;

/// Database representation of [ActionKind].
///
/// Stored as a tiny unsigned column. Unknown values are decoded as
/// [ActionKind::PrSuggestion], the most common entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SqlActionKind {
	RepoConnected = 0,
	PrSuggestion = 1,
	TestsGenerated = 2,
	CoverageUpdated = 3,
}

impl From<i16> for SqlActionKind {
	fn from(value: i16) -> Self {
		match value {
			0 => Self::RepoConnected,
			1 => Self::PrSuggestion,
			2 => Self::TestsGenerated,
			3 => Self::CoverageUpdated,
			_ => Self::PrSuggestion,
		}
	}
}

impl From<SqlActionKind> for ActionKind {
	fn from(value: SqlActionKind) -> Self {
		match value {
			SqlActionKind::RepoConnected => Self::RepoConnected,
			SqlActionKind::PrSuggestion => Self::PrSuggestion,
			SqlActionKind::TestsGenerated => Self::TestsGenerated,
			SqlActionKind::CoverageUpdated => Self::CoverageUpdated,
		}
	}
}

impl From<ActionKind> for SqlActionKind {
	fn from(value: ActionKind) -> Self {
		match value {
			ActionKind::RepoConnected => Self::RepoConnected,
			ActionKind::PrSuggestion => Self::PrSuggestion,
			ActionKind::TestsGenerated => Self::TestsGenerated,
			ActionKind::CoverageUpdated => Self::CoverageUpdated,
		}
	}
}
