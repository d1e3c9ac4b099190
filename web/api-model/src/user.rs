use serde::{Deserialize, Serialize};

use crate::UnixTime;

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct ApiUser {
	pub id: String,
	pub github_id: String,
	pub username: String,
	pub email: Option<String>,
	pub avatar_url: Option<String>,
	pub registered_at: UnixTime,
}
