//! Wire types for the GitHub REST API.
//!
//! Only the fields the backend actually consumes are modelled.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct GithubAccount {
	pub id: i64,
	pub login: String,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub email: Option<String>,
	#[serde(default)]
	pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubRepo {
	pub id: i64,
	pub name: String,
	pub full_name: String,
	pub owner: GithubAccount,
	#[serde(default)]
	pub private: bool,
	pub default_branch: String,
	#[serde(default)]
	pub language: Option<String>,
	#[serde(default)]
	pub description: Option<String>,
}

/// One entry of a `GET /contents` listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
	pub name: String,
	pub path: String,
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub sha: Option<String>,
	/// Base64 with embedded newlines, present for single-file responses.
	#[serde(default)]
	pub content: Option<String>,
	#[serde(default)]
	pub encoding: Option<String>,
}

/// `GET /contents` returns an array for directories and an object for files.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentsResponse {
	Listing(Vec<ContentEntry>),
	Single(ContentEntry),
}

impl ContentsResponse {
	pub fn into_entries(self) -> Vec<ContentEntry> {
		match self {
			Self::Listing(entries) => entries,
			Self::Single(entry) => vec![entry],
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitTree {
	pub sha: String,
	pub tree: Vec<GitTreeItem>,
	#[serde(default)]
	pub truncated: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitTreeItem {
	pub path: String,
	#[serde(rename = "type")]
	pub kind: String,
	pub sha: String,
	#[serde(default)]
	pub size: Option<u64>,
}

/// `GET /git/ref/{ref}` response.
#[derive(Debug, Clone, Deserialize)]
pub struct GitRefLookup {
	pub object: GitObject,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitObject {
	pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRefInfo {
	pub sha: String,
	#[serde(rename = "ref", default)]
	pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GithubPullRequest {
	pub number: i64,
	pub title: String,
	pub state: String,
	#[serde(default)]
	pub user: Option<GithubAccount>,
	pub head: GitRefInfo,
	pub base: GitRefInfo,
	#[serde(default)]
	pub additions: i64,
	#[serde(default)]
	pub deletions: i64,
	#[serde(default)]
	pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestFile {
	pub filename: String,
	pub status: String,
	pub additions: i64,
	pub deletions: i64,
	pub changes: i64,
	#[serde(default)]
	pub patch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueComment {
	pub id: i64,
	#[serde(default)]
	pub html_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationTokenResponse {
	pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallationRepositories {
	pub repositories: Vec<GithubRepo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthTokenResponse {
	#[serde(default)]
	pub access_token: Option<String>,
	#[serde(default)]
	pub error: Option<String>,
	#[serde(default)]
	pub error_description: Option<String>,
}

/// Summarized repository context fed into test generation prompts.
#[derive(Debug, Clone, Default)]
pub struct RepositoryContext {
	pub sections: Vec<String>,
	pub files: Vec<String>,
}

impl RepositoryContext {
	pub fn render(&self) -> String {
		self.sections.join("\n\n")
	}
}
