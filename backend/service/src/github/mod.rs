//! GitHub REST API client.
//!
//! Supports two authentication modes: user OAuth tokens and GitHub App
//! installation tokens. Every request is preceded by a fixed delay to
//! stay clear of secondary rate limits.

pub mod auth;
pub mod types;

use std::{
	collections::HashMap,
	time::{Duration, Instant},
};

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use futures::future::BoxFuture;
use hiro_backend_model::installation::InstallationRef;
use reqwest::{Method, RequestBuilder, StatusCode, header};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

use self::{
	auth::GithubAppConfig,
	types::{
		ContentEntry, ContentsResponse, GitRefLookup, GitTree, GithubAccount, GithubPullRequest,
		GithubRepo, InstallationRepositories, InstallationTokenResponse, IssueComment,
		OAuthTokenResponse, PullRequestFile, RepositoryContext,
	},
};

const USER_AGENT: &str = concat!("hiro/", env!("CARGO_PKG_VERSION"));

/// GitHub installation tokens last an hour; renew well before expiry.
const INSTALLATION_TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

/// Configuration for [`GithubService`].
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GithubConfig {
	/// OAuth app client ID.
	pub client_id: String,
	/// OAuth app client secret.
	pub client_secret: String,
	/// Shared secret for webhook signature verification.
	///
	/// Unsigned webhook deliveries are rejected when this is set.
	#[serde(default)]
	pub webhook_secret: Option<String>,
	/// Base URL of the REST API.
	#[serde(default = "default_api_base")]
	pub api_base: String,
	/// Base URL for the OAuth web flow.
	#[serde(default = "default_web_base")]
	pub web_base: String,
	/// Delay applied before every API call, in milliseconds.
	#[serde(default = "default_request_delay_ms")]
	pub request_delay_ms: u64,
	/// GitHub App credentials, required for installation tokens.
	#[serde(default)]
	pub app: Option<GithubAppConfig>,
}

fn default_api_base() -> String {
	"https://api.github.com".into()
}

fn default_web_base() -> String {
	"https://github.com".into()
}

fn default_request_delay_ms() -> u64 {
	1000
}

#[derive(Debug, Error)]
pub enum GithubError {
	#[error("http request failed: {0}")]
	Http(#[from] reqwest::Error),
	#[error("github api returned {status}: {message}")]
	Api { status: StatusCode, message: String },
	#[error("file not found: {0}")]
	FileNotFound(String),
	#[error("no decodable content for file: {0}")]
	InvalidContent(String),
	#[error("invalid base64 payload: {0}")]
	Base64(#[from] base64::DecodeError),
	#[error("app jwt error: {0}")]
	Jwt(#[from] jsonwebtoken::errors::Error),
	#[error("github app credentials are not configured")]
	AppNotConfigured,
	#[error("oauth code exchange failed: {0}")]
	OAuth(String),
	#[error("invalid github repository url: {0}")]
	InvalidRepoUrl(String),
	#[error("no github credentials available for repository: {0}")]
	NoCredentials(String),
}

struct CachedToken {
	token: String,
	minted_at: Instant,
}

/// Factory for authenticated [`GithubClient`]s.
pub struct GithubService {
	config: GithubConfig,
	http: reqwest::Client,
	installation_tokens: tokio::sync::Mutex<HashMap<InstallationRef, CachedToken>>,
}

impl std::fmt::Debug for GithubService {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("GithubService").finish()
	}
}

impl GithubService {
	pub fn new(config: GithubConfig) -> Result<Self, GithubError> {
		let http = reqwest::Client::builder()
			.user_agent(USER_AGENT)
			.build()?;
		Ok(Self {
			config,
			http,
			installation_tokens: tokio::sync::Mutex::new(HashMap::new()),
		})
	}

	pub fn webhook_secret(&self) -> Option<&str> {
		self.config.webhook_secret.as_deref()
	}

	fn client_with_token(&self, token: String) -> GithubClient {
		GithubClient {
			http: self.http.clone(),
			api_base: self.config.api_base.clone(),
			token,
			delay: Duration::from_millis(self.config.request_delay_ms),
		}
	}

	/// Client authenticated with a user's OAuth access token.
	pub fn user_client(&self, token: impl Into<String>) -> GithubClient {
		self.client_with_token(token.into())
	}

	/// Client authenticated as a GitHub App installation.
	pub async fn installation_client(
		&self,
		installation: InstallationRef,
	) -> Result<GithubClient, GithubError> {
		let token = self.installation_token(installation).await?;
		Ok(self.client_with_token(token))
	}

	async fn installation_token(
		&self,
		installation: InstallationRef,
	) -> Result<String, GithubError> {
		let mut cache = self.installation_tokens.lock().await;
		if let Some(cached) = cache.get(&installation) {
			if cached.minted_at.elapsed() < INSTALLATION_TOKEN_TTL {
				return Ok(cached.token.clone());
			}
		}

		let app = self.config.app.as_ref().ok_or(GithubError::AppNotConfigured)?;
		let now = time::OffsetDateTime::now_utc().unix_timestamp();
		let jwt = auth::make_app_jwt(app, now)?;

		debug!(installation, "minting installation token");
		let response = self
			.http
			.post(format!(
				"{}/app/installations/{}/access_tokens",
				self.config.api_base, installation
			))
			.bearer_auth(&jwt)
			.header(header::ACCEPT, "application/vnd.github+json")
			.send()
			.await?;
		let response = check_status(response).await?;
		let minted: InstallationTokenResponse = response.json().await?;

		cache.insert(
			installation,
			CachedToken {
				token: minted.token.clone(),
				minted_at: Instant::now(),
			},
		);
		Ok(minted.token)
	}

	/// URL to send a user to for the OAuth web flow.
	pub fn authorize_url(&self, state: &str) -> String {
		format!(
			"{}/login/oauth/authorize?client_id={}&scope=read%3Auser%20user%3Aemail%20repo&state={}",
			self.config.web_base, self.config.client_id, state
		)
	}

	/// Exchanges an OAuth `code` for a user access token.
	pub async fn exchange_code(&self, code: &str) -> Result<String, GithubError> {
		let response = self
			.http
			.post(format!("{}/login/oauth/access_token", self.config.web_base))
			.header(header::ACCEPT, "application/json")
			.form(&[
				("client_id", self.config.client_id.as_str()),
				("client_secret", self.config.client_secret.as_str()),
				("code", code),
			])
			.send()
			.await?;
		let response = check_status(response).await?;
		let token: OAuthTokenResponse = response.json().await?;
		match token.access_token {
			Some(access_token) => Ok(access_token),
			None => Err(GithubError::OAuth(
				token
					.error_description
					.or(token.error)
					.unwrap_or_else(|| "no access token in response".into()),
			)),
		}
	}
}

/// An authenticated handle to one GitHub identity.
#[derive(Debug, Clone)]
pub struct GithubClient {
	http: reqwest::Client,
	api_base: String,
	token: String,
	delay: Duration,
}

impl GithubClient {
	async fn request(&self, method: Method, path: &str) -> RequestBuilder {
		// Fixed pacing between calls keeps us under secondary rate limits.
		tokio::time::sleep(self.delay).await;
		self.http
			.request(method, format!("{}{}", self.api_base, path))
			.bearer_auth(&self.token)
			.header(header::ACCEPT, "application/vnd.github+json")
	}

	async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, GithubError> {
		let response = self.request(Method::GET, path).await.send().await?;
		Ok(check_status(response).await?.json().await?)
	}

	pub async fn authenticated_user(&self) -> Result<GithubAccount, GithubError> {
		self.get_json("/user").await
	}

	pub async fn get_repository(&self, owner: &str, repo: &str) -> Result<GithubRepo, GithubError> {
		self.get_json(&format!("/repos/{}/{}", owner, repo)).await
	}

	/// Repositories the token's user has access to, most recently updated first.
	pub async fn list_user_repositories(&self) -> Result<Vec<GithubRepo>, GithubError> {
		self.get_json("/user/repos?per_page=100&sort=updated").await
	}

	/// Repositories accessible to the authenticated installation.
	pub async fn list_installation_repositories(&self) -> Result<Vec<GithubRepo>, GithubError> {
		let listing: InstallationRepositories =
			self.get_json("/installation/repositories?per_page=100").await?;
		Ok(listing.repositories)
	}

	/// Lists directory contents. A missing path yields an empty listing.
	pub async fn get_contents(
		&self,
		owner: &str,
		repo: &str,
		path: &str,
		git_ref: Option<&str>,
	) -> Result<Vec<ContentEntry>, GithubError> {
		let url = contents_url(owner, repo, path, git_ref);
		let response = self.request(Method::GET, &url).await.send().await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(Vec::new());
		}
		let response = check_status(response).await?;
		let contents: ContentsResponse = response.json().await?;
		Ok(contents.into_entries())
	}

	/// Fetches and decodes a single file.
	pub async fn file_content(
		&self,
		owner: &str,
		repo: &str,
		path: &str,
		git_ref: Option<&str>,
	) -> Result<String, GithubError> {
		let url = contents_url(owner, repo, path, git_ref);
		let response = self.request(Method::GET, &url).await.send().await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Err(GithubError::FileNotFound(path.into()));
		}
		let response = check_status(response).await?;
		let entry: ContentEntry = response.json().await?;
		match (entry.content, entry.encoding.as_deref()) {
			(Some(content), Some("base64")) => {
				// GitHub wraps the base64 payload with newlines.
				let packed: String = content.chars().filter(|c| !c.is_whitespace()).collect();
				let bytes = BASE64.decode(packed)?;
				Ok(String::from_utf8_lossy(&bytes).into_owned())
			}
			_ => Err(GithubError::InvalidContent(path.into())),
		}
	}

	/// Full tree of the repository's default branch.
	pub async fn get_tree(
		&self,
		owner: &str,
		repo: &str,
		recursive: bool,
	) -> Result<GitTree, GithubError> {
		let repository = self.get_repository(owner, repo).await?;
		let mut url = format!(
			"/repos/{}/{}/git/trees/{}",
			owner, repo, repository.default_branch
		);
		if recursive {
			url.push_str("?recursive=1");
		}
		self.get_json(&url).await
	}

	/// Recursively collects code file paths under a folder.
	pub fn file_paths_under<'a>(
		&'a self,
		owner: &'a str,
		repo: &'a str,
		folder: &'a str,
		git_ref: Option<&'a str>,
	) -> BoxFuture<'a, Result<Vec<String>, GithubError>> {
		Box::pin(async move {
			let entries = self.get_contents(owner, repo, folder, git_ref).await?;
			let mut paths = Vec::new();
			for entry in entries {
				if entry.kind == "file" {
					if !should_skip_file(&entry.name) {
						paths.push(entry.path);
					}
				} else if entry.kind == "dir" {
					let sub = self
						.file_paths_under(owner, repo, &entry.path, git_ref)
						.await?;
					paths.extend(sub);
				}
			}
			Ok(paths)
		})
	}

	/// Recursively reads every code file, building prompt context.
	///
	/// Files that fail to read are skipped rather than failing the walk.
	pub fn repository_structure<'a>(
		&'a self,
		owner: &'a str,
		repo: &'a str,
		path: &'a str,
	) -> BoxFuture<'a, Result<RepositoryContext, GithubError>> {
		Box::pin(async move {
			let mut context = RepositoryContext::default();
			let entries = self.get_contents(owner, repo, path, None).await?;
			for entry in entries {
				if entry.kind == "file" {
					if should_skip_file(&entry.name) {
						continue;
					}
					match self.file_content(owner, repo, &entry.path, None).await {
						Ok(content) => {
							context
								.sections
								.push(format!("\n=== File: {} ===\n{}", entry.name, content));
							context.files.push(entry.path);
						}
						Err(error) => {
							warn!(file = %entry.name, %error, "skipping unreadable file");
						}
					}
				} else if entry.kind == "dir" {
					let sub = self.repository_structure(owner, repo, &entry.path).await?;
					context.sections.extend(sub.sections);
					context.files.extend(sub.files);
				}
			}
			Ok(context)
		})
	}

	async fn branch_sha(
		&self,
		owner: &str,
		repo: &str,
		branch: &str,
	) -> Result<Option<String>, GithubError> {
		let url = format!("/repos/{}/{}/git/ref/heads/{}", owner, repo, branch);
		let response = self.request(Method::GET, &url).await.send().await?;
		if response.status() == StatusCode::NOT_FOUND {
			return Ok(None);
		}
		let response = check_status(response).await?;
		let lookup: GitRefLookup = response.json().await?;
		Ok(Some(lookup.object.sha))
	}

	/// Creates a branch off `base` (default branch when `None`).
	///
	/// Returns `false` when the branch already exists.
	pub async fn create_branch(
		&self,
		owner: &str,
		repo: &str,
		branch: &str,
		base: Option<&str>,
	) -> Result<bool, GithubError> {
		let base = match base {
			Some(base) => base.to_owned(),
			None => self.get_repository(owner, repo).await?.default_branch,
		};
		let base_sha = self
			.branch_sha(owner, repo, &base)
			.await?
			.ok_or_else(|| GithubError::FileNotFound(format!("heads/{}", base)))?;

		if self.branch_sha(owner, repo, branch).await?.is_some() {
			debug!(owner, repo, branch, "branch already exists");
			return Ok(false);
		}

		let response = self
			.request(Method::POST, &format!("/repos/{}/{}/git/refs", owner, repo))
			.await
			.json(&serde_json::json!({
				"ref": format!("refs/heads/{}", branch),
				"sha": base_sha,
			}))
			.send()
			.await?;
		check_status(response).await?;
		Ok(true)
	}

	/// Creates or updates a file on a branch.
	pub async fn commit_file(
		&self,
		owner: &str,
		repo: &str,
		branch: &str,
		path: &str,
		content: &str,
		message: &str,
	) -> Result<(), GithubError> {
		// Updating an existing file requires its current blob SHA.
		let url = contents_url(owner, repo, path, Some(branch));
		let response = self.request(Method::GET, &url).await.send().await?;
		let sha = if response.status() == StatusCode::NOT_FOUND {
			None
		} else {
			let entry: ContentEntry = check_status(response).await?.json().await?;
			entry.sha
		};

		let mut body = serde_json::json!({
			"message": message,
			"content": BASE64.encode(content.as_bytes()),
			"branch": branch,
		});
		if let Some(sha) = sha {
			body["sha"] = serde_json::Value::String(sha);
		}

		let response = self
			.request(
				Method::PUT,
				&format!("/repos/{}/{}/contents/{}", owner, repo, path),
			)
			.await
			.json(&body)
			.send()
			.await?;
		check_status(response).await?;
		Ok(())
	}

	pub async fn get_pull_request(
		&self,
		owner: &str,
		repo: &str,
		number: i64,
	) -> Result<GithubPullRequest, GithubError> {
		self.get_json(&format!("/repos/{}/{}/pulls/{}", owner, repo, number))
			.await
	}

	pub async fn pull_request_files(
		&self,
		owner: &str,
		repo: &str,
		number: i64,
	) -> Result<Vec<PullRequestFile>, GithubError> {
		self.get_json(&format!(
			"/repos/{}/{}/pulls/{}/files?per_page=100",
			owner, repo, number
		))
		.await
	}

	pub async fn create_pull_request(
		&self,
		owner: &str,
		repo: &str,
		title: &str,
		head: &str,
		base: &str,
		body: Option<&str>,
	) -> Result<GithubPullRequest, GithubError> {
		let response = self
			.request(Method::POST, &format!("/repos/{}/{}/pulls", owner, repo))
			.await
			.json(&serde_json::json!({
				"title": title,
				"head": head,
				"base": base,
				"body": body,
			}))
			.send()
			.await?;
		Ok(check_status(response).await?.json().await?)
	}

	pub async fn create_comment(
		&self,
		owner: &str,
		repo: &str,
		issue_number: i64,
		body: &str,
	) -> Result<IssueComment, GithubError> {
		let response = self
			.request(
				Method::POST,
				&format!("/repos/{}/{}/issues/{}/comments", owner, repo, issue_number),
			)
			.await
			.json(&serde_json::json!({ "body": body }))
			.send()
			.await?;
		Ok(check_status(response).await?.json().await?)
	}
}

fn contents_url(owner: &str, repo: &str, path: &str, git_ref: Option<&str>) -> String {
	let mut url = format!("/repos/{}/{}/contents/{}", owner, repo, path);
	if let Some(git_ref) = git_ref {
		url.push_str("?ref=");
		url.push_str(git_ref);
	}
	url
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GithubError> {
	let status = response.status();
	if status.is_success() {
		Ok(response)
	} else {
		let message = response.text().await.unwrap_or_default();
		let message = message.chars().take(256).collect();
		Err(GithubError::Api { status, message })
	}
}

/// Extracts `(owner, repo)` from a GitHub repository URL.
pub fn parse_repo_url(url: &str) -> Result<(String, String), GithubError> {
	let invalid = || GithubError::InvalidRepoUrl(url.into());
	let path = url
		.split_once("github.com")
		.map(|(_, rest)| rest)
		.ok_or_else(invalid)?;
	let mut parts = path
		.trim_start_matches([':', '/'])
		.split('/')
		.filter(|part| !part.is_empty());
	let owner = parts.next().ok_or_else(invalid)?;
	let repo = parts
		.next()
		.map(|repo| repo.trim_end_matches(".git"))
		.ok_or_else(invalid)?;
	if owner.is_empty() || repo.is_empty() {
		return Err(invalid());
	}
	Ok((owner.to_owned(), repo.to_owned()))
}

/// Name suffixes that never get tests generated.
const SKIPPED_SUFFIXES: &[&str] = &[
	".png",
	".jpg",
	".jpeg",
	".gif",
	".svg",
	".ico",
	".pdf",
	".avif",
	".lock",
	".gitignore",
	".env",
	".yml",
	".yaml",
	"dockerfile",
	".md",
];

/// Whether a file is binary, config or docs rather than testable code.
pub fn should_skip_file(name: &str) -> bool {
	let lower = name.to_lowercase();
	SKIPPED_SUFFIXES
		.iter()
		.any(|suffix| lower.ends_with(suffix) || lower == *suffix)
}

#[cfg(test)]
mod test {
	use super::{parse_repo_url, should_skip_file};

	#[test]
	fn test_should_skip_file() {
		assert!(should_skip_file("logo.PNG"));
		assert!(should_skip_file("README.md"));
		assert!(should_skip_file("Cargo.lock"));
		assert!(should_skip_file(".env"));
		assert!(should_skip_file("Dockerfile"));
		assert!(!should_skip_file("main.rs"));
		assert!(!should_skip_file("index.ts"));
		assert!(!should_skip_file("environment.ts"));
	}

	#[test]
	fn test_parse_repo_url() {
		assert_eq!(
			parse_repo_url("https://github.com/octocat/hello-world").unwrap(),
			("octocat".into(), "hello-world".into())
		);
		assert_eq!(
			parse_repo_url("https://github.com/octocat/hello-world.git").unwrap(),
			("octocat".into(), "hello-world".into())
		);
		assert!(parse_repo_url("https://github.com/octocat").is_err());
		assert!(parse_repo_url("https://example.com/octocat/repo").is_err());
	}
}
