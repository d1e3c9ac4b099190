//! GitHub webhook receiver.

use axum::{
	Json,
	body::Bytes,
	extract::State,
	http::{HeaderMap, StatusCode},
};
use hiro_backend_model::{bus::DispatchBusMessage, pr::PullRequestRef};
use hiro_backend_service::{
	feed::NewFeedEntry,
	github::{should_skip_file, types::PullRequestFile},
	installation::InstallationAccount,
	job::NewJob,
	llm::CodeAnalysis,
	pr::{AnalysisOutcome, PrUpsert},
	repo::{NewRepository, RepoRecord, RepoSettingsUpdate},
	webhook::{DELIVERY_HEADER, EVENT_HEADER, SIGNATURE_HEADER, verify_signature},
};
use hiro_common_model::{
	feed::ActionKind,
	job::JobKind,
	pr::RiskLevel,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::WebServices;

use super::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
struct WebhookPayload {
	#[serde(default)]
	action: Option<String>,
	#[serde(default)]
	repository: Option<PayloadRepo>,
	#[serde(default)]
	pull_request: Option<PayloadPullRequest>,
	#[serde(default)]
	installation: Option<PayloadInstallation>,
	#[serde(default)]
	repositories: Option<Vec<PayloadShortRepo>>,
	#[serde(default)]
	repositories_added: Option<Vec<PayloadShortRepo>>,
	#[serde(default)]
	repositories_removed: Option<Vec<PayloadShortRepo>>,
}

#[derive(Debug, Deserialize)]
struct PayloadAccount {
	id: i64,
	login: String,
	#[serde(rename = "type", default)]
	kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayloadRepo {
	id: i64,
	full_name: String,
}

#[derive(Debug, Deserialize)]
struct PayloadShortRepo {
	id: i64,
	name: String,
	full_name: String,
	#[serde(default)]
	private: bool,
}

#[derive(Debug, Deserialize)]
struct PayloadRef {
	sha: String,
}

#[derive(Debug, Deserialize)]
struct PayloadPullRequest {
	number: i64,
	title: String,
	state: String,
	#[serde(default)]
	user: Option<PayloadAccount>,
	head: PayloadRef,
	base: PayloadRef,
	#[serde(default)]
	additions: i64,
	#[serde(default)]
	deletions: i64,
	#[serde(default)]
	html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PayloadInstallation {
	id: i64,
	account: PayloadAccount,
}

pub async fn github_webhook(
	State(services): State<WebServices>,
	headers: HeaderMap,
	body: Bytes,
) -> ApiResult<Json<serde_json::Value>> {
	let event = required_header(&headers, EVENT_HEADER)?;
	let delivery = required_header(&headers, DELIVERY_HEADER)?;
	let signature = required_header(&headers, SIGNATURE_HEADER)?;

	let Some(secret) = services.backend.github.webhook_secret() else {
		return Err(ApiError::CustomRef(
			StatusCode::INTERNAL_SERVER_ERROR,
			"webhook secret is not configured",
		));
	};
	if !verify_signature(&body, &signature, secret) {
		warn!(delivery, "webhook signature mismatch");
		return Err(ApiError::CustomRef(
			StatusCode::UNAUTHORIZED,
			"invalid webhook signature",
		));
	}

	let payload: WebhookPayload = serde_json::from_slice(&body)
		.map_err(|_| ApiError::CustomRef(StatusCode::BAD_REQUEST, "malformed webhook payload"))?;

	info!(event, delivery, "received webhook delivery");
	match event.as_str() {
		"pull_request" => handle_pull_request(&services, payload).await?,
		"push" => info!(delivery, "push event acknowledged"),
		"installation" => handle_installation(&services, payload).await?,
		"installation_repositories" => handle_installation_repositories(&services, payload).await?,
		other => info!(event = other, "ignoring unhandled webhook event"),
	}

	Ok(Json(serde_json::json!({ "received": true })))
}

fn required_header(headers: &HeaderMap, name: &'static str) -> ApiResult<String> {
	headers
		.get(name)
		.and_then(|value| value.to_str().ok())
		.map(str::to_string)
		.ok_or(ApiError::CustomString(
			StatusCode::BAD_REQUEST,
			format!("missing header: {}", name),
		))
}

async fn handle_pull_request(services: &WebServices, payload: WebhookPayload) -> ApiResult<()> {
	let action = payload.action.as_deref().unwrap_or_default();
	if !matches!(action, "opened" | "synchronize") {
		return Ok(());
	}
	let (Some(repository), Some(pull)) = (payload.repository, payload.pull_request) else {
		return Ok(());
	};

	let backend = &services.backend;
	let Some(repo) = backend.repo.get_by_github_id(repository.id).await? else {
		info!(repository = repository.full_name, "pull request for untracked repository");
		return Ok(());
	};
	let settings = repo.settings();
	if !settings.enabled {
		return Ok(());
	}

	let client = backend.github_client_for_repo(&repo).await?;
	let (owner, name) = super::repo::split_full_name(&repo);
	let files = client
		.pull_request_files(owner, name, pull.number)
		.await?;

	let changed_files: Vec<String> = files.iter().map(|file| file.filename.clone()).collect();
	let targets: Vec<String> = files
		.iter()
		.filter(|file| {
			!settings.only_changed_files || matches!(file.status.as_str(), "added" | "modified")
		})
		.filter(|file| {
			!settings
				.protected_dirs
				.iter()
				.any(|dir| file.filename.starts_with(dir.as_str()))
		})
		.filter(|file| !should_skip_file(&file.filename))
		.map(|file| file.filename.clone())
		.collect();

	let author = pull
		.user
		.as_ref()
		.map(|account| account.login.as_str())
		.unwrap_or_default();
	let pr_id = backend
		.pr
		.upsert(
			repo.id.0,
			PrUpsert {
				pr_number: pull.number as i32,
				title: &pull.title,
				state: &pull.state,
				head_sha: &pull.head.sha,
				base_sha: &pull.base.sha,
				author,
				changed_files: &changed_files,
				additions: pull.additions as i32,
				deletions: pull.deletions as i32,
			},
		)
		.await?;

	if settings.auto_generate_tests && !targets.is_empty() {
		let mut conn = backend.database.get().await?;
		backend
			.job
			.create(
				&mut conn,
				NewJob {
					repository: repo.id.0,
					pull_request: Some(pr_id),
					kind: JobKind::PrAnalysis,
					target_files: &targets,
					metadata: Some(serde_json::json!({ "pr_number": pull.number })),
				},
			)
			.await?;
		drop(conn);
		services
			.bus
			.dispatch(DispatchBusMessage::ResumeJobRunner)
			.await?;

		backend
			.feed
			.push(NewFeedEntry {
				repository: repo.id.0,
				kind: ActionKind::PrSuggestion,
				title: &format!("Queued test generation for PR #{}", pull.number),
				description: Some(&pull.title),
				pr_number: Some(pull.number as i32),
				pr_url: pull.html_url.as_deref(),
				risk_level: None,
				coverage_impact: None,
				metadata: None,
			})
			.await?;
		return Ok(());
	}

	if let Err(error) = analyze_pull_request(services, &repo, &pull, pr_id, &files).await {
		warn!(pr = pull.number, "pull request analysis failed: {}", error);
		backend.pr.mark_failed(pr_id).await?;
		return Err(error);
	}
	Ok(())
}

/// The analyze-and-comment path for PRs without automatic generation.
async fn analyze_pull_request(
	services: &WebServices,
	repo: &RepoRecord,
	pull: &PayloadPullRequest,
	pr_id: PullRequestRef,
	files: &[PullRequestFile],
) -> ApiResult<()> {
	let backend = &services.backend;
	backend.pr.set_analyzing(pr_id).await?;

	let total_changes = (pull.additions + pull.deletions).max(0) as u64;
	let risk_level = RiskLevel::from_total_changes(total_changes);

	let patches: Vec<&str> = files
		.iter()
		.filter_map(|file| file.patch.as_deref())
		.collect();
	let analysis = backend.llm.analyze_code(&patches.join("\n"), None).await;

	let body = analysis_comment(pull, risk_level, &analysis, files.len());
	let client = backend.github_client_for_repo(repo).await?;
	let (owner, name) = super::repo::split_full_name(repo);
	let comment = client.create_comment(owner, name, pull.number, &body).await?;

	backend
		.pr
		.record_analysis(
			pr_id,
			AnalysisOutcome {
				has_tests: !analysis.needs_tests,
				risk_level,
				suggestions: analysis.suggestions.clone(),
				comment_id: Some(comment.id),
			},
		)
		.await?;

	backend
		.feed
		.push(NewFeedEntry {
			repository: repo.id.0,
			kind: ActionKind::PrSuggestion,
			title: &format!("Analyzed PR #{}", pull.number),
			description: Some(&pull.title),
			pr_number: Some(pull.number as i32),
			pr_url: pull.html_url.as_deref(),
			risk_level: Some(risk_level),
			coverage_impact: None,
			metadata: None,
		})
		.await?;
	Ok(())
}

fn risk_name(level: RiskLevel) -> &'static str {
	match level {
		RiskLevel::Low => "low",
		RiskLevel::Medium => "medium",
		RiskLevel::High => "high",
	}
}

fn analysis_comment(
	pull: &PayloadPullRequest,
	risk_level: RiskLevel,
	analysis: &CodeAnalysis,
	file_count: usize,
) -> String {
	let mut body = format!(
		"## Hiro Analysis\n\n**Risk level:** {}\n**Files changed:** {} (+{}/-{})\n",
		risk_name(risk_level),
		file_count,
		pull.additions,
		pull.deletions
	);
	if analysis.needs_tests {
		body.push_str("\nThis change appears to need test coverage.\n");
	}
	if let Some(framework) = &analysis.test_framework {
		body.push_str(&format!("**Suggested framework:** {}\n", framework));
	}
	if !analysis.suggestions.is_empty() {
		body.push_str("\n### Suggestions\n");
		for suggestion in &analysis.suggestions {
			body.push_str(&format!("- {}\n", suggestion));
		}
	}
	body.push_str("\n_Automated analysis by Hiro._\n");
	body
}

async fn handle_installation(services: &WebServices, payload: WebhookPayload) -> ApiResult<()> {
	let backend = &services.backend;
	let Some(installation) = payload.installation else {
		return Ok(());
	};
	match payload.action.as_deref() {
		Some("created") => {
			let account_id = installation.account.id.to_string();
			backend
				.installation
				.record(
					installation.id,
					InstallationAccount {
						id: &account_id,
						kind: installation.account.kind.as_deref().unwrap_or("User"),
						login: &installation.account.login,
					},
				)
				.await?;
			if let Some(repositories) = payload.repositories {
				upsert_installation_repos(services, installation.id, repositories).await?;
			}
		}
		Some("deleted") => {
			backend.installation.remove(installation.id).await?;
		}
		action => {
			info!(?action, installation = installation.id, "ignoring installation action");
		}
	}
	Ok(())
}

async fn handle_installation_repositories(
	services: &WebServices,
	payload: WebhookPayload,
) -> ApiResult<()> {
	let backend = &services.backend;
	let Some(installation) = payload.installation else {
		return Ok(());
	};
	if let Some(added) = payload.repositories_added {
		upsert_installation_repos(services, installation.id, added).await?;
	}
	if let Some(removed) = payload.repositories_removed {
		for repository in removed {
			if let Some(repo) = backend.repo.get_by_github_id(repository.id).await? {
				backend
					.repo
					.update_settings(
						repo.id.0,
						RepoSettingsUpdate {
							enabled: Some(false),
							..Default::default()
						},
					)
					.await?;
			}
		}
	}
	Ok(())
}

async fn upsert_installation_repos(
	services: &WebServices,
	installation: i64,
	repositories: Vec<PayloadShortRepo>,
) -> ApiResult<()> {
	for repository in repositories {
		let owner = repository
			.full_name
			.split_once('/')
			.map(|(owner, _)| owner)
			.unwrap_or_default();
		services
			.backend
			.repo
			.upsert_from_installation(NewRepository {
				github_id: repository.id,
				name: &repository.name,
				full_name: &repository.full_name,
				owner,
				private: repository.private,
				// Installation payloads omit branch and language
				// details; filled in on the next full fetch.
				default_branch: "main",
				language: None,
				installation_id: Some(installation),
				user_id: None,
			})
			.await?;
	}
	Ok(())
}
