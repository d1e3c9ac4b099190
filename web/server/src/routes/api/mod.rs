use axum::{
	Router,
	routing::{get, post},
};

use crate::WebServices;

pub mod auth;
mod coverage;
pub mod error;
mod feed;
mod job;
mod pr;
mod repo;
mod webhook;

pub fn api_router() -> Router<WebServices> {
	Router::new()
		.route("/", get(handler))
		.route("/auth/login", get(auth::login))
		.route("/auth/callback", get(auth::callback))
		.route("/auth/logout", post(auth::logout))
		.route("/auth/me", get(auth::me))
		.route("/repos", get(repo::list_repos).post(repo::connect_repo))
		.route(
			"/repos/{repo}",
			get(repo::get_repo)
				.patch(repo::update_repo_settings)
				.delete(repo::disconnect_repo),
		)
		.route("/repos/{repo}/contents", get(repo::repo_contents))
		.route("/repos/{repo}/files", get(repo::repo_files))
		.route("/repos/{repo}/prs", get(pr::list_prs))
		.route(
			"/repos/{repo}/prs/{number}",
			get(pr::get_pr).post(pr::sync_pr),
		)
		.route("/repos/{repo}/feed", get(feed::repo_feed))
		.route("/repos/{repo}/coverage", get(coverage::latest_coverage))
		.route(
			"/repos/{repo}/coverage/history",
			get(coverage::coverage_history),
		)
		.route("/github/repos", get(repo::list_github_repos))
		.route("/jobs", get(job::list_jobs).post(job::create_job))
		.route("/jobs/process", post(job::process_queue))
		.route("/jobs/{job}", get(job::get_job))
		.route("/feed", get(feed::user_feed))
		.route("/webhooks/github", post(webhook::github_webhook))
}

async fn handler() -> &'static str {
	concat!("Hiro Web ", env!("CARGO_PKG_VERSION"))
}
