//! Test generation job runner.
//!
//! Runners park on a [`Notify`] and drain the pending queue when
//! woken, either by a dispatch bus message or by the periodic
//! watcher. Each claimed job walks its target files, asks the LLM
//! for tests, and records the results.

use std::{collections::BTreeSet, sync::Arc};

use anyhow::{Result, anyhow};
use hiro_backend_model::bus::BackendBusMessage;
use hiro_backend_service::{
	BackendServices,
	bus::BoxedBusService,
	coverage::NewSnapshot,
	feed::NewFeedEntry,
	github::{GithubClient, should_skip_file},
	job::{ClaimedJob, NewTestResult},
	llm::TestGenerationRequest,
	repo::RepoRecord,
};
use hiro_common_model::feed::ActionKind;
use tokio::sync::Notify;
use tracing::{Instrument, debug, error, info, info_span, warn};

#[derive(Debug)]
pub struct JobRunner {
	/// Notifier to resume parked runners immediately.
	notifier: Notify,
	/// Backend services
	backend: Arc<BackendServices>,
	/// Bus for job lifecycle broadcasts.
	bus: Arc<BoxedBusService>,
}

impl JobRunner {
	pub fn new(backend: Arc<BackendServices>, bus: Arc<BoxedBusService>) -> Result<Self> {
		Ok(Self {
			notifier: Notify::const_new(),
			backend,
			bus,
		})
	}

	#[tracing::instrument(level = "info", name = "jobrunner", skip(self))]
	pub async fn run(self: Arc<Self>, index: usize) {
		info!("job runner started");
		loop {
			self.notifier.notified().await;
			debug!("notified to resume");

			let result = async {
				while let Some(job) = self.backend.job.fetch_and_start().await? {
					let id = job.id;
					let outcome = self
						.exec(job)
						.instrument(info_span!("execute job", job = %id))
						.await;
					match outcome {
						Ok(()) => self.backend.job.complete(id).await?,
						Err(error) => {
							error!(job = %id, "job failed: {:#}", error);
							self.backend.job.fail(id, &error.to_string()).await?;
						}
					}
					self.bus
						.broadcast(BackendBusMessage::JobFinished { job: id })
						.await?;
				}
				Ok::<_, anyhow::Error>(())
			}
			.await;
			if let Err(error) = result {
				error!(?error, "job runner error")
			}
		}
	}

	/// Periodically re-checks the queue, catching jobs whose dispatch
	/// message was lost.
	#[tracing::instrument(level = "debug", name = "job_watcher", skip(self))]
	pub async fn run_watcher(self: Arc<Self>) {
		info!("job watcher started");
		loop {
			let result = async {
				let count = self.backend.job.count_pending().await?;
				for _ in 0..count {
					self.notify_one();
				}

				Ok::<_, anyhow::Error>(())
			}
			.await;
			if let Err(error) = result {
				error!(?error, "job watcher error")
			}
			tokio::time::sleep(std::time::Duration::from_secs(3 * 60)).await;
		}
	}

	pub fn notify_one(&self) {
		self.notifier.notify_one();
	}

	pub fn notify_all(&self) {
		self.notifier.notify_waiters();
	}

	/// Runs one claimed job end to end.
	async fn exec(&self, job: ClaimedJob) -> Result<()> {
		let backend = &self.backend;
		let repo = backend
			.repo
			.get(job.repository)
			.await?
			.ok_or_else(|| anyhow!("repository {} no longer exists", job.repository))?;
		let settings = repo.settings();
		let (owner, name) = split_full_name(&repo);
		let client = backend.github_client_for_repo(&repo).await?;

		let tree = client.get_tree(owner, name, true).await?;
		let code_files: Vec<String> = tree
			.tree
			.iter()
			.filter(|item| item.kind == "blob")
			.map(|item| item.path.clone())
			.filter(|path| !should_skip_file(path))
			.filter(|path| {
				!settings
					.protected_dirs
					.iter()
					.any(|dir| path.starts_with(dir.as_str()))
			})
			.collect();

		// PR jobs arrive with targets resolved by the webhook; an
		// empty list means the whole repository.
		let targets = if job.target_files.is_empty() {
			code_files.clone()
		} else {
			job.target_files.clone()
		};
		let total = targets.len();
		if total == 0 {
			info!(job = %job.id, "no target files, nothing to generate");
			backend.job.update_progress(job.id, 0, 0).await?;
			return Ok(());
		}

		let file_tree = code_files.join("\n");
		let context = client.repository_structure(owner, name, "").await?;
		let repo_context = context.render();

		let mut generated = 0usize;
		for (index, path) in targets.iter().enumerate() {
			let result = self
				.process_file(&client, owner, name, &job, path, &file_tree, &repo_context)
				.await;
			match result {
				Ok(()) => generated += 1,
				Err(error) => warn!(file = path, "skipping file: {:#}", error),
			}
			backend.job.update_progress(job.id, index + 1, total).await?;
		}
		info!(job = %job.id, generated, total, "test generation finished");

		let pr_number = match job.pull_request {
			Some(pr) => backend.pr.get(pr).await?.map(|record| record.pr_number),
			None => None,
		};
		backend
			.feed
			.push(NewFeedEntry {
				repository: repo.id.0,
				kind: ActionKind::TestsGenerated,
				title: &format!("Generated tests for {} of {} files", generated, total),
				description: None,
				pr_number,
				pr_url: None,
				risk_level: None,
				coverage_impact: None,
				metadata: Some(serde_json::json!({ "job": job.id })),
			})
			.await?;

		self.refresh_coverage(&repo, &code_files).await?;
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	async fn process_file(
		&self,
		client: &GithubClient,
		owner: &str,
		name: &str,
		job: &ClaimedJob,
		path: &str,
		file_tree: &str,
		repo_context: &str,
	) -> Result<()> {
		let code = client.file_content(owner, name, path, None).await?;
		let tests = self
			.backend
			.llm
			.generate_tests(TestGenerationRequest {
				file_tree,
				repo_context,
				code: &code,
				user_prompt: None,
			})
			.await?;

		let test_path = test_file_path(path);
		self.backend
			.job
			.record_result(NewTestResult {
				job: job.id,
				repository: job.repository,
				file_path: path,
				test_file_path: &test_path,
				test_code: &tests.code,
				metadata: &tests.metadata,
				required_packages: &tests.packages,
				test_framework: None,
			})
			.await?;
		Ok(())
	}

	/// Rebuilds the repository's coverage snapshot from stored results.
	///
	/// Coverage here is file-level: a source file counts as tested
	/// once any result exists for it.
	async fn refresh_coverage(&self, repo: &RepoRecord, code_files: &[String]) -> Result<()> {
		let backend = &self.backend;
		let results = backend.job.results_for_repo(repo.id.0, 1000).await?;
		let tested: BTreeSet<&str> = results.iter().map(|result| result.file_path.as_str()).collect();
		let total = code_files.len().max(tested.len());
		let overall = if total == 0 {
			0.0
		} else {
			tested.len() as f64 * 100.0 / total as f64
		};

		let mut file_coverage = serde_json::Map::new();
		for path in &tested {
			file_coverage.insert((*path).to_string(), serde_json::json!(100.0));
		}

		let previous = backend
			.coverage
			.latest(repo.id.0)
			.await?
			.map(|snapshot| snapshot.overall_coverage)
			.unwrap_or(0.0);
		backend
			.coverage
			.record(NewSnapshot {
				repository: repo.id.0,
				overall_coverage: overall,
				file_coverage: serde_json::Value::Object(file_coverage),
				total_files: total as i32,
				tested_files: tested.len() as i32,
			})
			.await?;

		backend
			.feed
			.push(NewFeedEntry {
				repository: repo.id.0,
				kind: ActionKind::CoverageUpdated,
				title: &format!("Coverage at {:.1}%", overall),
				description: None,
				pr_number: None,
				pr_url: None,
				risk_level: None,
				coverage_impact: Some(overall - previous),
				metadata: None,
			})
			.await?;
		Ok(())
	}
}

fn split_full_name(repo: &RepoRecord) -> (&str, &str) {
	repo.full_name
		.split_once('/')
		.unwrap_or((repo.owner.as_str(), repo.name.as_str()))
}

/// Where a generated test file lands in the repository.
pub fn test_file_path(path: &str) -> String {
	let file = path.rsplit('/').next().unwrap_or(path);
	match file.rsplit_once('.') {
		Some((stem, ext)) if !stem.is_empty() => {
			format!("hiro-tests/test_{}.test.{}", stem, ext)
		}
		_ => format!("hiro-tests/test_{}.test", file),
	}
}

#[cfg(test)]
mod test {
	use super::test_file_path;

	#[test]
	fn test_result_paths() {
		assert_eq!(test_file_path("src/util.ts"), "hiro-tests/test_util.test.ts");
		assert_eq!(test_file_path("main.py"), "hiro-tests/test_main.test.py");
		assert_eq!(
			test_file_path("deep/nested/mod.rs"),
			"hiro-tests/test_mod.test.rs"
		);
		assert_eq!(test_file_path("Makefile"), "hiro-tests/test_Makefile.test");
	}
}
