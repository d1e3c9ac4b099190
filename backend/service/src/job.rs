use std::sync::Arc;

use diesel::{
	ExpressionMethods, OptionalExtension, QueryDsl, Queryable, Selectable, insert_into, update,
};
use hiro_backend_model::{
	db::{
		SqlConn,
		schema::{self, test_job::dsl, test_result},
		utils::{DbJsonVal, DbUuidVal, sql_now},
	},
	job::{JobRef, SqlJobKind, SqlJobStatus},
	pr::PullRequestRef,
	repo::RepoRef,
};
use hiro_common_model::job::{JobKind, JobStatus};
use thiserror::Error;
use time::PrimitiveDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Result, database::DatabaseService};

/// A new test generation job.
#[derive(Debug, Clone)]
pub struct NewJob<'a> {
	pub repository: RepoRef,
	pub pull_request: Option<PullRequestRef>,
	pub kind: JobKind,
	pub target_files: &'a [String],
	pub metadata: Option<serde_json::Value>,
}

/// A pending job claimed by exactly one runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedJob {
	pub id: JobRef,
	pub repository: RepoRef,
	pub pull_request: Option<PullRequestRef>,
	pub kind: JobKind,
	pub target_files: Vec<String>,
}

/// One generated test file, recorded when its job processes a source file.
#[derive(Debug, Clone)]
pub struct NewTestResult<'a> {
	pub job: JobRef,
	pub repository: RepoRef,
	pub file_path: &'a str,
	pub test_file_path: &'a str,
	pub test_code: &'a str,
	pub metadata: &'a str,
	pub required_packages: &'a [String],
	pub test_framework: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::test_job)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct JobRecord {
	pub id: DbUuidVal,
	pub repository: DbUuidVal,
	pub pull_request: Option<DbUuidVal>,
	pub kind: i16,
	pub status: i16,
	pub target_files: DbJsonVal,
	pub progress: i16,
	pub error_message: Option<String>,
	pub created_at: PrimitiveDateTime,
	pub started_at: Option<PrimitiveDateTime>,
	pub completed_at: Option<PrimitiveDateTime>,
}

impl JobRecord {
	pub fn kind(&self) -> JobKind {
		SqlJobKind::from(self.kind).into()
	}

	pub fn status(&self) -> JobStatus {
		SqlJobStatus::from(self.status).into_common(self.error_message.clone())
	}
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::test_result)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct TestResultRecord {
	pub id: DbUuidVal,
	pub job: DbUuidVal,
	pub repository: DbUuidVal,
	pub file_path: String,
	pub test_file_path: String,
	pub test_code: String,
	pub metadata: String,
	pub required_packages: DbJsonVal,
	pub test_framework: Option<String>,
	pub created_at: PrimitiveDateTime,
}

/// SQL-backed test job queue.
///
/// Claiming is an atomic conditional update, so a pending job is
/// handed to at most one runner even with a fleet of workers polling.
#[derive(Debug)]
pub struct JobService {
	db: Arc<DatabaseService>,
}

impl JobService {
	pub fn new(db: Arc<DatabaseService>) -> Self {
		Self { db }
	}

	/// Creates a pending job.
	///
	/// Takes a connection so callers can create jobs inside a
	/// transaction together with the rows that triggered them.
	pub async fn create(&self, conn: &mut SqlConn, job: NewJob<'_>) -> Result<JobRef> {
		// v7 IDs order by creation time, so the queue needs no
		// separate sequence column.
		let id = Uuid::now_v7();
		conn.execute(
			insert_into(dsl::test_job).values((
				dsl::id.eq(DbUuidVal(id)),
				dsl::repository.eq(DbUuidVal(job.repository)),
				dsl::pull_request.eq(job.pull_request.map(DbUuidVal)),
				dsl::kind.eq(SqlJobKind::from(job.kind) as i16),
				dsl::status.eq(SqlJobStatus::Pending as i16),
				dsl::target_files.eq(DbJsonVal::from_string_list(job.target_files)),
				dsl::progress.eq(0i16),
				dsl::metadata.eq(job.metadata.map(DbJsonVal)),
				dsl::created_at.eq(sql_now()),
			)),
		)
		.await?;
		info!(%id, kind = ?job.kind, files = job.target_files.len(), "created test job");
		Ok(id)
	}

	/// Claims the oldest pending job, if any.
	pub async fn fetch_and_start(&self) -> Result<Option<ClaimedJob>> {
		let mut conn = self.db.get().await?;

		loop {
			let result = conn
				.get_result::<_, (DbUuidVal, DbUuidVal, Option<DbUuidVal>, i16, DbJsonVal)>(
					dsl::test_job
						.limit(1)
						.filter(dsl::status.eq(SqlJobStatus::Pending as i16))
						.order(dsl::id.asc())
						.select((
							dsl::id,
							dsl::repository,
							dsl::pull_request,
							dsl::kind,
							dsl::target_files,
						)),
				)
				.await
				.optional()?;
			let Some((id, repository, pull_request, kind, target_files)) = result else {
				return Ok(None);
			};

			let rows = conn
				.execute(
					update(
						dsl::test_job
							.filter(dsl::id.eq(id))
							.filter(dsl::status.eq(SqlJobStatus::Pending as i16)),
					)
					.set((
						dsl::status.eq(SqlJobStatus::Processing as i16),
						dsl::started_at.eq(sql_now()),
					)),
				)
				.await?;
			if rows == 0 {
				// lost the claim race, try the next pending job
				warn!(%id, "job claimed by another runner");
				continue;
			}

			info!(%id, "claimed test job");
			return Ok(Some(ClaimedJob {
				id: id.0,
				repository: repository.0,
				pull_request: pull_request.map(|pr| pr.0),
				kind: SqlJobKind::from(kind).into(),
				target_files: target_files.into_string_list(),
			}));
		}
	}

	/// Updates the progress column of a claimed job.
	pub async fn update_progress(&self, id: JobRef, processed: usize, total: usize) -> Result<()> {
		let mut conn = self.db.get().await?;
		conn.execute(
			update(
				dsl::test_job
					.filter(dsl::id.eq(DbUuidVal(id)))
					.filter(dsl::status.eq(SqlJobStatus::Processing as i16)),
			)
			.set(dsl::progress.eq(progress_percent(processed, total))),
		)
		.await?;
		Ok(())
	}

	/// Marks a claimed job completed.
	pub async fn complete(&self, id: JobRef) -> Result<()> {
		let mut conn = self.db.get().await?;
		let rows = conn
			.execute(
				update(
					dsl::test_job
						.filter(dsl::id.eq(DbUuidVal(id)))
						.filter(dsl::status.eq(SqlJobStatus::Processing as i16)),
				)
				.set((
					dsl::status.eq(SqlJobStatus::Completed as i16),
					dsl::progress.eq(100i16),
					dsl::completed_at.eq(sql_now()),
				)),
			)
			.await?;
		if rows == 0 {
			warn!(%id, "completing a job this runner does not hold");
			return Err(JobError::NotClaimed(id).into());
		}
		info!(%id, "completed test job");
		Ok(())
	}

	/// Marks a claimed job failed, keeping the error message.
	pub async fn fail(&self, id: JobRef, error: &str) -> Result<()> {
		let mut conn = self.db.get().await?;
		let rows = conn
			.execute(
				update(
					dsl::test_job
						.filter(dsl::id.eq(DbUuidVal(id)))
						.filter(dsl::status.eq(SqlJobStatus::Processing as i16)),
				)
				.set((
					dsl::status.eq(SqlJobStatus::Failed as i16),
					dsl::error_message.eq(error),
					dsl::completed_at.eq(sql_now()),
				)),
			)
			.await?;
		if rows == 0 {
			warn!(%id, "failing a job this runner does not hold");
			return Err(JobError::NotClaimed(id).into());
		}
		info!(%id, error, "failed test job");
		Ok(())
	}

	pub async fn count_pending(&self) -> Result<i64> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.get_result::<_, i64>(
				dsl::test_job
					.filter(dsl::status.eq(SqlJobStatus::Pending as i16))
					.count(),
			)
			.await?)
	}

	pub async fn get(&self, id: JobRef) -> Result<Option<JobRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_one_select(dsl::test_job.limit(1).filter(dsl::id.eq(DbUuidVal(id))))
			.await
			.optional()?)
	}

	/// Jobs of a repository, newest first.
	pub async fn list_for_repo(&self, repository: RepoRef, limit: i64) -> Result<Vec<JobRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_select(
				dsl::test_job
					.filter(dsl::repository.eq(DbUuidVal(repository)))
					.order(dsl::id.desc())
					.limit(limit),
			)
			.await?)
	}

	pub async fn list_recent(&self, limit: i64) -> Result<Vec<JobRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_select(dsl::test_job.order(dsl::id.desc()).limit(limit))
			.await?)
	}

	/// Records one generated test file.
	pub async fn record_result(&self, result: NewTestResult<'_>) -> Result<Uuid> {
		use test_result::dsl as results;

		let mut conn = self.db.get().await?;
		let id = Uuid::now_v7();
		conn.execute(
			insert_into(results::test_result).values((
				results::id.eq(DbUuidVal(id)),
				results::job.eq(DbUuidVal(result.job)),
				results::repository.eq(DbUuidVal(result.repository)),
				results::file_path.eq(result.file_path),
				results::test_file_path.eq(result.test_file_path),
				results::test_code.eq(result.test_code),
				results::metadata.eq(result.metadata),
				results::required_packages
					.eq(DbJsonVal::from_string_list(result.required_packages)),
				results::test_framework.eq(result.test_framework),
				results::created_at.eq(sql_now()),
			)),
		)
		.await?;
		Ok(id)
	}

	pub async fn results_for_job(&self, job: JobRef) -> Result<Vec<TestResultRecord>> {
		use test_result::dsl as results;

		let mut conn = self.db.get().await?;
		Ok(conn
			.load_select(
				results::test_result
					.filter(results::job.eq(DbUuidVal(job)))
					.order(results::id.asc()),
			)
			.await?)
	}

	pub async fn results_for_repo(
		&self,
		repository: RepoRef,
		limit: i64,
	) -> Result<Vec<TestResultRecord>> {
		use test_result::dsl as results;

		let mut conn = self.db.get().await?;
		Ok(conn
			.load_select(
				results::test_result
					.filter(results::repository.eq(DbUuidVal(repository)))
					.order(results::id.desc())
					.limit(limit),
			)
			.await?)
	}
}

/// Share of processed files, rounded to a whole percentage.
fn progress_percent(processed: usize, total: usize) -> i16 {
	if total == 0 {
		return 100;
	}
	let percent = (processed as f64 / total as f64 * 100.0).round();
	percent.clamp(0.0, 100.0) as i16
}

#[derive(Debug, Error)]
pub enum JobError {
	#[error("job {0} is not claimed by this runner")]
	NotClaimed(JobRef),
}

#[cfg(test)]
pub(crate) mod test {
	use hiro_backend_model::{job::JobRef, repo::RepoRef};
	use hiro_common_model::job::{JobKind, JobStatus};

	use super::{NewJob, NewTestResult, progress_percent};
	use crate::{BackendServices, repo::test::connect_test_repo, test::test_env};

	pub async fn create_test_job(env: &BackendServices, repo: RepoRef, file: &str) -> JobRef {
		let mut db = env.database.get().await.unwrap();
		env.job
			.create(
				&mut db,
				NewJob {
					repository: repo,
					pull_request: None,
					kind: JobKind::FullRepo,
					target_files: &[file.to_string()],
					metadata: None,
				},
			)
			.await
			.unwrap()
	}

	#[test]
	fn test_progress_percent() {
		assert_eq!(progress_percent(0, 3), 0);
		assert_eq!(progress_percent(1, 3), 33);
		assert_eq!(progress_percent(2, 3), 67);
		assert_eq!(progress_percent(3, 3), 100);
		assert_eq!(progress_percent(0, 0), 100);
	}

	#[tokio::test]
	async fn test_create_fetch_in_order() {
		let env = test_env().await;
		let repo = connect_test_repo(&env, 42).await;
		let first = create_test_job(&env, repo, "a.ts").await;
		let second = create_test_job(&env, repo, "b.ts").await;

		assert_eq!(env.job.count_pending().await.unwrap(), 2);
		assert_eq!(env.job.fetch_and_start().await.unwrap().unwrap().id, first);
		assert_eq!(env.job.fetch_and_start().await.unwrap().unwrap().id, second);
		assert!(env.job.fetch_and_start().await.unwrap().is_none());
	}

	#[tokio::test]
	async fn test_complete() {
		let env = test_env().await;
		let repo = connect_test_repo(&env, 42).await;
		let id = create_test_job(&env, repo, "a.ts").await;

		// completing an unclaimed job must fail
		assert!(env.job.complete(id).await.is_err());

		let claimed = env.job.fetch_and_start().await.unwrap().unwrap();
		assert_eq!(claimed.target_files, vec!["a.ts".to_string()]);

		env.job.update_progress(id, 1, 2).await.unwrap();
		assert_eq!(env.job.get(id).await.unwrap().unwrap().progress, 50);

		env.job.complete(id).await.unwrap();
		let record = env.job.get(id).await.unwrap().unwrap();
		assert_eq!(record.status(), JobStatus::Completed);
		assert_eq!(record.progress, 100);
		assert!(record.completed_at.is_some());

		// a terminal job cannot be completed again
		assert!(env.job.complete(id).await.is_err());
	}

	#[tokio::test]
	async fn test_fail_keeps_error() {
		let env = test_env().await;
		let repo = connect_test_repo(&env, 42).await;
		let id = create_test_job(&env, repo, "a.ts").await;

		env.job.fetch_and_start().await.unwrap().unwrap();
		env.job.fail(id, "llm unreachable").await.unwrap();

		let record = env.job.get(id).await.unwrap().unwrap();
		assert_eq!(
			record.status(),
			JobStatus::Failed {
				error: "llm unreachable".into()
			}
		);
	}

	#[tokio::test]
	async fn test_record_results() {
		let env = test_env().await;
		let repo = connect_test_repo(&env, 42).await;
		let id = create_test_job(&env, repo, "src/util.ts").await;
		env.job.fetch_and_start().await.unwrap().unwrap();

		env.job
			.record_result(NewTestResult {
				job: id,
				repository: repo,
				file_path: "src/util.ts",
				test_file_path: "hiro-tests/test_util.test.ts",
				test_code: "describe('util', () => {})",
				metadata: "## Notes",
				required_packages: &["jest".into()],
				test_framework: Some("jest"),
			})
			.await
			.unwrap();

		let results = env.job.results_for_job(id).await.unwrap();
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].test_file_path, "hiro-tests/test_util.test.ts");
		assert_eq!(
			results[0].required_packages.clone().into_string_list(),
			vec!["jest".to_string()]
		);

		assert_eq!(env.job.results_for_repo(repo, 10).await.unwrap().len(), 1);
	}
}
