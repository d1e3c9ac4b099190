use std::sync::Arc;

use diesel::{
	ExpressionMethods, OptionalExtension, QueryDsl, Queryable, Selectable, insert_into, update,
};
use hiro_backend_model::{
	db::{
		schema::{self, pull_request::dsl},
		utils::{DbJsonVal, DbUuidVal, sql_now},
	},
	pr::{PullRequestRef, SqlAnalysisStatus, SqlRiskLevel},
	repo::RepoRef,
};
use hiro_common_model::pr::RiskLevel;
use time::PrimitiveDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{Result, database::DatabaseService};

/// Pull request fields extracted from a webhook payload or API fetch.
#[derive(Debug, Clone)]
pub struct PrUpsert<'a> {
	pub pr_number: i32,
	pub title: &'a str,
	pub state: &'a str,
	pub head_sha: &'a str,
	pub base_sha: &'a str,
	pub author: &'a str,
	pub changed_files: &'a [String],
	pub additions: i32,
	pub deletions: i32,
}

/// Outcome of an automated PR analysis.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
	pub has_tests: bool,
	pub risk_level: RiskLevel,
	pub suggestions: Vec<String>,
	pub comment_id: Option<i64>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::pull_request)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PrRecord {
	pub id: DbUuidVal,
	pub repository: DbUuidVal,
	pub pr_number: i32,
	pub title: String,
	pub state: String,
	pub head_sha: String,
	pub base_sha: String,
	pub author: String,
	pub changed_files: DbJsonVal,
	pub additions: i32,
	pub deletions: i32,
	pub analysis_status: i16,
	pub has_tests: Option<bool>,
	pub risk_level: Option<i16>,
	pub suggestions: Option<DbJsonVal>,
	pub comment_id: Option<i64>,
	pub analyzed_at: Option<PrimitiveDateTime>,
	pub created_at: PrimitiveDateTime,
	pub updated_at: PrimitiveDateTime,
}

impl PrRecord {
	pub fn analysis_status(&self) -> SqlAnalysisStatus {
		SqlAnalysisStatus::from(self.analysis_status)
	}

	pub fn risk_level(&self) -> Option<RiskLevel> {
		self.risk_level.map(|level| SqlRiskLevel::from(level).into())
	}

	pub fn total_changes(&self) -> i32 {
		self.additions + self.deletions
	}
}

#[derive(Debug)]
pub struct PullRequestService {
	db: Arc<DatabaseService>,
}

impl PullRequestService {
	pub fn new(db: Arc<DatabaseService>) -> Self {
		Self { db }
	}

	/// Records a PR or refreshes it after a new push.
	///
	/// `(repository, pr_number)` identifies the row; a refreshed PR
	/// drops back to pending analysis.
	pub async fn upsert(&self, repository: RepoRef, pr: PrUpsert<'_>) -> Result<PullRequestRef> {
		let mut conn = self.db.get().await?;

		let existing = conn
			.get_result::<_, DbUuidVal>(
				dsl::pull_request
					.filter(dsl::repository.eq(DbUuidVal(repository)))
					.filter(dsl::pr_number.eq(pr.pr_number))
					.limit(1)
					.select(dsl::id),
			)
			.await
			.optional()?;

		if let Some(id) = existing {
			conn.execute(
				update(dsl::pull_request.filter(dsl::id.eq(id))).set((
					dsl::title.eq(pr.title),
					dsl::state.eq(pr.state),
					dsl::head_sha.eq(pr.head_sha),
					dsl::base_sha.eq(pr.base_sha),
					dsl::changed_files.eq(DbJsonVal::from_string_list(pr.changed_files)),
					dsl::additions.eq(pr.additions),
					dsl::deletions.eq(pr.deletions),
					dsl::analysis_status.eq(SqlAnalysisStatus::Pending as i16),
					dsl::updated_at.eq(sql_now()),
				)),
			)
			.await?;
			return Ok(id.0);
		}

		let id = Uuid::new_v4();
		let now = sql_now();
		conn.execute(
			insert_into(dsl::pull_request).values((
				dsl::id.eq(DbUuidVal(id)),
				dsl::repository.eq(DbUuidVal(repository)),
				dsl::pr_number.eq(pr.pr_number),
				dsl::title.eq(pr.title),
				dsl::state.eq(pr.state),
				dsl::head_sha.eq(pr.head_sha),
				dsl::base_sha.eq(pr.base_sha),
				dsl::author.eq(pr.author),
				dsl::changed_files.eq(DbJsonVal::from_string_list(pr.changed_files)),
				dsl::additions.eq(pr.additions),
				dsl::deletions.eq(pr.deletions),
				dsl::analysis_status.eq(SqlAnalysisStatus::Pending as i16),
				dsl::created_at.eq(now),
				dsl::updated_at.eq(now),
			)),
		)
		.await?;
		info!(pr = pr.pr_number, %id, "tracked pull request");
		Ok(id)
	}

	pub async fn set_analyzing(&self, id: PullRequestRef) -> Result<()> {
		let mut conn = self.db.get().await?;
		conn.execute(
			update(dsl::pull_request.filter(dsl::id.eq(DbUuidVal(id)))).set((
				dsl::analysis_status.eq(SqlAnalysisStatus::Analyzing as i16),
				dsl::updated_at.eq(sql_now()),
			)),
		)
		.await?;
		Ok(())
	}

	/// Stores a finished analysis and marks the PR completed.
	pub async fn record_analysis(
		&self,
		id: PullRequestRef,
		outcome: AnalysisOutcome,
	) -> Result<()> {
		let mut conn = self.db.get().await?;
		let now = sql_now();
		conn.execute(
			update(dsl::pull_request.filter(dsl::id.eq(DbUuidVal(id)))).set((
				dsl::analysis_status.eq(SqlAnalysisStatus::Completed as i16),
				dsl::has_tests.eq(outcome.has_tests),
				dsl::risk_level.eq(SqlRiskLevel::from(outcome.risk_level) as i16),
				dsl::suggestions.eq(DbJsonVal::from_string_list(&outcome.suggestions)),
				dsl::comment_id.eq(outcome.comment_id),
				dsl::analyzed_at.eq(now),
				dsl::updated_at.eq(now),
			)),
		)
		.await?;
		Ok(())
	}

	pub async fn mark_failed(&self, id: PullRequestRef) -> Result<()> {
		let mut conn = self.db.get().await?;
		conn.execute(
			update(dsl::pull_request.filter(dsl::id.eq(DbUuidVal(id)))).set((
				dsl::analysis_status.eq(SqlAnalysisStatus::Failed as i16),
				dsl::updated_at.eq(sql_now()),
			)),
		)
		.await?;
		Ok(())
	}

	pub async fn get(&self, id: PullRequestRef) -> Result<Option<PrRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_one_select(
				dsl::pull_request
					.limit(1)
					.filter(dsl::id.eq(DbUuidVal(id))),
			)
			.await
			.optional()?)
	}

	/// PRs of a repository, newest activity first.
	pub async fn list_for_repo(&self, repository: RepoRef, limit: i64) -> Result<Vec<PrRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_select(
				dsl::pull_request
					.filter(dsl::repository.eq(DbUuidVal(repository)))
					.order(dsl::updated_at.desc())
					.limit(limit),
			)
			.await?)
	}
}

#[cfg(test)]
mod test {
	use diesel::QueryDsl;
	use hiro_backend_model::{db::schema::pull_request::dsl, pr::SqlAnalysisStatus};
	use hiro_common_model::pr::RiskLevel;

	use super::{AnalysisOutcome, PrUpsert};
	use crate::{repo::test::connect_test_repo, test::test_env};

	#[tokio::test]
	async fn test_upsert_is_idempotent_per_pr() {
		let env = test_env().await;
		let repo = connect_test_repo(&env, 42).await;

		let first = env
			.pr
			.upsert(
				repo,
				PrUpsert {
					pr_number: 7,
					title: "Add feature",
					state: "open",
					head_sha: "aaa",
					base_sha: "bbb",
					author: "octocat",
					changed_files: &["src/index.ts".into()],
					additions: 10,
					deletions: 2,
				},
			)
			.await
			.unwrap();
		let second = env
			.pr
			.upsert(
				repo,
				PrUpsert {
					pr_number: 7,
					title: "Add feature (amended)",
					state: "open",
					head_sha: "ccc",
					base_sha: "bbb",
					author: "octocat",
					changed_files: &["src/index.ts".into(), "src/util.ts".into()],
					additions: 20,
					deletions: 4,
				},
			)
			.await
			.unwrap();
		assert_eq!(first, second);

		let mut db = env.database.get().await.unwrap();
		assert_eq!(
			db.get_result::<_, i64>(dsl::pull_request.count())
				.await
				.unwrap(),
			1
		);
		drop(db);

		let record = env.pr.get(first).await.unwrap().unwrap();
		assert_eq!(record.head_sha, "ccc");
		assert_eq!(
			record.changed_files.clone().into_string_list(),
			vec!["src/index.ts".to_string(), "src/util.ts".to_string()]
		);
		assert_eq!(record.analysis_status(), SqlAnalysisStatus::Pending);
	}

	#[tokio::test]
	async fn test_analysis_lifecycle() {
		let env = test_env().await;
		let repo = connect_test_repo(&env, 42).await;
		let id = env
			.pr
			.upsert(
				repo,
				PrUpsert {
					pr_number: 7,
					title: "Add feature",
					state: "open",
					head_sha: "aaa",
					base_sha: "bbb",
					author: "octocat",
					changed_files: &[],
					additions: 400,
					deletions: 200,
				},
			)
			.await
			.unwrap();

		env.pr.set_analyzing(id).await.unwrap();
		assert_eq!(
			env.pr.get(id).await.unwrap().unwrap().analysis_status(),
			SqlAnalysisStatus::Analyzing
		);

		env.pr
			.record_analysis(
				id,
				AnalysisOutcome {
					has_tests: false,
					risk_level: RiskLevel::from_total_changes(600),
					suggestions: vec!["add tests for util.ts".into()],
					comment_id: Some(1001),
				},
			)
			.await
			.unwrap();

		let record = env.pr.get(id).await.unwrap().unwrap();
		assert_eq!(record.analysis_status(), SqlAnalysisStatus::Completed);
		assert_eq!(record.risk_level(), Some(RiskLevel::High));
		assert_eq!(record.has_tests, Some(false));
		assert_eq!(record.comment_id, Some(1001));
		assert!(record.analyzed_at.is_some());
	}
}
