use std::sync::Arc;

use diesel::{
	ExpressionMethods, OptionalExtension, QueryDsl, Queryable, Selectable, insert_into,
};
use hiro_backend_model::{
	db::{
		schema::{self, coverage_snapshot::dsl},
		utils::{DbJsonVal, DbUuidVal, sql_now},
	},
	repo::RepoRef,
};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::{Result, database::DatabaseService};

/// A new point-in-time coverage measurement for a repository.
#[derive(Debug, Clone)]
pub struct NewSnapshot {
	pub repository: RepoRef,
	pub overall_coverage: f64,
	/// File path to coverage percentage.
	pub file_coverage: serde_json::Value,
	pub total_files: i32,
	pub tested_files: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::coverage_snapshot)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct SnapshotRecord {
	pub id: DbUuidVal,
	pub repository: DbUuidVal,
	pub overall_coverage: f64,
	pub file_coverage: DbJsonVal,
	pub total_files: i32,
	pub tested_files: i32,
	pub created_at: PrimitiveDateTime,
}

/// Append-only coverage history per repository.
#[derive(Debug)]
pub struct CoverageService {
	db: Arc<DatabaseService>,
}

impl CoverageService {
	pub fn new(db: Arc<DatabaseService>) -> Self {
		Self { db }
	}

	pub async fn record(&self, snapshot: NewSnapshot) -> Result<Uuid> {
		let mut conn = self.db.get().await?;
		let id = Uuid::now_v7();
		conn.execute(
			insert_into(dsl::coverage_snapshot).values((
				dsl::id.eq(DbUuidVal(id)),
				dsl::repository.eq(DbUuidVal(snapshot.repository)),
				dsl::overall_coverage.eq(snapshot.overall_coverage),
				dsl::file_coverage.eq(DbJsonVal(snapshot.file_coverage)),
				dsl::total_files.eq(snapshot.total_files),
				dsl::tested_files.eq(snapshot.tested_files),
				dsl::created_at.eq(sql_now()),
			)),
		)
		.await?;
		Ok(id)
	}

	/// Most recent snapshot, if any exists yet.
	pub async fn latest(&self, repository: RepoRef) -> Result<Option<SnapshotRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_one_select(
				dsl::coverage_snapshot
					.filter(dsl::repository.eq(DbUuidVal(repository)))
					.order(dsl::id.desc())
					.limit(1),
			)
			.await
			.optional()?)
	}

	/// Snapshot history, newest first.
	pub async fn history(&self, repository: RepoRef, limit: i64) -> Result<Vec<SnapshotRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_select(
				dsl::coverage_snapshot
					.filter(dsl::repository.eq(DbUuidVal(repository)))
					.order(dsl::id.desc())
					.limit(limit),
			)
			.await?)
	}
}

#[cfg(test)]
mod test {
	use super::NewSnapshot;
	use crate::{repo::test::connect_test_repo, test::test_env};

	#[tokio::test]
	async fn test_latest_and_history() {
		let env = test_env().await;
		let repo = connect_test_repo(&env, 42).await;

		assert!(env.coverage.latest(repo).await.unwrap().is_none());

		for (overall, tested) in [(10.0, 1), (35.5, 4)] {
			env.coverage
				.record(NewSnapshot {
					repository: repo,
					overall_coverage: overall,
					file_coverage: serde_json::json!({ "src/util.ts": overall }),
					total_files: 10,
					tested_files: tested,
				})
				.await
				.unwrap();
		}

		let latest = env.coverage.latest(repo).await.unwrap().unwrap();
		assert_eq!(latest.overall_coverage, 35.5);
		assert_eq!(latest.tested_files, 4);

		let history = env.coverage.history(repo, 10).await.unwrap();
		assert_eq!(history.len(), 2);
		assert_eq!(history[0].overall_coverage, 35.5);
		assert_eq!(history[1].overall_coverage, 10.0);
	}
}
