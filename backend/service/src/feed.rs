use std::sync::Arc;

use diesel::{ExpressionMethods, QueryDsl, Queryable, Selectable, insert_into};
use hiro_backend_model::{
	db::{
		schema::{self, action_feed::dsl, repository},
		utils::{DbJsonVal, DbUuidVal, sql_now},
	},
	feed::SqlActionKind,
	pr::SqlRiskLevel,
	repo::RepoRef,
	user::UserRef,
};
use hiro_common_model::{feed::ActionKind, pr::RiskLevel};
use time::PrimitiveDateTime;
use uuid::Uuid;

use crate::{Result, database::DatabaseService};

/// A new activity feed entry.
#[derive(Debug, Clone)]
pub struct NewFeedEntry<'a> {
	pub repository: RepoRef,
	pub kind: ActionKind,
	pub title: &'a str,
	pub description: Option<&'a str>,
	pub pr_number: Option<i32>,
	pub pr_url: Option<&'a str>,
	pub risk_level: Option<RiskLevel>,
	pub coverage_impact: Option<f64>,
	pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::action_feed)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct FeedRecord {
	pub id: DbUuidVal,
	pub repository: DbUuidVal,
	pub kind: i16,
	pub title: String,
	pub description: Option<String>,
	pub pr_number: Option<i32>,
	pub pr_url: Option<String>,
	pub risk_level: Option<i16>,
	pub coverage_impact: Option<f64>,
	pub created_at: PrimitiveDateTime,
}

impl FeedRecord {
	pub fn kind(&self) -> ActionKind {
		SqlActionKind::from(self.kind).into()
	}

	pub fn risk_level(&self) -> Option<RiskLevel> {
		self.risk_level.map(|level| SqlRiskLevel::from(level).into())
	}
}

/// Append-only activity log surfaced on the dashboard.
#[derive(Debug)]
pub struct FeedService {
	db: Arc<DatabaseService>,
}

impl FeedService {
	pub fn new(db: Arc<DatabaseService>) -> Self {
		Self { db }
	}

	pub async fn push(&self, entry: NewFeedEntry<'_>) -> Result<Uuid> {
		let mut conn = self.db.get().await?;
		let id = Uuid::now_v7();
		conn.execute(
			insert_into(dsl::action_feed).values((
				dsl::id.eq(DbUuidVal(id)),
				dsl::repository.eq(DbUuidVal(entry.repository)),
				dsl::kind.eq(SqlActionKind::from(entry.kind) as i16),
				dsl::title.eq(entry.title),
				dsl::description.eq(entry.description),
				dsl::pr_number.eq(entry.pr_number),
				dsl::pr_url.eq(entry.pr_url),
				dsl::risk_level
					.eq(entry.risk_level.map(|level| SqlRiskLevel::from(level) as i16)),
				dsl::coverage_impact.eq(entry.coverage_impact),
				dsl::metadata.eq(entry.metadata.map(DbJsonVal)),
				dsl::created_at.eq(sql_now()),
			)),
		)
		.await?;
		Ok(id)
	}

	/// Entries of one repository, newest first.
	pub async fn list_for_repo(&self, repository: RepoRef, limit: i64) -> Result<Vec<FeedRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_select(
				dsl::action_feed
					.filter(dsl::repository.eq(DbUuidVal(repository)))
					.order(dsl::id.desc())
					.limit(limit),
			)
			.await?)
	}

	/// Entries across all repositories a user has connected, newest first.
	pub async fn list_for_user(&self, user: UserRef, limit: i64) -> Result<Vec<FeedRecord>> {
		let mut conn = self.db.get().await?;
		let repos: Vec<DbUuidVal> = conn
			.load(
				repository::dsl::repository
					.filter(repository::dsl::user_id.eq(DbUuidVal(user)))
					.select(repository::dsl::id),
			)
			.await?;
		Ok(conn
			.load_select(
				dsl::action_feed
					.filter(dsl::repository.eq_any(repos))
					.order(dsl::id.desc())
					.limit(limit),
			)
			.await?)
	}
}

#[cfg(test)]
mod test {
	use hiro_common_model::{feed::ActionKind, pr::RiskLevel};

	use super::NewFeedEntry;
	use crate::{repo::test::connect_test_repo, test::test_env};

	#[tokio::test]
	async fn test_push_and_list() {
		let env = test_env().await;
		let repo = connect_test_repo(&env, 42).await;

		env.feed
			.push(NewFeedEntry {
				repository: repo,
				kind: ActionKind::RepoConnected,
				title: "Connected octocat/hello-world",
				description: None,
				pr_number: None,
				pr_url: None,
				risk_level: None,
				coverage_impact: None,
				metadata: None,
			})
			.await
			.unwrap();
		env.feed
			.push(NewFeedEntry {
				repository: repo,
				kind: ActionKind::TestsGenerated,
				title: "Generated tests for 3 files",
				description: Some("PR #7"),
				pr_number: Some(7),
				pr_url: Some("https://github.com/octocat/hello-world/pull/7"),
				risk_level: Some(RiskLevel::Medium),
				coverage_impact: Some(4.2),
				metadata: None,
			})
			.await
			.unwrap();

		let entries = env.feed.list_for_repo(repo, 10).await.unwrap();
		assert_eq!(entries.len(), 2);
		assert_eq!(entries[0].kind(), ActionKind::TestsGenerated);
		assert_eq!(entries[0].risk_level(), Some(RiskLevel::Medium));
		assert_eq!(entries[1].kind(), ActionKind::RepoConnected);
	}
}
