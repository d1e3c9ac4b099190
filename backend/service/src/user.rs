use std::sync::Arc;

use diesel::{
	ExpressionMethods, OptionalExtension, QueryDsl, Queryable, Selectable, insert_into, update,
};
use hiro_backend_model::{
	db::{
		schema::{self, users::dsl},
		utils::{DbUuidVal, sql_now},
	},
	user::UserRef,
};
use time::PrimitiveDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{Result, database::DatabaseService};

/// Profile fields delivered by the GitHub OAuth user endpoint.
#[derive(Debug, Clone)]
pub struct UserProfile<'a> {
	pub github_id: &'a str,
	pub username: &'a str,
	pub email: Option<&'a str>,
	pub avatar_url: Option<&'a str>,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct UserRecord {
	pub id: DbUuidVal,
	pub github_id: String,
	pub username: String,
	pub email: Option<String>,
	pub avatar_url: Option<String>,
	pub created_at: PrimitiveDateTime,
}

#[derive(Debug)]
pub struct UserService {
	db: Arc<DatabaseService>,
}

impl UserService {
	pub fn new(db: Arc<DatabaseService>) -> Self {
		Self { db }
	}

	/// Creates or refreshes the user row for a GitHub account.
	///
	/// The GitHub account ID is the stable key; profile fields and the
	/// OAuth token are overwritten on every login.
	pub async fn upsert(&self, profile: UserProfile<'_>, access_token: &str) -> Result<UserRef> {
		let mut conn = self.db.get().await?;

		let existing = conn
			.get_result::<_, DbUuidVal>(
				dsl::users
					.filter(dsl::github_id.eq(profile.github_id))
					.limit(1)
					.select(dsl::id),
			)
			.await
			.optional()?;

		if let Some(id) = existing {
			conn.execute(
				update(dsl::users.filter(dsl::id.eq(id))).set((
					dsl::username.eq(profile.username),
					dsl::email.eq(profile.email),
					dsl::avatar_url.eq(profile.avatar_url),
					dsl::access_token.eq(access_token),
					dsl::updated_at.eq(sql_now()),
				)),
			)
			.await?;
			return Ok(id.0);
		}

		let id = Uuid::new_v4();
		let now = sql_now();
		conn.execute(
			insert_into(dsl::users).values((
				dsl::id.eq(DbUuidVal(id)),
				dsl::github_id.eq(profile.github_id),
				dsl::username.eq(profile.username),
				dsl::email.eq(profile.email),
				dsl::avatar_url.eq(profile.avatar_url),
				dsl::access_token.eq(access_token),
				dsl::created_at.eq(now),
				dsl::updated_at.eq(now),
			)),
		)
		.await?;
		info!(username = profile.username, %id, "registered user");
		Ok(id)
	}

	pub async fn get(&self, id: UserRef) -> Result<Option<UserRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_one_select(dsl::users.limit(1).filter(dsl::id.eq(DbUuidVal(id))))
			.await
			.optional()?)
	}

	/// OAuth access token for user-scoped GitHub API calls.
	pub async fn access_token(&self, id: UserRef) -> Result<Option<String>> {
		let mut conn = self.db.get().await?;
		let token = conn
			.get_result::<_, Option<String>>(
				dsl::users
					.filter(dsl::id.eq(DbUuidVal(id)))
					.limit(1)
					.select(dsl::access_token),
			)
			.await
			.optional()?;
		Ok(token.flatten())
	}
}

#[cfg(test)]
mod test {
	use diesel::QueryDsl;
	use hiro_backend_model::db::schema::users::dsl;

	use super::UserProfile;
	use crate::test::test_env;

	#[tokio::test]
	async fn test_upsert_registers_once() {
		let env = test_env().await;
		let first = env
			.user
			.upsert(
				UserProfile {
					github_id: "1234",
					username: "octocat",
					email: Some("octo@example.com"),
					avatar_url: None,
				},
				"gho_first",
			)
			.await
			.unwrap();
		let second = env
			.user
			.upsert(
				UserProfile {
					github_id: "1234",
					username: "octocat-renamed",
					email: None,
					avatar_url: Some("https://example.com/a.png"),
				},
				"gho_second",
			)
			.await
			.unwrap();
		assert_eq!(first, second);

		let mut db = env.database.get().await.unwrap();
		assert_eq!(
			db.get_result::<_, i64>(dsl::users.count()).await.unwrap(),
			1
		);
		drop(db);

		let record = env.user.get(first).await.unwrap().unwrap();
		assert_eq!(record.username, "octocat-renamed");
		assert_eq!(record.email, None);
		assert_eq!(
			env.user.access_token(first).await.unwrap().as_deref(),
			Some("gho_second")
		);
	}

	#[tokio::test]
	async fn test_get_missing() {
		let env = test_env().await;
		assert!(env.user.get(uuid::Uuid::new_v4()).await.unwrap().is_none());
	}
}
