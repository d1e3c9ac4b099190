use std::sync::Arc;

use diesel::{
	ExpressionMethods, OptionalExtension, QueryDsl, Queryable, Selectable, delete, insert_into,
	update,
};
use hiro_backend_model::{
	db::{
		schema::{self, installation::dsl, repository},
		utils::{DbUuidVal, sql_now},
	},
	installation::InstallationRef,
	user::UserRef,
};
use time::PrimitiveDateTime;
use tracing::info;

use crate::{Result, database::DatabaseService};

/// Account fields delivered by `installation` webhook events.
#[derive(Debug, Clone)]
pub struct InstallationAccount<'a> {
	pub id: &'a str,
	pub kind: &'a str,
	pub login: &'a str,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::installation)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct InstallationRecord {
	pub id: i64,
	pub account_id: String,
	pub account_type: String,
	pub account_login: String,
	pub user_id: Option<DbUuidVal>,
	pub created_at: PrimitiveDateTime,
}

/// Tracks GitHub App installations.
#[derive(Debug)]
pub struct InstallationService {
	db: Arc<DatabaseService>,
}

impl InstallationService {
	pub fn new(db: Arc<DatabaseService>) -> Self {
		Self { db }
	}

	/// Records an installation, refreshing account fields when it is
	/// already known.
	pub async fn record(
		&self,
		id: InstallationRef,
		account: InstallationAccount<'_>,
	) -> Result<()> {
		let mut conn = self.db.get().await?;

		let rows = conn
			.execute(
				update(dsl::installation.filter(dsl::id.eq(id))).set((
					dsl::account_id.eq(account.id),
					dsl::account_type.eq(account.kind),
					dsl::account_login.eq(account.login),
				)),
			)
			.await?;
		if rows != 0 {
			return Ok(());
		}

		conn.execute(
			insert_into(dsl::installation).values((
				dsl::id.eq(id),
				dsl::account_id.eq(account.id),
				dsl::account_type.eq(account.kind),
				dsl::account_login.eq(account.login),
				dsl::created_at.eq(sql_now()),
			)),
		)
		.await?;
		info!(installation = id, account = account.login, "recorded app installation");
		Ok(())
	}

	/// Handles an installation removal.
	///
	/// Repositories reached through it are disabled but kept, so their
	/// history survives a reinstall.
	pub async fn remove(&self, id: InstallationRef) -> Result<()> {
		let mut conn = self.db.get().await?;
		conn.execute(
			update(
				repository::dsl::repository
					.filter(repository::dsl::installation_id.eq(id)),
			)
			.set((
				repository::dsl::enabled.eq(false),
				repository::dsl::updated_at.eq(sql_now()),
			)),
		)
		.await?;
		let rows = conn
			.execute(delete(dsl::installation.filter(dsl::id.eq(id))))
			.await?;
		if rows != 0 {
			info!(installation = id, "removed app installation");
		}
		Ok(())
	}

	/// Associates an installation with the user who set it up.
	pub async fn link_user(&self, id: InstallationRef, user: UserRef) -> Result<bool> {
		let mut conn = self.db.get().await?;
		let rows = conn
			.execute(
				update(dsl::installation.filter(dsl::id.eq(id)))
					.set(dsl::user_id.eq(DbUuidVal(user))),
			)
			.await?;
		Ok(rows != 0)
	}

	pub async fn get(&self, id: InstallationRef) -> Result<Option<InstallationRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_one_select(dsl::installation.limit(1).filter(dsl::id.eq(id)))
			.await
			.optional()?)
	}
}

#[cfg(test)]
mod test {
	use super::InstallationAccount;
	use crate::{repo::test::connect_test_repo, test::test_env};

	#[tokio::test]
	async fn test_record_and_update() {
		let env = test_env().await;
		env.installation
			.record(
				99,
				InstallationAccount {
					id: "1234",
					kind: "User",
					login: "octocat",
				},
			)
			.await
			.unwrap();
		env.installation
			.record(
				99,
				InstallationAccount {
					id: "1234",
					kind: "User",
					login: "octocat-renamed",
				},
			)
			.await
			.unwrap();

		let record = env.installation.get(99).await.unwrap().unwrap();
		assert_eq!(record.account_login, "octocat-renamed");
	}

	#[tokio::test]
	async fn test_remove_disables_repositories() {
		let env = test_env().await;
		env.installation
			.record(
				99,
				InstallationAccount {
					id: "1234",
					kind: "User",
					login: "octocat",
				},
			)
			.await
			.unwrap();
		let repo = connect_test_repo(&env, 42).await;
		env.repo
			.upsert_from_installation(crate::repo::NewRepository {
				github_id: 42,
				name: "hello-world",
				full_name: "octocat/hello-world",
				owner: "octocat",
				private: false,
				default_branch: "main",
				language: None,
				installation_id: Some(99),
				user_id: None,
			})
			.await
			.unwrap();

		env.installation.remove(99).await.unwrap();

		assert!(env.installation.get(99).await.unwrap().is_none());
		let record = env.repo.get(repo).await.unwrap().unwrap();
		assert!(!record.enabled);
	}
}
