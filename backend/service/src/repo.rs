use std::sync::Arc;

use diesel::{
	AsChangeset, ExpressionMethods, OptionalExtension, QueryDsl, Queryable, Selectable, delete,
	insert_into, update,
};
use hiro_backend_model::{
	db::{
		schema::{self, repository::dsl},
		utils::{DbJsonVal, DbUuidVal, sql_now},
	},
	installation::InstallationRef,
	repo::{RepoRef, RepoSettings},
	user::UserRef,
};
use thiserror::Error;
use time::PrimitiveDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{Result, database::DatabaseService};

/// Fields required to connect a repository, as fetched from GitHub.
#[derive(Debug, Clone)]
pub struct NewRepository<'a> {
	pub github_id: i64,
	pub name: &'a str,
	pub full_name: &'a str,
	pub owner: &'a str,
	pub private: bool,
	pub default_branch: &'a str,
	pub language: Option<&'a str>,
	pub installation_id: Option<InstallationRef>,
	pub user_id: Option<UserRef>,
}

/// Partial settings update; `None` fields are left untouched.
#[derive(Debug, Default, Clone, AsChangeset)]
#[diesel(table_name = schema::repository)]
pub struct RepoSettingsUpdate {
	pub enabled: Option<bool>,
	pub auto_generate_tests: Option<bool>,
	pub only_changed_files: Option<bool>,
	pub max_prs_per_day: Option<i32>,
	pub protected_dirs: Option<DbJsonVal>,
}

impl RepoSettingsUpdate {
	pub fn protected_dirs<S: AsRef<str>>(mut self, dirs: &[S]) -> Self {
		self.protected_dirs = Some(DbJsonVal::from_string_list(dirs));
		self
	}
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = schema::repository)]
#[diesel(check_for_backend(diesel::pg::Pg))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct RepoRecord {
	pub id: DbUuidVal,
	pub github_id: i64,
	pub name: String,
	pub full_name: String,
	pub owner: String,
	pub private: bool,
	pub default_branch: String,
	pub language: Option<String>,
	pub installation_id: Option<i64>,
	pub user_id: Option<DbUuidVal>,
	pub enabled: bool,
	pub auto_generate_tests: bool,
	pub only_changed_files: bool,
	pub max_prs_per_day: i32,
	pub protected_dirs: DbJsonVal,
	pub created_at: PrimitiveDateTime,
	pub updated_at: PrimitiveDateTime,
}

impl RepoRecord {
	pub fn settings(&self) -> RepoSettings {
		RepoSettings {
			enabled: self.enabled,
			auto_generate_tests: self.auto_generate_tests,
			only_changed_files: self.only_changed_files,
			max_prs_per_day: self.max_prs_per_day,
			protected_dirs: self.protected_dirs.clone().into_string_list(),
		}
	}
}

#[derive(Debug)]
pub struct RepoService {
	db: Arc<DatabaseService>,
}

impl RepoService {
	pub fn new(db: Arc<DatabaseService>) -> Self {
		Self { db }
	}

	/// Connects a repository on a user's behalf.
	///
	/// Connecting the same GitHub repository twice is an error.
	pub async fn connect(&self, repo: NewRepository<'_>) -> Result<RepoRef> {
		let mut conn = self.db.get().await?;

		let existing = conn
			.get_result::<_, DbUuidVal>(
				dsl::repository
					.filter(dsl::github_id.eq(repo.github_id))
					.limit(1)
					.select(dsl::id),
			)
			.await
			.optional()?;
		if existing.is_some() {
			return Err(RepoError::AlreadyConnected(repo.full_name.to_owned()).into());
		}

		let id = self.insert(&mut conn, &repo).await?;
		info!(repository = repo.full_name, %id, "connected repository");
		Ok(id)
	}

	/// Registers or refreshes a repository reached through an App
	/// installation. Returns the row ID and whether it was created.
	pub async fn upsert_from_installation(
		&self,
		repo: NewRepository<'_>,
	) -> Result<(RepoRef, bool)> {
		let mut conn = self.db.get().await?;

		let existing = conn
			.get_result::<_, DbUuidVal>(
				dsl::repository
					.filter(dsl::github_id.eq(repo.github_id))
					.limit(1)
					.select(dsl::id),
			)
			.await
			.optional()?;

		if let Some(id) = existing {
			conn.execute(
				update(dsl::repository.filter(dsl::id.eq(id))).set((
					dsl::full_name.eq(repo.full_name),
					dsl::default_branch.eq(repo.default_branch),
					dsl::language.eq(repo.language),
					dsl::installation_id.eq(repo.installation_id),
					dsl::updated_at.eq(sql_now()),
				)),
			)
			.await?;
			return Ok((id.0, false));
		}

		let id = self.insert(&mut conn, &repo).await?;
		info!(repository = repo.full_name, %id, "registered installation repository");
		Ok((id, true))
	}

	async fn insert(
		&self,
		conn: &mut crate::database::SqlConnRef,
		repo: &NewRepository<'_>,
	) -> Result<RepoRef> {
		let id = Uuid::new_v4();
		let now = sql_now();
		let defaults = RepoSettings::default();
		conn.execute(
			insert_into(dsl::repository).values((
				dsl::id.eq(DbUuidVal(id)),
				dsl::github_id.eq(repo.github_id),
				dsl::name.eq(repo.name),
				dsl::full_name.eq(repo.full_name),
				dsl::owner.eq(repo.owner),
				dsl::private.eq(repo.private),
				dsl::default_branch.eq(repo.default_branch),
				dsl::language.eq(repo.language),
				dsl::installation_id.eq(repo.installation_id),
				dsl::user_id.eq(repo.user_id.map(DbUuidVal)),
				dsl::enabled.eq(defaults.enabled),
				dsl::auto_generate_tests.eq(defaults.auto_generate_tests),
				dsl::only_changed_files.eq(defaults.only_changed_files),
				dsl::max_prs_per_day.eq(defaults.max_prs_per_day),
				dsl::protected_dirs.eq(DbJsonVal::from_string_list(&defaults.protected_dirs)),
				dsl::created_at.eq(now),
				dsl::updated_at.eq(now),
			)),
		)
		.await?;
		Ok(id)
	}

	pub async fn get(&self, id: RepoRef) -> Result<Option<RepoRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_one_select(dsl::repository.limit(1).filter(dsl::id.eq(DbUuidVal(id))))
			.await
			.optional()?)
	}

	pub async fn get_by_github_id(&self, github_id: i64) -> Result<Option<RepoRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_one_select(
				dsl::repository
					.limit(1)
					.filter(dsl::github_id.eq(github_id)),
			)
			.await
			.optional()?)
	}

	/// Repositories connected by a user, most recently updated first.
	pub async fn list_for_user(&self, user: UserRef) -> Result<Vec<RepoRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_select(
				dsl::repository
					.filter(dsl::user_id.eq(DbUuidVal(user)))
					.order(dsl::updated_at.desc()),
			)
			.await?)
	}

	pub async fn list_by_installation(
		&self,
		installation: InstallationRef,
	) -> Result<Vec<RepoRecord>> {
		let mut conn = self.db.get().await?;
		Ok(conn
			.load_select(dsl::repository.filter(dsl::installation_id.eq(installation)))
			.await?)
	}

	/// Applies a partial settings update. Returns false if the
	/// repository does not exist.
	pub async fn update_settings(
		&self,
		id: RepoRef,
		settings: RepoSettingsUpdate,
	) -> Result<bool> {
		let mut conn = self.db.get().await?;
		let rows = conn
			.execute(
				update(dsl::repository.filter(dsl::id.eq(DbUuidVal(id))))
					.set((settings, dsl::updated_at.eq(sql_now()))),
			)
			.await?;
		Ok(rows != 0)
	}

	/// Deletes a repository. PRs, jobs, results, snapshots and feed
	/// entries go with it via cascade.
	pub async fn disconnect(&self, id: RepoRef) -> Result<bool> {
		let mut conn = self.db.get().await?;
		let rows = conn
			.execute(delete(dsl::repository.filter(dsl::id.eq(DbUuidVal(id)))))
			.await?;
		if rows != 0 {
			info!(%id, "disconnected repository");
		}
		Ok(rows != 0)
	}
}

#[derive(Debug, Error)]
pub enum RepoError {
	#[error("repository {0} is already connected")]
	AlreadyConnected(String),
}

#[cfg(test)]
pub(crate) mod test {
	use hiro_backend_model::repo::RepoRef;

	use super::{NewRepository, RepoError, RepoSettingsUpdate};
	use crate::{BackendError, BackendServices, test::test_env};

	pub async fn connect_test_repo(env: &BackendServices, github_id: i64) -> RepoRef {
		env.repo
			.connect(NewRepository {
				github_id,
				name: "hello-world",
				full_name: "octocat/hello-world",
				owner: "octocat",
				private: false,
				default_branch: "main",
				language: Some("TypeScript"),
				installation_id: None,
				user_id: None,
			})
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn test_connect_rejects_duplicate() {
		let env = test_env().await;
		connect_test_repo(&env, 42).await;
		let error = env
			.repo
			.connect(NewRepository {
				github_id: 42,
				name: "hello-world",
				full_name: "octocat/hello-world",
				owner: "octocat",
				private: false,
				default_branch: "main",
				language: None,
				installation_id: None,
				user_id: None,
			})
			.await
			.unwrap_err();
		assert!(matches!(
			error,
			BackendError::RepoError(RepoError::AlreadyConnected(_))
		));
	}

	#[tokio::test]
	async fn test_upsert_from_installation() {
		let env = test_env().await;
		let id = connect_test_repo(&env, 42).await;

		let (upserted, created) = env
			.repo
			.upsert_from_installation(NewRepository {
				github_id: 42,
				name: "hello-world",
				full_name: "octocat/hello-world",
				owner: "octocat",
				private: false,
				default_branch: "trunk",
				language: Some("TypeScript"),
				installation_id: Some(77),
				user_id: None,
			})
			.await
			.unwrap();
		assert_eq!(upserted, id);
		assert!(!created);

		let record = env.repo.get(id).await.unwrap().unwrap();
		assert_eq!(record.default_branch, "trunk");
		assert_eq!(record.installation_id, Some(77));
	}

	#[tokio::test]
	async fn test_update_settings() {
		let env = test_env().await;
		let id = connect_test_repo(&env, 42).await;

		let default_settings = env.repo.get(id).await.unwrap().unwrap().settings();
		assert!(default_settings.enabled);
		assert!(!default_settings.auto_generate_tests);

		let updated = env
			.repo
			.update_settings(
				id,
				RepoSettingsUpdate {
					auto_generate_tests: Some(true),
					max_prs_per_day: Some(5),
					..Default::default()
				}
				.protected_dirs(&["vendor/"]),
			)
			.await
			.unwrap();
		assert!(updated);

		let settings = env.repo.get(id).await.unwrap().unwrap().settings();
		assert!(settings.auto_generate_tests);
		assert_eq!(settings.max_prs_per_day, 5);
		assert_eq!(settings.protected_dirs, vec!["vendor/".to_string()]);
		// untouched fields keep their defaults
		assert!(settings.only_changed_files);
	}

	#[tokio::test]
	async fn test_disconnect() {
		let env = test_env().await;
		let id = connect_test_repo(&env, 42).await;
		assert!(env.repo.disconnect(id).await.unwrap());
		assert!(env.repo.get(id).await.unwrap().is_none());
		assert!(!env.repo.disconnect(id).await.unwrap());
	}
}
