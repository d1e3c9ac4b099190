//! Redis-backed login sessions and OAuth state tokens.

use std::sync::Arc;

use hiro_backend_model::user::UserRef;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::{Result, redis::RedisService};

/// Sessions expire after 30 days without re-login.
pub const SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60;
/// OAuth `state` tokens only need to survive one login round trip.
const OAUTH_STATE_TTL_SECS: u64 = 10 * 60;

#[derive(Debug)]
pub struct SessionService {
	redis: Arc<RedisService>,
}

impl SessionService {
	pub fn new(redis: Arc<RedisService>) -> Self {
		Self { redis }
	}

	fn session_key(token: &str) -> String {
		format!("session:{}", token)
	}

	fn oauth_state_key(state: &str) -> String {
		format!("oauth-state:{}", state)
	}

	/// Creates a session for the given user and returns the opaque token.
	pub async fn create(&self, user: UserRef) -> Result<String> {
		let token = Uuid::new_v4().simple().to_string();
		let mut conn = self.redis.get().await?;
		conn.set_ex::<_, _, ()>(
			Self::session_key(&token),
			user.to_string(),
			SESSION_TTL_SECS,
		)
		.await
		.map_err(crate::redis::RedisError::from)?;
		Ok(token)
	}

	/// Resolves a session token to its user, if the session is still alive.
	pub async fn lookup(&self, token: &str) -> Result<Option<UserRef>> {
		let mut conn = self.redis.get().await?;
		let value: Option<String> = conn
			.get(Self::session_key(token))
			.await
			.map_err(crate::redis::RedisError::from)?;
		Ok(value.and_then(|v| Uuid::parse_str(&v).ok()))
	}

	pub async fn revoke(&self, token: &str) -> Result<()> {
		let mut conn = self.redis.get().await?;
		conn.del::<_, ()>(Self::session_key(token))
			.await
			.map_err(crate::redis::RedisError::from)?;
		Ok(())
	}

	/// Issues a one-time OAuth `state` token.
	pub async fn issue_oauth_state(&self) -> Result<String> {
		let state = Uuid::new_v4().simple().to_string();
		let mut conn = self.redis.get().await?;
		conn.set_ex::<_, _, ()>(Self::oauth_state_key(&state), 1u8, OAUTH_STATE_TTL_SECS)
			.await
			.map_err(crate::redis::RedisError::from)?;
		Ok(state)
	}

	/// Consumes an OAuth `state` token, returning whether it was valid.
	pub async fn take_oauth_state(&self, state: &str) -> Result<bool> {
		let mut conn = self.redis.get().await?;
		let removed: i64 = conn
			.del(Self::oauth_state_key(state))
			.await
			.map_err(crate::redis::RedisError::from)?;
		Ok(removed == 1)
	}
}
