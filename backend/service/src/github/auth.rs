//! GitHub App authentication.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::GithubError;

/// GitHub App credentials, used to mint installation tokens.
#[derive(Debug, PartialEq, Eq, Clone, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GithubAppConfig {
	/// Numeric GitHub App ID.
	pub id: i64,
	/// RSA private key in PEM format.
	pub private_key: String,
}

#[derive(Debug, Serialize)]
struct AppJwtClaims {
	iat: i64,
	exp: i64,
	iss: String,
}

/// Signs a short-lived RS256 JWT identifying the GitHub App.
///
/// `iat` is backdated by 60 seconds to tolerate clock drift between
/// us and GitHub.
pub fn make_app_jwt(app: &GithubAppConfig, now_unix: i64) -> Result<String, GithubError> {
	let key = EncodingKey::from_rsa_pem(app.private_key.as_bytes())?;
	let claims = AppJwtClaims {
		iat: now_unix - 60,
		exp: now_unix + 9 * 60,
		iss: app.id.to_string(),
	};
	Ok(jsonwebtoken::encode(
		&Header::new(Algorithm::RS256),
		&claims,
		&key,
	)?)
}
