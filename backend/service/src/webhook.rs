//! Webhook delivery verification.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const EVENT_HEADER: &str = "x-github-event";
pub const DELIVERY_HEADER: &str = "x-github-delivery";

/// Verifies a `sha256=<hex>` HMAC signature over the raw payload.
///
/// Comparison is constant-time via [`Mac::verify_slice`].
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> bool {
	let Some(hex_digest) = signature.strip_prefix("sha256=") else {
		return false;
	};
	let Ok(expected) = hex::decode(hex_digest) else {
		return false;
	};
	let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
		return false;
	};
	mac.update(payload);
	mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod test {
	use super::verify_signature;

	// Reference vector from the GitHub webhook documentation.
	const SECRET: &str = "It's a Secret to Everybody";
	const PAYLOAD: &[u8] = b"Hello, World!";
	const SIGNATURE: &str =
		"sha256=757107ea0eb2509fc211221cce984b8a37570b6d7586c22c46f4379c8b043e17";

	#[test]
	fn test_valid_signature() {
		assert!(verify_signature(PAYLOAD, SIGNATURE, SECRET));
	}

	#[test]
	fn test_rejects_bad_signature() {
		assert!(!verify_signature(b"Hello, World?", SIGNATURE, SECRET));
		assert!(!verify_signature(PAYLOAD, SIGNATURE, "wrong secret"));
	}

	#[test]
	fn test_rejects_malformed_signature() {
		assert!(!verify_signature(PAYLOAD, "sha1=abcdef", SECRET));
		assert!(!verify_signature(PAYLOAD, "sha256=zz", SECRET));
		assert!(!verify_signature(PAYLOAD, "", SECRET));
	}
}
