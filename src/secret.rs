//! Shared-secret authentication for automation-platform callers.
//!
//! The shared secret authenticates the automation platform itself, not any end
//! user; it is a single regenerable process-wide value compared byte-for-byte
//! (after trimming) against an inbound header.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	flows::Bridge,
	http::BridgeHttpClient,
	oauth::TransportErrorMapper,
	store::BridgeStore,
};

const SHARED_SECRET_LEN: usize = 48;

/// Redacted wrapper around the process-wide shared secret.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSecret(String);
impl SharedSecret {
	/// Wraps an existing secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Generates a fresh secret from a cryptographically secure RNG.
	pub fn generate() -> Self {
		let value: String =
			rand::rng().sample_iter(Alphanumeric).take(SHARED_SECRET_LEN).map(char::from).collect();

		Self(value)
	}

	/// Returns the inner secret value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}
}
impl Debug for SharedSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("SharedSecret").field(&"<redacted>").finish()
	}
}
impl Display for SharedSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Validates an inbound shared-secret header against the stored value.
///
/// An unset stored secret is a configuration problem, but it is surfaced to the
/// caller identically to a mismatch; only the reason string distinguishes them.
pub fn validate_shared_secret(
	stored: Option<&SharedSecret>,
	header: Option<&str>,
) -> Result<()> {
	let stored = match stored {
		Some(secret) if !secret.expose().trim().is_empty() => secret,
		_ =>
			return Err(Error::Unauthorized { reason: "Shared secret is not configured".into() }),
	};
	let header = header.map(str::trim).filter(|value| !value.is_empty()).ok_or_else(|| {
		Error::Unauthorized { reason: "Missing shared secret header".into() }
	})?;

	if header != stored.expose().trim() {
		return Err(Error::Unauthorized { reason: "Shared secret mismatch".into() });
	}

	Ok(())
}

impl<C, M> Bridge<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Generates and persists a fresh shared secret, invalidating the previous one.
	pub async fn rotate_shared_secret(&self) -> Result<SharedSecret> {
		let secret = SharedSecret::generate();

		<dyn BridgeStore>::save_shared_secret(self.store.as_ref(), secret.clone()).await?;

		Ok(secret)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn generated_secrets_are_long_and_distinct() {
		let first = SharedSecret::generate();
		let second = SharedSecret::generate();

		assert_eq!(first.expose().len(), SHARED_SECRET_LEN);
		assert_ne!(first.expose(), second.expose());
	}

	#[test]
	fn formatters_redact() {
		let secret = SharedSecret::new("zapier-secret");

		assert_eq!(format!("{secret:?}"), "SharedSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn validation_accepts_trimmed_match() {
		let stored = SharedSecret::new("expected-value");

		assert!(validate_shared_secret(Some(&stored), Some("expected-value")).is_ok());
		assert!(validate_shared_secret(Some(&stored), Some("  expected-value \n")).is_ok());
	}

	#[test]
	fn validation_rejects_unset_missing_and_mismatched() {
		let stored = SharedSecret::new("expected-value");
		let cases = [
			(None, Some("expected-value")),
			(Some(&stored), None),
			(Some(&stored), Some("")),
			(Some(&stored), Some("   ")),
			(Some(&stored), Some("other-value")),
		];

		for (stored, header) in cases {
			let err = validate_shared_secret(stored, header)
				.expect_err("Invalid secret inputs should be rejected.");

			assert!(matches!(err, Error::Unauthorized { .. }));
		}

		let blank = SharedSecret::new("   ");

		assert!(validate_shared_secret(Some(&blank), Some("   ")).is_err());
	}
}
