//! Credential records, profile snapshots, and pending-authorization state.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, CloudId, TokenSecret},
};

/// Profile snapshot captured from the provider during authorization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
	/// Provider-side account identifier, mirrored from the record key.
	pub account_id: AccountId,
	/// Display name, when the provider shared one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub display_name: Option<String>,
	/// Email address, when the provider shared one.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
}

/// Durable per-account credential record.
///
/// Created by the authorization callback, mutated in place by every successful
/// refresh (token fields replaced, everything else preserved), and deleted when a
/// refresh discovers the stored refresh token is permanently dead.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CredentialRecord {
	/// Opaque external user identifier; primary key.
	pub account_id: AccountId,
	/// Short-lived bearer credential for upstream API calls.
	pub access_token: TokenSecret,
	/// Long-lived rotating credential used to obtain fresh access tokens.
	pub refresh_token: TokenSecret,
	/// Absolute expiry of `access_token`, persisted as epoch milliseconds.
	#[serde(with = "time::serde::timestamp::milliseconds")]
	pub expires_at: OffsetDateTime,
	/// Upstream tenant/site this token is scoped to; required for every API call.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub cloud_id: Option<CloudId>,
	/// Profile snapshot captured during authorization.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user: Option<UserProfile>,
	/// Instant of the last write, persisted as epoch milliseconds.
	#[serde(with = "time::serde::timestamp::milliseconds")]
	pub updated_at: OffsetDateTime,
}
impl CredentialRecord {
	/// Names the first field that makes this record unusable for API calls, if any.
	///
	/// A record persisted by a degraded authorization (resource discovery failed)
	/// carries no cloud id and is reported here rather than at persist time.
	pub fn missing_field(&self) -> Option<&'static str> {
		if self.access_token.is_empty() {
			return Some("accessToken");
		}
		if self.refresh_token.is_empty() {
			return Some("refreshToken");
		}
		if self.cloud_id.is_none() {
			return Some("cloudId");
		}

		None
	}

	/// Returns `true` when the access token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		instant >= self.expires_at
	}

	/// Replaces the token fields after a successful refresh, preserving all others.
	///
	/// The refresh token is replaced only when the provider rotated it; providers
	/// that keep the old one valid omit it from the response.
	pub fn rotate(
		&mut self,
		access_token: TokenSecret,
		refresh_token: Option<TokenSecret>,
		expires_at: OffsetDateTime,
		now: OffsetDateTime,
	) {
		self.access_token = access_token;

		if let Some(rotated) = refresh_token {
			self.refresh_token = rotated;
		}

		self.expires_at = expires_at;
		self.updated_at = now;
	}
}

/// Short-lived state record guarding the authorization redirect against forgery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
	/// Single-use state token embedded in the authorize URL.
	pub state: String,
	/// Instant the authorization URL was issued, persisted as epoch milliseconds.
	#[serde(with = "time::serde::timestamp::milliseconds")]
	pub created_at: OffsetDateTime,
}
