//! Append-only bounded action log for operational visibility.

// self
use crate::{_prelude::*, auth::AccountId, worklog::WorklogAction};

/// Maximum number of entries retained by the action log ring.
pub const ACTION_LOG_CAPACITY: usize = 50;

/// Immutable record of one dispatched action's outcome, newest first in storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionLogEntry {
	/// Instant the action completed, persisted as epoch milliseconds.
	#[serde(with = "time::serde::timestamp::milliseconds")]
	pub timestamp: OffsetDateTime,
	/// Which operation was attempted.
	#[serde(rename = "actionType")]
	pub action: WorklogAction,
	/// Whether the action reached its success outcome.
	pub success: bool,
	/// Work-item key the action addressed, when it was parsed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issue_key: Option<String>,
	/// Worklog identifier, when known (supplied for update/delete, returned for create).
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub worklog_id: Option<String>,
	/// End-user identity the action ran on behalf of, when it was parsed.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub account_id: Option<AccountId>,
	/// Human-readable outcome summary; never contains secrets.
	pub message: String,
}
