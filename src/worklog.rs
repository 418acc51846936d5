//! Worklog call model and the raw REST requests it produces.

// crates.io
use time::{format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{
	_prelude::*,
	auth::{CloudId, TokenSecret},
	config::BridgeConfig,
	http::{BridgeHttpClient, RestMethod, RestRequest, RestResponse},
};

/// Timestamp layout the provider requires for worklog start instants, with an
/// explicit numeric UTC offset (`2024-01-15T09:30:00.000+0000`).
const STARTED_FORMAT: &[BorrowedFormatItem<'_>] = format_description!(
	"[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3][offset_hour \
	 sign:mandatory][offset_minute]"
);

/// The three worklog operations the bridge dispatches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorklogAction {
	/// Creates a new worklog entry on an issue.
	Create,
	/// Replaces the time and start instant of an existing entry.
	Update,
	/// Removes an existing entry.
	Delete,
}
impl WorklogAction {
	/// Returns the canonical lowercase name.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Create => "create",
			Self::Update => "update",
			Self::Delete => "delete",
		}
	}

	/// Returns the past-tense verb used in success payloads.
	pub fn verb_past(self) -> &'static str {
		match self {
			Self::Create => "created",
			Self::Update => "updated",
			Self::Delete => "deleted",
		}
	}

	/// Returns the HTTP method the provider expects for this action.
	pub fn rest_method(self) -> RestMethod {
		match self {
			Self::Create => RestMethod::Post,
			Self::Update => RestMethod::Put,
			Self::Delete => RestMethod::Delete,
		}
	}

	/// Returns the single status code the provider answers with on success.
	pub fn success_status(self) -> u16 {
		match self {
			Self::Create | Self::Update => 200,
			Self::Delete => 204,
		}
	}
}

/// Time payload carried by create and update calls.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorklogEntry {
	/// Start instant in the provider's explicit-offset layout.
	pub started: String,
	/// Logged duration in seconds.
	pub time_spent_seconds: i64,
}

/// One fully specified worklog operation, ready to validate and perform.
#[derive(Clone, Debug)]
pub struct WorklogCall {
	/// Which operation to perform.
	pub action: WorklogAction,
	/// Issue the worklog belongs to.
	pub issue_key: String,
	/// Time payload; required for create and update.
	pub entry: Option<WorklogEntry>,
	/// Existing entry identifier; required for update and delete.
	pub worklog_id: Option<String>,
}
impl WorklogCall {
	/// Builds a create call.
	pub fn create(issue_key: impl Into<String>, entry: WorklogEntry) -> Self {
		Self {
			action: WorklogAction::Create,
			issue_key: issue_key.into(),
			entry: Some(entry),
			worklog_id: None,
		}
	}

	/// Builds an update call.
	pub fn update(
		issue_key: impl Into<String>,
		worklog_id: impl Into<String>,
		entry: WorklogEntry,
	) -> Self {
		Self {
			action: WorklogAction::Update,
			issue_key: issue_key.into(),
			entry: Some(entry),
			worklog_id: Some(worklog_id.into()),
		}
	}

	/// Builds a delete call.
	pub fn delete(issue_key: impl Into<String>, worklog_id: impl Into<String>) -> Self {
		Self {
			action: WorklogAction::Delete,
			issue_key: issue_key.into(),
			entry: None,
			worklog_id: Some(worklog_id.into()),
		}
	}

	/// Checks the call's shape before any network traffic happens.
	pub fn validate(&self) -> Result<()> {
		if self.issue_key.trim().is_empty() {
			return Err(Error::BadRequest { reason: "issueKey must not be empty".into() });
		}

		match self.action {
			WorklogAction::Update | WorklogAction::Delete
				if self.worklog_id.as_deref().is_none_or(|id| id.trim().is_empty()) =>
				return Err(Error::BadRequest {
					reason: "worklogId is required for this action".into(),
				}),
			_ => (),
		}

		if matches!(self.action, WorklogAction::Create | WorklogAction::Update) {
			let Some(entry) = &self.entry else {
				return Err(Error::BadRequest {
					reason: "started and timeSpentSeconds are required for this action".into(),
				});
			};

			if OffsetDateTime::parse(&entry.started, STARTED_FORMAT).is_err() {
				return Err(Error::BadRequest {
					reason: format!(
						"started must match yyyy-MM-ddTHH:mm:ss.SSSZZ, got {:?}",
						entry.started,
					),
				});
			}
			if entry.time_spent_seconds < 0 {
				return Err(Error::BadRequest {
					reason: "timeSpentSeconds must not be negative".into(),
				});
			}
		}

		Ok(())
	}

	/// Returns the JSON body sent to the provider, if the action carries one.
	pub fn body(&self) -> Option<serde_json::Value> {
		self.entry.as_ref().map(|entry| {
			serde_json::json!({
				"started": entry.started,
				"timeSpentSeconds": entry.time_spent_seconds,
			})
		})
	}
}

/// Performs one worklog REST call with the given access token.
pub(crate) async fn perform<C>(
	http: &C,
	config: &BridgeConfig,
	cloud_id: &CloudId,
	access_token: &TokenSecret,
	call: &WorklogCall,
) -> Result<RestResponse>
where
	C: ?Sized + BridgeHttpClient,
{
	let url = config.worklog_url(cloud_id, &call.issue_key, call.worklog_id.as_deref())?;
	let mut request =
		RestRequest::new(call.action.rest_method(), url).bearer(access_token.clone());

	if let Some(body) = call.body() {
		request = request.json(body);
	}

	Ok(http.execute(request).await?)
}

/// Condenses a provider error body into a single log-safe line.
///
/// The provider reports failures either as an `errorMessages` array or an
/// `errors` object keyed by field; anything else falls back to the status code.
pub(crate) fn summarize_error_body(status: u16, body: &str) -> String {
	if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
		if let Some(messages) = value.get("errorMessages").and_then(serde_json::Value::as_array) {
			let joined = messages
				.iter()
				.filter_map(serde_json::Value::as_str)
				.collect::<Vec<_>>()
				.join("; ");

			if !joined.is_empty() {
				return joined;
			}
		}
		if let Some(errors) = value.get("errors").and_then(serde_json::Value::as_object) {
			let joined = errors
				.iter()
				.filter_map(|(field, message)| {
					message.as_str().map(|message| format!("{field}: {message}"))
				})
				.collect::<Vec<_>>()
				.join("; ");

			if !joined.is_empty() {
				return joined;
			}
		}
	}

	format!("Provider responded with status {status}")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn entry() -> WorklogEntry {
		WorklogEntry { started: "2024-01-15T09:30:00.000+0000".into(), time_spent_seconds: 900 }
	}

	#[test]
	fn actions_map_to_methods_and_success_statuses() {
		assert_eq!(WorklogAction::Create.rest_method(), RestMethod::Post);
		assert_eq!(WorklogAction::Update.rest_method(), RestMethod::Put);
		assert_eq!(WorklogAction::Delete.rest_method(), RestMethod::Delete);
		assert_eq!(WorklogAction::Create.success_status(), 200);
		assert_eq!(WorklogAction::Update.success_status(), 200);
		assert_eq!(WorklogAction::Delete.success_status(), 204);
	}

	#[test]
	fn create_requires_a_parseable_start_instant() {
		let valid = WorklogCall::create("COM-1", entry());

		assert!(valid.validate().is_ok());

		for started in ["2024-01-15T09:30:00Z", "2024-01-15 09:30", "yesterday", ""] {
			let call = WorklogCall::create(
				"COM-1",
				WorklogEntry { started: started.into(), time_spent_seconds: 900 },
			);
			let err = call.validate().expect_err("Malformed start instants should be rejected.");

			assert!(matches!(err, Error::BadRequest { .. }), "{started:?}");
		}
	}

	#[test]
	fn negative_durations_are_rejected() {
		let call = WorklogCall::create(
			"COM-1",
			WorklogEntry { started: entry().started, time_spent_seconds: -60 },
		);

		assert!(matches!(call.validate(), Err(Error::BadRequest { .. })));
	}

	#[test]
	fn update_and_delete_require_a_worklog_id() {
		let mut update = WorklogCall::update("COM-1", "42", entry());

		assert!(update.validate().is_ok());

		update.worklog_id = Some("  ".into());

		assert!(matches!(update.validate(), Err(Error::BadRequest { .. })));

		let mut delete = WorklogCall::delete("COM-1", "42");

		assert!(delete.validate().is_ok());

		delete.worklog_id = None;

		assert!(matches!(delete.validate(), Err(Error::BadRequest { .. })));
	}

	#[test]
	fn bodies_carry_only_the_time_payload() {
		let create = WorklogCall::create("COM-1", entry());
		let body = create.body().expect("Create calls should carry a body.");

		assert_eq!(
			body,
			serde_json::json!({
				"started": "2024-01-15T09:30:00.000+0000",
				"timeSpentSeconds": 900,
			}),
		);
		assert!(WorklogCall::delete("COM-1", "42").body().is_none());
	}

	#[test]
	fn error_bodies_are_summarized() {
		assert_eq!(
			summarize_error_body(404, r#"{"errorMessages":["Issue does not exist."]}"#),
			"Issue does not exist.",
		);
		assert_eq!(
			summarize_error_body(400, r#"{"errors":{"timeSpent":"Invalid time duration."}}"#),
			"timeSpent: Invalid time duration.",
		);
		assert_eq!(summarize_error_body(500, "<html>"), "Provider responded with status 500");
	}
}
