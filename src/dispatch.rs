//! Webhook dispatch: secret validation, payload parsing, orchestration, and the
//! fixed output vocabulary.
//!
//! Every inbound webhook resolves to exactly one [`OutputKey`]; callers branch
//! on the key (or its HTTP status) instead of inspecting message text. Failures
//! after the shared-secret gate are recorded in the action log regardless of
//! outcome.

// crates.io
use serde::de::Error as _;
// self
use crate::{
	_prelude::*,
	audit::ActionLogEntry,
	auth::AccountId,
	flows::Bridge,
	http::{BridgeHttpClient, RestResponse},
	oauth::TransportErrorMapper,
	secret::validate_shared_secret,
	store::BridgeStore,
	worklog::{self, WorklogAction, WorklogCall, WorklogEntry},
};

/// Header carrying the shared secret on every webhook request.
pub const SECRET_HEADER: &str = "x-zapier-secret";

/// An inbound webhook request reduced to what dispatch needs.
#[derive(Clone, Debug, Default)]
pub struct WebhookRequest {
	headers: HashMap<String, String>,
	/// Raw request body.
	pub body: String,
}
impl WebhookRequest {
	/// Builds a request from a raw body.
	pub fn new(body: impl Into<String>) -> Self {
		Self { headers: HashMap::new(), body: body.into() }
	}

	/// Attaches a header; names are matched case-insensitively.
	pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());

		self
	}

	/// Looks up a header value case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
	}
}

/// The fixed vocabulary of dispatch outcomes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OutputKey {
	/// Worklog entry was created.
	SuccessCreate,
	/// Worklog entry was updated.
	SuccessUpdate,
	/// Worklog entry was deleted.
	SuccessDelete,
	/// Caller input was malformed or incomplete.
	BadRequest,
	/// Shared secret or stored credential failure.
	Unauthorized,
	/// Provider refused the final API call.
	Forbidden,
	/// Addressed issue or worklog entry does not exist.
	NotFound,
	/// Bridge-side failure unrelated to caller input.
	Internal,
	/// Provider failure not covered by a more specific key.
	JiraApi,
}
impl OutputKey {
	/// Returns the stable output label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::SuccessCreate => "success-create",
			Self::SuccessUpdate => "success-update",
			Self::SuccessDelete => "success-delete",
			Self::BadRequest => "error-bad-request",
			Self::Unauthorized => "error-unauthorized",
			Self::Forbidden => "error-forbidden",
			Self::NotFound => "error-not-found",
			Self::Internal => "error-internal",
			Self::JiraApi => "error-jira-api",
		}
	}

	/// Returns the HTTP status this outcome maps to.
	pub fn http_status(self) -> u16 {
		match self {
			Self::SuccessCreate | Self::SuccessUpdate | Self::SuccessDelete => 200,
			Self::BadRequest => 400,
			Self::Unauthorized => 401,
			Self::Forbidden => 403,
			Self::NotFound => 404,
			Self::Internal => 500,
			Self::JiraApi => 502,
		}
	}

	/// Returns `true` for the success keys.
	pub fn is_success(self) -> bool {
		matches!(self, Self::SuccessCreate | Self::SuccessUpdate | Self::SuccessDelete)
	}

	fn error_label(self) -> &'static str {
		match self {
			Self::BadRequest => "Bad Request",
			Self::Unauthorized => "Unauthorized",
			Self::Forbidden => "Forbidden",
			Self::NotFound => "Not Found",
			Self::JiraApi => "Jira API Error",
			_ => "Internal Server Error",
		}
	}
}

/// One dispatched webhook's outcome, ready to serialize onto the wire.
#[derive(Clone, Debug)]
pub struct WebhookResponse {
	/// Outcome key.
	pub key: OutputKey,
	/// HTTP status derived from the key.
	pub status: u16,
	/// JSON response body.
	pub body: serde_json::Value,
}
impl WebhookResponse {
	fn success(action: WorklogAction) -> Self {
		let key = match action {
			WorklogAction::Create => OutputKey::SuccessCreate,
			WorklogAction::Update => OutputKey::SuccessUpdate,
			WorklogAction::Delete => OutputKey::SuccessDelete,
		};

		Self {
			key,
			status: key.http_status(),
			body: serde_json::json!({ "success": true, "action": action.verb_past() }),
		}
	}

	fn failure(key: OutputKey) -> Self {
		Self {
			key,
			status: key.http_status(),
			body: serde_json::json!({ "success": false, "error": key.error_label() }),
		}
	}
}

/// Boxed future type returned by [`WebhookDispatcher`] methods.
pub type DispatchFuture<'a> = Pin<Box<dyn Future<Output = WebhookResponse> + 'a + Send>>;

/// Object-safe entry point webhook frontends call into.
///
/// Dispatch never returns `Err`; every failure is already folded into the
/// response's [`OutputKey`].
pub trait WebhookDispatcher
where
	Self: Send + Sync,
{
	/// Dispatches a create-worklog webhook.
	fn dispatch_create<'a>(&'a self, request: &'a WebhookRequest) -> DispatchFuture<'a>;

	/// Dispatches an update-worklog webhook.
	fn dispatch_update<'a>(&'a self, request: &'a WebhookRequest) -> DispatchFuture<'a>;

	/// Dispatches a delete-worklog webhook.
	fn dispatch_delete<'a>(&'a self, request: &'a WebhookRequest) -> DispatchFuture<'a>;
}
impl<C, M> WebhookDispatcher for Bridge<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	fn dispatch_create<'a>(&'a self, request: &'a WebhookRequest) -> DispatchFuture<'a> {
		Box::pin(self.dispatch(WorklogAction::Create, request))
	}

	fn dispatch_update<'a>(&'a self, request: &'a WebhookRequest) -> DispatchFuture<'a> {
		Box::pin(self.dispatch(WorklogAction::Update, request))
	}

	fn dispatch_delete<'a>(&'a self, request: &'a WebhookRequest) -> DispatchFuture<'a> {
		Box::pin(self.dispatch(WorklogAction::Delete, request))
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRequestBody {
	#[serde(default)]
	user_id: Option<String>,
	#[serde(default)]
	issue_key: Option<String>,
	#[serde(default)]
	started: Option<String>,
	#[serde(default)]
	time_spent_seconds: Option<i64>,
	#[serde(default, deserialize_with = "deserialize_id_or_number")]
	worklog_id: Option<String>,
}

/// Accepts the worklog id as either a JSON string or number; callers send both.
fn deserialize_id_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
	D: serde::Deserializer<'de>,
{
	match Option::<serde_json::Value>::deserialize(deserializer)? {
		None | Some(serde_json::Value::Null) => Ok(None),
		Some(serde_json::Value::String(value)) => Ok(Some(value)),
		Some(serde_json::Value::Number(value)) => Ok(Some(value.to_string())),
		Some(other) => Err(D::Error::custom(format!(
			"worklogId must be a string or number, got {other}",
		))),
	}
}

#[derive(Debug)]
struct ParsedWebhook {
	account_id: AccountId,
	call: WorklogCall,
}

impl<C, M> Bridge<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	async fn dispatch(&self, action: WorklogAction, request: &WebhookRequest) -> WebhookResponse {
		// The secret gate runs before the body is even looked at; unauthorized
		// callers learn nothing about payload validation.
		let stored_secret =
			match <dyn BridgeStore>::fetch_shared_secret(self.store.as_ref()).await {
				Ok(secret) => secret,
				Err(_) => return WebhookResponse::failure(OutputKey::Internal),
			};

		if validate_shared_secret(stored_secret.as_ref(), request.header(SECRET_HEADER)).is_err()
		{
			return WebhookResponse::failure(OutputKey::Unauthorized);
		}

		let parsed = match parse_webhook(action, &request.body) {
			Ok(parsed) => parsed,
			Err(reason) => {
				self.record_outcome(action, None, None, false, &reason).await;

				return WebhookResponse::failure(OutputKey::BadRequest);
			},
		};
		let issue_key = parsed.call.issue_key.clone();
		let worklog_id = parsed.call.worklog_id.clone();
		let result = self.execute_worklog(&parsed.account_id, parsed.call).await;
		let (response, worklog_id, message) = match result {
			Ok(rest) => map_rest_outcome(action, rest, worklog_id),
			Err(err) => {
				let key = if err.is_auth_class() {
					OutputKey::Unauthorized
				} else if matches!(err, Error::BadRequest { .. }) {
					OutputKey::BadRequest
				} else {
					OutputKey::Internal
				};

				(WebhookResponse::failure(key), worklog_id, err.to_string())
			},
		};

		self.record_outcome(
			action,
			Some((parsed.account_id, issue_key)),
			worklog_id,
			response.key.is_success(),
			&message,
		)
		.await;

		response
	}

	/// Appends the outcome to the action log, swallowing storage failures.
	async fn record_outcome(
		&self,
		action: WorklogAction,
		identity: Option<(AccountId, String)>,
		worklog_id: Option<String>,
		success: bool,
		message: &str,
	) {
		let (account_id, issue_key) = match identity {
			Some((account, issue)) => (Some(account), Some(issue)),
			None => (None, None),
		};
		let entry = ActionLogEntry {
			timestamp: OffsetDateTime::now_utc(),
			action,
			success,
			issue_key,
			worklog_id,
			account_id,
			message: message.into(),
		};

		let _ = <dyn BridgeStore>::push_action(self.store.as_ref(), entry).await;
	}
}

fn parse_webhook(action: WorklogAction, body: &str) -> Result<ParsedWebhook, String> {
	if body.trim().is_empty() {
		return Err("Request body is empty".into());
	}

	let mut deserializer = serde_json::Deserializer::from_str(body);
	let raw: RawRequestBody = serde_path_to_error::deserialize(&mut deserializer)
		.map_err(|e| format!("Request body could not be parsed: {e}"))?;
	let mut missing = Vec::new();
	let present = |value: &Option<String>| {
		value.as_deref().is_some_and(|value| !value.trim().is_empty())
	};

	if !present(&raw.user_id) {
		missing.push("userId");
	}
	if !present(&raw.issue_key) {
		missing.push("issueKey");
	}
	if matches!(action, WorklogAction::Update | WorklogAction::Delete)
		&& !present(&raw.worklog_id)
	{
		missing.push("worklogId");
	}
	if matches!(action, WorklogAction::Create | WorklogAction::Update) {
		if !present(&raw.started) {
			missing.push("started");
		}
		if raw.time_spent_seconds.is_none() {
			missing.push("timeSpentSeconds");
		}
	}
	if !missing.is_empty() {
		return Err(format!("Missing required fields: {}", missing.join(", ")));
	}

	// The checks above guarantee presence per action.
	let user_id = raw.user_id.unwrap_or_default();
	let issue_key = raw.issue_key.unwrap_or_default();
	let account_id =
		AccountId::new(user_id).map_err(|e| format!("userId is invalid: {e}"))?;
	let entry = || WorklogEntry {
		started: raw.started.clone().unwrap_or_default(),
		time_spent_seconds: raw.time_spent_seconds.unwrap_or_default(),
	};
	let call = match action {
		WorklogAction::Create => WorklogCall::create(issue_key, entry()),
		WorklogAction::Update =>
			WorklogCall::update(issue_key, raw.worklog_id.clone().unwrap_or_default(), entry()),
		WorklogAction::Delete =>
			WorklogCall::delete(issue_key, raw.worklog_id.clone().unwrap_or_default()),
	};

	call.validate().map_err(|e| e.to_string())?;

	Ok(ParsedWebhook { account_id, call })
}

fn map_rest_outcome(
	action: WorklogAction,
	rest: RestResponse,
	worklog_id: Option<String>,
) -> (WebhookResponse, Option<String>, String) {
	if rest.status == action.success_status() {
		let worklog_id = match action {
			WorklogAction::Create => created_worklog_id(&rest.body),
			_ => worklog_id,
		};
		let message = match &worklog_id {
			Some(id) => format!("{} worklog {id}", capitalized(action.verb_past())),
			None => format!("{} worklog", capitalized(action.verb_past())),
		};

		return (WebhookResponse::success(action), worklog_id, message);
	}

	let key = match rest.status {
		400 => OutputKey::BadRequest,
		401 => OutputKey::Unauthorized,
		403 => OutputKey::Forbidden,
		404 if matches!(action, WorklogAction::Update | WorklogAction::Delete) =>
			OutputKey::NotFound,
		_ => OutputKey::JiraApi,
	};
	let message = worklog::summarize_error_body(rest.status, &rest.body);

	(WebhookResponse::failure(key), worklog_id, message)
}

fn created_worklog_id(body: &str) -> Option<String> {
	let value: serde_json::Value = serde_json::from_str(body).ok()?;

	match value.get("id")? {
		serde_json::Value::String(id) => Some(id.clone()),
		serde_json::Value::Number(id) => Some(id.to_string()),
		_ => None,
	}
}

fn capitalized(verb: &str) -> String {
	let mut chars = verb.chars();

	match chars.next() {
		Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
		None => String::new(),
	}
}
