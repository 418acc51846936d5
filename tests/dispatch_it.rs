#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use worklog_bridge::{
	_preludet::*,
	auth::{AccountId, CloudId, CredentialRecord, TokenSecret},
	dispatch::{OutputKey, WebhookDispatcher, WebhookRequest},
	secret::SharedSecret,
	store::{BridgeStore, MemoryStore},
	worklog::WorklogAction,
};

const ACCOUNT: &str = "acc-dispatch";
const SECRET: &str = "hook-secret";
const WORKLOG_PATH: &str = "/ex/jira/cloud-dispatch/rest/api/3/issue/COM-7/worklog";

async fn seed(store: &MemoryStore, access: &str) {
	let now = OffsetDateTime::now_utc();
	let account = AccountId::new(ACCOUNT).expect("Account fixture should be valid.");
	let record = CredentialRecord {
		account_id: account,
		access_token: TokenSecret::new(access),
		refresh_token: TokenSecret::new("refresh-dispatch"),
		expires_at: now + Duration::hours(1),
		cloud_id: Some(CloudId::new("cloud-dispatch").expect("Cloud fixture should be valid.")),
		user: None,
		updated_at: now,
	};

	store
		.save_credentials(record)
		.await
		.expect("Seeding the credential record should succeed.");
	store
		.save_shared_secret(SharedSecret::new(SECRET))
		.await
		.expect("Seeding the shared secret should succeed.");
}

fn create_body() -> String {
	format!(
		"{{\"event\":\"create_worklog\",\"userId\":\"{ACCOUNT}\",\"issueKey\":\"COM-7\",\
		 \"started\":\"2024-01-15T09:30:00.000+0000\",\"timeSpentSeconds\":900}}",
	)
}

fn authed(body: impl Into<String>) -> WebhookRequest {
	WebhookRequest::new(body).with_header("X-Zapier-Secret", SECRET)
}

#[tokio::test]
async fn create_happy_path_returns_success_and_logs_the_action() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));

	seed(&store, "access-live").await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(WORKLOG_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"10100\"}");
		})
		.await;

	let response = bridge.dispatch_create(&authed(create_body())).await;

	assert_eq!(response.key, OutputKey::SuccessCreate);
	assert_eq!(response.status, 200);
	assert_eq!(
		response.body,
		serde_json::json!({ "success": true, "action": "created" }),
	);

	let log = store.recent_actions().await.expect("Action log fetch should succeed.");

	assert_eq!(log.len(), 1);
	assert!(log[0].success);
	assert_eq!(log[0].action, WorklogAction::Create);
	assert_eq!(log[0].issue_key.as_deref(), Some("COM-7"));
	assert_eq!(log[0].worklog_id.as_deref(), Some("10100"));
}

#[tokio::test]
async fn expired_token_recovers_transparently() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));

	seed(&store, "access-stale").await;

	server
		.mock_async(|when, then| {
			when.method(PUT)
				.path(format!("{WORKLOG_PATH}/42"))
				.header("authorization", "Bearer access-stale");
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-fresh\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(PUT)
				.path(format!("{WORKLOG_PATH}/42"))
				.header("authorization", "Bearer access-fresh");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"42\"}");
		})
		.await;

	let body = format!(
		"{{\"event\":\"update_worklog\",\"userId\":\"{ACCOUNT}\",\"issueKey\":\"COM-7\",\
		 \"worklogId\":42,\"started\":\"2024-01-15T09:30:00.000+0000\",\"timeSpentSeconds\":600}}",
	);
	let response = bridge.dispatch_update(&authed(body)).await;

	assert_eq!(response.key, OutputKey::SuccessUpdate);
	assert_eq!(
		response.body,
		serde_json::json!({ "success": true, "action": "updated" }),
	);
}

#[tokio::test]
async fn a_dead_refresh_token_surfaces_as_unauthorized_and_disconnects() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));

	seed(&store, "access-stale").await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(WORKLOG_PATH);
			then.status(401);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(400)
				.header("content-type", "application/json")
				.body("{\"error\":\"invalid_grant\"}");
		})
		.await;

	let response = bridge.dispatch_create(&authed(create_body())).await;

	assert_eq!(response.key, OutputKey::Unauthorized);
	assert_eq!(response.status, 401);
	assert_eq!(
		response.body,
		serde_json::json!({ "success": false, "error": "Unauthorized" }),
	);

	let account = AccountId::new(ACCOUNT).expect("Account fixture should be valid.");

	assert!(
		store
			.fetch_credentials(&account)
			.await
			.expect("Store fetch should succeed.")
			.is_none(),
		"The account should read as disconnected afterwards.",
	);

	let log = store.recent_actions().await.expect("Action log fetch should succeed.");

	assert_eq!(log.len(), 1);
	assert!(!log[0].success);
}

#[tokio::test]
async fn the_secret_gate_runs_before_payload_validation() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));

	seed(&store, "access-live").await;

	let any_mock = server
		.mock_async(|when, then| {
			when.method(POST);
			then.status(500);
		})
		.await;

	// Garbage body plus a wrong secret resolves as unauthorized, not bad request.
	let wrong = WebhookRequest::new("{not json").with_header("x-zapier-secret", "wrong");
	let response = bridge.dispatch_create(&wrong).await;

	assert_eq!(response.key, OutputKey::Unauthorized);

	let missing = WebhookRequest::new(create_body());
	let response = bridge.dispatch_create(&missing).await;

	assert_eq!(response.key, OutputKey::Unauthorized);

	any_mock.assert_calls_async(0).await;
	assert!(
		store
			.recent_actions()
			.await
			.expect("Action log fetch should succeed.")
			.is_empty(),
		"Rejected secrets must not reach the action log.",
	);
}

#[tokio::test]
async fn malformed_bodies_fail_with_bad_request_and_are_logged() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));

	seed(&store, "access-live").await;

	let response = bridge
		.dispatch_delete(&authed(format!(
			"{{\"userId\":\"{ACCOUNT}\",\"issueKey\":\"COM-7\"}}",
		)))
		.await;

	assert_eq!(response.key, OutputKey::BadRequest);
	assert_eq!(response.status, 400);
	assert_eq!(
		response.body,
		serde_json::json!({ "success": false, "error": "Bad Request" }),
	);

	let log = store.recent_actions().await.expect("Action log fetch should succeed.");

	assert_eq!(log.len(), 1);
	assert!(!log[0].success);
	assert!(log[0].message.contains("worklogId"));
}

#[tokio::test]
async fn delete_maps_204_to_success_and_404_to_not_found() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));

	seed(&store, "access-live").await;

	let delete_body = format!(
		"{{\"event\":\"delete_worklog\",\"userId\":\"{ACCOUNT}\",\"issueKey\":\"COM-7\",\
		 \"worklogId\":\"42\"}}",
	);

	server
		.mock_async(|when, then| {
			when.method(DELETE).path(format!("{WORKLOG_PATH}/42"));
			then.status(204);
		})
		.await;

	let response = bridge.dispatch_delete(&authed(delete_body.clone())).await;

	assert_eq!(response.key, OutputKey::SuccessDelete);
	assert_eq!(
		response.body,
		serde_json::json!({ "success": true, "action": "deleted" }),
	);

	let missing_body = delete_body.replace("\"42\"", "\"404404\"");

	server
		.mock_async(|when, then| {
			when.method(DELETE).path(format!("{WORKLOG_PATH}/404404"));
			then.status(404)
				.header("content-type", "application/json")
				.body("{\"errorMessages\":[\"Worklog does not exist.\"]}");
		})
		.await;

	let response = bridge.dispatch_delete(&authed(missing_body)).await;

	assert_eq!(response.key, OutputKey::NotFound);
	assert_eq!(response.status, 404);

	let log = store.recent_actions().await.expect("Action log fetch should succeed.");

	assert_eq!(log.len(), 2, "Both outcomes should be logged, newest first.");
	assert!(!log[0].success);
	assert_eq!(log[0].message, "Worklog does not exist.");
	assert!(log[1].success);
}

#[tokio::test]
async fn provider_5xx_maps_to_the_jira_api_error_key() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));

	seed(&store, "access-live").await;

	server
		.mock_async(|when, then| {
			when.method(POST).path(WORKLOG_PATH);
			then.status(500).body("<html>impossible</html>");
		})
		.await;

	let response = bridge.dispatch_create(&authed(create_body())).await;

	assert_eq!(response.key, OutputKey::JiraApi);
	assert_eq!(response.status, 502);
	assert_eq!(
		response.body,
		serde_json::json!({ "success": false, "error": "Jira API Error" }),
	);
}

#[tokio::test]
async fn rotating_the_shared_secret_invalidates_the_previous_one() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));

	seed(&store, "access-live").await;

	let rotated = bridge
		.rotate_shared_secret()
		.await
		.expect("Rotating the shared secret should succeed.");

	assert_ne!(rotated.expose(), SECRET);

	let stale = bridge.dispatch_create(&authed(create_body())).await;

	assert_eq!(stale.key, OutputKey::Unauthorized);

	server
		.mock_async(|when, then| {
			when.method(POST).path(WORKLOG_PATH);
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"id\":\"10200\"}");
		})
		.await;

	let fresh_request = WebhookRequest::new(create_body())
		.with_header("x-zapier-secret", rotated.expose());
	let fresh = bridge.dispatch_create(&fresh_request).await;

	assert_eq!(fresh.key, OutputKey::SuccessCreate);
}
