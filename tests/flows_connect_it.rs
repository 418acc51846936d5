#![cfg(feature = "reqwest")]

// std
use std::collections::HashMap;
// crates.io
use httpmock::prelude::*;
// self
use worklog_bridge::{
	_preludet::*,
	auth::AccountId,
	error::Error,
	flows::{CallbackParams, STATE_PREFIX},
	store::BridgeStore,
};

const ACCOUNT: &str = "5b10a2844c20165700ede21g";

async fn mock_provider_success(server: &MockServer) {
	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-code\",\"refresh_token\":\"refresh-code\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/me").header("authorization", "Bearer access-code");
			then.status(200).header("content-type", "application/json").body(format!(
				"{{\"account_id\":\"{ACCOUNT}\",\"name\":\"Dana Scully\",\"email\":\"dana@example.com\"}}",
			));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/token/accessible-resources");
			then.status(200).header("content-type", "application/json").body(
				"[{\"id\":\"cloud-first\",\"name\":\"First Site\"},{\"id\":\"cloud-second\"}]",
			);
		})
		.await;
}

#[tokio::test]
async fn start_produces_a_prefixed_state_and_full_consent_url() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));
	let account = AccountId::new(ACCOUNT).expect("Account fixture should be valid.");
	let session = bridge
		.start_authorization(Some(&account))
		.await
		.expect("Starting an authorization should succeed.");

	assert!(session.state.starts_with(STATE_PREFIX));
	assert_eq!(session.account_id.as_ref(), Some(&account));

	let pairs: HashMap<String, String> =
		session.authorize_url.query_pairs().into_owned().collect();

	assert_eq!(pairs.get("response_type"), Some(&"code".into()));
	assert_eq!(pairs.get("client_id"), Some(&"client-test".into()));
	assert_eq!(pairs.get("state"), Some(&session.state));
	assert_eq!(pairs.get("prompt"), Some(&"consent".into()));
	assert_eq!(
		pairs.get("scope").map(String::as_str),
		Some("read:me read:account read:jira-work write:jira-work offline_access"),
	);

	let pending = store
		.take_pending(&account)
		.await
		.expect("Pending lookup should succeed.")
		.expect("Starting for a known account should persist a pending record.");

	assert_eq!(pending.state, session.state);
}

#[tokio::test]
async fn callback_persists_a_full_record_and_consumes_the_pending_state() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));
	let account = AccountId::new(ACCOUNT).expect("Account fixture should be valid.");

	mock_provider_success(&server).await;

	let session = bridge
		.start_authorization(Some(&account))
		.await
		.expect("Starting an authorization should succeed.");
	let outcome = bridge
		.complete_authorization(CallbackParams {
			code: Some("auth-code".into()),
			state: Some(session.state),
			..Default::default()
		})
		.await
		.expect("Completing the authorization should succeed.");

	assert_eq!(outcome.account_id, account);
	assert_eq!(outcome.cloud_id.as_ref().map(AsRef::as_ref), Some("cloud-first"));

	let record = store
		.fetch_credentials(&account)
		.await
		.expect("Store fetch should succeed.")
		.expect("The callback should persist a credential record.");

	assert_eq!(record.access_token.expose(), "access-code");
	assert_eq!(record.refresh_token.expose(), "refresh-code");
	assert_eq!(record.cloud_id.as_ref().map(AsRef::as_ref), Some("cloud-first"));
	assert_eq!(
		record.user.as_ref().and_then(|user| user.display_name.as_deref()),
		Some("Dana Scully"),
	);
	assert!(
		store
			.take_pending(&account)
			.await
			.expect("Pending lookup should succeed.")
			.is_none(),
		"The pending record must be consumed by the callback.",
	);
}

#[tokio::test]
async fn a_stale_state_with_the_right_prefix_is_tolerated() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));
	let account = AccountId::new(ACCOUNT).expect("Account fixture should be valid.");

	mock_provider_success(&server).await;

	bridge
		.start_authorization(Some(&account))
		.await
		.expect("Starting an authorization should succeed.");

	let outcome = bridge
		.complete_authorization(CallbackParams {
			code: Some("auth-code".into()),
			state: Some(format!("{STATE_PREFIX}stale-but-prefixed")),
			..Default::default()
		})
		.await
		.expect("A stale bridge-issued state should not fail the callback.");

	assert_eq!(outcome.account_id, account);
	assert!(
		store
			.fetch_credentials(&account)
			.await
			.expect("Store fetch should succeed.")
			.is_some(),
	);
}

#[tokio::test]
async fn denial_and_malformed_callbacks_are_rejected() {
	let server = MockServer::start_async().await;
	let (bridge, _store) = build_reqwest_test_bridge(mock_config(&server.base_url()));
	let denied = bridge
		.complete_authorization(CallbackParams {
			error: Some("access_denied".into()),
			error_description: Some("User declined the request".into()),
			..Default::default()
		})
		.await
		.expect_err("A provider denial should fail the callback.");

	assert!(matches!(denied, Error::AuthorizationDenied { .. }), "{denied:?}");

	let missing_code = bridge
		.complete_authorization(CallbackParams {
			state: Some(format!("{STATE_PREFIX}something")),
			..Default::default()
		})
		.await
		.expect_err("A callback without a code should be rejected.");

	assert!(matches!(missing_code, Error::BadRequest { .. }), "{missing_code:?}");

	let foreign_state = bridge
		.complete_authorization(CallbackParams {
			code: Some("auth-code".into()),
			state: Some("not-ours".into()),
			..Default::default()
		})
		.await
		.expect_err("A state without the service prefix should be rejected.");

	assert!(matches!(foreign_state, Error::BadRequest { .. }), "{foreign_state:?}");
}

#[tokio::test]
async fn a_missing_site_degrades_instead_of_failing() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));
	let account = AccountId::new(ACCOUNT).expect("Account fixture should be valid.");

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-code\",\"refresh_token\":\"refresh-code\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/me");
			then.status(200)
				.header("content-type", "application/json")
				.body(format!("{{\"account_id\":\"{ACCOUNT}\"}}"));
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth/token/accessible-resources");
			then.status(200).header("content-type", "application/json").body("[]");
		})
		.await;

	let outcome = bridge
		.complete_authorization(CallbackParams {
			code: Some("auth-code".into()),
			state: Some(format!("{STATE_PREFIX}anonymous")),
			..Default::default()
		})
		.await
		.expect("An empty resource list should not fail the callback.");

	assert!(outcome.cloud_id.is_none());

	let record = store
		.fetch_credentials(&account)
		.await
		.expect("Store fetch should succeed.")
		.expect("The degraded record should still be persisted.");

	assert!(record.cloud_id.is_none());
	assert_eq!(record.missing_field(), Some("cloudId"));
}

#[tokio::test]
async fn an_identity_failure_fails_the_callback() {
	let server = MockServer::start_async().await;
	let (bridge, store) = build_reqwest_test_bridge(mock_config(&server.base_url()));

	server
		.mock_async(|when, then| {
			when.method(POST).path("/token");
			then.status(200).header("content-type", "application/json").body(
				"{\"access_token\":\"access-code\",\"token_type\":\"bearer\",\"expires_in\":3600}",
			);
		})
		.await;
	server
		.mock_async(|when, then| {
			when.method(GET).path("/me");
			then.status(500).body("upstream exploded");
		})
		.await;

	let err = bridge
		.complete_authorization(CallbackParams {
			code: Some("auth-code".into()),
			state: Some(format!("{STATE_PREFIX}anonymous")),
			..Default::default()
		})
		.await
		.expect_err("A failed identity lookup should fail the callback.");

	assert!(matches!(err, Error::Upstream { status: 500, .. }), "{err:?}");

	let account = AccountId::new(ACCOUNT).expect("Account fixture should be valid.");

	assert!(
		store
			.fetch_credentials(&account)
			.await
			.expect("Store fetch should succeed.")
			.is_none(),
		"No record may be persisted when identity resolution fails.",
	);
}
