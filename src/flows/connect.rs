//! Authorization session start and callback completion.
//!
//! [`Bridge::start_authorization`] produces the provider consent URL plus an
//! opaque state value; [`Bridge::complete_authorization`] turns the redirect
//! callback into a persisted [`CredentialRecord`] by exchanging the code,
//! resolving the user's identity, and picking the first accessible site.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	auth::{AccountId, CloudId, CredentialRecord, PendingAuthorization, TokenSecret, UserProfile},
	config,
	flows::Bridge,
	http::{BridgeHttpClient, RestMethod, RestRequest},
	oauth::{TokenFacade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::BridgeStore,
	worklog::summarize_error_body,
};

/// Prefix every bridge-issued state value carries.
///
/// Callbacks whose state lacks the prefix were not started by this bridge and
/// are rejected outright; a prefix match with a stale suffix is only warned
/// about, because single-use consumption of the pending record already bounds
/// the replay window.
pub const STATE_PREFIX: &str = "wlb-";

/// A started authorization awaiting the provider callback.
#[derive(Clone, Debug)]
pub struct AuthorizationSession {
	/// Account the session was started for, when known up front.
	pub account_id: Option<AccountId>,
	/// Opaque state value echoed back on the callback.
	pub state: String,
	/// Consent URL to send the user to.
	pub authorize_url: Url,
}

/// Query parameters delivered on the provider's redirect callback.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct CallbackParams {
	/// Authorization code to exchange, absent on denial.
	pub code: Option<String>,
	/// Echoed state value.
	pub state: Option<String>,
	/// Provider error code, present on denial.
	pub error: Option<String>,
	/// Provider error description, when supplied.
	pub error_description: Option<String>,
}

/// Result of a completed authorization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizationOutcome {
	/// Identity resolved from the provider.
	pub account_id: AccountId,
	/// First accessible site, when one was found.
	pub cloud_id: Option<CloudId>,
}

#[derive(Debug, Deserialize)]
struct IdentityResponse {
	account_id: String,
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AccessibleResource {
	id: String,
}

impl<C, M> Bridge<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Starts an authorization session, returning the consent URL and state.
	///
	/// When the account is already known the state is persisted for callback
	/// verification; anonymous sessions rely on the state prefix alone.
	pub async fn start_authorization(
		&self,
		account_id: Option<&AccountId>,
	) -> Result<AuthorizationSession> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "start_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.config.ensure_client_credentials()?;

				let state = generate_state();

				if let Some(account) = account_id {
					<dyn BridgeStore>::save_pending(
						self.store.as_ref(),
						account,
						PendingAuthorization {
							state: state.clone(),
							created_at: OffsetDateTime::now_utc(),
						},
					)
					.await?;
				}

				let mut authorize_url = self.config.authorization_endpoint.clone();

				authorize_url
					.query_pairs_mut()
					.append_pair("audience", &self.config.audience)
					.append_pair("client_id", &self.config.client_id)
					.append_pair("scope", &config::SCOPES.join(" "))
					.append_pair("redirect_uri", self.config.redirect_uri.as_str())
					.append_pair("state", &state)
					.append_pair("response_type", "code")
					.append_pair("prompt", "consent");

				Ok(AuthorizationSession {
					account_id: account_id.cloned(),
					state,
					authorize_url,
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	/// Completes an authorization from the provider's redirect callback.
	///
	/// Exchanges the code, resolves the authorizing user's identity and first
	/// accessible site, then persists the fully populated credential record. A
	/// missing site is tolerated with a warning; the record stays usable for
	/// everything except worklog calls until the next authorization.
	pub async fn complete_authorization(
		&self,
		params: CallbackParams,
	) -> Result<AuthorizationOutcome> {
		const KIND: FlowKind = FlowKind::Authorize;

		let span = FlowSpan::new(KIND, "complete_authorization");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.config.ensure_client_credentials()?;

				if let Some(error) = params.error {
					let reason = params.error_description.unwrap_or(error);

					return Err(Error::AuthorizationDenied { reason });
				}

				let Some(code) = params.code.filter(|code| !code.trim().is_empty()) else {
					return Err(Error::BadRequest {
						reason: "Callback is missing the authorization code".into(),
					});
				};

				match params.state.as_deref() {
					Some(state) if state.starts_with(STATE_PREFIX) => (),
					_ =>
						return Err(Error::BadRequest {
							reason: "Callback state was not issued by this service".into(),
						}),
				}

				let facade = <TokenFacade<C, M>>::from_config(
					&self.config,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;
				let exchange = facade.exchange_code(&code).await?;
				let identity = self.fetch_identity(&exchange.access_token).await?;
				let account_id = AccountId::new(identity.account_id)
					.map_err(|e| Error::Protocol { reason: e.to_string() })?;
				let cloud_id = self.fetch_first_cloud_id(&exchange.access_token).await;

				if cloud_id.is_none() {
					obs::warn_flow(
						KIND,
						"No accessible site was found; worklog calls will fail until the account \
						 re-authorizes",
					);
				}

				self.verify_pending_state(&account_id, params.state.as_deref()).await;

				let now = OffsetDateTime::now_utc();
				let record = CredentialRecord {
					account_id: account_id.clone(),
					access_token: exchange.access_token.clone(),
					refresh_token: exchange
						.refresh_token
						.clone()
						.unwrap_or_else(|| TokenSecret::new("")),
					expires_at: exchange.expires_at(now),
					cloud_id: cloud_id.clone(),
					user: Some(UserProfile {
						account_id: account_id.clone(),
						display_name: identity.name,
						email: identity.email,
					}),
					updated_at: now,
				};

				<dyn BridgeStore>::save_credentials(self.store.as_ref(), record).await?;

				Ok(AuthorizationOutcome { account_id, cloud_id })
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}

	async fn fetch_identity(&self, access_token: &TokenSecret) -> Result<IdentityResponse> {
		let request = RestRequest::new(RestMethod::Get, self.config.identity_url()?)
			.bearer(access_token.clone());
		let response = self.http_client.execute(request).await?;

		if !response.is_success() {
			return Err(Error::Upstream {
				status: response.status,
				message: summarize_error_body(response.status, &response.body),
			});
		}

		let identity: IdentityResponse =
			serde_json::from_str(&response.body).map_err(|e| Error::Protocol {
				reason: format!("Identity response could not be parsed: {e}"),
			})?;

		if identity.account_id.trim().is_empty() {
			return Err(Error::Protocol {
				reason: "Identity response carried an empty account id".into(),
			});
		}

		Ok(identity)
	}

	/// Fetches the first accessible site, tolerating every failure as `None`.
	async fn fetch_first_cloud_id(&self, access_token: &TokenSecret) -> Option<CloudId> {
		let url = match self.config.resources_url() {
			Ok(url) => url,
			Err(_) => return None,
		};
		let request = RestRequest::new(RestMethod::Get, url).bearer(access_token.clone());
		let response = match self.http_client.execute(request).await {
			Ok(response) if response.is_success() => response,
			_ => return None,
		};
		let resources: Vec<AccessibleResource> =
			serde_json::from_str(&response.body).ok()?;

		resources.into_iter().next().and_then(|resource| CloudId::new(resource.id).ok())
	}

	/// Checks the callback state against the stored pending record.
	///
	/// Mismatches and lookup failures are warned about but never fail the
	/// authorization; the prefix check has already rejected foreign callbacks.
	async fn verify_pending_state(&self, account_id: &AccountId, state: Option<&str>) {
		let pending =
			match <dyn BridgeStore>::take_pending(self.store.as_ref(), account_id).await {
				Ok(pending) => pending,
				Err(_) => {
					obs::warn_flow(
						FlowKind::Authorize,
						"Pending authorization lookup failed during callback verification",
					);

					return;
				},
			};

		match (pending, state) {
			(Some(pending), Some(state)) if pending.state == state => (),
			(Some(_), _) => obs::warn_flow(
				FlowKind::Authorize,
				"Callback state did not match the stored pending authorization",
			),
			(None, _) => (),
		}
	}
}

fn generate_state() -> String {
	let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
	let sample = |len: usize| -> String {
		rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
	};

	format!("{STATE_PREFIX}{nanos}-{}-{}", sample(8), sample(16))
}
