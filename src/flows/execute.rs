//! Worklog API orchestration with transparent refresh-and-retry.
//!
//! [`Bridge::execute_worklog`] performs one worklog REST call with the stored
//! access token. When the provider answers 401 or 403 the bridge refreshes the
//! credential once and retries the call exactly once; the retry's outcome is
//! final either way. Access tokens are never refreshed preemptively, so a
//! locally expired record still gets its first attempt.

// self
use crate::{
	_prelude::*,
	auth::AccountId,
	flows::Bridge,
	http::{BridgeHttpClient, RestResponse},
	oauth::TransportErrorMapper,
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::BridgeStore,
	worklog::{self, WorklogCall},
};

impl<C, M> Bridge<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Performs a worklog call for the account, refreshing and retrying once on
	/// an auth-failure status.
	///
	/// Returns the raw provider response; callers apply their own status
	/// policies. A refresh failure aborts the retry and surfaces as the bridge
	/// error it produced.
	pub async fn execute_worklog(
		&self,
		account_id: &AccountId,
		call: WorklogCall,
	) -> Result<RestResponse> {
		const KIND: FlowKind = FlowKind::Worklog;

		let span = FlowSpan::new(KIND, "execute_worklog");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				call.validate()?;

				let record = <dyn BridgeStore>::fetch_credentials(self.store.as_ref(), account_id)
					.await?
					.ok_or(Error::AuthDataIncomplete { missing: "credentials" })?;

				if let Some(missing) = record.missing_field() {
					return Err(Error::AuthDataIncomplete { missing });
				}

				let Some(cloud_id) = record.cloud_id.clone() else {
					return Err(Error::AuthDataIncomplete { missing: "cloudId" });
				};
				let first = worklog::perform(
					self.http_client.as_ref(),
					&self.config,
					&cloud_id,
					&record.access_token,
					&call,
				)
				.await?;

				if !first.is_auth_failure() {
					return Ok(first);
				}

				// One refresh, one retry; the second response is final.
				let refreshed = self.refresh_credentials(account_id).await?;

				Ok(worklog::perform(
					self.http_client.as_ref(),
					&self.config,
					&cloud_id,
					&refreshed.access_token,
					&call,
				)
				.await?)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
