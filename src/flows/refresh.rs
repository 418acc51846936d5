//! Refresh token rotation against the stored credential record.
//!
//! The bridge exposes [`Bridge::refresh_credentials`] so callers can trade a
//! stored refresh token for a fresh access token. Successful exchanges rotate
//! both secrets in place (providers may or may not return a replacement refresh
//! token); a definitive `invalid_grant` rejection deletes the record entirely so
//! the account reads as disconnected afterwards.

// self
use crate::{
	_prelude::*,
	auth::{AccountId, CredentialRecord},
	flows::Bridge,
	http::BridgeHttpClient,
	oauth::{TokenFacade, TransportErrorMapper},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	store::BridgeStore,
};

impl<C, M> Bridge<C, M>
where
	C: ?Sized + BridgeHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	/// Exchanges the account's stored refresh token for a fresh access token,
	/// persisting the rotated record.
	///
	/// Two concurrent callers may both perform the exchange; the store's per-key
	/// atomicity makes the overlap safe and the later write wins.
	pub async fn refresh_credentials(&self, account_id: &AccountId) -> Result<CredentialRecord> {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "refresh_credentials");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span
			.instrument(async move {
				self.config.ensure_client_credentials()?;

				let mut record =
					<dyn BridgeStore>::fetch_credentials(self.store.as_ref(), account_id)
						.await?
						.ok_or(Error::AuthDataIncomplete { missing: "credentials" })?;

				if record.refresh_token.is_empty() {
					return Err(Error::AuthDataIncomplete { missing: "refreshToken" });
				}

				let facade = <TokenFacade<C, M>>::from_config(
					&self.config,
					self.http_client.clone(),
					self.transport_mapper.clone(),
				)?;
				let exchange = match facade.refresh(record.refresh_token.expose()).await {
					Ok(exchange) => exchange,
					Err(err) => {
						if matches!(err, Error::ReauthRequired { .. }) {
							// The refresh token is dead; keeping the record would
							// make every later call fail the same way.
							let _ = <dyn BridgeStore>::delete_credentials(
								self.store.as_ref(),
								account_id,
							)
							.await;
						}

						return Err(err);
					},
				};
				let now = OffsetDateTime::now_utc();

				record.rotate(
					exchange.access_token.clone(),
					exchange.refresh_token.clone(),
					exchange.expires_at(now),
					now,
				);
				<dyn BridgeStore>::save_credentials(self.store.as_ref(), record.clone()).await?;

				Ok(record)
			})
			.await;

		match &result {
			Ok(_) => obs::record_flow_outcome(KIND, FlowOutcome::Success),
			Err(_) => obs::record_flow_outcome(KIND, FlowOutcome::Failure),
		}

		result
	}
}
