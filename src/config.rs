//! Static bridge configuration.

// self
use crate::{_prelude::*, auth::CloudId, error::ConfigError};

/// OAuth scopes requested during authorization.
///
/// `offline_access` is what makes the provider return a refresh token; dropping
/// it silently breaks the refresh flow for every newly connected account.
pub const SCOPES: &[&str] =
	&["read:me", "read:account", "read:jira-work", "write:jira-work", "offline_access"];

const DEFAULT_AUTHORIZATION_ENDPOINT: &str = "https://auth.atlassian.com/authorize";
const DEFAULT_TOKEN_ENDPOINT: &str = "https://auth.atlassian.com/oauth/token";
const DEFAULT_API_BASE: &str = "https://api.atlassian.com/";
const DEFAULT_AUDIENCE: &str = "api.atlassian.com";

/// Immutable configuration for a [`Bridge`](crate::flows::Bridge).
///
/// All provider endpoints are explicit fields so tests can point the bridge at
/// local mock servers; the builder defaults target the hosted Atlassian cloud.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
	/// OAuth client identifier issued by the provider.
	pub client_id: String,
	/// OAuth client secret issued by the provider.
	pub client_secret: String,
	/// Redirect URI registered with the provider for the authorization flow.
	pub redirect_uri: Url,
	/// Authorization endpoint users are sent to.
	pub authorization_endpoint: Url,
	/// Token endpoint used for code exchange and refresh.
	pub token_endpoint: Url,
	/// Base URL of the provider's REST API gateway, always ending in `/`.
	pub api_base: Url,
	/// Audience parameter attached to the authorization request.
	pub audience: String,
}
impl BridgeConfig {
	/// Starts a config builder with the given client credentials and redirect URI.
	pub fn builder(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_uri: Url,
	) -> BridgeConfigBuilder {
		BridgeConfigBuilder {
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			redirect_uri,
			authorization_endpoint: None,
			token_endpoint: None,
			api_base: None,
			audience: None,
		}
	}

	/// Verifies that both client credentials are non-empty.
	pub fn ensure_client_credentials(&self) -> Result<(), ConfigError> {
		if self.client_id.trim().is_empty() {
			return Err(ConfigError::MissingClientId);
		}
		if self.client_secret.trim().is_empty() {
			return Err(ConfigError::MissingClientSecret);
		}

		Ok(())
	}

	/// Builds the worklog resource URL for an issue, optionally addressing one entry.
	pub fn worklog_url(
		&self,
		cloud: &CloudId,
		issue_key: &str,
		worklog_id: Option<&str>,
	) -> Result<Url, ConfigError> {
		let mut path = format!("ex/jira/{cloud}/rest/api/3/issue/{issue_key}/worklog");

		if let Some(id) = worklog_id {
			path.push('/');
			path.push_str(id);
		}

		self.api_base.join(&path).map_err(|e| ConfigError::InvalidEndpoint { source: e })
	}

	/// Builds the identity endpoint URL.
	pub fn identity_url(&self) -> Result<Url, ConfigError> {
		self.api_base.join("me").map_err(|e| ConfigError::InvalidEndpoint { source: e })
	}

	/// Builds the accessible-resources endpoint URL.
	pub fn resources_url(&self) -> Result<Url, ConfigError> {
		self.api_base
			.join("oauth/token/accessible-resources")
			.map_err(|e| ConfigError::InvalidEndpoint { source: e })
	}
}

/// Builder for [`BridgeConfig`].
#[derive(Clone, Debug)]
pub struct BridgeConfigBuilder {
	client_id: String,
	client_secret: String,
	redirect_uri: Url,
	authorization_endpoint: Option<Url>,
	token_endpoint: Option<Url>,
	api_base: Option<Url>,
	audience: Option<String>,
}
impl BridgeConfigBuilder {
	/// Overrides the authorization endpoint.
	pub fn authorization_endpoint(mut self, url: Url) -> Self {
		self.authorization_endpoint = Some(url);

		self
	}

	/// Overrides the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Overrides the REST API base URL.
	pub fn api_base(mut self, url: Url) -> Self {
		self.api_base = Some(url);

		self
	}

	/// Overrides the audience parameter.
	pub fn audience(mut self, audience: impl Into<String>) -> Self {
		self.audience = Some(audience.into());

		self
	}

	/// Finalizes the configuration, applying hosted-provider defaults.
	pub fn build(self) -> BridgeConfig {
		let mut api_base = self.api_base.unwrap_or_else(default_api_base);

		// Relative joins silently drop the last path segment without this.
		if !api_base.path().ends_with('/') {
			let path = format!("{}/", api_base.path());

			api_base.set_path(&path);
		}

		BridgeConfig {
			client_id: self.client_id,
			client_secret: self.client_secret,
			redirect_uri: self.redirect_uri,
			authorization_endpoint: self
				.authorization_endpoint
				.unwrap_or_else(|| default_url(DEFAULT_AUTHORIZATION_ENDPOINT)),
			token_endpoint: self
				.token_endpoint
				.unwrap_or_else(|| default_url(DEFAULT_TOKEN_ENDPOINT)),
			api_base,
			audience: self.audience.unwrap_or_else(|| DEFAULT_AUDIENCE.into()),
		}
	}
}

fn default_api_base() -> Url {
	default_url(DEFAULT_API_BASE)
}

fn default_url(value: &str) -> Url {
	match Url::parse(value) {
		Ok(url) => url,
		// Compile-time constants above always parse.
		Err(_) => unreachable!(),
	}
}
