//! Bridge-level error taxonomy shared across flows, dispatch, and stores.
//!
//! Every failure class the dispatcher must distinguish is a dedicated variant;
//! callers match on kinds instead of inspecting message text.

// self
use crate::_prelude::*;

/// Bridge-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical bridge error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, IO).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Malformed or incomplete caller input; never retried.
	#[error("Bad request: {reason}.")]
	BadRequest {
		/// Human-readable description of what was missing or malformed.
		reason: String,
	},
	/// Shared-secret or permission failure; never retried.
	#[error("Unauthorized: {reason}.")]
	Unauthorized {
		/// Human-readable description of the rejected credential.
		reason: String,
	},
	/// No usable stored credential for this account; requires out-of-band authorization.
	#[error("Stored authorization data is incomplete: missing {missing}.")]
	AuthDataIncomplete {
		/// Name of the absent credential field.
		missing: &'static str,
	},
	/// The stored refresh token is permanently dead; the user must re-authorize.
	#[error("Re-authorization required: {reason}.")]
	ReauthRequired {
		/// Provider- or bridge-supplied reason string.
		reason: String,
	},
	/// The provider reported an error on the authorization redirect.
	#[error("Authorization was denied by the provider: {reason}.")]
	AuthorizationDenied {
		/// Provider-supplied `error` or `error_description` value.
		reason: String,
	},
	/// Non-success provider response not covered by a more specific kind.
	#[error("Upstream returned HTTP {status}: {message}.")]
	Upstream {
		/// HTTP status code returned by the provider.
		status: u16,
		/// Summarized provider error payload.
		message: String,
	},
	/// Well-formed HTTP response with a semantically broken payload.
	#[error("Provider protocol violation: {reason}.")]
	Protocol {
		/// Description of the missing or malformed payload element.
		reason: String,
	},
}

/// Configuration and validation failures raised by the bridge.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// OAuth client identifier is empty.
	#[error("OAuth client id is not configured.")]
	MissingClientId,
	/// OAuth client secret is empty.
	#[error("OAuth client secret is not configured.")]
	MissingClientSecret,
	/// A configured endpoint URL could not be used.
	#[error("Configured endpoint URL is invalid.")]
	InvalidEndpoint {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// Redirect URI cannot be parsed.
	#[error("Redirect URI is invalid.")]
	InvalidRedirect {
		/// Underlying parsing failure.
		#[source]
		source: oauth2::url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for ConfigError {
	fn from(e: reqwest::Error) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the provider.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the provider.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

impl Error {
	/// Returns `true` for kinds the dispatcher surfaces as an authorization failure.
	///
	/// Secret mismatches, unusable stored credentials, and dead refresh tokens all
	/// instruct the caller to (re-)connect rather than retry the request.
	pub fn is_auth_class(&self) -> bool {
		matches!(
			self,
			Error::Unauthorized { .. }
				| Error::AuthDataIncomplete { .. }
				| Error::ReauthRequired { .. }
		)
	}
}
