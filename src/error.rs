//! Crate-level error types shared across sessions, token management, and the database layer.

// self
use crate::{_prelude::*, auth::CredentialError, http::Method};

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
///
/// HTTP-level failures (4xx/5xx) are not represented here; sessions return them as
/// ordinary [`Response`](crate::http::Response) values.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Base or redirect URL is not a usable absolute HTTP(S) URL.
	#[error(transparent)]
	InvalidUrl(#[from] InvalidUrlError),
	/// Service-account credential could not be loaded.
	#[error(transparent)]
	Credential(#[from] CredentialError),
	/// Token renewal failed and no usable cached token exists.
	#[error(transparent)]
	Authentication(#[from] AuthenticationError),
	/// Transport failure (DNS, TCP, TLS, IO).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Caller supplied contradictory request options.
	#[error(transparent)]
	Request(#[from] RequestError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Redirect chain exceeded the configured ceiling.
	#[error("Redirect chain exceeded {max} hops.")]
	TooManyRedirects {
		/// Configured hop ceiling.
		max: usize,
	},
	/// Database endpoint answered with a non-success status.
	#[error("Database responded with HTTP {status}: {message}.")]
	UnexpectedStatus {
		/// HTTP status code.
		status: u16,
		/// Reason phrase reported with the status.
		message: String,
	},
	/// Response body is not the expected JSON document.
	#[error("Response body is not valid JSON.")]
	Decode {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request payload could not be serialized.
	#[error("Request payload could not be serialized.")]
	Encode(#[source] serde_json::Error),
}

/// URL validation failures raised when binding a session to an origin.
#[derive(Debug, ThisError)]
pub enum InvalidUrlError {
	/// URL cannot be parsed at all.
	#[error("URL `{url}` cannot be parsed.")]
	Parse {
		/// Offending input.
		url: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// URL uses a scheme other than `http` or `https`.
	#[error("URL `{url}` uses unsupported scheme `{scheme}`.")]
	UnsupportedScheme {
		/// Offending input.
		url: String,
		/// Scheme that was rejected.
		scheme: String,
	},
	/// URL has no host component.
	#[error("URL `{url}` has no host.")]
	MissingHost {
		/// Offending input.
		url: String,
	},
}

/// Token renewal failures surfaced through the token manager.
#[derive(Debug, ThisError)]
pub enum AuthenticationError {
	/// Token endpoint answered with a non-200 status.
	#[error("Token endpoint rejected the assertion with HTTP {status}.")]
	Rejected {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Leading part of the response body, for diagnostics.
		body: String,
	},
	/// Token endpoint responded with JSON that lacks the expected fields.
	#[error("Token endpoint returned a malformed response.")]
	MalformedResponse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Token endpoint returned a lifetime that does not fit in a timestamp.
	#[error("The expires_in value {expires_in} exceeds the supported range.")]
	ExpiresInOutOfRange {
		/// Lifetime reported by the token endpoint.
		expires_in: i64,
	},
	/// Token endpoint returned a non-positive lifetime.
	#[error("The expires_in value must be positive, got {expires_in}.")]
	NonPositiveExpiresIn {
		/// Lifetime reported by the token endpoint.
		expires_in: i64,
	},
	/// Assertion could not be signed with the credential's private key.
	#[error("Assertion could not be signed: {reason}.")]
	Signing {
		/// Description of the key or signing failure.
		reason: String,
	},
	/// Exchange request did not complete.
	#[error("Token exchange request failed.")]
	Exchange {
		/// Session or transport failure.
		#[source]
		source: Box<Error>,
	},
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while talking to `{origin}`.")]
	Network {
		/// Origin the session is bound to.
		origin: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		origin: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { origin: origin.into(), source: Box::new(src) }
	}
}

/// Request options that cannot be honoured together.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum RequestError {
	/// Both a raw body and structured form parameters were supplied.
	#[error("A request cannot carry both a raw body and form parameters.")]
	ConflictingBody,
	/// A body was supplied for a method that does not carry one.
	#[error("{method} requests cannot carry a body.")]
	BodyNotPermitted {
		/// Method that rejected the body.
		method: Method,
	},
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// No transport was configured and the default one is compiled out.
	#[error("No connector configured; enable the `reqwest` feature or supply one.")]
	MissingConnector,
	/// Database URL cannot be derived without a project identifier.
	#[error("Project identifier is required to derive the database URL.")]
	MissingProjectId,
	/// Header value contains characters HTTP does not allow.
	#[error("Header value is invalid.")]
	InvalidHeaderValue(#[from] ::http::header::InvalidHeaderValue),
}
