//! Classification of raw transport results and redirect target resolution.

// crates.io
use ::http::header::LOCATION;
// self
use crate::{
	_prelude::*,
	error::{InvalidUrlError, TransportError},
	http::Response,
};

/// Hop ceiling applied when a session is not configured otherwise.
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// What a single round trip produced.
#[derive(Debug)]
pub enum TransportOutcome {
	/// 3xx with a usable `Location`; the caller must re-issue the request.
	Redirect {
		/// Status that carried the redirect.
		status: u16,
		/// Raw `Location` header value.
		location: String,
	},
	/// Any other response, returned to the caller as-is.
	Completed(Response),
	/// The exchange did not complete.
	Failed(TransportError),
}
impl TransportOutcome {
	/// Discriminates a raw transport result.
	///
	/// A 3xx response without a readable `Location` cannot be followed and is treated as
	/// completed.
	pub fn classify(result: Result<Response, TransportError>) -> Self {
		let response = match result {
			Ok(response) => response,
			Err(e) => return Self::Failed(e),
		};

		if !response.is_redirection() {
			return Self::Completed(response);
		}

		match response.headers.get(LOCATION).and_then(|value| value.to_str().ok()) {
			Some(location) if !location.trim().is_empty() =>
				Self::Redirect { status: response.status, location: location.trim().to_owned() },
			_ => Self::Completed(response),
		}
	}
}

/// Resolves `location` against the URL of the request that was redirected.
///
/// Absolute locations are used as-is; path-only locations inherit the current origin.
pub fn resolve_location(current: &Url, location: &str) -> Result<Url, InvalidUrlError> {
	let target = current
		.join(location)
		.map_err(|source| InvalidUrlError::Parse { url: location.to_owned(), source })?;

	ensure_http_url(&target, location)?;

	Ok(target)
}

/// Rejects URLs a session cannot be bound to.
pub(crate) fn ensure_http_url(url: &Url, raw: &str) -> Result<(), InvalidUrlError> {
	if !matches!(url.scheme(), "http" | "https") {
		return Err(InvalidUrlError::UnsupportedScheme {
			url: raw.to_owned(),
			scheme: url.scheme().to_owned(),
		});
	}
	if url.host_str().is_none_or(str::is_empty) {
		return Err(InvalidUrlError::MissingHost { url: raw.to_owned() });
	}

	Ok(())
}
