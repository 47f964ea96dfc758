//! Normalized response returned by sessions for every completed exchange.

// crates.io
use ::http::{HeaderMap, header::CONNECTION};
use serde::de::DeserializeOwned;
// self
use crate::_prelude::*;

/// Completed HTTP exchange, whatever its status.
///
/// Sessions never raise on 4xx/5xx; interpreting the status is the caller's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
	/// HTTP status code.
	pub status: u16,
	/// Response headers; repeated names keep every value.
	pub headers: HeaderMap,
	/// Raw body bytes.
	pub body: Vec<u8>,
	/// Canonical reason phrase for the status.
	///
	/// The reqwest transport does not expose the phrase the peer sent, so this is the
	/// standard phrase for `status` (empty for unregistered codes).
	pub message: String,
}
impl Response {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns `true` for 3xx statuses.
	pub fn is_redirection(&self) -> bool {
		(300..400).contains(&self.status)
	}

	/// Returns the first value of `name` as text, if present and valid.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers.get(name).and_then(|value| value.to_str().ok())
	}

	/// Returns every value of `name` that is valid text.
	pub fn header_values(&self, name: &str) -> Vec<&str> {
		self.headers.get_all(name).iter().filter_map(|value| value.to_str().ok()).collect()
	}

	/// Whether the peer asked for the connection to be closed after this response.
	pub fn wants_close(&self) -> bool {
		self.headers.get_all(CONNECTION).iter().any(|value| {
			value
				.to_str()
				.map(|raw| raw.split(',').any(|token| token.trim().eq_ignore_ascii_case("close")))
				.unwrap_or(false)
		})
	}

	/// Body decoded as UTF-8, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Deserializes the body as JSON with path-aware error reporting.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::_preludet::response;

	#[test]
	fn connection_close_is_detected_case_insensitively() {
		assert!(response(200, &[("connection", "Close")], "").wants_close());
		assert!(response(200, &[("connection", "upgrade, close")], "").wants_close());
		assert!(!response(200, &[("connection", "keep-alive")], "").wants_close());
		assert!(!response(200, &[], "").wants_close());
	}

	#[test]
	fn json_errors_carry_the_failing_path() {
		#[derive(Debug, Deserialize)]
		struct Payload {
			#[allow(dead_code)]
			inner: Inner,
		}
		#[derive(Debug, Deserialize)]
		struct Inner {
			#[allow(dead_code)]
			count: u32,
		}

		let err = response(200, &[], "{\"inner\":{\"count\":\"x\"}}")
			.json::<Payload>()
			.expect_err("String count must not deserialize.");

		assert_eq!(err.path().to_string(), "inner.count");
	}

	#[test]
	fn repeated_headers_keep_all_values() {
		let response = response(200, &[("set-cookie", "a=1"), ("set-cookie", "b=2")], "ok");

		assert_eq!(response.header_values("set-cookie"), vec!["a=1", "b=2"]);
		assert_eq!(response.header("set-cookie"), Some("a=1"));
		assert!(response.is_success());
		assert_eq!(response.text(), "ok");
	}
}
