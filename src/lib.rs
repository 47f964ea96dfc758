//! Blocking Firebase Realtime Database client built around redirect-aware HTTP sessions and
//! self-renewing JWT-bearer service-account tokens.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod database;
pub mod error;
pub mod http;
pub mod obs;
#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::{HashMap, VecDeque};
	// self
	use crate::{
		auth::Credential,
		http::{Connection, Connector, Response, WireRequest},
	};

	/// PKCS#8 RSA key used to sign assertions in tests.
	pub const TEST_PRIVATE_KEY: &str = include_str!("../tests/fixtures/rsa_pkcs8.pem");
	/// Same key in PKCS#1 (`BEGIN RSA PRIVATE KEY`) form.
	pub const TEST_PRIVATE_KEY_PKCS1: &str = include_str!("../tests/fixtures/rsa_pkcs1.pem");

	/// Builds a credential signed by [`TEST_PRIVATE_KEY`] that targets `token_uri`.
	pub fn test_credential(token_uri: &str) -> Credential {
		let json = serde_json::json!({
			"type": "service_account",
			"project_id": "demo-project",
			"private_key": TEST_PRIVATE_KEY,
			"client_email": "robot@demo-project.iam.gserviceaccount.com",
			"token_uri": token_uri,
		});

		Credential::from_json(&json.to_string()).expect("Test credential should parse.")
	}

	/// Builds a response with the given status, headers, and body.
	pub fn response(status: u16, headers: &[(&str, &str)], body: &str) -> Response {
		let mut map = ::http::HeaderMap::new();

		for (name, value) in headers {
			map.append(
				::http::HeaderName::from_bytes(name.as_bytes())
					.expect("Header name should be valid."),
				::http::HeaderValue::from_str(value).expect("Header value should be valid."),
			);
		}

		Response {
			status,
			headers: map,
			body: body.as_bytes().to_vec(),
			message: ::http::StatusCode::from_u16(status)
				.ok()
				.and_then(|code| code.canonical_reason())
				.unwrap_or_default()
				.to_owned(),
		}
	}

	/// Request observed by a [`ScriptedConnector`], tagged with the connection that sent it.
	#[derive(Clone, Debug)]
	pub struct SentRequest {
		/// Sequence number of the connection (1-based, across all origins).
		pub connection: usize,
		/// Request exactly as handed to the wire.
		pub request: WireRequest,
	}

	#[derive(Debug, Default)]
	struct Script {
		replies: HashMap<String, VecDeque<Response>>,
		opened: Vec<String>,
		sent: Vec<SentRequest>,
	}

	/// In-memory [`Connector`] that replays scripted responses keyed by request URL.
	///
	/// Requests for a URL with no remaining replies fail with a transport error.
	#[derive(Clone, Debug, Default)]
	pub struct ScriptedConnector(Arc<Mutex<Script>>);
	impl ScriptedConnector {
		/// Queues `response` for the next request to `url`.
		pub fn reply(&self, url: &str, response: Response) -> &Self {
			self.0.lock().replies.entry(url.to_owned()).or_default().push_back(response);

			self
		}

		/// Origins opened so far, in order.
		pub fn opened(&self) -> Vec<String> {
			self.0.lock().opened.clone()
		}

		/// Requests sent so far, in order.
		pub fn sent(&self) -> Vec<SentRequest> {
			self.0.lock().sent.clone()
		}

		/// Shares the connector as a trait object.
		pub fn shared(&self) -> Arc<dyn Connector> {
			Arc::new(self.clone())
		}
	}
	impl Connector for ScriptedConnector {
		fn open(&self, origin: &Url) -> Result<Box<dyn Connection>, crate::error::TransportError> {
			let mut script = self.0.lock();

			script.opened.push(origin.origin().ascii_serialization());

			Ok(Box::new(ScriptedConnection { id: script.opened.len(), script: self.0.clone() }))
		}
	}

	struct ScriptedConnection {
		id: usize,
		script: Arc<Mutex<Script>>,
	}
	impl Connection for ScriptedConnection {
		fn send(
			&mut self,
			request: &WireRequest,
		) -> Result<Response, crate::error::TransportError> {
			let mut script = self.script.lock();

			script.sent.push(SentRequest { connection: self.id, request: request.clone() });

			script.replies.get_mut(request.url.as_str()).and_then(VecDeque::pop_front).ok_or_else(
				|| {
					crate::error::TransportError::Io(std::io::Error::new(
						std::io::ErrorKind::ConnectionRefused,
						format!("no scripted reply for {}", request.url),
					))
				},
			)
		}
	}
}

mod _prelude {
	pub use std::{
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		path::Path,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::Mutex;
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
