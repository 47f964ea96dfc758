//! HTTP sessions and the transport primitives they run on.
//!
//! [`HttpSession`] is bound to a single origin and resolves redirects itself, so the
//! transport underneath must never follow them. The transport is reached only through
//! [`Connector`] (opens a connection to an origin) and [`Connection`] (sends one request and
//! reads the full response). [`ReqwestConnector`] is the default implementation; tests and
//! downstream crates can bring their own.

pub mod redirect;
pub mod request;
pub mod response;
pub mod session;

pub use redirect::*;
pub use request::*;
pub use response::*;
pub use session::*;

// crates.io
use ::http::HeaderMap;
#[cfg(feature = "reqwest")] use reqwest::{blocking::Client as BlockingClient, redirect::Policy};
// self
use crate::{_prelude::*, error::TransportError};

/// Opens connections to an origin on behalf of an [`HttpSession`].
///
/// Implementations must be `Send + Sync + 'static` so a single connector can be shared
/// between a session, the sessions it spawns for cross-origin redirects, and the token
/// manager.
pub trait Connector
where
	Self: 'static + Send + Sync,
{
	/// Opens a connection to the origin of `origin`.
	fn open(&self, origin: &Url) -> Result<Box<dyn Connection>, TransportError>;
}

/// A live connection owned by exactly one session.
///
/// Dropping the connection closes it.
pub trait Connection
where
	Self: Send,
{
	/// Sends `request` and reads the complete response.
	///
	/// Implementations must return 3xx responses untouched and must not raise on HTTP
	/// error statuses.
	fn send(&mut self, request: &WireRequest) -> Result<Response, TransportError>;
}

/// Fully resolved request handed to a [`Connection`].
#[derive(Clone, Debug)]
pub struct WireRequest {
	/// Request method.
	pub method: Method,
	/// Absolute target URL, stripped of user-info.
	pub url: Url,
	/// Headers after session defaults and per-call overrides were merged.
	pub headers: HeaderMap,
	/// Encoded body, if the method carries one.
	pub body: Option<Vec<u8>>,
}

/// Default blocking transport backed by [`reqwest`].
///
/// Without explicit timeouts the reqwest defaults apply.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug, Default)]
pub struct ReqwestConnector {
	timeout: Option<std::time::Duration>,
	connect_timeout: Option<std::time::Duration>,
	accept_invalid_certs: bool,
}
#[cfg(feature = "reqwest")]
impl ReqwestConnector {
	/// Sets the total request timeout.
	pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	/// Sets the connect timeout.
	pub fn with_connect_timeout(mut self, timeout: std::time::Duration) -> Self {
		self.connect_timeout = Some(timeout);

		self
	}

	/// Skips peer certificate verification.
	///
	/// Only meant for self-signed test servers such as `httpmock`'s HTTPS listener.
	pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
		self.accept_invalid_certs = accept;

		self
	}
}
#[cfg(feature = "reqwest")]
impl Connector for ReqwestConnector {
	fn open(&self, origin: &Url) -> Result<Box<dyn Connection>, TransportError> {
		let origin = origin.origin().ascii_serialization();
		let mut builder =
			BlockingClient::builder().redirect(Policy::none()).pool_max_idle_per_host(1);

		if let Some(timeout) = self.timeout {
			builder = builder.timeout(timeout);
		}
		if let Some(timeout) = self.connect_timeout {
			builder = builder.connect_timeout(timeout);
		}
		if self.accept_invalid_certs {
			builder = builder.danger_accept_invalid_certs(true);
		}

		let client = builder.build().map_err(|e| TransportError::network(origin.clone(), e))?;

		Ok(Box::new(ReqwestConnection { origin, client }))
	}
}

#[cfg(feature = "reqwest")]
struct ReqwestConnection {
	origin: String,
	client: BlockingClient,
}
#[cfg(feature = "reqwest")]
impl Connection for ReqwestConnection {
	fn send(&mut self, request: &WireRequest) -> Result<Response, TransportError> {
		let mut builder = self
			.client
			.request(request.method.as_http(), request.url.clone())
			.headers(request.headers.clone());

		if let Some(body) = &request.body {
			builder = builder.body(body.clone());
		}

		let response =
			builder.send().map_err(|e| TransportError::network(self.origin.clone(), e))?;
		let status = response.status();
		let headers = response.headers().to_owned();
		let body =
			response.bytes().map_err(|e| TransportError::network(self.origin.clone(), e))?;

		Ok(Response {
			status: status.as_u16(),
			headers,
			body: body.to_vec(),
			message: status.canonical_reason().unwrap_or_default().to_owned(),
		})
	}
}

/// Returns the default connector, when one is compiled in.
pub(crate) fn default_connector() -> Result<Arc<dyn Connector>> {
	#[cfg(feature = "reqwest")]
	{
		Ok(Arc::new(ReqwestConnector::default()))
	}
	#[cfg(not(feature = "reqwest"))]
	{
		Err(crate::error::ConfigError::MissingConnector.into())
	}
}
