//! Origin-bound HTTP session with a lazy connection lifecycle and redirect resolution.
//!
//! A session owns at most one connection to its origin. The connection opens on first use,
//! stays open across calls, and closes when the caller asks, when the peer answers with
//! `Connection: close`, or when the transport fails. The next call re-opens it.
//!
//! Redirects are followed in a loop bounded by [`SessionConfig::max_redirects`]. A
//! same-origin target is re-requested on the same session and connection; a cross-origin
//! target gets a freshly spawned session that inherits the default headers, and that
//! session is handed back to the caller through [`Dispatched::successor`].

// crates.io
use ::http::{HeaderMap, HeaderName, HeaderValue, header::CONTENT_TYPE};
use url::Origin;
// self
use crate::{
	_prelude::*,
	error::{InvalidUrlError, TransportError},
	http::{
		Connection, Connector, DEFAULT_MAX_REDIRECTS, Method, RequestOptions, Response,
		TransportOutcome, WireRequest, redirect, request,
	},
	obs::{self, CloseReason, Event, EventSink, Operation, OperationSpan, Outcome},
};

/// Tunables shared by a session and every session it spawns.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionConfig {
	/// Maximum number of redirect hops followed per call.
	pub max_redirects: usize,
}
impl Default for SessionConfig {
	fn default() -> Self {
		Self { max_redirects: DEFAULT_MAX_REDIRECTS }
	}
}

/// Connection lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
	/// No connection has been opened yet.
	Unstarted,
	/// A connection is open.
	Started,
	/// The connection was closed; the next call re-opens it.
	Closed,
}

/// Builder for [`HttpSession`] values; also runs one-shot requests.
pub struct SessionBuilder {
	url: String,
	headers: HeaderMap,
	config: SessionConfig,
	connector: Option<Arc<dyn Connector>>,
	sink: Option<Arc<dyn EventSink>>,
}
impl SessionBuilder {
	/// Creates a builder for a session bound to the origin of `url`.
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			headers: HeaderMap::new(),
			config: SessionConfig::default(),
			connector: None,
			sink: None,
		}
	}

	/// Replaces the default headers sent with every request.
	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Adds one default header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Overrides the session configuration.
	pub fn config(mut self, config: SessionConfig) -> Self {
		self.config = config;

		self
	}

	/// Overrides the redirect hop ceiling.
	pub fn max_redirects(mut self, max: usize) -> Self {
		self.config.max_redirects = max;

		self
	}

	/// Uses `connector` instead of the default transport.
	pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
		self.connector = Some(connector);

		self
	}

	/// Emits events to `sink` instead of discarding them.
	pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.sink = Some(sink);

		self
	}

	/// Validates the URL and builds the session. No connection is opened yet.
	pub fn build(self) -> Result<HttpSession> {
		let base = Url::parse(&self.url)
			.map_err(|source| InvalidUrlError::Parse { url: self.url.clone(), source })?;

		redirect::ensure_http_url(&base, &self.url)?;

		let connector = match self.connector {
			Some(connector) => connector,
			None => crate::http::default_connector()?,
		};
		let sink = self.sink.unwrap_or_else(obs::noop);

		Ok(HttpSession::bind(base, self.headers, self.config, connector, sink))
	}

	/// Sends one `GET` with `pairs` as the query, then closes the session.
	pub fn get<I, K, V>(self, pairs: I) -> Result<Response>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.once(Method::Get, RequestOptions::new().query_pairs(pairs))
	}

	/// Sends one `POST` with `pairs` as a URL-encoded form body, then closes the session.
	pub fn post_form<I, K, V>(self, pairs: I) -> Result<Response>
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.once(Method::Post, RequestOptions::new().form(pairs))
	}

	/// Sends one `POST` with `value` serialized as JSON, then closes the session.
	pub fn post_json<T>(self, value: &T) -> Result<Response>
	where
		T: ?Sized + Serialize,
	{
		let body = serde_json::to_vec(value).map_err(Error::Encode)?;
		let options = RequestOptions::new()
			.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
			.body(body);

		self.once(Method::Post, options)
	}

	fn once(self, method: Method, options: RequestOptions) -> Result<Response> {
		let mut session = self.build()?;
		let response = session.execute(method, options);

		session.close();

		response
	}
}

/// Result of [`HttpSession::dispatch`].
#[derive(Debug)]
pub struct Dispatched {
	/// Final, non-redirect response.
	pub response: Response,
	/// Session spawned for a cross-origin redirect, if the chain left this session's origin.
	///
	/// Callers that want to keep talking to the redirected origin should keep this handle.
	pub successor: Option<HttpSession>,
}

/// Persistent HTTP session bound to one origin.
///
/// Not synchronized: use one session per thread or guard it externally.
pub struct HttpSession {
	base: Url,
	origin: Origin,
	headers: HeaderMap,
	config: SessionConfig,
	connector: Arc<dyn Connector>,
	sink: Arc<dyn EventSink>,
	connection: Option<Box<dyn Connection>>,
	status: SessionStatus,
	connections_opened: usize,
}
impl HttpSession {
	/// Builds a session with default headers and the default transport.
	pub fn new(url: impl Into<String>, headers: HeaderMap) -> Result<Self> {
		SessionBuilder::new(url).headers(headers).build()
	}

	/// Starts a [`SessionBuilder`].
	pub fn builder(url: impl Into<String>) -> SessionBuilder {
		SessionBuilder::new(url)
	}

	fn bind(
		base: Url,
		headers: HeaderMap,
		config: SessionConfig,
		connector: Arc<dyn Connector>,
		sink: Arc<dyn EventSink>,
	) -> Self {
		Self {
			origin: base.origin(),
			base,
			headers,
			config,
			connector,
			sink,
			connection: None,
			status: SessionStatus::Unstarted,
			connections_opened: 0,
		}
	}

	/// URL the session was built with; its path is the default request path.
	pub fn base_url(&self) -> &Url {
		&self.base
	}

	/// Origin (scheme, host, port) the session is bound to.
	pub fn origin(&self) -> &Origin {
		&self.origin
	}

	/// Default headers sent with every request.
	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Mutable access to the default headers.
	pub fn headers_mut(&mut self) -> &mut HeaderMap {
		&mut self.headers
	}

	/// Session configuration.
	pub fn config(&self) -> SessionConfig {
		self.config
	}

	/// Current lifecycle state.
	pub fn status(&self) -> SessionStatus {
		self.status
	}

	/// How many times this session has opened a connection.
	pub fn connections_opened(&self) -> usize {
		self.connections_opened
	}

	/// Opens the connection if it is not open already.
	pub fn start(&mut self) -> Result<(), TransportError> {
		if self.connection.is_none() {
			let connection = self.open()?;

			self.connection = Some(connection);
		}

		Ok(())
	}

	/// Closes the connection, if open. The next call re-opens it.
	pub fn close(&mut self) {
		self.close_with(CloseReason::Requested);
	}

	/// Sends a `GET`.
	pub fn get(&mut self, options: RequestOptions) -> Result<Response> {
		self.execute(Method::Get, options)
	}

	/// Sends a `PUT`.
	pub fn put(&mut self, options: RequestOptions) -> Result<Response> {
		self.execute(Method::Put, options)
	}

	/// Sends a `PATCH`.
	pub fn patch(&mut self, options: RequestOptions) -> Result<Response> {
		self.execute(Method::Patch, options)
	}

	/// Sends a `POST`.
	pub fn post(&mut self, options: RequestOptions) -> Result<Response> {
		self.execute(Method::Post, options)
	}

	/// Sends a `DELETE`.
	pub fn delete(&mut self, options: RequestOptions) -> Result<Response> {
		self.execute(Method::Delete, options)
	}

	/// Sends a request and returns the final response, discarding any spawned session.
	pub fn execute(&mut self, method: Method, options: RequestOptions) -> Result<Response> {
		self.dispatch(method, options).map(|dispatched| dispatched.response)
	}

	/// Sends a request, following redirects, and returns the final response together with
	/// the session spawned for a cross-origin redirect, if any.
	pub fn dispatch(&mut self, method: Method, options: RequestOptions) -> Result<Dispatched> {
		const OPERATION: Operation = Operation::Dispatch;

		let _span = OperationSpan::new(OPERATION, "dispatch").entered();

		obs::record_outcome(OPERATION, Outcome::Attempt);

		let result = self.follow(method, options);

		obs::record_result(OPERATION, result)
	}

	fn follow(&mut self, method: Method, options: RequestOptions) -> Result<Dispatched> {
		let max = self.config.max_redirects;
		let encoded = options.encode(method, &self.base, &self.headers)?;
		let mut request = encoded.wire;
		let mut basic_auth = encoded.basic_auth;
		let mut successor: Option<HttpSession> = None;
		let mut hops = 0;

		loop {
			let session = match successor.as_mut() {
				Some(next) => next,
				None => &mut *self,
			};
			let location = match session.round_trip(&request, basic_auth) {
				TransportOutcome::Completed(response) =>
					return Ok(Dispatched { response, successor }),
				TransportOutcome::Failed(e) => return Err(e.into()),
				TransportOutcome::Redirect { location, .. } => location,
			};

			hops += 1;

			if hops > max {
				return Err(Error::TooManyRedirects { max });
			}

			let mut target = redirect::resolve_location(&request.url, &location)?;

			basic_auth |= request::apply_user_info(&mut target, &mut request.headers);

			let same_origin = target.origin() == session.origin;

			session.sink.record(&Event::Redirected {
				from: request.url.to_string(),
				to: target.to_string(),
				same_origin,
			});

			if !same_origin {
				let next = session.spawn(&target);

				successor = Some(next);
			}

			request.url = target;
		}
	}

	/// Builds a session for the origin of `target`, inheriting headers, config, transport,
	/// and sink.
	fn spawn(&self, target: &Url) -> HttpSession {
		let mut base = target.clone();

		base.set_query(None);
		base.set_fragment(None);

		HttpSession::bind(
			base,
			self.headers.clone(),
			self.config,
			self.connector.clone(),
			self.sink.clone(),
		)
	}

	fn round_trip(&mut self, request: &WireRequest, basic_auth: bool) -> TransportOutcome {
		let mut connection = match self.connection.take() {
			Some(connection) => connection,
			None => match self.open() {
				Ok(connection) => connection,
				Err(e) => return TransportOutcome::Failed(e),
			},
		};

		self.sink.record(&Event::RequestSent {
			method: request.method,
			target: target_of(&request.url),
			body_len: request.body.as_ref().map_or(0, Vec::len),
			headers_injected: request.headers.len(),
			basic_auth,
		});

		let result = connection.send(request);

		self.connection = Some(connection);

		match &result {
			Ok(response) if response.wants_close() => self.close_with(CloseReason::PeerRequested),
			Err(_) => self.close_with(CloseReason::TransportFailure),
			Ok(_) => (),
		}

		let outcome = TransportOutcome::classify(result);

		if let TransportOutcome::Completed(response) = &outcome {
			self.sink.record(&Event::ResponseReceived { status: response.status });
		}

		outcome
	}

	fn open(&mut self) -> Result<Box<dyn Connection>, TransportError> {
		let connection = self.connector.open(&self.base)?;

		self.connections_opened += 1;
		self.status = SessionStatus::Started;
		self.sink.record(&Event::ConnectionOpened { origin: self.origin.ascii_serialization() });

		Ok(connection)
	}

	fn close_with(&mut self, reason: CloseReason) {
		if self.connection.take().is_some() {
			self.status = SessionStatus::Closed;
			self.sink.record(&Event::ConnectionClosed {
				origin: self.origin.ascii_serialization(),
				reason,
			});
		}
	}
}
impl Debug for HttpSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpSession")
			.field("base", &self.base.as_str())
			.field("headers", &self.headers.keys().collect::<Vec<_>>())
			.field("config", &self.config)
			.field("status", &self.status)
			.field("connections_opened", &self.connections_opened)
			.finish()
	}
}

fn target_of(url: &Url) -> String {
	match url.query() {
		Some(query) => format!("{}?{query}", url.path()),
		None => url.path().to_owned(),
	}
}
