//! Realtime Database dispatcher: path formatting, bearer injection, JSON bodies.
//!
//! A [`Database`] owns a [`TokenManager`] and one lazily created [`HttpSession`] bound to
//! `https://<project_id>.firebaseio.com/`. Every call asks the manager for a current token,
//! so renewal happens transparently between calls. When a redirect moves the database to
//! another origin, the dispatcher keeps talking to the new origin from then on.

// crates.io
use ::http::{
	HeaderMap, HeaderValue,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use serde::de::DeserializeOwned;
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	auth::TokenManager,
	error::{ConfigError, InvalidUrlError},
	http::{
		Connector, Dispatched, HttpSession, Method, RequestOptions, Response, SessionBuilder,
		redirect,
	},
	obs::{self, EventSink, Operation, OperationSpan, Outcome},
};

/// Formats `https://<project_id>.firebaseio.com/`.
pub fn project_url(project_id: &str) -> String {
	format!("https://{project_id}.firebaseio.com/")
}

/// Maps a data-store path to its REST resource: leading `/`, trailing `.json`.
pub fn format_path(path: &str) -> String {
	if path.starts_with('/') { format!("{path}.json") } else { format!("/{path}.json") }
}

/// Output format requested through the `print` query parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Print {
	/// Human-readable JSON.
	Pretty,
	/// No body on writes; the server answers `204 No Content`.
	Silent,
}
impl Print {
	/// Query value for this mode.
	pub const fn as_str(self) -> &'static str {
		match self {
			Print::Pretty => "pretty",
			Print::Silent => "silent",
		}
	}
}

/// Builder for [`Database`].
pub struct DatabaseBuilder {
	tokens: TokenManager,
	project_id: Option<String>,
	base_url: Option<String>,
	connector: Option<Arc<dyn Connector>>,
	sink: Option<Arc<dyn EventSink>>,
	shallow: bool,
	print: Option<Print>,
}
impl DatabaseBuilder {
	/// Overrides the project identifier carried by the credential.
	pub fn project_id(mut self, project_id: impl Into<String>) -> Self {
		self.project_id = Some(project_id.into());

		self
	}

	/// Uses `base_url` verbatim instead of deriving it from the project identifier.
	pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = Some(base_url.into());

		self
	}

	/// Overrides the transport used for database requests.
	pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
		self.connector = Some(connector);

		self
	}

	/// Installs an event sink for the database session.
	pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.sink = Some(sink);

		self
	}

	/// Adds `shallow=true` to reads.
	pub fn shallow(mut self, shallow: bool) -> Self {
		self.shallow = shallow;

		self
	}

	/// Adds `print=<mode>` to every request.
	pub fn print(mut self, print: Print) -> Self {
		self.print = Some(print);

		self
	}

	/// Resolves the base URL and finalizes the dispatcher. No connection is opened yet.
	pub fn build(self) -> Result<Database> {
		let raw = match (self.base_url, self.project_id) {
			(Some(base_url), _) => base_url,
			(None, Some(project_id)) => project_url(&project_id),
			(None, None) => match &self.tokens.credential().project_id {
				Some(project_id) => project_url(project_id),
				None => return Err(ConfigError::MissingProjectId.into()),
			},
		};
		let base =
			Url::parse(&raw).map_err(|source| InvalidUrlError::Parse { url: raw.clone(), source })?;

		redirect::ensure_http_url(&base, &raw)?;

		let connector = match self.connector {
			Some(connector) => connector,
			None => crate::http::default_connector()?,
		};

		Ok(Database {
			base,
			tokens: self.tokens,
			connector,
			sink: self.sink.unwrap_or_else(obs::noop),
			shallow: self.shallow,
			print: self.print,
			session: None,
		})
	}
}

/// Authenticated Realtime Database client.
pub struct Database {
	base: Url,
	tokens: TokenManager,
	connector: Arc<dyn Connector>,
	sink: Arc<dyn EventSink>,
	shallow: bool,
	print: Option<Print>,
	session: Option<HttpSession>,
}
impl Database {
	/// Returns a builder that signs requests with tokens from `tokens`.
	pub fn builder(tokens: TokenManager) -> DatabaseBuilder {
		DatabaseBuilder {
			tokens,
			project_id: None,
			base_url: None,
			connector: None,
			sink: None,
			shallow: false,
			print: None,
		}
	}

	/// Base URL requests are resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base
	}

	/// Token manager backing this client.
	pub fn tokens(&self) -> &TokenManager {
		&self.tokens
	}

	/// Mutable access to the token manager, e.g. to invalidate the cached token.
	pub fn tokens_mut(&mut self) -> &mut TokenManager {
		&mut self.tokens
	}

	/// Current session, if one has been created.
	pub fn session(&self) -> Option<&HttpSession> {
		self.session.as_ref()
	}

	/// Sends `method` to `path` with an optional JSON body and returns the raw response.
	///
	/// HTTP error statuses are returned, not raised.
	pub fn execute(
		&mut self,
		method: Method,
		path: &str,
		body: Option<&Value>,
	) -> Result<Response> {
		let _span = OperationSpan::new(Operation::Database, method.as_str()).entered();

		obs::record_outcome(Operation::Database, Outcome::Attempt);

		let result = self.send(method, path, body);

		obs::record_result(Operation::Database, result)
	}

	/// Reads the value at `path`.
	pub fn get(&mut self, path: &str) -> Result<Value> {
		self.call(Method::Get, path, None)
	}

	/// Reads the value at `path` into `T`.
	pub fn get_as<T>(&mut self, path: &str) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let response = self.execute(Method::Get, path, None)?;

		decode(ensure_success(response)?)
	}

	/// Replaces the value at `path`.
	pub fn put(&mut self, path: &str, value: &Value) -> Result<Value> {
		self.call(Method::Put, path, Some(value))
	}

	/// Merges `value` into the children of `path`.
	pub fn patch(&mut self, path: &str, value: &Value) -> Result<Value> {
		self.call(Method::Patch, path, Some(value))
	}

	/// Appends `value` under a server-generated key; the response carries the key as `name`.
	pub fn post(&mut self, path: &str, value: &Value) -> Result<Value> {
		self.call(Method::Post, path, Some(value))
	}

	/// Removes the value at `path`.
	pub fn delete(&mut self, path: &str) -> Result<Value> {
		self.call(Method::Delete, path, None)
	}

	/// Closes the current session, if any; the next call re-opens it.
	pub fn close(&mut self) {
		if let Some(session) = self.session.as_mut() {
			session.close();
		}
	}

	fn call(&mut self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
		let response = ensure_success(self.execute(method, path, body)?)?;

		if response.status == 204 {
			return Ok(Value::Null);
		}

		decode(response)
	}

	fn send(&mut self, method: Method, path: &str, body: Option<&Value>) -> Result<Response> {
		let token = self.tokens.current_token()?;
		let mut options = RequestOptions::new()
			.path(format_path(path))
			.header(AUTHORIZATION, token.bearer_header()?);
		let query = self.query_pairs(method);

		if !query.is_empty() {
			options = options.query_pairs(query);
		}
		if let Some(body) = body {
			options = options.body(serde_json::to_vec(body).map_err(Error::Encode)?);
		}

		let Dispatched { response, successor } = self.open_session()?.dispatch(method, options)?;

		if let Some(successor) = successor {
			self.session = Some(successor);
		}

		Ok(response)
	}

	fn open_session(&mut self) -> Result<&mut HttpSession> {
		let session = match self.session.take() {
			Some(session) => session,
			None => {
				let mut headers = HeaderMap::new();

				headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

				SessionBuilder::new(self.base.as_str())
					.headers(headers)
					.connector(self.connector.clone())
					.sink(self.sink.clone())
					.build()?
			},
		};

		Ok(self.session.insert(session))
	}

	fn query_pairs(&self, method: Method) -> Vec<(&'static str, &'static str)> {
		let mut pairs = Vec::new();

		if self.shallow && method == Method::Get {
			pairs.push(("shallow", "true"));
		}
		if let Some(print) = self.print {
			pairs.push(("print", print.as_str()));
		}

		pairs
	}
}
impl Debug for Database {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Database")
			.field("base", &self.base.as_str())
			.field("tokens", &self.tokens)
			.field("shallow", &self.shallow)
			.field("print", &self.print)
			.field("session", &self.session.as_ref().map(|s| s.origin().ascii_serialization()))
			.finish()
	}
}

// `204` only comes back for `print=silent` writes.
fn ensure_success(response: Response) -> Result<Response> {
	if matches!(response.status, 200 | 204) {
		Ok(response)
	} else {
		Err(Error::UnexpectedStatus { status: response.status, message: response.message })
	}
}

fn decode<T>(response: Response) -> Result<T>
where
	T: DeserializeOwned,
{
	response.json().map_err(|source| Error::Decode { source })
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		_preludet::{ScriptedConnector, response, test_credential},
		auth::RenewalFailurePolicy,
		error::AuthenticationError,
		obs::{Event, MemorySink},
	};

	const TOKEN_URI: &str = "https://oauth2.example.com/token";
	const DB: &str = "https://demo-project.firebaseio.com";

	fn granted(connector: &ScriptedConnector, token: &str) {
		let body = format!("{{\"access_token\":\"{token}\",\"expires_in\":3600}}");

		connector.reply(TOKEN_URI, response(200, &[], &body));
	}

	fn database(connector: &ScriptedConnector) -> DatabaseBuilder {
		let tokens = TokenManager::builder(test_credential(TOKEN_URI))
			.connector(connector.shared())
			.policy(RenewalFailurePolicy::Strict)
			.build()
			.expect("Token manager should build.");

		Database::builder(tokens).connector(connector.shared())
	}

	#[test]
	fn format_path_adds_slash_and_suffix() {
		assert_eq!(format_path("users/ada"), "/users/ada.json");
		assert_eq!(format_path("/users/ada"), "/users/ada.json");
		assert_eq!(format_path(""), "/.json");
	}

	#[test]
	fn base_url_comes_from_override_then_credential() {
		let connector = ScriptedConnector::default();
		let db = database(&connector).build().expect("Credential project id should be used.");

		assert_eq!(db.base_url().as_str(), "https://demo-project.firebaseio.com/");

		let db = database(&connector).project_id("other").build().expect("Override should win.");

		assert_eq!(db.base_url().as_str(), "https://other.firebaseio.com/");

		let db = database(&connector)
			.base_url("http://127.0.0.1:9000/")
			.build()
			.expect("Explicit base URL should win.");

		assert_eq!(db.base_url().as_str(), "http://127.0.0.1:9000/");
		assert!(db.session().is_none());
	}

	#[test]
	fn missing_project_id_is_a_config_error() {
		let connector = ScriptedConnector::default();
		let mut credential = test_credential(TOKEN_URI);

		credential.project_id = None;

		let tokens = TokenManager::builder(credential)
			.connector(connector.shared())
			.build()
			.expect("Token manager should build.");
		let err = Database::builder(tokens)
			.connector(connector.shared())
			.build()
			.expect_err("No project id must fail.");

		assert!(matches!(err, Error::Config(ConfigError::MissingProjectId)));
	}

	#[test]
	fn get_sends_bearer_and_json_headers() {
		let connector = ScriptedConnector::default();

		granted(&connector, "abc");
		connector.reply(&format!("{DB}/users/ada.json"), response(200, &[], "{\"name\":\"Ada\"}"));

		let mut db = database(&connector).build().expect("Database should build.");
		let value = db.get("users/ada").expect("GET should succeed.");

		assert_eq!(value, serde_json::json!({ "name": "Ada" }));

		let sent = connector.sent();
		let request = &sent[1].request;

		assert_eq!(request.method, Method::Get);
		assert_eq!(request.headers[AUTHORIZATION], "Bearer abc");
		assert_eq!(request.headers[CONTENT_TYPE], "application/json");
		assert!(request.body.is_none());
	}

	#[test]
	fn writes_serialize_body_and_reuse_session() {
		let connector = ScriptedConnector::default();
		let body = serde_json::json!({ "score": 42 });

		granted(&connector, "abc");
		connector
			.reply(&format!("{DB}/scores.json"), response(200, &[], "{\"name\":\"-Nabc\"}"))
			.reply(&format!("{DB}/scores/ada.json"), response(200, &[], "{\"score\":42}"))
			.reply(&format!("{DB}/scores/ada.json"), response(200, &[], "null"));

		let mut db = database(&connector).build().expect("Database should build.");

		assert_eq!(
			db.post("scores", &body).expect("POST should succeed."),
			serde_json::json!({ "name": "-Nabc" })
		);
		assert_eq!(db.patch("/scores/ada", &body).expect("PATCH should succeed."), body);
		assert_eq!(db.delete("scores/ada").expect("DELETE should succeed."), Value::Null);

		let sent = connector.sent();

		assert_eq!(sent[1].request.body.as_deref(), Some(&b"{\"score\":42}"[..]));
		assert_eq!(sent[2].request.method, Method::Patch);
		// One connection for the token endpoint, one shared by every database call.
		assert_eq!(connector.opened().len(), 2);
		assert_eq!(db.session().map(HttpSession::connections_opened), Some(1));
	}

	#[test]
	fn non_success_status_is_unexpected_status() {
		let connector = ScriptedConnector::default();

		granted(&connector, "abc");
		connector.reply(
			&format!("{DB}/locked.json"),
			response(401, &[], "{\"error\":\"Permission denied\"}"),
		);

		let mut db = database(&connector).build().expect("Database should build.");
		let err = db
			.put("locked", &serde_json::json!(true))
			.expect_err("401 must surface as an error.");

		assert!(matches!(
			err,
			Error::UnexpectedStatus { status: 401, ref message } if message == "Unauthorized"
		));
	}

	#[test]
	fn execute_returns_error_statuses_as_responses() {
		let connector = ScriptedConnector::default();

		granted(&connector, "abc");
		connector.reply(&format!("{DB}/missing.json"), response(404, &[], ""));

		let mut db = database(&connector).build().expect("Database should build.");
		let response = db.execute(Method::Get, "missing", None).expect("Execute should not raise.");

		assert_eq!(response.status, 404);
	}

	#[test]
	fn query_flags_apply_per_method() {
		let connector = ScriptedConnector::default();

		granted(&connector, "abc");
		connector
			.reply(&format!("{DB}/users.json?shallow=true&print=silent"), response(204, &[], ""))
			.reply(&format!("{DB}/users.json?print=silent"), response(204, &[], ""));

		let mut db = database(&connector)
			.shallow(true)
			.print(Print::Silent)
			.build()
			.expect("Database should build.");

		assert_eq!(db.get("users").expect("Silent GET should succeed."), Value::Null);
		assert_eq!(
			db.put("users", &serde_json::json!({})).expect("Silent PUT should succeed."),
			Value::Null
		);
	}

	#[test]
	fn token_failure_blocks_request() {
		let connector = ScriptedConnector::default();

		connector.reply(TOKEN_URI, response(400, &[], "{\"error\":\"invalid_grant\"}"));

		let mut db = database(&connector).build().expect("Database should build.");
		let err = db.get("users").expect_err("Failed renewal must abort the call.");

		assert!(matches!(
			err,
			Error::Authentication(AuthenticationError::Rejected { status: 400, .. })
		));
		assert_eq!(connector.sent().len(), 1);
	}

	#[test]
	fn cross_origin_redirect_moves_the_session() {
		let connector = ScriptedConnector::default();
		let sink = Arc::new(MemorySink::default());

		granted(&connector, "abc");
		connector
			.reply(
				&format!("{DB}/users.json"),
				response(
					307,
					&[("location", "https://demo-project-eu.firebaseio.com/users.json")],
					"",
				),
			)
			.reply("https://demo-project-eu.firebaseio.com/users.json", response(200, &[], "1"))
			.reply("https://demo-project-eu.firebaseio.com/users.json", response(200, &[], "2"));

		let mut db =
			database(&connector).sink(sink.clone()).build().expect("Database should build.");

		assert_eq!(db.get("users").expect("Redirected GET should succeed."), serde_json::json!(1));
		assert_eq!(
			db.session().map(|s| s.origin().ascii_serialization()),
			Some("https://demo-project-eu.firebaseio.com".to_owned())
		);
		assert_eq!(
			db.get("users").expect("Second GET should go straight to the new origin."),
			serde_json::json!(2)
		);
		assert!(
			sink.events().iter().any(|e| matches!(e, Event::Redirected { same_origin: false, .. }))
		);

		let sent = connector.sent();
		let last = &sent[sent.len() - 1].request;

		assert_eq!(last.headers[AUTHORIZATION], "Bearer abc");
		assert_eq!(last.headers[CONTENT_TYPE], "application/json");
	}
}
