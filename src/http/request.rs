//! Request methods, per-call options, and the encoding pipeline that turns them into a
//! [`WireRequest`].

// crates.io
use ::http::{
	HeaderMap, HeaderName, HeaderValue,
	header::{AUTHORIZATION, CONTENT_TYPE},
};
use base64::{Engine, prelude::BASE64_STANDARD};
use percent_encoding::percent_decode_str;
use url::form_urlencoded::Serializer;
// self
use crate::{_prelude::*, error::RequestError, http::WireRequest};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Methods supported by sessions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Method {
	/// `GET`.
	Get,
	/// `PUT`.
	Put,
	/// `PATCH`.
	Patch,
	/// `POST`.
	Post,
	/// `DELETE`.
	Delete,
}
impl Method {
	/// Returns the canonical method token.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Post => "POST",
			Method::Delete => "DELETE",
		}
	}

	/// Whether requests with this method carry a body.
	pub const fn permits_body(self) -> bool {
		matches!(self, Method::Put | Method::Patch | Method::Post)
	}

	/// Converts to the [`http`](::http) crate's method type.
	pub fn as_http(self) -> ::http::Method {
		match self {
			Method::Get => ::http::Method::GET,
			Method::Put => ::http::Method::PUT,
			Method::Patch => ::http::Method::PATCH,
			Method::Post => ::http::Method::POST,
			Method::Delete => ::http::Method::DELETE,
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Per-call request options.
///
/// Structured query pairs take priority over a raw query string. A raw body and form
/// pairs are mutually exclusive, and neither is accepted for `GET`/`DELETE`.
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Path override; defaults to the session's base path.
	pub path: Option<String>,
	/// Raw query string, used verbatim.
	pub query: Option<String>,
	/// Structured query pairs, URL-form-encoded.
	pub query_pairs: Option<Vec<(String, String)>>,
	/// Raw body bytes.
	pub body: Option<Vec<u8>>,
	/// Structured form pairs, URL-form-encoded into the body.
	pub form: Option<Vec<(String, String)>>,
	/// Headers that override the session defaults for this call.
	pub headers: HeaderMap,
}
impl RequestOptions {
	/// Creates empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Overrides the path.
	pub fn path(mut self, path: impl Into<String>) -> Self {
		self.path = Some(path.into());

		self
	}

	/// Sets a raw query string.
	pub fn query(mut self, query: impl Into<String>) -> Self {
		self.query = Some(query.into());

		self
	}

	/// Sets structured query pairs.
	pub fn query_pairs<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.query_pairs = Some(collect_pairs(pairs));

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Sets structured form pairs.
	pub fn form<I, K, V>(mut self, pairs: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: Into<String>,
		V: Into<String>,
	{
		self.form = Some(collect_pairs(pairs));

		self
	}

	/// Adds a per-call header, replacing any session default with the same name.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.insert(name, value);

		self
	}

	/// Encodes the options into a wire request against `base`.
	pub(crate) fn encode(
		self,
		method: Method,
		base: &Url,
		defaults: &HeaderMap,
	) -> Result<EncodedRequest, RequestError> {
		let body = match (self.body, self.form) {
			(Some(_), Some(_)) => return Err(RequestError::ConflictingBody),
			(None, None) => None,
			_ if !method.permits_body() => return Err(RequestError::BodyNotPermitted { method }),
			(Some(raw), None) => Some(Body::Raw(raw)),
			(None, Some(pairs)) => Some(Body::Form(pairs)),
		};
		let mut url = base.clone();

		if let Some(path) = &self.path {
			url.set_path(path);
		}
		if let Some(pairs) = &self.query_pairs {
			url.set_query(Some(&encode_pairs(pairs)));
		} else if let Some(query) = &self.query {
			url.set_query(Some(query));
		}

		let mut headers = HeaderMap::new();
		let body = body.map(|body| match body {
			Body::Raw(raw) => raw,
			Body::Form(pairs) => {
				headers.insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));

				encode_pairs(&pairs).into_bytes()
			},
		});

		for (name, value) in defaults.iter().chain(self.headers.iter()) {
			headers.insert(name.clone(), value.clone());
		}

		let basic_auth = apply_user_info(&mut url, &mut headers);

		Ok(EncodedRequest { wire: WireRequest { method, url, headers, body }, basic_auth })
	}
}

/// Output of [`RequestOptions::encode`].
#[derive(Debug)]
pub(crate) struct EncodedRequest {
	pub(crate) wire: WireRequest,
	pub(crate) basic_auth: bool,
}

enum Body {
	Raw(Vec<u8>),
	Form(Vec<(String, String)>),
}

/// Moves `user:pass@` out of `url` into a basic `Authorization` header.
///
/// Returns whether a header was synthesized.
pub(crate) fn apply_user_info(url: &mut Url, headers: &mut HeaderMap) -> bool {
	if url.username().is_empty() && url.password().is_none() {
		return false;
	}

	let user = percent_decode(url.username());
	let password = url.password().map(percent_decode).unwrap_or_default();
	let credentials = BASE64_STANDARD.encode(format!("{user}:{password}"));
	let synthesized = match HeaderValue::from_str(&format!("Basic {credentials}")) {
		Ok(value) => {
			headers.insert(AUTHORIZATION, value);

			true
		},
		Err(_) => false,
	};

	// Setters only fail on cannot-be-a-base URLs; sessions hold http(s) URLs only.
	let _ = url.set_username("");
	let _ = url.set_password(None);

	synthesized
}

fn percent_decode(raw: &str) -> String {
	percent_decode_str(raw).decode_utf8_lossy().into_owned()
}

fn encode_pairs(pairs: &[(String, String)]) -> String {
	Serializer::new(String::new()).extend_pairs(pairs).finish()
}

fn collect_pairs<I, K, V>(pairs: I) -> Vec<(String, String)>
where
	I: IntoIterator<Item = (K, V)>,
	K: Into<String>,
	V: Into<String>,
{
	pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}
