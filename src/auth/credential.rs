//! Service-account credential loading and validation.

// std
use std::path::PathBuf;
// self
use crate::{
	_prelude::*,
	auth::Secret,
	error::InvalidUrlError,
	http::redirect,
};

/// Token endpoint used when the credential omits `token_uri`.
pub const DEFAULT_TOKEN_URI: &str = "https://www.googleapis.com/oauth2/v4/token";

/// Where a credential document comes from.
#[derive(Clone, Copy, Debug)]
pub enum CredentialSource<'a> {
	/// Inline JSON document.
	Json(&'a str),
	/// Path to a JSON document on disk.
	File(&'a Path),
}

/// Failures raised while loading a service-account credential.
#[derive(Debug, ThisError)]
pub enum CredentialError {
	/// Credential file could not be read.
	#[error("Credential file `{}` cannot be read.", .path.display())]
	Unreadable {
		/// Path that was requested.
		path: PathBuf,
		/// Underlying IO failure.
		#[source]
		source: std::io::Error,
	},
	/// Document is not valid JSON or has fields of the wrong type.
	#[error("Credential document is malformed.")]
	Malformed {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// A required field is missing or empty.
	#[error("Credential field `{field}` is missing or empty.")]
	MissingField {
		/// Name of the missing field.
		field: &'static str,
	},
	/// `token_uri` is present but is not an absolute HTTP(S) URL.
	#[error("Credential token_uri is invalid.")]
	InvalidTokenUri {
		/// Validation failure.
		#[source]
		source: InvalidUrlError,
	},
}

/// Parsed service-account credential. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential {
	/// PEM-encoded RSA private key (PKCS#8 or PKCS#1).
	pub private_key: Secret,
	/// Service-account e-mail, used as the assertion issuer.
	pub client_email: String,
	/// Project identifier, when the document carries one.
	pub project_id: Option<String>,
	/// Endpoint receiving the signed assertion.
	pub token_endpoint: Url,
}
impl Credential {
	/// Loads a credential from any [`CredentialSource`].
	pub fn load(source: CredentialSource<'_>) -> Result<Self, CredentialError> {
		match source {
			CredentialSource::Json(json) => Self::from_json(json),
			CredentialSource::File(path) => Self::from_file(path),
		}
	}

	/// Parses a credential from an inline JSON document.
	pub fn from_json(json: &str) -> Result<Self, CredentialError> {
		let mut de = serde_json::Deserializer::from_str(json);
		let document: CredentialDocument = serde_path_to_error::deserialize(&mut de)
			.map_err(|source| CredentialError::Malformed { source })?;

		document.validate()
	}

	/// Reads and parses a credential file.
	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CredentialError> {
		let path = path.as_ref();
		let json = std::fs::read_to_string(path)
			.map_err(|source| CredentialError::Unreadable { path: path.to_path_buf(), source })?;

		Self::from_json(&json)
	}
}
impl FromStr for Credential {
	type Err = CredentialError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::from_json(s)
	}
}

// Unknown fields (`type`, `private_key_id`, `client_id`, ...) are ignored.
#[derive(Deserialize)]
struct CredentialDocument {
	#[serde(default)]
	private_key: Option<String>,
	#[serde(default)]
	client_email: Option<String>,
	#[serde(default)]
	project_id: Option<String>,
	#[serde(default)]
	token_uri: Option<String>,
}
impl CredentialDocument {
	fn validate(self) -> Result<Credential, CredentialError> {
		let private_key = required(self.private_key, "private_key")?;
		let client_email = required(self.client_email, "client_email")?;
		let token_endpoint = match self.token_uri.filter(|uri| !uri.trim().is_empty()) {
			Some(uri) => parse_token_uri(&uri)?,
			None => parse_token_uri(DEFAULT_TOKEN_URI)?,
		};

		Ok(Credential {
			private_key: Secret::new(private_key),
			client_email,
			project_id: self.project_id.filter(|id| !id.trim().is_empty()),
			token_endpoint,
		})
	}
}

fn required(value: Option<String>, field: &'static str) -> Result<String, CredentialError> {
	value.filter(|v| !v.trim().is_empty()).ok_or(CredentialError::MissingField { field })
}

fn parse_token_uri(raw: &str) -> Result<Url, CredentialError> {
	let url = Url::parse(raw).map_err(|source| CredentialError::InvalidTokenUri {
		source: InvalidUrlError::Parse { url: raw.to_owned(), source },
	})?;

	redirect::ensure_http_url(&url, raw)
		.map_err(|source| CredentialError::InvalidTokenUri { source })?;

	Ok(url)
}
