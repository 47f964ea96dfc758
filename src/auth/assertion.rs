//! RS256-signed JWT assertions for the JWT-bearer grant.

// crates.io
use base64::prelude::{BASE64_URL_SAFE_NO_PAD, Engine as _};
use rsa::{
	RsaPrivateKey,
	pkcs1::DecodeRsaPrivateKey,
	pkcs1v15::SigningKey,
	pkcs8::DecodePrivateKey,
	signature::{SignatureEncoding, Signer},
};
use sha2::Sha256;
// self
use crate::{_prelude::*, auth::Credential, error::AuthenticationError};

/// Scope requested for every access token.
pub const SCOPE: &str = concat!(
	"https://www.googleapis.com/auth/firebase.database ",
	"https://www.googleapis.com/auth/userinfo.email"
);
/// Lifetime of a signed assertion.
pub const ASSERTION_LIFETIME: Duration = Duration::seconds(60);

/// JOSE header; always RS256.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header<'a> {
	/// Signing algorithm.
	pub alg: &'a str,
	/// Token type.
	pub typ: &'a str,
}
impl Header<'static> {
	/// The only header this crate emits.
	pub const RS256: Self = Self { alg: "RS256", typ: "JWT" };
}

/// Claim set sent to the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
	/// Issuer: the service-account e-mail.
	pub iss: String,
	/// Space-separated scopes.
	pub scope: String,
	/// Audience: the token endpoint.
	pub aud: String,
	/// Issued-at, seconds since the Unix epoch.
	pub iat: i64,
	/// Expiry, seconds since the Unix epoch.
	pub exp: i64,
}
impl Claims {
	/// Builds the claim set for `credential` issued at `now`.
	pub fn new(credential: &Credential, now: OffsetDateTime) -> Self {
		let iat = now.unix_timestamp();

		Self {
			iss: credential.client_email.clone(),
			scope: SCOPE.to_owned(),
			aud: credential.token_endpoint.to_string(),
			iat,
			exp: iat + ASSERTION_LIFETIME.whole_seconds(),
		}
	}
}

/// Signs a fresh assertion for `credential` issued at `now`.
///
/// The key is parsed on every call; PKCS#8 is tried first, then PKCS#1.
pub fn sign(credential: &Credential, now: OffsetDateTime) -> Result<String, AuthenticationError> {
	let key = signing_key(credential.private_key.expose())?;
	let header = encode_segment(&Header::RS256)?;
	let claims = encode_segment(&Claims::new(credential, now))?;
	let signing_input = format!("{header}.{claims}");
	let signature = key.sign(signing_input.as_bytes());

	Ok(format!("{signing_input}.{}", BASE64_URL_SAFE_NO_PAD.encode(signature.to_bytes())))
}

fn signing_key(pem: &str) -> Result<SigningKey<Sha256>, AuthenticationError> {
	let key = RsaPrivateKey::from_pkcs8_pem(pem)
		.or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
		.map_err(|e| AuthenticationError::Signing {
			reason: format!("private key is neither PKCS#8 nor PKCS#1 PEM ({e})"),
		})?;

	Ok(SigningKey::<Sha256>::new(key))
}

fn encode_segment<T>(value: &T) -> Result<String, AuthenticationError>
where
	T: Serialize,
{
	let json = serde_json::to_vec(value)
		.map_err(|e| AuthenticationError::Signing { reason: e.to_string() })?;

	Ok(BASE64_URL_SAFE_NO_PAD.encode(json))
}
