//! Bearer access tokens and their lifecycle classification.

// crates.io
use ::http::HeaderValue;
// self
use crate::{_prelude::*, auth::Secret, error::ConfigError};

/// Window before expiry in which a token is renewed instead of reused.
pub const RENEWAL_MARGIN: Duration = Duration::seconds(60);

/// Lifecycle of the cached token relative to an instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenState {
	/// No token has been obtained yet.
	Absent,
	/// Expiry is more than [`RENEWAL_MARGIN`] away.
	Valid,
	/// Expiry is within [`RENEWAL_MARGIN`] but still in the future.
	Expiring,
	/// Expiry has passed.
	Expired,
}
impl TokenState {
	/// Classifies an optional token at `instant`.
	pub fn of(token: Option<&AccessToken>, instant: OffsetDateTime) -> Self {
		token.map_or(Self::Absent, |token| token.state_at(instant))
	}
}

/// Access token obtained from the token endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
	/// Bearer secret; callers must avoid logging it.
	pub secret: Secret,
	/// Expiry instant: exchange time plus `expires_in`.
	pub expires_at: OffsetDateTime,
}
impl AccessToken {
	/// Creates a token that expires `expires_in` after `issued_at`.
	///
	/// Returns `None` when the expiry falls outside the representable range.
	pub fn new(
		secret: impl Into<String>,
		issued_at: OffsetDateTime,
		expires_in: Duration,
	) -> Option<Self> {
		let expires_at = issued_at.checked_add(expires_in)?;

		Some(Self { secret: Secret::new(secret), expires_at })
	}

	/// Computes the lifecycle state at a given instant.
	pub fn state_at(&self, instant: OffsetDateTime) -> TokenState {
		let remaining = self.expires_at - instant;

		if remaining <= Duration::ZERO {
			TokenState::Expired
		} else if remaining <= RENEWAL_MARGIN {
			TokenState::Expiring
		} else {
			TokenState::Valid
		}
	}

	/// Returns `true` if the token has expired at the provided instant.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.state_at(instant), TokenState::Expired)
	}

	/// Returns the raw bearer value.
	pub fn expose(&self) -> &str {
		self.secret.expose()
	}

	/// Renders the `Authorization: Bearer <token>` header value, marked sensitive.
	pub fn bearer_header(&self) -> Result<HeaderValue, ConfigError> {
		let mut value = HeaderValue::from_str(&format!("Bearer {}", self.expose()))?;

		value.set_sensitive(true);

		Ok(value)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn at(seconds: i64) -> OffsetDateTime {
		OffsetDateTime::from_unix_timestamp(1_700_000_000 + seconds)
			.expect("Timestamp should be valid.")
	}

	#[test]
	fn state_boundaries_follow_renewal_margin() {
		let token =
			AccessToken::new("abc", at(0), Duration::seconds(3600)).expect("Expiry should fit.");

		assert_eq!(token.state_at(at(0)), TokenState::Valid);
		assert_eq!(token.state_at(at(3539)), TokenState::Valid);
		assert_eq!(token.state_at(at(3540)), TokenState::Expiring);
		assert_eq!(token.state_at(at(3599)), TokenState::Expiring);
		assert_eq!(token.state_at(at(3600)), TokenState::Expired);
		assert!(token.is_expired_at(at(4000)));
	}

	#[test]
	fn out_of_range_expiry_is_rejected() {
		assert!(AccessToken::new("abc", at(0), Duration::seconds(i64::MAX)).is_none());
	}

	#[test]
	fn absent_when_no_token() {
		assert_eq!(TokenState::of(None, at(0)), TokenState::Absent);
	}

	#[test]
	fn bearer_header_is_sensitive_and_debug_is_redacted() {
		let token =
			AccessToken::new("abc", at(0), Duration::seconds(60)).expect("Expiry should fit.");
		let header = token.bearer_header().expect("Header should render.");

		assert_eq!(header.to_str().expect("Header should be ASCII."), "Bearer abc");
		assert!(header.is_sensitive());
		assert!(!format!("{token:?}").contains("abc"));
	}
}
