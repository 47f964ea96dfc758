//! Self-renewing access-token cache for one service account.
//!
//! The manager exchanges a freshly signed assertion for an access token whenever the
//! cached one is absent or within [`RENEWAL_MARGIN`](crate::auth::RENEWAL_MARGIN) of
//! expiry. There is no retry loop and no coalescing of concurrent renewals; the manager
//! takes `&mut self` and is meant to be owned by one caller.

// self
use crate::{
	_prelude::*,
	auth::{AccessToken, Credential, TokenState, assertion},
	error::AuthenticationError,
	http::{Connector, SessionBuilder},
	obs::{self, Event, EventSink, Operation, OperationSpan, Outcome},
};

/// Grant type sent with every assertion.
pub const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const BODY_PREVIEW_LIMIT: usize = 512;

/// What to do when a renewal exchange fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RenewalFailurePolicy {
	/// Hand out the cached token while it is still unexpired; fail otherwise.
	#[default]
	ReuseUnexpired,
	/// Always surface the failure.
	Strict,
}

/// Builder for [`TokenManager`].
pub struct TokenManagerBuilder {
	credential: Credential,
	connector: Option<Arc<dyn Connector>>,
	sink: Option<Arc<dyn EventSink>>,
	policy: RenewalFailurePolicy,
}
impl TokenManagerBuilder {
	/// Overrides the transport used for token exchanges.
	pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
		self.connector = Some(connector);

		self
	}

	/// Installs an event sink.
	pub fn sink(mut self, sink: Arc<dyn EventSink>) -> Self {
		self.sink = Some(sink);

		self
	}

	/// Sets the renewal failure policy.
	pub fn policy(mut self, policy: RenewalFailurePolicy) -> Self {
		self.policy = policy;

		self
	}

	/// Finalizes the manager; falls back to the default transport when none was set.
	pub fn build(self) -> Result<TokenManager> {
		let connector = match self.connector {
			Some(connector) => connector,
			None => crate::http::default_connector()?,
		};

		Ok(TokenManager {
			credential: self.credential,
			connector,
			sink: self.sink.unwrap_or_else(obs::noop),
			policy: self.policy,
			token: None,
		})
	}
}

/// Caches one access token and renews it on demand.
pub struct TokenManager {
	credential: Credential,
	connector: Arc<dyn Connector>,
	sink: Arc<dyn EventSink>,
	policy: RenewalFailurePolicy,
	token: Option<AccessToken>,
}
impl TokenManager {
	/// Creates a manager with the default transport, no sink, and the default policy.
	pub fn new(credential: Credential) -> Result<Self> {
		Self::builder(credential).build()
	}

	/// Returns a builder for `credential`.
	pub fn builder(credential: Credential) -> TokenManagerBuilder {
		TokenManagerBuilder {
			credential,
			connector: None,
			sink: None,
			policy: RenewalFailurePolicy::default(),
		}
	}

	/// Credential this manager signs assertions with.
	pub fn credential(&self) -> &Credential {
		&self.credential
	}

	/// Active renewal failure policy.
	pub fn policy(&self) -> RenewalFailurePolicy {
		self.policy
	}

	/// Cached token, without renewing.
	pub fn cached(&self) -> Option<&AccessToken> {
		self.token.as_ref()
	}

	/// Lifecycle state of the cached token at `now`.
	pub fn state_at(&self, now: OffsetDateTime) -> TokenState {
		TokenState::of(self.token.as_ref(), now)
	}

	/// Drops the cached token; the next call renews.
	pub fn invalidate(&mut self) {
		self.token = None;
	}

	/// Returns a token valid beyond the renewal margin, renewing when needed.
	pub fn current_token(&mut self) -> Result<AccessToken> {
		self.current_token_at(OffsetDateTime::now_utc())
	}

	/// Same as [`current_token`](Self::current_token) against an explicit clock.
	pub fn current_token_at(&mut self, now: OffsetDateTime) -> Result<AccessToken> {
		if let Some(token) = self.token.as_ref().filter(|t| t.state_at(now) == TokenState::Valid)
		{
			return Ok(token.clone());
		}

		self.renew_at(now)
	}

	/// Runs one renewal exchange regardless of the cached token's state.
	pub fn renew_at(&mut self, now: OffsetDateTime) -> Result<AccessToken> {
		let _span = OperationSpan::new(Operation::TokenRenewal, "renew").entered();

		obs::record_outcome(Operation::TokenRenewal, Outcome::Attempt);
		self.sink.record(&Event::TokenRenewalStarted {
			endpoint: self.credential.token_endpoint.to_string(),
		});

		match obs::record_result(Operation::TokenRenewal, self.exchange(now)) {
			Ok(token) => {
				self.sink.record(&Event::TokenRenewed { expires_at: token.expires_at });
				self.token = Some(token.clone());

				Ok(token)
			},
			Err(e) => {
				self.sink.record(&Event::TokenRenewalFailed { reason: e.to_string() });

				match (&self.token, self.policy) {
					(Some(cached), RenewalFailurePolicy::ReuseUnexpired)
						if cached.state_at(now) == TokenState::Expiring =>
					{
						self.sink
							.record(&Event::CachedTokenReused { expires_at: cached.expires_at });

						Ok(cached.clone())
					},
					_ => Err(e.into()),
				}
			},
		}
	}

	fn exchange(&self, now: OffsetDateTime) -> Result<AccessToken, AuthenticationError> {
		let assertion = assertion::sign(&self.credential, now)?;
		let response = SessionBuilder::new(self.credential.token_endpoint.as_str())
			.connector(self.connector.clone())
			.sink(self.sink.clone())
			.post_form([("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
			.map_err(|e| AuthenticationError::Exchange { source: Box::new(e) })?;

		if response.status != 200 {
			return Err(AuthenticationError::Rejected {
				status: response.status,
				body: preview(&response.text()),
			});
		}

		let payload: TokenEndpointResponse =
			response.json().map_err(|source| AuthenticationError::MalformedResponse { source })?;

		if payload.expires_in <= 0 {
			return Err(AuthenticationError::NonPositiveExpiresIn {
				expires_in: payload.expires_in,
			});
		}

		AccessToken::new(payload.access_token, now, Duration::seconds(payload.expires_in)).ok_or(
			AuthenticationError::ExpiresInOutOfRange { expires_in: payload.expires_in },
		)
	}
}
impl Debug for TokenManager {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenManager")
			.field("client_email", &self.credential.client_email)
			.field("token_endpoint", &self.credential.token_endpoint.as_str())
			.field("policy", &self.policy)
			.field("token", &self.token)
			.finish()
	}
}

// Extra fields such as `token_type` are ignored.
#[derive(Deserialize)]
struct TokenEndpointResponse {
	access_token: String,
	expires_in: i64,
}

fn preview(body: &str) -> String {
	match body.char_indices().nth(BODY_PREVIEW_LIMIT) {
		Some((cut, _)) => format!("{}...", &body[..cut]),
		None => body.to_owned(),
	}
}
