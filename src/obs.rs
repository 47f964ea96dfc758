//! Observability hooks for sessions, token renewal, and the database layer.
//!
//! Every component takes an [`EventSink`] at construction; the default is [`NoopSink`],
//! so nothing is emitted unless the caller opts in. [`MemorySink`] keeps events for
//! assertions in tests.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to get [`TracingSink`] and spans named `firebase_rtdb.operation` with the
//!   `operation` and `stage` fields.
//! - Enable `metrics` to increment the `firebase_rtdb_operation_total` counter for every
//!   attempt/success/failure, labeled by `operation` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::{_prelude::*, http::Method};

/// Operations observed by the crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
	/// Session dispatch, including redirect hops.
	Dispatch,
	/// Token renewal exchange.
	TokenRenewal,
	/// Database verb call.
	Database,
}
impl Operation {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Operation::Dispatch => "dispatch",
			Operation::TokenRenewal => "token_renewal",
			Operation::Database => "database",
		}
	}
}
impl Display for Operation {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
	/// Entry to an operation.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl Outcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Outcome::Attempt => "attempt",
			Outcome::Success => "success",
			Outcome::Failure => "failure",
		}
	}
}
impl Display for Outcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Why a session dropped its connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CloseReason {
	/// Caller asked for it.
	Requested,
	/// Peer sent `Connection: close`.
	PeerRequested,
	/// The connection failed mid-exchange.
	TransportFailure,
}

/// Structured events emitted by the crate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
	/// A session opened its connection.
	ConnectionOpened {
		/// ASCII serialization of the origin.
		origin: String,
	},
	/// A session dropped its connection.
	ConnectionClosed {
		/// ASCII serialization of the origin.
		origin: String,
		/// What triggered the close.
		reason: CloseReason,
	},
	/// A request is about to be written.
	RequestSent {
		/// Request method.
		method: Method,
		/// Path and query of the target.
		target: String,
		/// Body length in bytes.
		body_len: usize,
		/// Number of session and per-call headers injected.
		headers_injected: usize,
		/// Whether a basic `Authorization` header came from URL user-info.
		basic_auth: bool,
	},
	/// A non-redirect response was received.
	ResponseReceived {
		/// HTTP status code.
		status: u16,
	},
	/// A redirect is being followed.
	Redirected {
		/// URL that answered with the redirect.
		from: String,
		/// URL the request is re-issued against.
		to: String,
		/// Whether the target shares the session's origin.
		same_origin: bool,
	},
	/// A token renewal exchange started.
	TokenRenewalStarted {
		/// Token endpoint receiving the assertion.
		endpoint: String,
	},
	/// A token renewal exchange succeeded.
	TokenRenewed {
		/// Expiry of the new token.
		expires_at: OffsetDateTime,
	},
	/// A token renewal exchange failed.
	TokenRenewalFailed {
		/// Rendered error.
		reason: String,
	},
	/// Renewal failed but the cached, still unexpired token was handed out.
	CachedTokenReused {
		/// Expiry of the reused token.
		expires_at: OffsetDateTime,
	},
}

/// Receives structured events; injected into each component at construction.
pub trait EventSink
where
	Self: 'static + Send + Sync,
{
	/// Records one event.
	fn record(&self, event: &Event);
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;
impl EventSink for NoopSink {
	fn record(&self, _event: &Event) {}
}

/// Sink that keeps events in memory, in emission order.
#[derive(Debug, Default)]
pub struct MemorySink(Mutex<Vec<Event>>);
impl MemorySink {
	/// Returns a copy of the recorded events.
	pub fn events(&self) -> Vec<Event> {
		self.0.lock().clone()
	}

	/// Drains the recorded events.
	pub fn take(&self) -> Vec<Event> {
		std::mem::take(&mut *self.0.lock())
	}
}
impl EventSink for MemorySink {
	fn record(&self, event: &Event) {
		self.0.lock().push(event.clone());
	}
}

/// Shared no-op sink used when the caller does not supply one.
pub(crate) fn noop() -> Arc<dyn EventSink> {
	Arc::new(NoopSink)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn memory_sink_keeps_order_and_drains() {
		let sink = MemorySink::default();

		sink.record(&Event::ResponseReceived { status: 200 });
		sink.record(&Event::ResponseReceived { status: 404 });

		assert_eq!(sink.events().len(), 2);
		assert_eq!(sink.take(), vec![
			Event::ResponseReceived { status: 200 },
			Event::ResponseReceived { status: 404 },
		]);
		assert!(sink.events().is_empty());
	}

	#[test]
	fn labels_are_stable() {
		assert_eq!(Operation::TokenRenewal.to_string(), "token_renewal");
		assert_eq!(Outcome::Failure.to_string(), "failure");
	}
}
