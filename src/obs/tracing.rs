// self
#[cfg(feature = "tracing")] use crate::obs::{Event, EventSink};
use crate::{_prelude::*, obs::Operation};

/// Span wrapper used around blocking operations.
#[derive(Clone, Debug)]
pub struct OperationSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl OperationSpan {
	/// Creates a new span tagged with the provided operation + stage.
	pub fn new(operation: Operation, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"firebase_rtdb.operation",
				operation = operation.as_str(),
				stage
			);

			Self { span }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (operation, stage);

			Self {}
		}
	}

	/// Enters the span until the returned guard drops.
	pub fn entered(self) -> OperationSpanGuard {
		#[cfg(feature = "tracing")]
		{
			OperationSpanGuard { guard: self.span.entered() }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = self;

			OperationSpanGuard {}
		}
	}
}

/// RAII guard returned by [`OperationSpan::entered`].
pub struct OperationSpanGuard {
	#[cfg(feature = "tracing")]
	#[allow(dead_code)]
	guard: tracing::span::EnteredSpan,
}
impl Debug for OperationSpanGuard {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("OperationSpanGuard(..)")
	}
}

/// Sink that forwards events to `tracing` under the `firebase_rtdb` target.
#[cfg(feature = "tracing")]
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;
#[cfg(feature = "tracing")]
impl EventSink for TracingSink {
	fn record(&self, event: &Event) {
		match event {
			Event::ConnectionOpened { origin } =>
				tracing::debug!(target: "firebase_rtdb", %origin, "connection opened"),
			Event::ConnectionClosed { origin, reason } =>
				tracing::info!(target: "firebase_rtdb", %origin, ?reason, "connection closed"),
			Event::RequestSent { method, target, body_len, headers_injected, basic_auth } =>
				tracing::debug!(
					target: "firebase_rtdb",
					%method,
					%target,
					body_len,
					headers_injected,
					basic_auth,
					"request sent"
				),
			Event::ResponseReceived { status } =>
				tracing::debug!(target: "firebase_rtdb", status, "response received"),
			Event::Redirected { from, to, same_origin } =>
				tracing::info!(target: "firebase_rtdb", %from, %to, same_origin, "following redirect"),
			Event::TokenRenewalStarted { endpoint } =>
				tracing::info!(target: "firebase_rtdb", %endpoint, "requesting access token"),
			Event::TokenRenewed { expires_at } =>
				tracing::info!(target: "firebase_rtdb", %expires_at, "access token renewed"),
			Event::TokenRenewalFailed { reason } =>
				tracing::warn!(target: "firebase_rtdb", %reason, "access token renewal failed"),
			Event::CachedTokenReused { expires_at } => tracing::warn!(
				target: "firebase_rtdb",
				%expires_at,
				"renewal failed; reusing unexpired cached token"
			),
		}
	}
}
