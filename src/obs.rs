//! Flow spans and outcome counters.
//!
//! Every attempt runs inside an `oauth_tester.flow` span carrying `flow` and `stage` fields.
//! With the `metrics` feature enabled, attempts and their results also increment the
//! `oauth_tester_flow_total{flow,outcome}` counter.

// crates.io
use tracing::{Instrument, Span, instrument::Instrumented};
// self
use crate::_prelude::*;

/// Operations observed by the tester.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// Authorization Code + PKCE flow.
	AuthorizationCode,
	/// Client Credentials flow.
	ClientCredentials,
	/// Capability discovery probe.
	Discovery,
}
impl FlowKind {
	/// Label used for the `flow` span and metric field.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::AuthorizationCode => "authorization_code",
			FlowKind::ClientCredentials => "client_credentials",
			FlowKind::Discovery => "discovery",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Counter label for one step in an attempt's life.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Attempt started.
	Attempt,
	/// Attempt returned tokens (or a report).
	Success,
	/// Attempt returned an error.
	Failure,
}
impl FlowOutcome {
	/// Label used for the `outcome` metric field.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}

	/// Success or failure, depending on `result`.
	pub fn of<T, E>(result: &std::result::Result<T, E>) -> Self {
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure }
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// `oauth_tester.flow` span for one attempt.
#[derive(Clone, Debug)]
pub struct FlowSpan(Span);
impl FlowSpan {
	/// Opens a span for `kind` at `stage`.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		Self(tracing::info_span!("oauth_tester.flow", flow = kind.as_str(), stage))
	}

	/// Runs `fut` inside the span; no guard is held across `.await` points.
	pub fn in_span<Fut>(&self, fut: Fut) -> Instrumented<Fut>
	where
		Fut: Future,
	{
		fut.instrument(self.0.clone())
	}
}

/// Bumps the flow counter; a no-op without the `metrics` feature.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(
		"oauth_tester_flow_total",
		"flow" => kind.as_str(),
		"outcome" => outcome.as_str()
	)
	.increment(1);

	#[cfg(not(feature = "metrics"))]
	let _ = (kind, outcome);
}
