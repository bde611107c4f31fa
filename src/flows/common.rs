//! Shared helpers for flow implementations.

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	flows::FlowEngine,
	http::TokenHttpClient,
	oauth::TransportErrorMapper,
	provider::GrantType,
};

/// Length of generated `state` values.
pub const STATE_LEN: usize = 32;

/// Random alphanumeric string drawn from the thread-local CSPRNG.
pub(crate) fn random_string(len: usize) -> String {
	rand::rng().sample_iter(Alphanumeric).take(len).map(char::from).collect()
}

/// Fails with [`ConfigError::UnsupportedGrant`] when the engine's descriptor lacks `grant`.
pub(crate) fn ensure_supported<C, M>(engine: &FlowEngine<C, M>, grant: GrantType) -> Result<()>
where
	C: ?Sized + TokenHttpClient,
	M: ?Sized + TransportErrorMapper<C::TransportError>,
{
	if engine.descriptor.supports(grant) {
		Ok(())
	} else {
		Err(ConfigError::UnsupportedGrant {
			descriptor: engine.descriptor.display_name().to_owned(),
			grant,
		}
		.into())
	}
}

/// Logs scope warnings and notes produced while formatting a request.
pub(crate) fn log_scope_findings(grant: GrantType, warnings: &[String], notes: &[String]) {
	for note in notes {
		tracing::info!(grant = grant.as_str(), "{note}");
	}
	for warning in warnings {
		tracing::warn!(grant = grant.as_str(), "{warning}");
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn random_strings_are_alphanumeric_and_sized() {
		let value = random_string(STATE_LEN);

		assert_eq!(value.len(), STATE_LEN);
		assert!(value.chars().all(|c| c.is_ascii_alphanumeric()));
	}
}
