//! Strongly typed identifiers validated before they reach a provider.

// std
use std::ops::Deref;
// self
use crate::_prelude::*;

// Salesforce consumer keys run close to 100 characters; leave headroom.
const IDENTIFIER_MAX_LEN: usize = 256;

macro_rules! identifier {
	($(#[$meta:meta])* $name:ident => $kind:literal) => {
		$(#[$meta])*
		#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Validates `value` and wraps it.
			pub fn new(value: impl AsRef<str>) -> Result<Self, IdentifierError> {
				check($kind, value.as_ref()).map(|view| Self(view.to_owned()))
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &str {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.debug_tuple(stringify!($name)).field(&self.0).finish()
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				check($kind, &value)?;

				Ok(Self(value))
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
	};
}

/// Why an identifier was refused.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// Nothing was supplied.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// `Client`, `Tenant`, or `Provider`.
		kind: &'static str,
	},
	/// Whitespace anywhere, usually a copy-paste accident.
	#[error("{kind} identifier contains whitespace.")]
	ContainsWhitespace {
		/// `Client`, `Tenant`, or `Provider`.
		kind: &'static str,
	},
	/// Longer than any real provider issues.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// `Client`, `Tenant`, or `Provider`.
		kind: &'static str,
		/// Limit that was exceeded.
		max: usize,
	},
}

identifier! {
	/// OAuth 2.0 client identifier registered with a provider.
	ClientId => "Client"
}
identifier! {
	/// Directory tenant (GUID or verified domain) for multi-tenant providers.
	TenantId => "Tenant"
}
identifier! {
	/// Identifier for a provider descriptor.
	ProviderId => "Provider"
}

fn check<'a>(kind: &'static str, view: &'a str) -> Result<&'a str, IdentifierError> {
	match view {
		"" => Err(IdentifierError::Empty { kind }),
		_ if view.chars().any(char::is_whitespace) =>
			Err(IdentifierError::ContainsWhitespace { kind }),
		_ if view.chars().count() > IDENTIFIER_MAX_LEN =>
			Err(IdentifierError::TooLong { kind, max: IDENTIFIER_MAX_LEN }),
		_ => Ok(view),
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn padded_and_empty_values_are_refused() {
		assert_eq!(
			TenantId::new(" contoso.onmicrosoft.com"),
			Err(IdentifierError::ContainsWhitespace { kind: "Tenant" })
		);
		assert!(TenantId::new("contoso.onmicrosoft.com\n").is_err());
		assert_eq!(ClientId::new(""), Err(IdentifierError::Empty { kind: "Client" }));

		let tenant: TenantId = "72f988bf-86f1-41af-91ab-2d7cd011db47"
			.parse()
			.expect("GUID tenant fixture should be valid.");

		assert_eq!(&*tenant, "72f988bf-86f1-41af-91ab-2d7cd011db47");
		assert_eq!(format!("{tenant:?}"), "TenantId(\"72f988bf-86f1-41af-91ab-2d7cd011db47\")");
	}

	#[test]
	fn deserialization_runs_the_same_checks() {
		let client: ClientId =
			serde_json::from_str("\"3MVG9-consumer-key\"").expect("Client should deserialize.");

		assert_eq!(client.to_string(), "3MVG9-consumer-key");
		assert!(serde_json::from_str::<ClientId>("\"with space\"").is_err());
	}

	#[test]
	fn length_limit_counts_characters() {
		ClientId::new("é".repeat(IDENTIFIER_MAX_LEN)).expect("Exact length should succeed.");

		assert!(matches!(
			ClientId::new("a".repeat(IDENTIFIER_MAX_LEN + 1)),
			Err(IdentifierError::TooLong { .. })
		));
	}
}
