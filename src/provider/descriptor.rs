//! Provider descriptor data structures shared by all flows.
//!
//! The module exposes validated metadata, supporting builder utilities, and grant helpers so
//! providers can describe their capabilities without tying flows to a particular HTTP client.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Grant helpers wired into provider descriptors.
pub mod grant;

pub use builder::*;
pub use grant::*;

// self
use crate::{
	_prelude::*,
	auth::ProviderId,
	provider::{CredentialRequirement, FormattedScope, ProviderKind, ScopeConvention},
};

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Authorization endpoint used by the Authorization Code flow.
	pub authorization: Url,
	/// Token endpoint used for every exchange.
	pub token: Url,
	/// Optional OpenID Connect discovery document.
	pub metadata: Option<Url>,
	/// Optional device authorization endpoint (RFC 8628).
	pub device_code: Option<Url>,
}

/// Immutable provider descriptor consumed by flows and the discovery probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Descriptor identifier.
	pub id: ProviderId,
	/// Provider family the descriptor belongs to.
	pub kind: ProviderKind,
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Grants the provider is known to accept.
	pub supported_grants: SupportedGrants,
	/// How the provider expects `scope` values to look.
	pub scope_convention: ScopeConvention,
	/// Extra query parameters appended to every authorization URL.
	pub authorization_params: Vec<(String, String)>,
}
impl ProviderDescriptor {
	/// Creates a new builder for the provided identifier and provider family.
	pub fn builder(id: ProviderId, kind: ProviderKind) -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::new(id, kind)
	}

	/// Checks whether the descriptor supports a given grant.
	pub fn supports(&self, grant: GrantType) -> bool {
		self.supported_grants.supports(grant)
	}

	/// Name shown in reports (the provider family, or the identifier for custom descriptors).
	pub fn display_name(&self) -> &str {
		match self.kind {
			ProviderKind::Custom => self.id.as_ref(),
			kind => kind.label(),
		}
	}

	/// Credentials this descriptor's provider family needs to resolve its endpoints.
	pub fn required_credentials(&self) -> &'static [CredentialRequirement] {
		self.kind.required_credentials()
	}

	/// Formats a user-supplied scope string for `grant` according to the provider's
	/// convention.
	///
	/// The function is pure: it never contacts the provider and never invents a resource URI
	/// the caller did not type. Non-conforming input is kept as-is and reported through
	/// [`FormattedScope::warnings`].
	pub fn format_scope(&self, grant: GrantType, requested: &str) -> FormattedScope {
		self.scope_convention.format(grant, requested)
	}
}
