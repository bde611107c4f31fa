// self
use crate::_prelude::*;

/// OAuth 2.0 grant types the tester knows how to name, drive, or probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
	/// Authorization Code grant (driven with PKCE).
	AuthorizationCode,
	/// Client Credentials grant for app-only tokens.
	ClientCredentials,
	/// Refresh Token grant (reported only; never driven automatically).
	RefreshToken,
	/// Device Authorization grant (RFC 8628; probed during discovery).
	DeviceCode,
}
impl GrantType {
	/// Every grant the tester can describe, in display order.
	pub const ALL: [GrantType; 4] = [
		GrantType::AuthorizationCode,
		GrantType::ClientCredentials,
		GrantType::RefreshToken,
		GrantType::DeviceCode,
	];

	/// Returns the identifier used in `grant_type` parameters and discovery metadata.
	pub fn as_str(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "authorization_code",
			GrantType::ClientCredentials => "client_credentials",
			GrantType::RefreshToken => "refresh_token",
			GrantType::DeviceCode => "urn:ietf:params:oauth:grant-type:device_code",
		}
	}

	/// Human-readable label used in reports.
	pub fn label(self) -> &'static str {
		match self {
			GrantType::AuthorizationCode => "Authorization Code",
			GrantType::ClientCredentials => "Client Credentials",
			GrantType::RefreshToken => "Refresh Token",
			GrantType::DeviceCode => "Device Code",
		}
	}
}
impl Display for GrantType {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for GrantType {
	type Err = UnknownGrantType;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"authorization_code" => Ok(GrantType::AuthorizationCode),
			"client_credentials" => Ok(GrantType::ClientCredentials),
			"refresh_token" => Ok(GrantType::RefreshToken),
			"urn:ietf:params:oauth:grant-type:device_code" | "device_code" =>
				Ok(GrantType::DeviceCode),
			other => Err(UnknownGrantType(other.to_owned())),
		}
	}
}

/// Grant identifier outside the set the tester models (e.g. `password`, `implicit`).
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Unknown grant type `{0}`.")]
pub struct UnknownGrantType(pub String);

/// Collection of grant flags wired into the descriptor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedGrants {
	/// Indicates whether the Authorization Code grant is enabled.
	pub authorization_code: bool,
	/// Indicates whether the Client Credentials grant is enabled.
	pub client_credentials: bool,
	/// Indicates whether the Refresh Token grant is enabled.
	pub refresh_token: bool,
	/// Indicates whether the Device Code grant is enabled.
	pub device_code: bool,
}
impl SupportedGrants {
	/// Returns true if the provided grant is supported.
	pub fn supports(self, grant: GrantType) -> bool {
		match grant {
			GrantType::AuthorizationCode => self.authorization_code,
			GrantType::ClientCredentials => self.client_credentials,
			GrantType::RefreshToken => self.refresh_token,
			GrantType::DeviceCode => self.device_code,
		}
	}

	/// Marks a grant as supported.
	pub fn enable(mut self, grant: GrantType) -> Self {
		match grant {
			GrantType::AuthorizationCode => self.authorization_code = true,
			GrantType::ClientCredentials => self.client_credentials = true,
			GrantType::RefreshToken => self.refresh_token = true,
			GrantType::DeviceCode => self.device_code = true,
		}

		self
	}

	/// Returns true when no grants are enabled.
	pub fn is_empty(self) -> bool {
		!GrantType::ALL.into_iter().any(|grant| self.supports(grant))
	}

	/// Iterates over the enabled grants.
	pub fn iter(self) -> impl Iterator<Item = GrantType> {
		GrantType::ALL.into_iter().filter(move |grant| self.supports(*grant))
	}
}
impl FromIterator<GrantType> for SupportedGrants {
	fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = GrantType>,
	{
		iter.into_iter().fold(Self::default(), Self::enable)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn grant_identifiers_round_trip_through_metadata_strings() {
		for grant in GrantType::ALL {
			assert_eq!(GrantType::from_str(grant.as_str()), Ok(grant));
		}

		assert!(GrantType::from_str("password").is_err());
	}

	#[test]
	fn supported_grants_collect_and_iterate() {
		let grants: SupportedGrants =
			[GrantType::DeviceCode, GrantType::AuthorizationCode].into_iter().collect();

		assert!(grants.supports(GrantType::DeviceCode));
		assert!(!grants.supports(GrantType::ClientCredentials));
		assert_eq!(
			grants.iter().collect::<Vec<_>>(),
			vec![GrantType::AuthorizationCode, GrantType::DeviceCode]
		);
		assert!(SupportedGrants::default().is_empty());
	}
}
