//! Human-readable rendering of token responses, decoded tokens, and discovery reports.
//!
//! Every view is a [`Display`] adapter so callers decide where the text goes. Secrets appear
//! only in the "FULL TOKEN VALUES" section, which exists so the operator can copy them.

// std
use std::fmt::Write as _;
// crates.io
use time::{format_description::BorrowedFormatItem, macros::format_description};
// self
use crate::{
	_prelude::*,
	auth::TokenResponse,
	discovery::{DiscoveryReport, MetadataFinding, ProbeFinding, ProviderMetadata},
	inspect::{DecodedToken, TokenClaims, TokenReport},
	provider::GrantType,
};

const RULE_WIDTH: usize = 60;
const SUB_RULE_WIDTH: usize = 40;
const TIMESTAMP: &[BorrowedFormatItem<'static>] =
	format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC");

/// Formats an instant as `YYYY-MM-DD HH:MM:SS UTC`.
pub fn timestamp(instant: OffsetDateTime) -> String {
	instant
		.to_offset(time::UtcOffset::UTC)
		.format(TIMESTAMP)
		.unwrap_or_else(|_| instant.unix_timestamp().to_string())
}

/// Full report for a successful flow: summary, copyable values, and per-token analysis.
#[derive(Debug)]
pub struct TokenResponseView<'a> {
	response: &'a TokenResponse,
	report: &'a TokenReport,
	verbose: bool,
}
impl<'a> TokenResponseView<'a> {
	/// Renders `response` using the pre-computed `report`.
	pub fn new(response: &'a TokenResponse, report: &'a TokenReport, verbose: bool) -> Self {
		Self { response, report, verbose }
	}
}
impl Display for TokenResponseView<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let Self { response, report, verbose } = *self;

		heading(f, "TOKEN RESPONSE")?;
		writeln!(
			f,
			"Access Token: Present ({})",
			if report.access_token.is_jwt() { "JWT" } else { "Opaque" }
		)?;

		if let Some(id_token) = &report.id_token {
			writeln!(f, "ID Token: Present ({})", if id_token.is_jwt() { "JWT" } else { "Opaque" })?;
		}
		if report.refresh_token_present {
			writeln!(f, "Refresh Token: Present")?;
		}

		writeln!(f, "Token Type: {}", response.token_type)?;

		if let Some(expires_in) = response.expires_in {
			writeln!(f, "Expires In: {expires_in} seconds")?;
		}
		if let Some(expires_at) = response.expires_at() {
			writeln!(f, "Expires At: {}", timestamp(expires_at))?;
		}
		if let Some(scope) = &response.scope {
			writeln!(f, "Granted Scopes: {scope}")?;
		}
		for (name, value) in &response.extra {
			writeln!(f, "{name}: {}", plain(value))?;
		}

		heading(f, "FULL TOKEN VALUES (for copying)")?;
		sub_heading(f, "Access Token")?;
		writeln!(f, "{}", response.access_token.expose())?;

		if let Some(id_token) = &response.id_token {
			sub_heading(f, "ID Token")?;
			writeln!(f, "{}", id_token.expose())?;
		}
		if let Some(refresh_token) = &response.refresh_token {
			sub_heading(f, "Refresh Token")?;
			writeln!(f, "{}", refresh_token.expose())?;
		}

		let access_title = if report.access_token.is_jwt() {
			"Access Token (JWT)"
		} else {
			"Access Token Analysis (Opaque)"
		};

		write!(f, "{}", DecodedTokenView::new(access_title, &report.access_token, verbose))?;

		if let Some(id_token) = &report.id_token {
			write!(f, "{}", DecodedTokenView::new("ID Token Analysis", id_token, verbose))?;
		}

		if response.grant == GrantType::ClientCredentials {
			writeln!(f)?;
			writeln!(f, "Client Credentials notes:")?;
			writeln!(f, "  - This token represents the application, not a user.")?;
			writeln!(f, "  - It grants only the permissions consented for the app itself.")?;
			writeln!(f, "  - No refresh token is issued; request a new token when it expires.")?;
		}

		if verbose {
			sub_heading(f, "Full Token Response (JSON)")?;
			writeln!(f, "{}", pretty(response))?;
		}

		Ok(())
	}
}

/// Analysis block for one token.
#[derive(Debug)]
pub struct DecodedTokenView<'a> {
	title: &'a str,
	token: &'a DecodedToken,
	verbose: bool,
}
impl<'a> DecodedTokenView<'a> {
	/// Renders `token` under `title`.
	pub fn new(title: &'a str, token: &'a DecodedToken, verbose: bool) -> Self {
		Self { title, token, verbose }
	}
}
impl Display for DecodedTokenView<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		sub_heading(f, self.title)?;

		match self.token {
			DecodedToken::Jwt { header, payload, claims } => {
				writeln!(f, "Valid JWT format (signature not verified)")?;

				if let Some(alg) = header.get("alg").and_then(JsonValue::as_str) {
					writeln!(f, "Algorithm (alg): {alg}")?;
				}

				write_claims(f, claims)?;

				if self.verbose {
					writeln!(f)?;
					writeln!(f, "Full Header:")?;
					writeln!(f, "{}", pretty(header))?;
					writeln!(f)?;
					writeln!(f, "Full Payload:")?;
					writeln!(f, "{}", pretty(payload))?;
				}
			},
			DecodedToken::Opaque { raw } => {
				writeln!(f, "Opaque token; it cannot be decoded locally.")?;

				if self.verbose {
					writeln!(f, "Token value: {raw}")?;
				}
			},
		}

		Ok(())
	}
}

/// Discovery findings and recommendations.
#[derive(Debug)]
pub struct DiscoveryView<'a> {
	report: &'a DiscoveryReport,
	verbose: bool,
}
impl<'a> DiscoveryView<'a> {
	/// Renders `report`.
	pub fn new(report: &'a DiscoveryReport, verbose: bool) -> Self {
		Self { report, verbose }
	}
}
impl Display for DiscoveryView<'_> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let report = self.report;

		writeln!(f, "Provider: {}", report.provider)?;
		writeln!(f, "Client ID: {}", report.client_id)?;
		writeln!(
			f,
			"Client Secret: {}",
			if report.client_secret_present { "Present" } else { "Not provided" }
		)?;

		heading(f, "OAUTH DISCOVERY INFORMATION")?;

		if let Some(endpoint) = &report.metadata_endpoint {
			writeln!(f, "Discovery URL: {endpoint}")?;
		}

		match &report.metadata {
			MetadataFinding::Available { metadata } => write_metadata(f, metadata, self.verbose)?,
			MetadataFinding::Unavailable { reason } =>
				writeln!(f, "Metadata unavailable: {reason}")?,
			MetadataFinding::NotPublished =>
				writeln!(f, "The provider does not publish a discovery document.")?,
		}

		heading(f, "TESTING GRANT TYPE SUPPORT")?;
		write_probe(f, GrantType::ClientCredentials, &report.client_credentials)?;

		if let Some(device_code) = &report.device_code {
			write_probe(f, GrantType::DeviceCode, device_code)?;
		}

		writeln!(f)?;
		writeln!(f, "Authorization Code: LIKELY SUPPORTED (requires user interaction to test)")?;

		let recommendations = &report.recommendations;

		heading(f, "RECOMMENDATIONS")?;
		writeln!(f, "Supported grants: {}", labels(&recommendations.supported_grants))?;
		writeln!(
			f,
			"PKCE (S256): {}",
			match recommendations.pkce_supported {
				Some(true) => "supported",
				Some(false) => "not advertised",
				None => "unknown (not listed in metadata)",
			}
		)?;
		writeln!(f, "Recommended flow: {}", recommendations.recommended_flow.label())?;

		for note in &recommendations.notes {
			writeln!(f, "  - {note}")?;
		}

		writeln!(f)?;
		writeln!(f, "Suggested testing order:")?;

		for (position, grant) in recommendations.testing_order.iter().enumerate() {
			writeln!(f, "  {}. {}", position + 1, grant.label())?;
		}

		Ok(())
	}
}

fn heading(f: &mut Formatter, title: &str) -> FmtResult {
	let rule = "=".repeat(RULE_WIDTH);

	writeln!(f)?;
	writeln!(f, "{rule}")?;
	writeln!(f, "{title}")?;
	writeln!(f, "{rule}")
}

fn sub_heading(f: &mut Formatter, title: &str) -> FmtResult {
	writeln!(f)?;
	writeln!(f, "{title}:")?;
	writeln!(f, "{}", "-".repeat(SUB_RULE_WIDTH))
}

fn write_claims(f: &mut Formatter, claims: &TokenClaims) -> FmtResult {
	let texts = [
		("Subject (sub)", &claims.subject),
		("Issuer (iss)", &claims.issuer),
		("Name", &claims.name),
		("Email", &claims.email),
		("Username", &claims.preferred_username),
		("UPN", &claims.upn),
	];
	let instants = [
		("Expires (exp)", claims.expires_at),
		("Issued at (iat)", claims.issued_at),
		("Not before (nbf)", claims.not_before),
	];
	let lists = [
		("Audience (aud)", &claims.audience),
		("Scopes", &claims.scopes),
		("Roles", &claims.roles),
		("Groups", &claims.groups),
	];

	for (label, value) in texts {
		if let Some(value) = value {
			writeln!(f, "{label}: {value}")?;
		}
	}
	for (label, value) in instants {
		if let Some(value) = value {
			writeln!(f, "{label}: {}", timestamp(value))?;
		}
	}
	for (label, values) in lists {
		if !values.is_empty() {
			writeln!(f, "{label}: {}", values.join(" "))?;
		}
	}

	if claims.is_expired_at(OffsetDateTime::now_utc()) == Some(true) {
		writeln!(f, "Warning: this token has already expired.")?;
	}

	Ok(())
}

fn write_metadata(f: &mut Formatter, metadata: &ProviderMetadata, verbose: bool) -> FmtResult {
	let or_na = |value: &Option<String>| value.clone().unwrap_or_else(|| "N/A".into());

	writeln!(f, "Issuer: {}", or_na(&metadata.issuer))?;
	writeln!(f, "Authorization Endpoint: {}", or_na(&metadata.authorization_endpoint))?;
	writeln!(f, "Token Endpoint: {}", or_na(&metadata.token_endpoint))?;

	if let Some(endpoint) = &metadata.device_authorization_endpoint {
		writeln!(f, "Device Authorization Endpoint: {endpoint}")?;
	}

	let lists = [
		("Supported Grant Types", &metadata.grant_types_supported),
		("Supported Response Types", &metadata.response_types_supported),
		("Supported Scopes", &metadata.scopes_supported),
		("Supported PKCE Methods", &metadata.code_challenge_methods_supported),
		("Token Endpoint Auth Methods", &metadata.token_endpoint_auth_methods_supported),
	];

	for (label, values) in lists {
		if values.is_empty() {
			continue;
		}

		writeln!(f)?;
		writeln!(f, "{label}:")?;

		for value in values {
			writeln!(f, "  + {value}")?;
		}
	}

	if verbose {
		sub_heading(f, "Full Discovery Response")?;
		writeln!(f, "{}", pretty(metadata))?;
	}

	Ok(())
}

fn write_probe(f: &mut Formatter, grant: GrantType, finding: &ProbeFinding) -> FmtResult {
	let label = grant.label();

	writeln!(f)?;

	match finding {
		ProbeFinding::Supported { details } => {
			writeln!(f, "{label}: SUPPORTED")?;

			for (name, value) in details {
				writeln!(f, "     {name}: {value}")?;
			}
		},
		ProbeFinding::Rejected { status, error, description } => {
			let mut line = format!("{label}: NOT SUPPORTED");

			if let Some(status) = status {
				let _ = write!(line, " (HTTP {status})");
			}

			writeln!(f, "{line}")?;

			if let Some(error) = error {
				writeln!(f, "     Error: {error}")?;
			}
			if let Some(description) = description {
				writeln!(f, "     Description: {description}")?;
			}
		},
		ProbeFinding::Failed { reason } => writeln!(f, "{label}: ERROR - {reason}")?,
		ProbeFinding::Skipped { reason } => writeln!(f, "{label}: NOT TESTED ({reason})")?,
	}

	Ok(())
}

fn labels(grants: &[GrantType]) -> String {
	if grants.is_empty() {
		return "none confirmed".into();
	}

	grants.iter().map(|grant| grant.label()).collect::<Vec<_>>().join(", ")
}

fn plain(value: &JsonValue) -> String {
	match value {
		JsonValue::String(text) => text.clone(),
		other => other.to_string(),
	}
}

fn pretty(value: &impl Serialize) -> String {
	serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::{
		discovery::Recommendations,
		inspect::{self, decode},
	};

	fn response(grant: GrantType) -> TokenResponse {
		TokenResponse::builder(grant)
			.access_token("opaque-access")
			.refresh_token("refresh-value")
			.expires_in(3600)
			.scope("api refresh_token")
			.issued_at(
				OffsetDateTime::from_unix_timestamp(1_700_000_000)
					.expect("Fixture timestamp should be valid."),
			)
			.build()
			.expect("Token response fixture should build.")
	}

	#[test]
	fn timestamps_use_utc_wall_clock() {
		let instant = OffsetDateTime::from_unix_timestamp(1_700_000_000)
			.expect("Fixture timestamp should be valid.");

		assert_eq!(timestamp(instant), "2023-11-14 22:13:20 UTC");
	}

	#[test]
	fn token_report_has_summary_values_and_analysis_sections() {
		let response = response(GrantType::AuthorizationCode);
		let report = inspect::inspect(&response);
		let text = TokenResponseView::new(&response, &report, false).to_string();

		assert!(text.contains("TOKEN RESPONSE"));
		assert!(text.contains("Access Token: Present (Opaque)"));
		assert!(text.contains("Refresh Token: Present"));
		assert!(text.contains("Expires At: 2023-11-14 23:13:20 UTC"));
		assert!(text.contains("FULL TOKEN VALUES (for copying)"));
		assert!(text.contains("refresh-value"));
		assert!(text.contains("Access Token Analysis (Opaque)"));
		assert!(!text.contains("Client Credentials notes"));
	}

	#[test]
	fn client_credentials_reports_carry_app_only_notes() {
		let response = response(GrantType::ClientCredentials);
		let report = inspect::inspect(&response);
		let text = TokenResponseView::new(&response, &report, true).to_string();

		assert!(text.contains("Client Credentials notes"));
		assert!(text.contains("Full Token Response (JSON)"));
	}

	#[test]
	fn opaque_tokens_are_shown_only_when_verbose() {
		let decoded = decode("opaque-value");

		assert!(!DecodedTokenView::new("T", &decoded, false).to_string().contains("opaque-value"));
		assert!(DecodedTokenView::new("T", &decoded, true).to_string().contains("opaque-value"));
	}

	#[test]
	fn discovery_report_lists_findings_and_order() {
		let report = DiscoveryReport {
			provider: "Salesforce".into(),
			client_id: "app".into(),
			client_secret_present: true,
			metadata_endpoint: None,
			metadata: MetadataFinding::Unavailable { reason: "HTTP 404".into() },
			client_credentials: ProbeFinding::Rejected {
				status: Some(400),
				error: Some("invalid_grant".into()),
				description: Some("no client credentials user enabled".into()),
			},
			device_code: None,
			recommendations: Recommendations {
				supported_grants: vec![GrantType::AuthorizationCode],
				pkce_supported: None,
				recommended_flow: GrantType::AuthorizationCode,
				testing_order: vec![GrantType::AuthorizationCode],
				notes: vec!["Note.".into()],
			},
		};
		let text = DiscoveryView::new(&report, false).to_string();

		assert!(text.contains("Metadata unavailable: HTTP 404"));
		assert!(text.contains("Client Credentials: NOT SUPPORTED (HTTP 400)"));
		assert!(text.contains("Description: no client credentials user enabled"));
		assert!(text.contains("RECOMMENDATIONS"));
		assert!(text.contains("  1. Authorization Code"));
	}
}
