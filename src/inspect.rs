//! Token inspection: decode JWT header and payload without verifying the signature.
//!
//! Decoding is for diagnostics only. Nothing here trusts a claim; a token that does not look
//! like a compact JWS is reported as opaque instead of producing an error.

// crates.io
use base64::{
	Engine as _, alphabet,
	engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
// self
use crate::{_prelude::*, auth::TokenResponse};

/// base64url that accepts both padded and unpadded input.
const BASE64URL_LENIENT: GeneralPurpose = GeneralPurpose::new(
	&alphabet::URL_SAFE,
	GeneralPurposeConfig::new()
		.with_encode_padding(false)
		.with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Result of decoding a bearer token.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum DecodedToken {
	/// Compact JWS whose header and payload decode to JSON objects.
	Jwt {
		/// JOSE header.
		header: JsonMap<String, JsonValue>,
		/// Claims set, verbatim.
		payload: JsonMap<String, JsonValue>,
		/// Well-known claims pulled out of the payload.
		claims: TokenClaims,
	},
	/// Anything else (reference tokens, Salesforce session ids, garbage).
	Opaque {
		/// Token as supplied.
		raw: String,
	},
}
impl DecodedToken {
	/// Returns true for [`DecodedToken::Jwt`].
	pub fn is_jwt(&self) -> bool {
		matches!(self, DecodedToken::Jwt { .. })
	}

	/// Extracted claims, when the token is a JWT.
	pub fn claims(&self) -> Option<&TokenClaims> {
		match self {
			DecodedToken::Jwt { claims, .. } => Some(claims),
			DecodedToken::Opaque { .. } => None,
		}
	}
}

/// Claims the reports care about. Absent claims stay empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TokenClaims {
	/// `sub`.
	pub subject: Option<String>,
	/// `iss`.
	pub issuer: Option<String>,
	/// `aud` (string or array).
	pub audience: Vec<String>,
	/// `exp`.
	#[serde(with = "time::serde::rfc3339::option")]
	pub expires_at: Option<OffsetDateTime>,
	/// `iat`.
	#[serde(with = "time::serde::rfc3339::option")]
	pub issued_at: Option<OffsetDateTime>,
	/// `nbf`.
	#[serde(with = "time::serde::rfc3339::option")]
	pub not_before: Option<OffsetDateTime>,
	/// `scope` (space-delimited) or Microsoft `scp` (string or array).
	pub scopes: Vec<String>,
	/// `roles` (app roles granted to the client or user).
	pub roles: Vec<String>,
	/// `groups` or `cognito:groups`.
	pub groups: Vec<String>,
	/// `name`.
	pub name: Option<String>,
	/// `email`.
	pub email: Option<String>,
	/// `preferred_username` (or `cognito:username`).
	pub preferred_username: Option<String>,
	/// Microsoft user principal name (`upn`).
	pub upn: Option<String>,
}
impl TokenClaims {
	/// Pulls the well-known claims out of a decoded payload.
	pub fn from_payload(payload: &JsonMap<String, JsonValue>) -> Self {
		let text = |name: &str| payload.get(name).and_then(JsonValue::as_str).map(str::to_owned);
		let instant = |name: &str| payload.get(name).and_then(unix_instant);
		let scopes = match payload.get("scope") {
			Some(value) => string_list(value),
			None => payload.get("scp").map(string_list).unwrap_or_default(),
		};
		let groups = payload
			.get("groups")
			.or_else(|| payload.get("cognito:groups"))
			.map(string_list)
			.unwrap_or_default();

		Self {
			subject: text("sub"),
			issuer: text("iss"),
			audience: payload.get("aud").map(string_list).unwrap_or_default(),
			expires_at: instant("exp"),
			issued_at: instant("iat"),
			not_before: instant("nbf"),
			scopes,
			roles: payload.get("roles").map(string_list).unwrap_or_default(),
			groups,
			name: text("name"),
			email: text("email"),
			preferred_username: text("preferred_username").or_else(|| text("cognito:username")),
			upn: text("upn"),
		}
	}

	/// Whether `exp` lies at or before `now`; `None` when the token carries no expiry.
	pub fn is_expired_at(&self, now: OffsetDateTime) -> Option<bool> {
		self.expires_at.map(|exp| exp <= now)
	}
}

/// Decoded view of every token in a response.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TokenReport {
	/// Access token analysis.
	pub access_token: DecodedToken,
	/// ID token analysis, when one was issued.
	pub id_token: Option<DecodedToken>,
	/// Whether a refresh token was issued (it is never decoded).
	pub refresh_token_present: bool,
}

/// Classifies and decodes `token`. Never fails.
pub fn decode(token: &str) -> DecodedToken {
	try_decode_jwt(token).unwrap_or_else(|| DecodedToken::Opaque { raw: token.to_owned() })
}

/// Decodes the access and ID tokens of a response together.
pub fn inspect(response: &TokenResponse) -> TokenReport {
	TokenReport {
		access_token: decode(response.access_token.expose()),
		id_token: response.id_token.as_ref().map(|token| decode(token.expose())),
		refresh_token_present: response.refresh_token.is_some(),
	}
}

fn try_decode_jwt(token: &str) -> Option<DecodedToken> {
	let mut segments = token.trim().split('.');
	let (header, payload, signature) = (segments.next()?, segments.next()?, segments.next()?);

	if segments.next().is_some() {
		return None;
	}

	let header = json_object(header)?;
	let payload = json_object(payload)?;

	BASE64URL_LENIENT.decode(signature).ok()?;

	let claims = TokenClaims::from_payload(&payload);

	Some(DecodedToken::Jwt { header, payload, claims })
}

fn json_object(segment: &str) -> Option<JsonMap<String, JsonValue>> {
	let bytes = BASE64URL_LENIENT.decode(segment).ok()?;

	match serde_json::from_slice(&bytes).ok()? {
		JsonValue::Object(map) => Some(map),
		_ => None,
	}
}

fn string_list(value: &JsonValue) -> Vec<String> {
	match value {
		JsonValue::String(text) => text.split_whitespace().map(str::to_owned).collect(),
		JsonValue::Array(items) =>
			items.iter().filter_map(JsonValue::as_str).map(str::to_owned).collect(),
		_ => Vec::new(),
	}
}

fn unix_instant(value: &JsonValue) -> Option<OffsetDateTime> {
	let secs = value.as_i64().or_else(|| value.as_f64().map(|secs| secs as i64))?;

	OffsetDateTime::from_unix_timestamp(secs).ok()
}
