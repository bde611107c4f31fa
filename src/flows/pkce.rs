//! PKCE (RFC 7636) verifier and S256 challenge generation.

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::Rng;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Length of generated verifiers (RFC 7636 allows 43 to 128).
pub const PKCE_VERIFIER_LEN: usize = 64;

const UNRESERVED: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Supported PKCE challenge methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PkceCodeChallengeMethod {
	/// SHA-256 based PKCE (RFC 7636 S256).
	S256,
}
impl PkceCodeChallengeMethod {
	/// Returns the RFC 7636 identifier for the challenge method.
	pub fn as_str(self) -> &'static str {
		match self {
			PkceCodeChallengeMethod::S256 => "S256",
		}
	}
}

/// Verifier/challenge pair for a single authorization attempt.
///
/// The verifier is secret until the code exchange completes and never shows up in `Debug`.
#[derive(Clone)]
pub struct PkceChallenge {
	verifier: String,
	challenge: String,
}
impl PkceChallenge {
	/// Draws a fresh verifier from the OS-seeded CSPRNG and derives its S256 challenge.
	pub fn generate() -> Self {
		let mut rng = rand::rng();
		let verifier = (0..PKCE_VERIFIER_LEN)
			.map(|_| char::from(UNRESERVED[rng.random_range(0..UNRESERVED.len())]))
			.collect::<String>();
		let challenge = s256(&verifier);

		Self { verifier, challenge }
	}

	/// Secret verifier sent with the code exchange.
	pub fn verifier(&self) -> &str {
		&self.verifier
	}

	/// Public challenge sent on the authorization URL.
	pub fn challenge(&self) -> &str {
		&self.challenge
	}

	/// Challenge method (always `S256`).
	pub fn method(&self) -> PkceCodeChallengeMethod {
		PkceCodeChallengeMethod::S256
	}

	/// Returns true when `challenge` is the S256 transform of `verifier`.
	pub fn verify(verifier: &str, challenge: &str) -> bool {
		s256(verifier) == challenge
	}
}
impl Debug for PkceChallenge {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PkceChallenge")
			.field("verifier", &"<redacted>")
			.field("challenge", &self.challenge)
			.finish()
	}
}

fn s256(verifier: &str) -> String {
	URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn generated_verifiers_use_the_unreserved_alphabet() {
		let pkce = PkceChallenge::generate();

		assert_eq!(pkce.verifier().len(), PKCE_VERIFIER_LEN);
		assert!(pkce.verifier().bytes().all(|byte| UNRESERVED.contains(&byte)));
		assert!(PkceChallenge::verify(pkce.verifier(), pkce.challenge()));
		assert_ne!(pkce.verifier(), PkceChallenge::generate().verifier());
	}

	#[test]
	fn challenge_matches_the_rfc_7636_vector() {
		assert!(PkceChallenge::verify(
			"dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk",
			"E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
		));
		assert!(!PkceChallenge::verify("tampered", "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"));
	}

	#[test]
	fn debug_output_hides_the_verifier() {
		let pkce = PkceChallenge::generate();
		let rendered = format!("{pkce:?}");

		assert!(!rendered.contains(pkce.verifier()));
		assert!(rendered.contains(pkce.challenge()));
	}
}
