//! Application session tokens.
//!
//! The login exchange optionally mints a bearer credential bound to the
//! identity's subject id. Tokens are a base64url JSON payload plus an
//! HMAC-SHA256 signature keyed by `STRIDE_SESSION_SECRET`. Repeated mints
//! for the same subject produce distinct but equally valid tokens; no
//! uniqueness invariant is required.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Errors that can occur when verifying a session token.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Token is not in `payload.signature` form.
    #[error("malformed session token")]
    Malformed,

    /// Signature does not match the payload.
    #[error("invalid session token signature")]
    InvalidSignature,
}

/// Signed claims carried inside a session token.
#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    /// Identity provider subject id.
    sub: String,
    /// Unix timestamp at mint time.
    iat: i64,
    /// Random nonce so repeated mints differ.
    nonce: u64,
}

/// Mints and verifies HMAC-signed session tokens.
#[derive(Clone)]
pub struct SessionSigner {
    secret: SecretString,
}

impl SessionSigner {
    /// Create a signer from the configured session secret.
    #[must_use]
    pub const fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    // Hmac accepts keys of any length, so new_from_slice cannot fail.
    #[allow(clippy::expect_used)]
    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key length")
    }

    /// Mint a token bound to a subject id.
    #[must_use]
    pub fn mint(&self, subject_id: &str) -> String {
        let claims = SessionClaims {
            sub: subject_id.to_string(),
            iat: Utc::now().timestamp(),
            nonce: rand::random(),
        };
        // Serializing a struct of plain fields cannot fail.
        let payload = serde_json::to_vec(&claims).unwrap_or_default();
        let encoded = URL_SAFE_NO_PAD.encode(&payload);

        let mut mac = self.mac();
        mac.update(encoded.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        format!("{encoded}.{signature}")
    }

    /// Verify a token and return the subject id it was minted for.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Malformed` if the token does not parse and
    /// `SessionError::InvalidSignature` if the signature check fails.
    pub fn verify(&self, token: &str) -> Result<String, SessionError> {
        let (encoded, signature) = token.split_once('.').ok_or(SessionError::Malformed)?;

        let provided = hex::decode(signature).map_err(|_| SessionError::Malformed)?;
        let mut mac = self.mac();
        mac.update(encoded.as_bytes());
        mac.verify_slice(&provided)
            .map_err(|_| SessionError::InvalidSignature)?;

        let payload = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|_| SessionError::Malformed)?;
        let claims: SessionClaims =
            serde_json::from_slice(&payload).map_err(|_| SessionError::Malformed)?;

        Ok(claims.sub)
    }
}

impl std::fmt::Debug for SessionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSigner")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn signer() -> SessionSigner {
        SessionSigner::new(SecretString::from("k9!vR2#mQ8$wX4&nT7*bJ1^hL5@cF3%z"))
    }

    #[test]
    fn test_mint_verify_roundtrip() {
        let signer = signer();
        let token = signer.mint("subject-123");
        assert_eq!(signer.verify(&token).unwrap(), "subject-123");
    }

    #[test]
    fn test_repeated_mints_differ_but_both_verify() {
        let signer = signer();
        let a = signer.mint("subject-123");
        let b = signer.mint("subject-123");
        assert_ne!(a, b);
        assert_eq!(signer.verify(&a).unwrap(), "subject-123");
        assert_eq!(signer.verify(&b).unwrap(), "subject-123");
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let signer = signer();
        let token = signer.mint("subject-123");
        let (payload, sig) = token.split_once('.').unwrap();
        let forged = serde_json::json!({"sub": "someone-else", "iat": 0, "nonce": 0});
        let tampered = format!(
            "{}.{sig}",
            URL_SAFE_NO_PAD.encode(forged.to_string().as_bytes())
        );
        assert!(matches!(
            signer.verify(&tampered),
            Err(SessionError::InvalidSignature)
        ));
        // Keep the original valid
        assert!(signer.verify(&format!("{payload}.{sig}")).is_ok());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let token = signer().mint("subject-123");
        let other = SessionSigner::new(SecretString::from("z3%fC5@lH1^jB7*tN4&xW8$qM2#rV9!k"));
        assert!(matches!(
            other.verify(&token),
            Err(SessionError::InvalidSignature)
        ));
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(matches!(
            signer().verify("not-a-token"),
            Err(SessionError::Malformed)
        ));
    }
}
