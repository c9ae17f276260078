use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const SEPARATOR: char = ':';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignatureError {
    #[error("signature does not match")]
    BadSignature,
    #[error("signature expired")]
    Expired,
    #[error("invalid signing key")]
    InvalidKey,
}

/// HMAC-SHA256 signer that binds a value to the time it was signed.
///
/// Token format: `value:timestamp:signature`, where the signature covers
/// `value:timestamp` and is URL-safe base64 without padding. Values may
/// themselves contain `:`.
#[derive(Clone)]
pub struct TimestampSigner {
    secret: Vec<u8>,
    salt: String,
}

impl TimestampSigner {
    pub fn new(secret: impl AsRef<[u8]>, salt: impl Into<String>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            salt: salt.into(),
        }
    }

    pub fn sign(&self, value: &str) -> Result<String, SignatureError> {
        self.sign_at(value, Utc::now().timestamp())
    }

    pub fn sign_at(&self, value: &str, timestamp: i64) -> Result<String, SignatureError> {
        let payload = format!("{}{}{}", value, SEPARATOR, timestamp);
        let signature = self.signature(&payload)?;
        Ok(format!("{}{}{}", payload, SEPARATOR, signature))
    }

    /// Verify a token and return the signed value.
    pub fn unsign(&self, token: &str, max_age: Duration) -> Result<String, SignatureError> {
        self.unsign_at(token, max_age, Utc::now().timestamp())
    }

    pub fn unsign_at(
        &self,
        token: &str,
        max_age: Duration,
        now: i64,
    ) -> Result<String, SignatureError> {
        let (payload, signature) = token
            .rsplit_once(SEPARATOR)
            .ok_or(SignatureError::BadSignature)?;

        let expected = self.signature(payload)?;
        if expected.len() != signature.len()
            || !bool::from(expected.as_bytes().ct_eq(signature.as_bytes()))
        {
            return Err(SignatureError::BadSignature);
        }

        let (value, timestamp) = payload
            .rsplit_once(SEPARATOR)
            .ok_or(SignatureError::BadSignature)?;
        let timestamp: i64 = timestamp
            .parse()
            .map_err(|_| SignatureError::BadSignature)?;

        if now - timestamp > max_age.num_seconds() {
            return Err(SignatureError::Expired);
        }

        Ok(value.to_string())
    }

    fn signature(&self, payload: &str) -> Result<String, SignatureError> {
        let mut mac =
            HmacSha256::new_from_slice(&self.secret).map_err(|_| SignatureError::InvalidKey)?;
        mac.update(self.salt.as_bytes());
        mac.update(b"|");
        mac.update(payload.as_bytes());
        Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> TimestampSigner {
        TimestampSigner::new("my_secret_key", "cartera.confirmation")
    }

    #[test]
    fn test_sign_and_unsign() {
        let token = signer().sign_at("lote:42", 1_700_000_000).unwrap();
        let value = signer()
            .unsign_at(&token, Duration::days(7), 1_700_000_100)
            .unwrap();
        assert_eq!(value, "lote:42");
    }

    #[test]
    fn test_expired_token() {
        let token = signer().sign_at("17", 1_700_000_000).unwrap();
        let later = 1_700_000_000 + Duration::days(8).num_seconds();
        assert_eq!(
            signer().unsign_at(&token, Duration::days(7), later),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn test_tampered_value() {
        let token = signer().sign_at("17", 1_700_000_000).unwrap();
        let tampered = token.replacen("17", "18", 1);
        assert_eq!(
            signer().unsign_at(&tampered, Duration::days(7), 1_700_000_000),
            Err(SignatureError::BadSignature)
        );
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = signer().sign_at("17", 1_700_000_000).unwrap();
        let other = TimestampSigner::new("another_secret", "cartera.confirmation");
        assert_eq!(
            other.unsign_at(&token, Duration::days(7), 1_700_000_000),
            Err(SignatureError::BadSignature)
        );
    }

    #[test]
    fn test_malformed_token() {
        assert_eq!(
            signer().unsign_at("garbage", Duration::days(7), 0),
            Err(SignatureError::BadSignature)
        );
        assert_eq!(
            signer().unsign_at("", Duration::days(7), 0),
            Err(SignatureError::BadSignature)
        );
    }
}
