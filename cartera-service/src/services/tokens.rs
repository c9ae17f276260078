//! Signed confirmation links sent to suppliers.

use chrono::Duration;
use service_core::error::AppError;
use service_core::utils::{SignatureError, TimestampSigner};
use thiserror::Error;

use crate::config::MAX_CONFIRMATION_AGE_DAYS;

const SALT: &str = "cartera.payment-confirmation";

/// What a confirmation link confirms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationSubject {
    Payment(i64),
    Batch(i64),
}

impl ConfirmationSubject {
    fn encode(&self) -> String {
        match self {
            ConfirmationSubject::Payment(id) => format!("pago:{}", id),
            ConfirmationSubject::Batch(id) => format!("lote:{}", id),
        }
    }

    fn decode(value: &str) -> Option<Self> {
        let (kind, id) = value.split_once(':')?;
        if id.is_empty() || !id.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let id = id.parse().ok()?;
        match kind {
            "pago" => Some(ConfirmationSubject::Payment(id)),
            "lote" => Some(ConfirmationSubject::Batch(id)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token_expirado")]
    Expired,
    #[error("token_invalido")]
    Invalid,
}

impl From<TokenError> for AppError {
    fn from(_: TokenError) -> Self {
        AppError::bad_request("The link is not valid or has expired")
    }
}

#[derive(Clone)]
pub struct ConfirmationTokens {
    signer: TimestampSigner,
    max_age: Duration,
}

impl ConfirmationTokens {
    pub fn new(secret: &str, max_age_days: i64) -> Self {
        Self {
            signer: TimestampSigner::new(secret, SALT),
            max_age: Duration::days(max_age_days.clamp(1, MAX_CONFIRMATION_AGE_DAYS)),
        }
    }

    pub fn sign(&self, subject: ConfirmationSubject) -> Result<String, AppError> {
        self.signer.sign(&subject.encode()).map_err(|e| {
            AppError::InternalError(anyhow::anyhow!("Failed to sign confirmation token: {}", e))
        })
    }

    pub fn sign_at(
        &self,
        subject: ConfirmationSubject,
        timestamp: i64,
    ) -> Result<String, AppError> {
        self.signer
            .sign_at(&subject.encode(), timestamp)
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!(
                    "Failed to sign confirmation token: {}",
                    e
                ))
            })
    }

    pub fn verify_payment(&self, token: &str) -> Result<i64, TokenError> {
        match self.verify(token)? {
            ConfirmationSubject::Payment(id) => Ok(id),
            ConfirmationSubject::Batch(_) => Err(TokenError::Invalid),
        }
    }

    pub fn verify_batch(&self, token: &str) -> Result<i64, TokenError> {
        match self.verify(token)? {
            ConfirmationSubject::Batch(id) => Ok(id),
            ConfirmationSubject::Payment(_) => Err(TokenError::Invalid),
        }
    }

    fn verify(&self, token: &str) -> Result<ConfirmationSubject, TokenError> {
        let value = self
            .signer
            .unsign(token, self.max_age)
            .map_err(|e| match e {
                SignatureError::Expired => TokenError::Expired,
                SignatureError::BadSignature | SignatureError::InvalidKey => TokenError::Invalid,
            })?;
        ConfirmationSubject::decode(&value).ok_or(TokenError::Invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn tokens() -> ConfirmationTokens {
        ConfirmationTokens::new("test-signing-secret", 7)
    }

    #[test]
    fn payment_token_round_trips() {
        let token = tokens().sign(ConfirmationSubject::Payment(41)).unwrap();
        assert_eq!(tokens().verify_payment(&token), Ok(41));
    }

    #[test]
    fn batch_token_is_not_a_payment_token() {
        let token = tokens().sign(ConfirmationSubject::Batch(3)).unwrap();
        assert_eq!(tokens().verify_batch(&token), Ok(3));
        assert_eq!(tokens().verify_payment(&token), Err(TokenError::Invalid));

        let token = tokens().sign(ConfirmationSubject::Payment(3)).unwrap();
        assert_eq!(tokens().verify_batch(&token), Err(TokenError::Invalid));
    }

    #[test]
    fn week_old_token_expires() {
        let eight_days_ago = Utc::now().timestamp() - Duration::days(8).num_seconds();
        let token = tokens()
            .sign_at(ConfirmationSubject::Payment(9), eight_days_ago)
            .unwrap();
        assert_eq!(tokens().verify_payment(&token), Err(TokenError::Expired));
    }

    #[test]
    fn out_of_range_max_age_is_clamped() {
        let tokens = ConfirmationTokens::new("test-signing-secret", i64::MAX);
        let token = tokens.sign(ConfirmationSubject::Payment(5)).unwrap();
        assert_eq!(tokens.verify_payment(&token), Ok(5));

        let tokens = ConfirmationTokens::new("test-signing-secret", i64::MIN);
        let token = tokens.sign(ConfirmationSubject::Payment(5)).unwrap();
        assert_eq!(tokens.verify_payment(&token), Ok(5));
    }

    #[test]
    fn garbage_is_invalid() {
        assert_eq!(tokens().verify_payment("pago:1"), Err(TokenError::Invalid));
        assert_eq!(
            tokens().verify_payment("pago:1:123:abc"),
            Err(TokenError::Invalid)
        );
    }
}
