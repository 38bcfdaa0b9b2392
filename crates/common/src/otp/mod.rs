//! One-time verification codes
//!
//! A six digit code is issued per e-mail address and verifies exactly once
//! before its TTL runs out. Only the SHA-256 hash of the code is stored.

mod store;

pub use store::{MemoryOtpStore, OtpStore, RedisOtpStore};

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use rand::Rng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use validator::Validate;

/// Failed verifications tolerated per issued code
pub const MAX_ATTEMPTS: u64 = 5;

/// Hands an issued code to the user
#[async_trait]
pub trait CodeDelivery: Send + Sync {
    async fn deliver(&self, email: &str, code: &str) -> Result<()>;
}

/// Delivery that only records the issue; mail transport lives elsewhere
pub struct LogDelivery;

#[async_trait]
impl CodeDelivery for LogDelivery {
    async fn deliver(&self, email: &str, _code: &str) -> Result<()> {
        tracing::info!(email = %email, "Verification code issued");
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SendCodeRequest {
    #[serde(default)]
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct VerifyCodeRequest {
    #[serde(default)]
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(equal = 6, message = "Code must be 6 digits"))]
    pub otp: String,
}

/// Issues and verifies one-time codes
#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    delivery: Arc<dyn CodeDelivery>,
    ttl: Duration,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>, delivery: Arc<dyn CodeDelivery>, ttl: Duration) -> Self {
        Self {
            store,
            delivery,
            ttl,
        }
    }

    /// Issue a fresh code for an address, replacing any previous one
    pub async fn issue(&self, request: SendCodeRequest) -> Result<()> {
        request.validate()?;
        let email = normalize(&request.email);

        let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
        self.store.put(&email, &hash_code(&code), self.ttl).await?;
        self.delivery.deliver(&email, &code).await
    }

    /// Verify and consume a code. After `MAX_ATTEMPTS` misses the code is
    /// discarded and a new one must be issued.
    pub async fn verify(&self, request: VerifyCodeRequest) -> Result<()> {
        request.validate()?;
        let email = normalize(&request.email);

        if self
            .store
            .take_if_matches(&email, &hash_code(request.otp.trim()))
            .await?
        {
            tracing::info!(email = %email, "Verification code accepted");
            return Ok(());
        }

        let misses = self.store.record_miss(&email, self.ttl).await?;
        if misses >= MAX_ATTEMPTS {
            self.store.remove(&email).await?;
            tracing::warn!(
                email = %email,
                misses,
                "Verification code discarded after repeated failures"
            );
        } else {
            tracing::debug!(email = %email, misses, "Verification code rejected");
        }
        Err(invalid_code())
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}

fn normalize(email: &str) -> String {
    email.trim().to_lowercase()
}

fn invalid_code() -> AppError {
    AppError::validation("Invalid or expired code")
}

/// Hex SHA-256 of a code
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingDelivery {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CodeDelivery for RecordingDelivery {
        async fn deliver(&self, email: &str, code: &str) -> Result<()> {
            self.sent.lock().await.push((email.to_string(), code.to_string()));
            Ok(())
        }
    }

    fn service(ttl: Duration) -> (OtpService, Arc<RecordingDelivery>) {
        let delivery = Arc::new(RecordingDelivery::default());
        let service = OtpService::new(Arc::new(MemoryOtpStore::new()), delivery.clone(), ttl);
        (service, delivery)
    }

    async fn last_code(delivery: &RecordingDelivery) -> String {
        delivery.sent.lock().await.last().map(|(_, c)| c.clone()).unwrap()
    }

    fn verify_request(email: &str, otp: &str) -> VerifyCodeRequest {
        VerifyCodeRequest {
            email: email.into(),
            otp: otp.into(),
        }
    }

    #[test]
    fn test_hash_code() {
        assert_eq!(hash_code("123456"), hash_code("123456"));
        assert_ne!(hash_code("123456"), hash_code("654321"));
        assert_eq!(hash_code("123456").len(), 64);
    }

    #[tokio::test]
    async fn test_code_verifies_once() {
        let (service, delivery) = service(Duration::from_secs(300));
        service
            .issue(SendCodeRequest { email: "Reader@Example.com".into() })
            .await
            .unwrap();

        let code = last_code(&delivery).await;
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        assert!(service.verify(verify_request("reader@example.com", &code)).await.is_ok());
        assert!(service.verify(verify_request("reader@example.com", &code)).await.is_err());
    }

    #[tokio::test]
    async fn test_wrong_code_rejected() {
        let (service, delivery) = service(Duration::from_secs(300));
        service
            .issue(SendCodeRequest { email: "a@example.com".into() })
            .await
            .unwrap();
        let code = last_code(&delivery).await;
        let wrong = if code == "000000" { "111111" } else { "000000" };

        let err = service.verify(verify_request("a@example.com", wrong)).await.unwrap_err();
        assert!(err.to_string().contains("Invalid or expired code"));
        // the right code still works afterwards
        assert!(service.verify(verify_request("a@example.com", &code)).await.is_ok());
    }

    #[tokio::test]
    async fn test_code_discarded_after_max_attempts() {
        let (service, delivery) = service(Duration::from_secs(300));
        service
            .issue(SendCodeRequest { email: "a@example.com".into() })
            .await
            .unwrap();
        let code = last_code(&delivery).await;
        let wrong = if code == "000000" { "111111" } else { "000000" };

        for _ in 0..MAX_ATTEMPTS {
            assert!(service.verify(verify_request("a@example.com", wrong)).await.is_err());
        }
        assert!(service.verify(verify_request("a@example.com", &code)).await.is_err());

        // a fresh code starts a fresh count
        service
            .issue(SendCodeRequest { email: "a@example.com".into() })
            .await
            .unwrap();
        let code = last_code(&delivery).await;
        let wrong = if code == "000000" { "111111" } else { "000000" };
        for _ in 0..MAX_ATTEMPTS - 1 {
            assert!(service.verify(verify_request("a@example.com", wrong)).await.is_err());
        }
        assert!(service.verify(verify_request("a@example.com", &code)).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_verify_accepts_once() {
        let (service, delivery) = service(Duration::from_secs(300));
        service
            .issue(SendCodeRequest { email: "a@example.com".into() })
            .await
            .unwrap();
        let code = last_code(&delivery).await;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                let request = verify_request("a@example.com", &code);
                tokio::spawn(async move { service.verify(request).await.is_ok() })
            })
            .collect();

        let mut accepted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn test_expired_code_rejected() {
        let (service, delivery) = service(Duration::from_millis(30));
        service
            .issue(SendCodeRequest { email: "a@example.com".into() })
            .await
            .unwrap();
        let code = last_code(&delivery).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(service.verify(verify_request("a@example.com", &code)).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let (service, delivery) = service(Duration::from_secs(300));
        let err = service
            .issue(SendCodeRequest { email: "not-an-email".into() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(delivery.sent.lock().await.is_empty());
    }
}
