use std::sync::atomic::{AtomicI64, Ordering};

use argon2::{Algorithm, Argon2, Params, Version};
use axum::async_trait;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::utils::crypto::{hash_password_with, token_digest};
use crate::utils::token::{format_plain_token, generate_token_secret, TOKEN_SECRET_LENGTH};

/// Name recorded against tokens issued at registration.
pub const REGISTRATION_TOKEN_NAME: &str = "api_token";

/// Password hashing and access-token issuance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialService: Send + Sync {
    /// One-way hash of `plain`, salted per call.
    async fn hash_password(&self, plain: &str) -> Result<String>;

    /// Issues a new token for `user_id` and returns its plain-text form.
    /// Only a digest of the secret is kept.
    async fn issue_token(&self, user_id: i64) -> Result<String>;
}

async fn hash_blocking(argon2: Argon2<'static>, plain: &str) -> Result<String> {
    let plain = plain.to_string();
    tokio::task::spawn_blocking(move || hash_password_with(&argon2, &plain))
        .await?
        .map_err(|e| Error::Internal(format!("password hashing failed: {}", e)))
}

#[derive(Clone)]
pub struct PgCredentialService {
    pool: PgPool,
}

impl PgCredentialService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialService for PgCredentialService {
    async fn hash_password(&self, plain: &str) -> Result<String> {
        hash_blocking(Argon2::default(), plain).await
    }

    async fn issue_token(&self, user_id: i64) -> Result<String> {
        let secret = generate_token_secret(TOKEN_SECRET_LENGTH);
        let token_id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO personal_access_tokens (user_id, name, token)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(REGISTRATION_TOKEN_NAME)
        .bind(token_digest(&secret))
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(user_id, token_id, "issued access token");
        Ok(format_plain_token(token_id, &secret))
    }
}

/// Credentials kept in process, hashed with minimal Argon2 cost. Issued
/// tokens are numbered but not stored.
pub struct MemoryCredentialService {
    argon2: Argon2<'static>,
    next_token_id: AtomicI64,
}

impl MemoryCredentialService {
    pub fn new() -> Result<Self> {
        let params = Params::new(Params::MIN_M_COST, 1, 1, None)
            .map_err(|e| Error::Internal(format!("argon2 params: {}", e)))?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
            next_token_id: AtomicI64::new(1),
        })
    }
}

#[async_trait]
impl CredentialService for MemoryCredentialService {
    async fn hash_password(&self, plain: &str) -> Result<String> {
        hash_blocking(self.argon2.clone(), plain).await
    }

    async fn issue_token(&self, user_id: i64) -> Result<String> {
        let secret = generate_token_secret(TOKEN_SECRET_LENGTH);
        let id = self.next_token_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(user_id, token_id = id, "issued in-memory access token");
        Ok(format_plain_token(id, &secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::crypto::verify_password;

    #[tokio::test]
    async fn memory_hashes_verify() {
        let service = MemoryCredentialService::new().unwrap();
        let hash = service.hash_password("secret123").await.unwrap();
        assert!(verify_password("secret123", &hash).unwrap());
        assert_ne!(hash, "secret123");
    }

    #[tokio::test]
    async fn issued_tokens_are_numbered_with_fresh_secrets() {
        let service = MemoryCredentialService::new().unwrap();
        let first = service.issue_token(7).await.unwrap();
        let second = service.issue_token(7).await.unwrap();

        let (first_id, first_secret) = first.split_once('|').unwrap();
        let (second_id, second_secret) = second.split_once('|').unwrap();
        assert_eq!((first_id, second_id), ("1", "2"));
        assert_eq!(first_secret.len(), TOKEN_SECRET_LENGTH);
        assert!(first_secret.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(first_secret, second_secret);
    }
}
