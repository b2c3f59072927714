use loyalink_common::types::{TokenSnapshot, TokenUsage};
use loyalink_storage::codec::generate_token;
use loyalink_storage::{RegistrationStore, StorageError, TokenCodec};
use std::sync::Arc;

use super::error::RegistrationError;

type Result<T> = std::result::Result<T, RegistrationError>;

/// Token lifecycle: issue encrypted links, check them, and answer admin queries.
pub struct RegistrationService {
    store: Arc<RegistrationStore>,
    codec: Arc<TokenCodec>,
}

impl RegistrationService {
    pub fn new(store: Arc<RegistrationStore>, codec: Arc<TokenCodec>) -> Self {
        Self { store, codec }
    }

    pub fn store(&self) -> &Arc<RegistrationStore> {
        &self.store
    }

    /// Issues a fresh single-use link: `base_url` followed by the encrypted token.
    ///
    /// A token collision surfaces as [`RegistrationError::DuplicateToken`]
    /// and is left to the caller to retry.
    pub async fn issue_link(&self, base_url: &str) -> Result<String> {
        let token = generate_token();

        let registration = self.store.create(&token).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to store new registration token");
            match e {
                StorageError::DuplicateToken => RegistrationError::DuplicateToken,
                other => RegistrationError::Storage(other),
            }
        })?;

        let encrypted = self.codec.encrypt(&token).map_err(|e| {
            tracing::error!(registration_id = registration.id, error = %e, "Failed to encrypt token");
            RegistrationError::Codec(e)
        })?;

        tracing::info!(registration_id = registration.id, "Registration link issued");
        Ok(format!("{base_url}{encrypted}"))
    }

    /// Decrypts a link token and checks that it is issued and still unused.
    ///
    /// Returns the plaintext token. Never writes.
    pub async fn validate_and_decode(&self, encrypted: &str) -> Result<String> {
        let token = self.codec.decrypt(encrypted).map_err(|e| {
            tracing::warn!(error = %e, "Rejected undecryptable link token");
            RegistrationError::InvalidToken
        })?;

        match self.store.get_by_token(&token).await {
            Ok(registration) if registration.is_usable() => Ok(token),
            Ok(registration) => {
                tracing::warn!(registration_id = registration.id, "Rejected already used link token");
                Err(RegistrationError::InvalidOrUsedToken)
            }
            Err(StorageError::NotFound { .. }) => {
                tracing::warn!("Rejected never-issued link token");
                Err(RegistrationError::InvalidOrUsedToken)
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to look up link token");
                Err(RegistrationError::Storage(e))
            }
        }
    }

    pub async fn token_usage(&self, token: &str) -> Result<TokenUsage> {
        self.store.get_usage(token).await.map_err(|e| match e {
            StorageError::NotFound { .. } => RegistrationError::NotFound,
            other => {
                tracing::error!(error = %other, "Failed to load token usage");
                RegistrationError::Storage(other)
            }
        })
    }

    /// Used and unused tokens, split from a single read.
    pub async fn token_snapshot(&self) -> Result<TokenSnapshot> {
        Ok(self.store.snapshot().await?)
    }
}
