//! Credential store for bearer and refresh tokens
//!
//! The host platform owns the real secure storage (keychain, keystore, ...).
//! The queue only ever talks to it through [`CredentialStore`], so any
//! `get/set/delete(key)` capability can sit behind it. [`KvCredentialStore`]
//! is the sled-backed implementation used by desktop hosts and tests.

use async_trait::async_trait;
use thiserror::Error;

use crate::kv::{KvError, KvStore};

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "umilax_access_token_v1";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "umilax_refresh_token_v1";

/// Credential store error types
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Underlying storage failure
    #[error("Credential storage error: {0}")]
    Storage(#[from] KvError),

    /// Platform secure storage rejected the operation
    #[error("Secure storage unavailable: {0}")]
    Unavailable(String),
}

/// Result type for credential operations
pub type Result<T> = std::result::Result<T, CredentialError>;

/// Holder of the current access and refresh tokens
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Persist a new access token, and the refresh token when one is given.
    ///
    /// Passing `None` for `refresh` leaves the stored refresh token untouched.
    async fn save_tokens(&self, access: &str, refresh: Option<&str>) -> Result<()>;

    /// Current access token, if any
    async fn access_token(&self) -> Result<Option<String>>;

    /// Current refresh token, if any
    async fn refresh_token(&self) -> Result<Option<String>>;

    /// Delete both tokens
    async fn clear_tokens(&self) -> Result<()>;
}

/// Credential store backed by the key-value store
#[derive(Clone)]
pub struct KvCredentialStore {
    kv: KvStore,
}

impl KvCredentialStore {
    /// Create a credential store on top of an existing key-value store
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl CredentialStore for KvCredentialStore {
    async fn save_tokens(&self, access: &str, refresh: Option<&str>) -> Result<()> {
        self.kv.set(ACCESS_TOKEN_KEY, &access)?;
        if let Some(refresh) = refresh {
            self.kv.set(REFRESH_TOKEN_KEY, &refresh)?;
        }
        Ok(())
    }

    async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.kv.get(ACCESS_TOKEN_KEY)?)
    }

    async fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.kv.get(REFRESH_TOKEN_KEY)?)
    }

    async fn clear_tokens(&self) -> Result<()> {
        self.kv.remove(ACCESS_TOKEN_KEY)?;
        self.kv.remove(REFRESH_TOKEN_KEY)?;
        tracing::debug!("cleared stored credentials");
        Ok(())
    }
}
