//! Bearer token sources.
//!
//! The auth collaborator owns the credential; these sources only read it.
//! Every send asks again, so a rotated token is picked up on the next call.

use async_trait::async_trait;
use smsdash_core::config::{ApiConfig, expand_path};
use smsdash_core::error::DeliveryError;
use smsdash_core::traits::TokenSource;
use std::path::PathBuf;
use std::sync::Arc;

/// A fixed token from configuration.
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn bearer_token(&self) -> Result<String, DeliveryError> {
        if self.0.trim().is_empty() {
            return Err(DeliveryError::Auth("no API token configured".into()));
        }
        Ok(self.0.trim().to_string())
    }
}

/// A token file maintained by an external login process.
pub struct FileToken {
    path: PathBuf,
}

impl FileToken {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenSource for FileToken {
    async fn bearer_token(&self) -> Result<String, DeliveryError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DeliveryError::Auth(format!("cannot read {}: {e}", self.path.display()))
        })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(DeliveryError::Auth(format!(
                "token file {} is empty",
                self.path.display()
            )));
        }
        Ok(token.to_string())
    }
}

/// A token read from an environment variable at call time.
pub struct EnvToken {
    var: String,
}

impl EnvToken {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl TokenSource for EnvToken {
    async fn bearer_token(&self) -> Result<String, DeliveryError> {
        std::env::var(&self.var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| DeliveryError::Auth(format!("{} is not set", self.var)))
    }
}

/// Pick the token source for the send endpoint: a token file wins over a
/// token environment variable, which wins over a static token.
pub fn token_source_from_config(api: &ApiConfig) -> Arc<dyn TokenSource> {
    if !api.token_file.trim().is_empty() {
        Arc::new(FileToken::new(expand_path(api.token_file.trim())))
    } else if !api.token_env.trim().is_empty() {
        Arc::new(EnvToken::new(api.token_env.trim()))
    } else {
        Arc::new(StaticToken::new(api.token.clone()))
    }
}
