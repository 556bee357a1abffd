use std::collections::HashMap;

use super::{ProviderError, SecretStore};

/// Reads secrets from environment variables named by the key.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecretStore;

impl SecretStore for EnvSecretStore {
    fn get(&self, key: &str) -> Result<String, ProviderError> {
        match std::env::var(key) {
            Ok(v) if !v.is_empty() => Ok(v),
            _ => Err(ProviderError::NotFound(format!("secret {key}"))),
        }
    }
}

/// Fixed set of secrets, for tests and local runs.
#[derive(Debug, Default, Clone)]
pub struct StaticSecretStore {
    secrets: HashMap<String, String>,
}

impl StaticSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(key.into(), value.into());
        self
    }
}

impl SecretStore for StaticSecretStore {
    fn get(&self, key: &str) -> Result<String, ProviderError> {
        self.secrets
            .get(key)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("secret {key}")))
    }
}
