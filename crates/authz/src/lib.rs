//! Static API-key guard.
//!
//! The guard holds the configured header name and key set. It is built once
//! at startup and shared by the HTTP middleware.

use bookshelf_kernel::settings::SecuritySettings;
use subtle::{Choice, ConstantTimeEq};
use thiserror::Error;

/// Reasons a request fails the API-key check.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("API key required")]
    MissingKey,
    #[error("Invalid API key")]
    InvalidKey,
}

#[derive(Debug, Clone)]
pub struct ApiKeyGuard {
    enabled: bool,
    header: String,
    keys: Vec<String>,
}

impl ApiKeyGuard {
    pub fn new(enabled: bool, header: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            enabled,
            header: header.into(),
            keys: keys.into_iter().filter(|key| !key.is_empty()).collect(),
        }
    }

    pub fn from_settings(settings: &SecuritySettings) -> Self {
        if settings.enable_api_key && settings.allowed_api_keys.is_empty() {
            tracing::warn!(
                target: "bookshelf-authz",
                "API key check enabled with no allowed keys; every guarded request will be rejected"
            );
        }
        Self::new(
            settings.enable_api_key,
            settings.api_key_header.clone(),
            settings.allowed_api_keys.clone(),
        )
    }

    /// A guard that lets every request through.
    pub fn disabled() -> Self {
        Self::new(false, "X-API-Key", Vec::new())
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Header the key is read from.
    pub fn header(&self) -> &str {
        &self.header
    }

    /// Check the value of the key header, if the request carried one.
    pub fn check(&self, presented: Option<&str>) -> Result<(), AuthzError> {
        if !self.enabled {
            return Ok(());
        }

        let presented = match presented {
            Some(key) if !key.is_empty() => key,
            _ => return Err(AuthzError::MissingKey),
        };

        // No early exit: every configured key is compared.
        let matched = self.keys.iter().fold(Choice::from(0), |matched, key| {
            matched | key.as_bytes().ct_eq(presented.as_bytes())
        });

        if bool::from(matched) {
            Ok(())
        } else {
            Err(AuthzError::InvalidKey)
        }
    }
}

/// First characters of a key, safe to write to logs.
pub fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(8).collect();
    format!("{prefix}...")
}
