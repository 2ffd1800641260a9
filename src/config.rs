// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Process-wide configuration surface (§6) loaded once at startup and
//! passed by value to the components that need it (§9: "Process-wide
//! defaults live in an immutable configuration record injected at
//! startup").

use crate::error::{DocbaseError, DocbaseResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// The configuration surface a host reads before wiring up the core
/// (§6). Field names are camelCase on the wire and in `docbase.toml`
/// alike.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocbaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_concurrent_connections: usize,
    #[serde(default = "default_max_cache_items")]
    pub max_cache_item_count: usize,
    #[serde(default = "default_max_cache_bytes")]
    pub max_cache_size_in_bytes: usize,
    #[serde(default = "default_cache_ttl_millis")]
    pub default_cache_ttl_milliseconds: u64,
    #[serde(default = "default_storage_path")]
    pub storage_path: String,
    #[serde(default)]
    pub require_authentication: bool,
    #[serde(default)]
    pub master_password: Option<String>,
    #[serde(default = "default_cache_timeout_minutes")]
    pub cache_timeout_minutes: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    7700
}
fn default_max_connections() -> usize {
    256
}
fn default_max_cache_items() -> usize {
    10_000
}
fn default_max_cache_bytes() -> usize {
    64 * 1024 * 1024
}
fn default_cache_ttl_millis() -> u64 {
    300_000
}
fn default_storage_path() -> String {
    "./data".to_string()
}
fn default_cache_timeout_minutes() -> u64 {
    5
}

impl Default for DocbaseConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_concurrent_connections: default_max_connections(),
            max_cache_item_count: default_max_cache_items(),
            max_cache_size_in_bytes: default_max_cache_bytes(),
            default_cache_ttl_milliseconds: default_cache_ttl_millis(),
            storage_path: default_storage_path(),
            require_authentication: false,
            master_password: None,
            cache_timeout_minutes: default_cache_timeout_minutes(),
        }
    }
}

impl DocbaseConfig {
    /// Parses a `docbase.toml`-shaped string.
    pub fn from_toml_str(content: &str) -> DocbaseResult<Self> {
        let config: DocbaseConfig = toml::from_str(content).map_err(|e| DocbaseError::ConfigInvalid {
            reason: format!("malformed configuration: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates configuration from a TOML file on disk.
    pub fn load_from_path(path: &Path) -> DocbaseResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| DocbaseError::IoError {
            operation: format!("read_config({})", path.display()),
            reason: e.to_string(),
        })?;
        Self::from_toml_str(&content)
    }

    /// Validates cross-field constraints not expressible via `serde`
    /// defaults.
    pub fn validate(&self) -> DocbaseResult<()> {
        if self.host.trim().is_empty() {
            return Err(DocbaseError::ConfigInvalid {
                reason: "host must not be empty".to_string(),
            });
        }
        if self.storage_path.trim().is_empty() {
            return Err(DocbaseError::ConfigInvalid {
                reason: "storagePath must not be empty".to_string(),
            });
        }
        if self.max_concurrent_connections == 0 {
            return Err(DocbaseError::ConfigInvalid {
                reason: "maxConcurrentConnections must be at least 1".to_string(),
            });
        }
        if self.require_authentication && self.master_password.as_deref().unwrap_or("").is_empty() {
            return Err(DocbaseError::ConfigInvalid {
                reason: "masterPassword is required when requireAuthentication is set".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let config = DocbaseConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config = DocbaseConfig::from_toml_str("port = 9000\n").unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.host, default_host());
    }

    #[test]
    fn rejects_auth_required_without_master_password() {
        let toml = "requireAuthentication = true\n";
        let err = DocbaseConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, DocbaseError::ConfigInvalid { .. }));
    }

    #[test]
    fn rejects_empty_host() {
        let config = DocbaseConfig { host: "  ".to_string(), ..DocbaseConfig::default() };
        assert!(config.validate().is_err());
    }
}
