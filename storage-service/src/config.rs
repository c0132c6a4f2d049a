// SPDX-License-Identifier: GPL-3.0-only

//! Service configuration
//!
//! Read from a TOML file. Every key is optional; a missing file means
//! all defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, ServiceError};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/openlmi/storage/storage.toml";

/// Lifetime of a transient setting that nobody refreshes.
pub const DEFAULT_TRANSIENT_LIFETIME_SECS: u64 = 3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Read-only store with administrator supplied settings.
    pub preconfigured_dir: PathBuf,
    /// Read-write store with persistent settings.
    pub persistent_dir: PathBuf,
    /// Namespace prefix of allocated setting IDs.
    pub id_prefix: String,
    pub transient_lifetime_secs: u64,
    /// Highest ID suffix `allocate_id` may hand out.
    pub max_id: Option<u64>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            preconfigured_dir: PathBuf::from("/etc/openlmi/storage/settings"),
            persistent_dir: PathBuf::from("/var/lib/openlmi-storage/settings"),
            id_prefix: "LMI".to_string(),
            transient_lifetime_secs: DEFAULT_TRANSIENT_LIFETIME_SECS,
            max_id: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from `path`, falling back to defaults when the
    /// file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Configuration {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| ServiceError::Config(format!("{}: {}", path.display(), e)))?;
        debug!("Loaded configuration from {:?}: {:?}", path, config);
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ServiceError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.id_prefix.is_empty() || self.id_prefix.contains(':') {
            return Err(ServiceError::Config(format!(
                "id_prefix must be non-empty and must not contain ':' (got {:?})",
                self.id_prefix
            )));
        }
        if self.transient_lifetime_secs == 0 {
            return Err(ServiceError::Config(
                "transient_lifetime_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn transient_lifetime(&self) -> Duration {
        Duration::from_secs(self.transient_lifetime_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let config = ServiceConfig::from_toml("").expect("parse empty config");
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.transient_lifetime(), Duration::from_secs(3600));
    }

    #[test]
    fn overrides_are_applied() {
        let config = ServiceConfig::from_toml(
            r#"
            persistent_dir = "/tmp/settings"
            id_prefix = "TEST"
            max_id = 10
            "#,
        )
        .expect("parse config");
        assert_eq!(config.persistent_dir, PathBuf::from("/tmp/settings"));
        assert_eq!(config.id_prefix, "TEST");
        assert_eq!(config.max_id, Some(10));
        assert_eq!(
            config.preconfigured_dir,
            PathBuf::from("/etc/openlmi/storage/settings")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = ServiceConfig::from_toml("persistent_path = \"/x\"").expect_err("unknown key");
        assert!(matches!(err, ServiceError::Config(_)));
    }

    #[test]
    fn prefix_with_separator_is_rejected() {
        assert!(ServiceConfig::from_toml("id_prefix = \"A:B\"").is_err());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config =
            ServiceConfig::load(Path::new("/not/existing/storage.toml")).expect("load defaults");
        assert_eq!(config, ServiceConfig::default());
    }
}
