//! Configuration loading traits and types.
//!
//! Standardized TOML configuration loading for the btpm daemon and tools.
//!
//! # TOML Example
//!
//! ```toml
//! [shared]
//! log_level = "debug"
//! service_name = "btpm-dev"
//!
//! [pbap]
//! server_port = 19
//! service_name = "Phonebook Access PSE"
//! require_authorization = true
//!
//! [hfp]
//! server_port = 3
//! ```

use crate::flags::IncomingPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

/// Common configuration fields shared across btpm binaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl SharedConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Per-profile server endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileServerConfig {
    /// RFCOMM/OBEX server port to advertise.
    pub server_port: u8,

    /// Service name placed in the SDP record.
    #[serde(default)]
    pub service_name: String,

    /// Require explicit client authorization for inbound opens.
    #[serde(default)]
    pub require_authorization: bool,

    /// Require link authentication for inbound opens.
    #[serde(default)]
    pub require_authentication: bool,

    /// Require link encryption for inbound opens.
    #[serde(default)]
    pub require_encryption: bool,
}

impl ProfileServerConfig {
    /// Map the boolean policy fields onto the policy bitflags.
    pub fn incoming_policy(&self) -> IncomingPolicy {
        let mut policy = IncomingPolicy::empty();
        if self.require_authorization {
            policy.insert(IncomingPolicy::REQUIRE_AUTHORIZATION);
        }
        if self.require_authentication {
            policy.insert(IncomingPolicy::REQUIRE_AUTHENTICATION);
        }
        if self.require_encryption {
            policy.insert(IncomingPolicy::REQUIRE_ENCRYPTION);
        }
        policy
    }

    /// Validate port range and names.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server_port == 0 {
            return Err(ConfigError::ValidationError(
                "server_port must be nonzero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    pub shared: SharedConfig,

    /// Phone Book Access server endpoint (optional).
    pub pbap: Option<ProfileServerConfig>,

    /// Hands-Free server endpoint (optional).
    pub hfp: Option<ProfileServerConfig>,
}

impl DaemonConfig {
    /// Validate all sections.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;
        if let Some(pbap) = &self.pbap {
            pbap.validate()?;
        }
        if let Some(hfp) = &self.hfp {
            hfp.validate()?;
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
/// - Returns `ConfigError::ValidationError` if semantic validation fails
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn shared_config_validation() {
        let ok = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "btpm".to_string(),
        };
        assert!(ok.validate().is_ok());

        let bad = SharedConfig {
            log_level: LogLevel::Info,
            service_name: String::new(),
        };
        assert!(matches!(bad.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn profile_server_policy_mapping() {
        let cfg = ProfileServerConfig {
            server_port: 19,
            service_name: "PSE".to_string(),
            require_authorization: true,
            require_authentication: false,
            require_encryption: true,
        };
        let policy = cfg.incoming_policy();
        assert!(policy.contains(IncomingPolicy::REQUIRE_AUTHORIZATION));
        assert!(!policy.contains(IncomingPolicy::REQUIRE_AUTHENTICATION));
        assert!(policy.contains(IncomingPolicy::REQUIRE_ENCRYPTION));
    }

    #[test]
    fn profile_server_port_zero_rejected() {
        let cfg = ProfileServerConfig {
            server_port: 0,
            service_name: String::new(),
            require_authorization: false,
            require_authentication: false,
            require_encryption: false,
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn daemon_config_loads_from_toml() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[shared]
log_level = "debug"
service_name = "btpm-dev"

[pbap]
server_port = 19
service_name = "Phonebook Access PSE"
require_authorization = true
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = DaemonConfig::load(file.path()).unwrap();
        config.validate().unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.pbap.as_ref().unwrap().server_port, 19);
        assert!(config.hfp.is_none());
    }

    #[test]
    fn config_loader_file_not_found() {
        let result = DaemonConfig::load(Path::new("/nonexistent/btpm.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();
        let result = DaemonConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
