//! Configuration module for Consignr
//!
//! Handles loading and parsing of YAML configuration files with support for
//! environment variable expansion and comprehensive validation.

use crate::keys::Purpose;
use crate::policy::Constraints;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Default lifetime of an issued capability, in seconds
pub const DEFAULT_CAPABILITY_TTL_SECS: u64 = 300;

/// Default deadline for one transfer attempt, in seconds
pub const DEFAULT_TRANSFER_TIMEOUT_SECS: u64 = 60;

/// Validate that a URL starts with http:// or https://
fn is_valid_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        ConfigLoader::load(path)
    }

    /// Constraint set the upload section describes
    pub fn constraints(&self) -> Constraints {
        Constraints::new(
            self.upload.max_size_bytes,
            self.upload.allowed_mime_prefixes.clone(),
        )
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.address.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "Invalid server address '{}'",
                self.server.address
            )));
        }

        if self.storage.bucket.trim().is_empty() {
            return Err(ConfigError::ValidationError("Bucket cannot be empty".into()));
        }
        if self.storage.region.trim().is_empty() {
            return Err(ConfigError::ValidationError("Region cannot be empty".into()));
        }
        if let Some(ref endpoint) = self.storage.endpoint {
            if !is_valid_http_url(endpoint) {
                return Err(ConfigError::ValidationError(
                    "Invalid endpoint: must start with http:// or https://".into(),
                ));
            }
        }

        if self.upload.max_size_bytes <= 0 {
            return Err(ConfigError::ValidationError(
                "max_size_bytes must be positive".into(),
            ));
        }
        if self.upload.capability_ttl_secs == 0 {
            return Err(ConfigError::ValidationError(
                "capability_ttl_secs must be positive".into(),
            ));
        }
        if self.upload.transfer_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "transfer_timeout_secs must be positive".into(),
            ));
        }
        if self.upload.allowed_mime_prefixes.iter().any(|p| p.is_empty()) {
            return Err(ConfigError::ValidationError(
                "allowed_mime_prefixes entries cannot be empty".into(),
            ));
        }
        for purpose in &self.upload.allowed_purposes {
            if let Err(e) = Purpose::parse(purpose) {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid purpose '{}': {}",
                    purpose, e
                )));
            }
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_address")]
    pub address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: default_server_address(),
        }
    }
}

fn default_server_address() -> String {
    "0.0.0.0:8080".to_string()
}

/// Storage provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Endpoint override for S3-compatible providers (MinIO, Ceph RGW)
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
}

/// Upload policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: i64,
    /// Accepted MIME type prefixes; empty means any type
    #[serde(default)]
    pub allowed_mime_prefixes: Vec<String>,
    /// Purposes subjects may upload for; empty means any purpose
    #[serde(default)]
    pub allowed_purposes: Vec<String>,
    #[serde(default = "default_capability_ttl_secs")]
    pub capability_ttl_secs: u64,
    #[serde(default = "default_transfer_timeout_secs")]
    pub transfer_timeout_secs: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: default_max_size_bytes(),
            allowed_mime_prefixes: Vec::new(),
            allowed_purposes: Vec::new(),
            capability_ttl_secs: default_capability_ttl_secs(),
            transfer_timeout_secs: default_transfer_timeout_secs(),
        }
    }
}

fn default_max_size_bytes() -> i64 {
    10485760 // 10MB
}

fn default_capability_ttl_secs() -> u64 {
    DEFAULT_CAPABILITY_TTL_SECS
}

fn default_transfer_timeout_secs() -> u64 {
    DEFAULT_TRANSFER_TIMEOUT_SECS
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_port() -> u16 {
    9090
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        Config {
            server: ServerConfig::default(),
            storage: StorageConfig {
                bucket: "uploads".into(),
                region: "us-east-1".into(),
                endpoint: None,
                access_key: None,
                secret_key: None,
            },
            upload: UploadConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    #[test]
    fn test_upload_defaults() {
        let config = UploadConfig::default();
        assert_eq!(config.max_size_bytes, 10485760);
        assert!(config.allowed_mime_prefixes.is_empty());
        assert!(config.allowed_purposes.is_empty());
        assert_eq!(config.capability_ttl_secs, 300);
        assert_eq!(config.transfer_timeout_secs, 60);
    }

    #[test]
    fn test_minimal_yaml_parses_with_defaults() {
        let yaml = r#"
storage:
  bucket: "uploads"
  region: "us-east-1"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.address, "0.0.0.0:8080");
        assert_eq!(config.upload.max_size_bytes, 10485760);
        assert!(config.metrics.enabled);
        assert_eq!(config.metrics.port, 9090);
    }

    #[test]
    fn test_constraints_come_from_upload_section() {
        let mut config = minimal_config();
        config.upload.max_size_bytes = 2048;
        config.upload.allowed_mime_prefixes = vec!["image/".into(), "video/".into()];

        let constraints = config.constraints();
        assert_eq!(constraints.max_size_bytes, 2048);
        assert_eq!(constraints.allowed_mime_prefixes.len(), 2);
    }

    #[test]
    fn test_validation_rejects_empty_bucket() {
        let mut config = minimal_config();
        config.storage.bucket = "".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_address() {
        let mut config = minimal_config();
        config.server.address = "not-an-address".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_bad_endpoint() {
        let mut config = minimal_config();
        config.storage.endpoint = Some("minio:9000".into());
        assert!(config.validate().is_err());

        config.storage.endpoint = Some("http://minio:9000".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_nonpositive_limits() {
        let mut config = minimal_config();
        config.upload.max_size_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = minimal_config();
        config.upload.capability_ttl_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_malformed_purpose() {
        let mut config = minimal_config();
        config.upload.allowed_purposes = vec!["avatar".into(), "Not Valid".into()];
        assert!(config.validate().is_err());
    }
}
