use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use cvr_core::{ServiceConfig, StrategyKind};
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Server configuration, loaded from TOML. Every field has a default.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub strategy: StrategyKind,
    /// Directory of the filesystem payload store. In-memory when unset.
    pub payload_dir: Option<PathBuf>,
    /// Path of the record log. In-memory when unset.
    pub records_path: Option<PathBuf>,
    pub io_timeout_ms: u64,
    pub default_page_limit: usize,
    pub max_page_limit: usize,
    pub conflict_retries: u32,
    pub pin_payloads: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let service = ServiceConfig::default();
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            strategy: StrategyKind::Embedded,
            payload_dir: None,
            records_path: None,
            io_timeout_ms: service.io_timeout.as_millis() as u64,
            default_page_limit: service.default_page_limit,
            max_page_limit: service.max_page_limit,
            conflict_retries: service.conflict_retries,
            pin_payloads: service.pin_payloads,
        }
    }
}

impl ServerConfig {
    /// Read a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ServerError::Config(format!("reading {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> ServerResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| ServerError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ServerResult<String> {
        toml::to_string_pretty(self).map_err(|e| ServerError::Config(e.to_string()))
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.io_timeout_ms == 0 {
            return Err(ServerError::Config("io_timeout_ms must be positive".into()));
        }
        if self.max_page_limit == 0 {
            return Err(ServerError::Config("max_page_limit must be positive".into()));
        }
        if self.default_page_limit > self.max_page_limit {
            return Err(ServerError::Config(format!(
                "default_page_limit ({}) exceeds max_page_limit ({})",
                self.default_page_limit, self.max_page_limit
            )));
        }
        Ok(())
    }

    /// Settings handed to the deployment service.
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            io_timeout: Duration::from_millis(self.io_timeout_ms),
            conflict_retries: self.conflict_retries,
            pin_payloads: self.pin_payloads,
            default_page_limit: self.default_page_limit,
            max_page_limit: self.max_page_limit,
            ..ServiceConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = ServerConfig::default();
        assert_eq!(c.bind_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(c.strategy, StrategyKind::Embedded);
        assert!(c.payload_dir.is_none());
        assert!(c.records_path.is_none());
        assert_eq!(c.io_timeout_ms, 5_000);
        assert!(c.validate().is_ok());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let c = ServerConfig::from_toml_str(
            r#"
            bind_addr = "0.0.0.0:9000"
            strategy = "content_addressed"
            payload_dir = "/var/lib/cvr/payloads"
            "#,
        )
        .unwrap();
        assert_eq!(c.bind_addr.port(), 9000);
        assert_eq!(c.strategy, StrategyKind::ContentAddressed);
        assert_eq!(c.payload_dir, Some(PathBuf::from("/var/lib/cvr/payloads")));
        assert_eq!(c.max_page_limit, 100);
    }

    #[test]
    fn rejects_unknown_strategy() {
        let err = ServerConfig::from_toml_str("strategy = \"ipfs\"").unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn rejects_inconsistent_page_limits() {
        let err = ServerConfig::from_toml_str("default_page_limit = 500").unwrap_err();
        assert!(err.to_string().contains("default_page_limit"));
    }

    #[test]
    fn toml_roundtrip() {
        let c = ServerConfig {
            records_path: Some(PathBuf::from("records.jsonl")),
            conflict_retries: 7,
            ..ServerConfig::default()
        };
        let text = c.to_toml_string().unwrap();
        assert_eq!(ServerConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cvr.toml");
        std::fs::write(&path, "io_timeout_ms = 250\npin_payloads = false\n").unwrap();
        let c = ServerConfig::load(&path).unwrap();
        let service = c.service_config();
        assert_eq!(service.io_timeout, Duration::from_millis(250));
        assert!(!service.pin_payloads);

        assert!(ServerConfig::load(dir.path().join("missing.toml")).is_err());
    }
}
