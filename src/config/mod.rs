use crate::Result;
use crate::error::ConfigError;
use crate::readiness::ReadinessPolicy;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "DEVNET_CONFIG";

/// Upper bound on create+start attempts when host ports collide
pub const DEFAULT_PORT_RETRY_LIMIT: u32 = 5;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub engine: EngineSettings,
    pub port_retry_limit: u32,
    pub readiness: ReadinessSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// `docker` or `podman`
    pub binary: String,
    pub network_driver: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ReadinessSettings {
    pub attempts: u32,
    pub attempt_timeout_ms: u64,
    pub interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
    pub json: bool,
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            port_retry_limit: DEFAULT_PORT_RETRY_LIMIT,
            readiness: ReadinessSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            network_driver: "bridge".to_string(),
        }
    }
}

impl Default for ReadinessSettings {
    fn default() -> Self {
        Self {
            attempts: 100,
            attempt_timeout_ms: 1000,
            interval_ms: 1000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ReadinessSettings {
    pub fn policy(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            attempts: self.attempts,
            attempt_timeout: Duration::from_millis(self.attempt_timeout_ms),
            interval: Duration::from_millis(self.interval_ms),
        }
    }
}

impl FixtureConfig {
    /// Load configuration from `$DEVNET_CONFIG` or the user config dir,
    /// falling back to defaults when no file exists.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            debug!("No config file at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn default_path() -> PathBuf {
        if let Ok(explicit) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(explicit);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("devnet")
            .join("config.toml")
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {:?}", path))?;
        let config: FixtureConfig = toml::from_str(&content)?;
        config.validate()?;

        info!("📄 Loaded fixture config from {:?}", path);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.engine.binary.trim().is_empty() {
            return Err(invalid("engine.binary", "must not be empty"));
        }
        if self.port_retry_limit == 0 {
            return Err(invalid("port_retry_limit", "must be at least 1"));
        }
        if self.readiness.attempts == 0 {
            return Err(invalid("readiness.attempts", "must be at least 1"));
        }
        if self.readiness.attempt_timeout_ms == 0 {
            return Err(invalid("readiness.attempt_timeout_ms", "must be positive"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> crate::FixtureError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_match_probe_constants() {
        let config = FixtureConfig::default();
        let policy = config.readiness.policy();
        assert_eq!(policy.attempts, 100);
        assert_eq!(policy.attempt_timeout, Duration::from_secs(1));
        assert_eq!(policy.interval, Duration::from_secs(1));
        assert_eq!(config.port_retry_limit, DEFAULT_PORT_RETRY_LIMIT);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "port_retry_limit = 3\n[engine]\nbinary = \"podman\"\n[readiness]\ninterval_ms = 250"
        )
        .unwrap();

        let config = FixtureConfig::load_from(file.path()).unwrap();
        assert_eq!(config.port_retry_limit, 3);
        assert_eq!(config.engine.binary, "podman");
        assert_eq!(config.engine.network_driver, "bridge");
        assert_eq!(config.readiness.interval_ms, 250);
        assert_eq!(config.readiness.attempts, 100);
    }

    #[test]
    fn test_rejects_zero_retry_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port_retry_limit = 0").unwrap();

        let err = FixtureConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(
            err,
            crate::FixtureError::Config(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FixtureConfig::load_from(dir.path().join("nope.toml")).unwrap_err();
        assert!(matches!(
            err,
            crate::FixtureError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
