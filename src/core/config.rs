//! Configuration system: TOML file + env var overrides + validated defaults.
//!
//! Threshold limits are consumed here as already-resolved values; persisting
//! or editing them belongs to the server's admin surface, not this subsystem.

#![allow(missing_docs)]

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::errors::{Result, SpkError};

// ──────────────────── storage kinds and roots ────────────────────

/// The two monitored storage classes: build artifacts and persisted metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageKind {
    Artifacts,
    Metadata,
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Artifacts => write!(f, "artifacts"),
            Self::Metadata => write!(f, "metadata"),
        }
    }
}

/// A monitored filesystem location with its warning and full limits.
///
/// Immutable once built from configuration. Invariant: `full_limit_mb <=
/// warning_limit_mb` — the warning fires first as space shrinks, the full
/// limit is crossed later and stops scheduling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRoot {
    pub kind: StorageKind,
    pub path: PathBuf,
    pub warning_limit_mb: u64,
    pub full_limit_mb: u64,
}

impl StorageRoot {
    pub fn new(
        kind: StorageKind,
        path: impl Into<PathBuf>,
        warning_limit_mb: u64,
        full_limit_mb: u64,
    ) -> Result<Self> {
        if full_limit_mb > warning_limit_mb {
            return Err(SpkError::InvalidConfig {
                details: format!(
                    "{kind}: full_limit_mb ({full_limit_mb}) must not exceed \
                     warning_limit_mb ({warning_limit_mb})"
                ),
            });
        }
        Ok(Self {
            kind,
            path: path.into(),
            warning_limit_mb,
            full_limit_mb,
        })
    }
}

// ──────────────────── configuration model ────────────────────

/// Full spacekeeper configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
#[derive(Default)]
pub struct Config {
    pub storage: StorageConfig,
    pub monitor: MonitorConfig,
    pub server: ServerConfig,
}

/// Per-kind storage blocks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    pub artifacts: StorageRootConfig,
    pub metadata: StorageRootConfig,
}

/// One monitored location and its limits.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageRootConfig {
    pub path: PathBuf,
    pub warning_limit_mb: u64,
    pub full_limit_mb: u64,
}

/// Monitor loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
}

/// Server identity and operator contact, used when drafting notifications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address/IP identity string embedded in notification bodies.
    pub host_id: String,
    /// Administrator recipient for drafted notifications.
    pub admin_email: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            artifacts: StorageRootConfig {
                path: PathBuf::from("/var/lib/ci/artifacts"),
                warning_limit_mb: 1_000,
                full_limit_mb: 100,
            },
            metadata: StorageRootConfig {
                path: PathBuf::from("/var/lib/ci/db"),
                warning_limit_mb: 1_000,
                full_limit_mb: 100,
            },
        }
    }
}

impl Default for StorageRootConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            warning_limit_mb: 1_000,
            full_limit_mb: 100,
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host_id: "127.0.0.1".to_string(),
            admin_email: String::new(),
        }
    }
}

// ──────────────────── loading and validation ────────────────────

impl Config {
    /// Load from a TOML file, apply env overrides, validate.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SpkError::MissingConfig {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|e| SpkError::ConfigParse {
            context: "config file read",
            details: format!("{}: {e}", path.display()),
        })?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load from the given path if present; otherwise fall back to defaults
    /// (still env-overridden and validated).
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            let mut config = Self::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }

    /// Env overrides take precedence over file values. Only the identity and
    /// interval knobs are overridable; limits come from the file alone.
    fn apply_env_overrides(&mut self) {
        if let Ok(host) = env::var("SPACEKEEPER_HOST_ID")
            && !host.is_empty()
        {
            self.server.host_id = host;
        }
        if let Ok(email) = env::var("SPACEKEEPER_ADMIN_EMAIL")
            && !email.is_empty()
        {
            self.server.admin_email = email;
        }
        if let Ok(interval) = env::var("SPACEKEEPER_POLL_INTERVAL_MS")
            && let Ok(ms) = interval.parse::<u64>()
        {
            self.monitor.poll_interval_ms = ms;
        }
    }

    /// Reject configurations that would make the threshold machine nonsensical.
    pub fn validate(&self) -> Result<()> {
        if self.monitor.poll_interval_ms == 0 {
            return Err(SpkError::InvalidConfig {
                details: "monitor.poll_interval_ms must be greater than zero".to_string(),
            });
        }
        // Construction enforces full <= warning per root.
        self.storage_roots().map(|_| ())
    }

    /// Build the immutable [`StorageRoot`] pair the monitor iterates over.
    pub fn storage_roots(&self) -> Result<Vec<StorageRoot>> {
        Ok(vec![
            StorageRoot::new(
                StorageKind::Artifacts,
                self.storage.artifacts.path.clone(),
                self.storage.artifacts.warning_limit_mb,
                self.storage.artifacts.full_limit_mb,
            )?,
            StorageRoot::new(
                StorageKind::Metadata,
                self.storage.metadata.path.clone(),
                self.storage.metadata.warning_limit_mb,
                self.storage.metadata.full_limit_mb,
            )?,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        let roots = config.storage_roots().expect("default roots");
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].kind, StorageKind::Artifacts);
        assert_eq!(roots[1].kind, StorageKind::Metadata);
    }

    #[test]
    fn full_limit_above_warning_is_rejected() {
        let err = StorageRoot::new(StorageKind::Artifacts, "/tmp/a", 100, 500)
            .expect_err("inverted limits must fail");
        assert_eq!(err.code(), "SPK-1001");
        assert!(err.to_string().contains("full_limit_mb"));
    }

    #[test]
    fn equal_limits_are_allowed() {
        let root =
            StorageRoot::new(StorageKind::Metadata, "/tmp/db", 200, 200).expect("equal limits ok");
        assert_eq!(root.warning_limit_mb, root.full_limit_mb);
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = Config::default();
        config.monitor.poll_interval_ms = 0;
        let err = config.validate().expect_err("zero interval must fail");
        assert_eq!(err.code(), "SPK-1001");
    }

    #[test]
    fn toml_round_trip() {
        let config = Config::default();
        let raw = toml::to_string(&config).expect("serialize");
        let parsed: Config = toml::from_str(&raw).expect("parse");
        assert_eq!(config, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let raw = r#"
            [storage.artifacts]
            path = "/data/artifacts"
            warning_limit_mb = 500
            full_limit_mb = 50

            [server]
            admin_email = "ops@example.com"
        "#;
        let parsed: Config = toml::from_str(raw).expect("parse");
        assert_eq!(parsed.storage.artifacts.warning_limit_mb, 500);
        assert_eq!(parsed.storage.artifacts.full_limit_mb, 50);
        assert_eq!(parsed.server.admin_email, "ops@example.com");
        // Untouched sections keep defaults.
        assert_eq!(parsed.monitor.poll_interval_ms, 5_000);
        assert_eq!(parsed.storage.metadata.warning_limit_mb, 1_000);
    }

    #[test]
    fn load_missing_file_fails_with_code() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Config::load(&dir.path().join("nope.toml")).expect_err("must fail");
        assert_eq!(err.code(), "SPK-1002");
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config::load_or_default(&dir.path().join("nope.toml")).expect("defaults");
        assert_eq!(config.monitor.poll_interval_ms, 5_000);
    }

    #[test]
    fn load_parses_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("spacekeeper.toml");
        std::fs::write(
            &path,
            r#"
                [monitor]
                poll_interval_ms = 250

                [server]
                host_id = "10.0.0.5"
            "#,
        )
        .expect("write config");
        let config = Config::load(&path).expect("load");
        assert_eq!(config.monitor.poll_interval_ms, 250);
        assert_eq!(config.server.host_id, "10.0.0.5");
    }
}
