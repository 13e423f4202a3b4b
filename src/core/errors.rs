//! SPK-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SpkError>;

/// Top-level error type for spacekeeper.
#[derive(Debug, Error)]
pub enum SpkError {
    #[error("[SPK-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SPK-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SPK-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SPK-2001] space probe failure for {path}: {details}")]
    Probe { path: PathBuf, details: String },

    #[error("[SPK-2002] digest failure for {path}: {source}")]
    Digest {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SPK-2003] artifact store IO failure at {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SPK-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SPK-3001] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[SPK-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SpkError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SPK-1001",
            Self::MissingConfig { .. } => "SPK-1002",
            Self::ConfigParse { .. } => "SPK-1003",
            Self::Probe { .. } => "SPK-2001",
            Self::Digest { .. } => "SPK-2002",
            Self::StoreIo { .. } => "SPK-2003",
            Self::Serialization { .. } => "SPK-2101",
            Self::ChannelClosed { .. } => "SPK-3001",
            Self::Runtime { .. } => "SPK-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    ///
    /// Probe and digest failures are transient by contract: the monitor retries
    /// on its next tick, and a digest failure downgrades to "content differs".
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Probe { .. }
                | Self::Digest { .. }
                | Self::StoreIo { .. }
                | Self::ChannelClosed { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for store IO errors with a known path.
    #[must_use]
    pub fn store_io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::StoreIo {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for digest failures with a known path.
    #[must_use]
    pub fn digest(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Digest {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for SpkError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SpkError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
