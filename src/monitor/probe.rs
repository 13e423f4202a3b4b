//! Free-space probing behind a trait seam.
//!
//! The monitor owns the only probe call sites; nothing on the scheduling path
//! ever probes. Test doubles script their samples through the same trait.

use std::path::Path;

use crate::core::errors::Result;

const BYTES_PER_MB: u64 = 1024 * 1024;

/// Queries available free space for a storage root.
pub trait SpaceProbe: Send + Sync {
    /// Available space in megabytes at `path`.
    ///
    /// Fails with [`SpkError::Probe`](crate::core::errors::SpkError::Probe)
    /// when the path is unreadable. Callers treat that as transient.
    fn available_mb(&self, path: &Path) -> Result<u64>;
}

/// Production probe using `statvfs` on unix.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatvfsProbe;

impl StatvfsProbe {
    /// Construct the production probe.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SpaceProbe for StatvfsProbe {
    #[cfg(unix)]
    fn available_mb(&self, path: &Path) -> Result<u64> {
        let stat = nix::sys::statvfs::statvfs(path).map_err(|error| {
            crate::core::errors::SpkError::Probe {
                path: path.to_path_buf(),
                details: error.to_string(),
            }
        })?;
        // Available (unprivileged) blocks, not free blocks: the scheduler
        // cannot use root-reserved space.
        let bytes = stat.blocks_available().saturating_mul(stat.fragment_size());
        Ok(bytes / BYTES_PER_MB)
    }

    #[cfg(not(unix))]
    fn available_mb(&self, path: &Path) -> Result<u64> {
        Err(crate::core::errors::SpkError::Probe {
            path: path.to_path_buf(),
            details: "statvfs is unavailable on this platform".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn statvfs_probe_reports_space_for_tempdir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let probe = StatvfsProbe::new();
        // Any readable filesystem reports some figure; the exact value is
        // environment-dependent.
        let mb = probe.available_mb(dir.path()).expect("probe tempdir");
        assert!(mb < u64::MAX / BYTES_PER_MB);
    }

    #[cfg(unix)]
    #[test]
    fn statvfs_probe_fails_for_missing_path() {
        let probe = StatvfsProbe::new();
        let err = probe
            .available_mb(Path::new("/definitely/not/a/real/path"))
            .expect_err("missing path must fail");
        assert_eq!(err.code(), "SPK-2001");
        assert!(err.is_retryable());
    }
}
