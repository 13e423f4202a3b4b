//! Content-addressable-by-path artifact file store.
//!
//! Artifacts are write-once: a build uploads its outputs once and nothing
//! mutates them afterwards except external cleanup. Digests are therefore
//! safe to recompute concurrently for the same location; there is no shared
//! mutable artifact state.

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::errors::{Result, SpkError};

// ──────────────────── locations ────────────────────

/// Identifies the job a stored artifact belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobIdentifier {
    pub pipeline: String,
    pub pipeline_counter: u32,
    pub stage: String,
    pub stage_counter: u32,
    pub job: String,
}

impl JobIdentifier {
    #[must_use]
    pub fn new(
        pipeline: impl Into<String>,
        pipeline_counter: u32,
        stage: impl Into<String>,
        stage_counter: u32,
        job: impl Into<String>,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            pipeline_counter,
            stage: stage.into(),
            stage_counter,
            job: job.into(),
        }
    }

    /// Directory the job's artifacts live under, relative to the store root.
    #[must_use]
    pub fn artifact_locator(&self) -> PathBuf {
        PathBuf::from(&self.pipeline)
            .join(self.pipeline_counter.to_string())
            .join(&self.stage)
            .join(self.stage_counter.to_string())
            .join(&self.job)
    }
}

/// A stored file (or aggregate directory) within a job's artifact tree.
///
/// `zipped` marks an aggregate: serve the location as a directory archive
/// rather than a single file. Created at upload time, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactLocation {
    pub job: JobIdentifier,
    pub relative_path: String,
    pub zipped: bool,
}

impl ArtifactLocation {
    #[must_use]
    pub fn file(job: JobIdentifier, relative_path: impl Into<String>) -> Self {
        Self {
            job,
            relative_path: relative_path.into(),
            zipped: false,
        }
    }

    #[must_use]
    pub fn zipped(job: JobIdentifier, relative_path: impl Into<String>) -> Self {
        Self {
            job,
            relative_path: relative_path.into(),
            zipped: true,
        }
    }

    /// Whether the relative path tries to escape the job's artifact tree or
    /// smuggles characters the store refuses to write.
    #[must_use]
    pub fn has_forbidden_components(&self) -> bool {
        if self.relative_path.contains('\0') {
            return true;
        }
        Path::new(&self.relative_path).components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
    }
}

// ──────────────────── store ────────────────────

const DIGEST_BUF_SIZE: usize = 64 * 1024;

/// File storage rooted at the artifact repository directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of a location inside the store.
    #[must_use]
    pub fn file_path(&self, location: &ArtifactLocation) -> PathBuf {
        self.root
            .join(location.job.artifact_locator())
            .join(&location.relative_path)
    }

    /// Whether anything (file or aggregate directory) exists at the location.
    #[must_use]
    pub fn exists(&self, location: &ArtifactLocation) -> bool {
        self.file_path(location).exists()
    }

    /// Create the file with the given contents. Fails if the parent
    /// directories cannot be created or the write itself fails; existence
    /// checks are the caller's responsibility.
    pub fn write(&self, location: &ArtifactLocation, bytes: &[u8]) -> Result<()> {
        let path = self.file_path(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SpkError::store_io(parent, e))?;
        }
        let mut file = File::create(&path).map_err(|e| SpkError::store_io(&path, e))?;
        file.write_all(bytes)
            .map_err(|e| SpkError::store_io(&path, e))?;
        Ok(())
    }

    /// Append to an existing file, creating it if absent (console logs are
    /// uploaded in increments).
    pub fn append(&self, location: &ArtifactLocation, bytes: &[u8]) -> Result<()> {
        let path = self.file_path(location);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| SpkError::store_io(parent, e))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| SpkError::store_io(&path, e))?;
        file.write_all(bytes)
            .map_err(|e| SpkError::store_io(&path, e))?;
        Ok(())
    }

    /// Streamed SHA-256 digest of the stored file, lowercase hex.
    pub fn digest(&self, location: &ArtifactLocation) -> Result<String> {
        let path = self.file_path(location);
        let file = File::open(&path).map_err(|e| SpkError::digest(&path, e))?;
        let mut reader = BufReader::new(file);
        let mut hasher = Sha256::new();
        let mut buf = [0u8; DIGEST_BUF_SIZE];
        loop {
            let read = reader
                .read(&mut buf)
                .map_err(|e| SpkError::digest(&path, e))?;
            if read == 0 {
                break;
            }
            hasher.update(&buf[..read]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobIdentifier {
        JobIdentifier::new("distro", 42, "package", 1, "linux-x64")
    }

    fn store() -> (tempfile::TempDir, ArtifactStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ArtifactStore::new(dir.path());
        (dir, store)
    }

    #[test]
    fn locator_layout_matches_job_hierarchy() {
        let location = ArtifactLocation::file(job(), "dist/app.tar.gz");
        let (_dir, store) = store();
        let path = store.file_path(&location);
        assert!(
            path.ends_with("distro/42/package/1/linux-x64/dist/app.tar.gz"),
            "unexpected layout: {}",
            path.display()
        );
    }

    #[test]
    fn write_then_exists_and_digest() {
        let (_dir, store) = store();
        let location = ArtifactLocation::file(job(), "build.log");
        assert!(!store.exists(&location));
        store.write(&location, b"compiled ok\n").expect("write");
        assert!(store.exists(&location));

        let digest = store.digest(&location).expect("digest");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        // Digest is stable for unchanged content.
        assert_eq!(digest, store.digest(&location).expect("second digest"));
    }

    #[test]
    fn append_accumulates_content() {
        let (_dir, store) = store();
        let location = ArtifactLocation::file(job(), "cruise-output/console.log");
        store.append(&location, b"line one\n").expect("append 1");
        let first = store.digest(&location).expect("digest 1");
        store.append(&location, b"line two\n").expect("append 2");
        let second = store.digest(&location).expect("digest 2");
        assert_ne!(first, second);

        let content = std::fs::read_to_string(store.file_path(&location)).expect("read");
        assert_eq!(content, "line one\nline two\n");
    }

    #[test]
    fn digest_of_missing_file_is_digest_error() {
        let (_dir, store) = store();
        let location = ArtifactLocation::file(job(), "never-uploaded.bin");
        let err = store.digest(&location).expect_err("must fail");
        assert_eq!(err.code(), "SPK-2002");
        assert!(err.is_retryable());
    }

    #[test]
    fn traversal_components_are_forbidden() {
        assert!(ArtifactLocation::file(job(), "../etc/passwd").has_forbidden_components());
        assert!(ArtifactLocation::file(job(), "logs/../../escape").has_forbidden_components());
        assert!(ArtifactLocation::file(job(), "/etc/passwd").has_forbidden_components());
        assert!(ArtifactLocation::file(job(), "bad\0name").has_forbidden_components());
        assert!(!ArtifactLocation::file(job(), "dist/app.tar.gz").has_forbidden_components());
        assert!(!ArtifactLocation::file(job(), "dot.in.name.log").has_forbidden_components());
    }

    #[test]
    fn zipped_marker_distinguishes_aggregates() {
        let file = ArtifactLocation::file(job(), "report");
        let aggregate = ArtifactLocation::zipped(job(), "report");
        assert!(!file.zipped);
        assert!(aggregate.zipped);
        // Same path on disk either way; only the serving mode differs.
        let (_dir, store) = store();
        assert_eq!(store.file_path(&file), store.file_path(&aggregate));
    }
}
