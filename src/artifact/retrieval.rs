//! Conditional artifact retrieval and upload outcome mapping.
//!
//! Outcomes carry the decision, not HTTP detail: the transport layer maps
//! them to status codes (304 for `NotModified`, 200 with body for `Content`,
//! archive-then-200 for `NeedsArchiving`, 404 for `NotFound`; 201/200/403/
//! 400/500 on the upload side). Archive construction is the transport's job,
//! scoped to the request lifetime — the service itself never blocks on it.

#![allow(missing_docs)]

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifact::store::{ArtifactLocation, ArtifactStore};

// ──────────────────── multipart field names ────────────────────

/// Field name for a plain file upload.
pub const REGULAR_MULTIPART_FILENAME: &str = "file";
/// Field name for an archive upload that the server unpacks in place.
pub const ZIP_MULTIPART_FILENAME: &str = "zipfile";

/// Relative path of a job's console log, which gets a friendlier
/// not-found message than ordinary artifacts.
pub const CONSOLE_LOG_PATH: &str = "cruise-output/console.log";

// ──────────────────── outcomes ────────────────────

/// Decision for a GET of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetrievalOutcome {
    /// Client-supplied digest matches the stored content.
    NotModified,
    /// Serve the file's bytes with the inferred content type.
    Content {
        path: PathBuf,
        content_type: &'static str,
    },
    /// Aggregate artifact not yet materialized; the transport archives
    /// `source_dir` on demand.
    NeedsArchiving { source_dir: PathBuf },
    /// Nothing stored at the location.
    NotFound { path: String },
}

/// Decision for a PUT/POST of a new artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// File created (201).
    Created { path: String },
    /// Content appended to an existing file (200).
    Appended { path: String },
    /// Target path contains forbidden characters (403).
    Forbidden { path: String },
    /// Target exists and overwrite was not requested (403).
    AlreadyExists { path: String },
    /// Multipart payload lacks a recognized field name (400).
    InvalidRequest { reason: String },
    /// IO failure during write — distinct from the rejections above (500).
    SaveFailed { path: String },
}

// ──────────────────── service ────────────────────

/// Maps a stored artifact (or its absence) plus a client digest to a
/// retrieval decision, and upload attempts to upload outcomes.
#[derive(Debug, Clone)]
pub struct RetrievalService {
    store: ArtifactStore,
}

impl RetrievalService {
    #[must_use]
    pub fn new(store: ArtifactStore) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Resolve a GET.
    ///
    /// A digest-computation failure is treated as "content differs": stale
    /// content must never be silently served as unmodified.
    #[must_use]
    pub fn resolve(
        &self,
        location: &ArtifactLocation,
        client_digest: Option<&str>,
    ) -> RetrievalOutcome {
        let path = self.store.file_path(location);
        if !path.exists() {
            return RetrievalOutcome::NotFound {
                path: location.relative_path.clone(),
            };
        }

        if path.is_dir() {
            // An aggregate that has not been materialized as an archive yet.
            // Digest comparison is meaningless for a directory.
            return RetrievalOutcome::NeedsArchiving { source_dir: path };
        }

        if let Some(supplied) = client_digest
            && self
                .store
                .digest(location)
                .is_ok_and(|current| current == supplied)
        {
            return RetrievalOutcome::NotModified;
        }

        RetrievalOutcome::Content {
            content_type: content_type_for(&location.relative_path),
            path,
        }
    }

    /// Handle a POST creating a new artifact.
    #[must_use]
    pub fn handle_upload(
        &self,
        location: &ArtifactLocation,
        field_name: &str,
        bytes: &[u8],
        overwrite: bool,
    ) -> UploadOutcome {
        if field_name != REGULAR_MULTIPART_FILENAME && field_name != ZIP_MULTIPART_FILENAME {
            return UploadOutcome::InvalidRequest {
                reason: format!(
                    "multipart file must have name '{REGULAR_MULTIPART_FILENAME}' or \
                     '{ZIP_MULTIPART_FILENAME}' (unpacked automatically)"
                ),
            };
        }
        if location.has_forbidden_components() {
            return UploadOutcome::Forbidden {
                path: location.relative_path.clone(),
            };
        }
        if self.store.exists(location) && !overwrite {
            return UploadOutcome::AlreadyExists {
                path: location.relative_path.clone(),
            };
        }
        match self.store.write(location, bytes) {
            Ok(()) => UploadOutcome::Created {
                path: location.relative_path.clone(),
            },
            Err(e) => {
                eprintln!("[SPK-STORE] {e}");
                UploadOutcome::SaveFailed {
                    path: location.relative_path.clone(),
                }
            }
        }
    }

    /// Handle a PUT appending to an artifact (console log increments).
    #[must_use]
    pub fn handle_append(&self, location: &ArtifactLocation, bytes: &[u8]) -> UploadOutcome {
        if location.has_forbidden_components() {
            return UploadOutcome::Forbidden {
                path: location.relative_path.clone(),
            };
        }
        match self.store.append(location, bytes) {
            Ok(()) => UploadOutcome::Appended {
                path: location.relative_path.clone(),
            },
            Err(e) => {
                eprintln!("[SPK-STORE] {e}");
                UploadOutcome::SaveFailed {
                    path: location.relative_path.clone(),
                }
            }
        }
    }
}

// ──────────────────── presentation helpers ────────────────────

/// Not-found body for the transport layer. The console log gets a message
/// that explains where it went instead of a bare path.
#[must_use]
pub fn not_found_message(path: &str) -> String {
    if path == CONSOLE_LOG_PATH {
        "Console log for this job is unavailable as it may have been purged or deleted \
         externally."
            .to_string()
    } else {
        format!(
            "Artifact '{path}' is unavailable as it may have been purged or deleted externally."
        )
    }
}

/// Infer a response content type from the artifact's file extension.
#[must_use]
pub fn content_type_for(path: &str) -> &'static str {
    let extension = path.rsplit('.').next().unwrap_or_default();
    match extension {
        "zip" => "application/zip",
        "html" | "htm" => "text/html",
        "json" => "application/json",
        "xml" => "application/xml",
        "log" | "txt" => "text/plain; charset=utf-8",
        "png" => "image/png",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ──────────────────── tests ────────────────────
