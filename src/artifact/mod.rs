//! Artifact storage and conditional retrieval.

pub mod retrieval;
pub mod store;

pub use retrieval::{RetrievalOutcome, RetrievalService, UploadOutcome};
pub use store::{ArtifactLocation, ArtifactStore, JobIdentifier};
