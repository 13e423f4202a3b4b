//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use spacekeeper::prelude::*;
//! ```

// Core
pub use crate::core::config::{Config, StorageKind, StorageRoot};
pub use crate::core::errors::{Result, SpkError};

// Health
pub use crate::health::{HealthCondition, HealthLevel, HealthRegistry, HealthStateType};

// Monitor
pub use crate::monitor::threshold::ServerIdentity;
pub use crate::monitor::{AdmissionFlags, SpaceProbe, StatvfsProbe, ThresholdMonitor};

// Scheduling
pub use crate::scheduling::{
    DiskSpaceAdmissionCheck, ManualApprovalCheck, OperationResult, SchedulingCheck, run_checks,
};

// Artifacts
pub use crate::artifact::retrieval::{RetrievalOutcome, RetrievalService, UploadOutcome};
pub use crate::artifact::store::{ArtifactLocation, ArtifactStore, JobIdentifier};

// Notifications
pub use crate::notify::{DraftedMessage, MailSink, NullMailSink};
