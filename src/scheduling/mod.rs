//! Scheduling admission checks: structural outcomes, never exceptions.
//!
//! Every check records success, warning, or error into a shared
//! [`OperationResult`] accumulator. The caller runs the full chain and
//! branches on the accumulated severity afterwards; no check can abort the
//! chain or throw past it. Checks sit on the critical scheduling path, so
//! they read in-memory state only — the disk-space check consults the
//! monitor's cached flag, never the disk.

#![allow(missing_docs)]

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::config::StorageKind;
use crate::health::{HealthLevel, HealthRegistry, HealthScope, HealthStateType};
use crate::monitor::threshold::AdmissionFlags;

// ──────────────────── operation result ────────────────────

/// Accumulating outcome for a chain of scheduling checks.
///
/// Severity is the maximum across all recorded outcomes. The headline
/// message is "first error wins": the first ERROR recorded keeps its message
/// even if later checks also fail; with no errors, the first warning holds
/// the headline.
#[derive(Debug, Clone, Default)]
pub struct OperationResult {
    level: HealthLevel,
    message: Option<String>,
    description: Option<String>,
    state: Option<HealthStateType>,
}

impl OperationResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful check. Does not lower an already-raised severity.
    pub fn success(&mut self, state: HealthStateType) {
        if self.state.is_none() {
            self.state = Some(state);
        }
    }

    /// Record a warning. Keeps an earlier warning's headline.
    pub fn warning(
        &mut self,
        message: impl Into<String>,
        description: impl Into<String>,
        state: HealthStateType,
    ) {
        if self.level < HealthLevel::Warning {
            self.level = HealthLevel::Warning;
            self.message = Some(message.into());
            self.description = Some(description.into());
            self.state = Some(state);
        }
    }

    /// Record an error. The first error's headline is final.
    pub fn error(
        &mut self,
        message: impl Into<String>,
        description: impl Into<String>,
        state: HealthStateType,
    ) {
        if self.level < HealthLevel::Error {
            self.level = HealthLevel::Error;
            self.message = Some(message.into());
            self.description = Some(description.into());
            self.state = Some(state);
        }
    }

    /// Accumulated severity across the chain so far.
    #[must_use]
    pub fn level(&self) -> HealthLevel {
        self.level
    }

    /// Whether the scheduler may proceed with the unit of work.
    #[must_use]
    pub fn can_continue(&self) -> bool {
        self.level != HealthLevel::Error
    }

    /// Headline message of the worst outcome, if any check raised one.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Longer explanation accompanying the headline.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// State key of the headline outcome.
    #[must_use]
    pub fn state(&self) -> Option<&HealthStateType> {
        self.state.as_ref()
    }
}

// ──────────────────── check protocol ────────────────────

/// A predicate evaluated before a pipeline run is scheduled.
pub trait SchedulingCheck: Send + Sync {
    /// Record this check's outcome into `result`.
    fn check(&self, result: &mut OperationResult);
}

/// Run a chain of checks in order. Order never changes the final severity
/// (checks are independent); it only decides which message surfaces first.
pub fn run_checks(checks: &[&dyn SchedulingCheck], result: &mut OperationResult) {
    for check in checks {
        check.check(result);
    }
}

// ──────────────────── pipeline trigger inputs ────────────────────

/// How the scheduling request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerMode {
    Automatic,
    Manual,
}

/// The slice of pipeline configuration the admission checks need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    /// Whether the pipeline's first stage requires manual approval.
    pub first_stage_manual_approval: bool,
}

impl PipelineConfig {
    #[must_use]
    pub fn new(name: impl Into<String>, first_stage_manual_approval: bool) -> Self {
        Self {
            name: name.into(),
            first_stage_manual_approval,
        }
    }
}

// ──────────────────── manual-approval gate ────────────────────

/// Rejects automatic triggering of pipelines whose first stage is manual.
pub struct ManualApprovalCheck {
    pipeline: PipelineConfig,
    trigger: TriggerMode,
}

impl ManualApprovalCheck {
    #[must_use]
    pub fn new(pipeline: PipelineConfig, trigger: TriggerMode) -> Self {
        Self { pipeline, trigger }
    }
}

impl SchedulingCheck for ManualApprovalCheck {
    fn check(&self, result: &mut OperationResult) {
        let state =
            HealthStateType::general(HealthScope::Pipeline(self.pipeline.name.clone()));
        if self.pipeline.first_stage_manual_approval && self.trigger == TriggerMode::Automatic {
            result.error(
                format!("Failed to trigger pipeline [{}]", self.pipeline.name),
                format!(
                    "The first stage of pipeline \"{}\" requires manual approval",
                    self.pipeline.name
                ),
                state,
            );
        } else {
            result.success(state);
        }
    }
}

// ──────────────────── disk-space gate ────────────────────

/// Rejects scheduling while the monitor holds a storage kind full.
///
/// Consults the health registry first and the cached admission flag second;
/// no free-space probe ever runs here. The monitor's flag is authoritative
/// for the admission path.
pub struct DiskSpaceAdmissionCheck {
    kind: StorageKind,
    registry: Arc<HealthRegistry>,
    flags: Arc<AdmissionFlags>,
}

impl DiskSpaceAdmissionCheck {
    #[must_use]
    pub fn new(kind: StorageKind, registry: Arc<HealthRegistry>, flags: Arc<AdmissionFlags>) -> Self {
        Self {
            kind,
            registry,
            flags,
        }
    }

    /// The gate for the artifact repository, the one every pipeline trigger
    /// runs through.
    #[must_use]
    pub fn artifacts(registry: Arc<HealthRegistry>, flags: Arc<AdmissionFlags>) -> Self {
        Self::new(StorageKind::Artifacts, registry, flags)
    }
}

impl SchedulingCheck for DiskSpaceAdmissionCheck {
    fn check(&self, result: &mut OperationResult) {
        let state = HealthStateType::disk_full(self.kind);
        if self.registry.contains_error(&state) || !self.flags.is_admitted(self.kind) {
            result.error(
                format!("Failed to schedule: {} storage is full", self.kind),
                format!(
                    "Scheduling has been stopped because the {} storage location is out of \
                     disk space. Free space at the configured location to resume.",
                    self.kind
                ),
                state,
            );
        } else {
            result.success(state);
        }
    }
}

// ──────────────────── tests ────────────────────
