//! Threshold state machine: free-space samples against warning/full limits,
//! edge-triggered operator notifications, and the admission flags that gate
//! scheduling.
//!
//! Three states per storage root: OK, WARNING, FULL. Severity escalates on the
//! same condition key as space shrinks; notifications fire only on state
//! transitions, never per tick (an operator gets exactly one alert per
//! transition, not one per poll while the disk stays full).

#![allow(missing_docs)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::config::{StorageKind, StorageRoot};
use crate::core::errors::Result;
use crate::health::{HealthCondition, HealthLevel, HealthRegistry, HealthStateType};
use crate::monitor::probe::SpaceProbe;
use crate::notify::{self, DraftedMessage, MailSink};

// ──────────────────── admission flags ────────────────────

/// Per-kind "scheduling permitted" flags.
///
/// Written exclusively by [`ThresholdMonitor`]; read by every scheduling
/// check. This pair of booleans is the sole coupling between the monitor and
/// the scheduler — the admission path never probes the disk itself.
#[derive(Debug)]
pub struct AdmissionFlags {
    artifacts: AtomicBool,
    metadata: AtomicBool,
}

impl Default for AdmissionFlags {
    fn default() -> Self {
        Self {
            artifacts: AtomicBool::new(true),
            metadata: AtomicBool::new(true),
        }
    }
}

impl AdmissionFlags {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, kind: StorageKind) -> &AtomicBool {
        match kind {
            StorageKind::Artifacts => &self.artifacts,
            StorageKind::Metadata => &self.metadata,
        }
    }

    /// Whether new work may be scheduled against this storage kind.
    #[must_use]
    pub fn is_admitted(&self, kind: StorageKind) -> bool {
        self.flag(kind).load(Ordering::SeqCst)
    }

    pub(crate) fn set_admitted(&self, kind: StorageKind, admitted: bool) {
        self.flag(kind).store(admitted, Ordering::SeqCst);
    }
}

// ──────────────────── identity for drafting ────────────────────

/// Host identity and operator contact, threaded into drafted notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerIdentity {
    pub host_id: String,
    pub admin_email: String,
}

// ──────────────────── threshold monitor ────────────────────

/// Periodic free-space check for every configured storage root.
///
/// One parameterized monitor covers both storage kinds; the notification
/// drafter pair is selected per kind, so no per-kind subtype is needed.
pub struct ThresholdMonitor {
    probe: Arc<dyn SpaceProbe>,
    registry: Arc<HealthRegistry>,
    flags: Arc<AdmissionFlags>,
    identity: ServerIdentity,
    sink: Arc<dyn MailSink>,
}

impl ThresholdMonitor {
    #[must_use]
    pub fn new(
        probe: Arc<dyn SpaceProbe>,
        registry: Arc<HealthRegistry>,
        flags: Arc<AdmissionFlags>,
        identity: ServerIdentity,
        sink: Arc<dyn MailSink>,
    ) -> Self {
        Self {
            probe,
            registry,
            flags,
            identity,
            sink,
        }
    }

    /// Run one check for a storage root.
    ///
    /// Returns the condition now active for the root's `disk_full` key. A
    /// probe failure is returned as `Err` without touching the admission flag
    /// or the registry; the caller logs it and retries next tick — probing
    /// must never crash the monitor loop.
    pub fn check(&self, root: &StorageRoot) -> Result<HealthCondition> {
        self.sample(root).map(|(_, condition)| condition)
    }

    /// Like [`check`](Self::check), but also returns the probed free-space
    /// figure for callers that log it.
    pub fn sample(&self, root: &StorageRoot) -> Result<(u64, HealthCondition)> {
        let free_mb = self.probe.available_mb(&root.path)?;
        Ok((free_mb, self.apply_sample(root, free_mb)))
    }

    /// Advance the state machine with an already-probed sample.
    pub fn apply_sample(&self, root: &StorageRoot, free_mb: u64) -> HealthCondition {
        let state = HealthStateType::disk_full(root.kind);
        let previous = self.registry.level_of(&state);

        if free_mb < root.full_limit_mb {
            return self.enter_full(root, &state, previous, free_mb);
        }
        if free_mb < root.warning_limit_mb {
            return self.enter_warning(root, &state, previous, free_mb);
        }
        self.recover(root, &state)
    }

    fn enter_full(
        &self,
        root: &StorageRoot,
        state: &HealthStateType,
        previous: HealthLevel,
        free_mb: u64,
    ) -> HealthCondition {
        self.flags.set_admitted(root.kind, false);
        let condition = HealthCondition::new(
            state.clone(),
            HealthLevel::Error,
            match root.kind {
                StorageKind::Artifacts => "No artifact disk space, scheduling stopped",
                StorageKind::Metadata => "No disk space for data, scheduling stopped",
            },
            format!(
                "The server has only {free_mb}Mb available at {} (full limit {}Mb)",
                root.path.display(),
                root.full_limit_mb
            ),
        );
        self.registry.record(condition.clone());

        // Edge-triggered: consecutive full ticks draft exactly one alert.
        if previous != HealthLevel::Error {
            self.dispatch(self.draft_full(root.kind, &root.path, root.full_limit_mb));
        }
        condition
    }

    fn enter_warning(
        &self,
        root: &StorageRoot,
        state: &HealthStateType,
        previous: HealthLevel,
        free_mb: u64,
    ) -> HealthCondition {
        // Once full, stay in the full-handling branch exclusively: the ERROR
        // and the closed admission flag hold until the sample clears the
        // warning limit. A sample between the limits is not recovery.
        if previous == HealthLevel::Error {
            return self
                .registry
                .get(state)
                .unwrap_or_else(|| HealthCondition::ok(state.clone()));
        }
        let condition = HealthCondition::new(
            state.clone(),
            HealthLevel::Warning,
            match root.kind {
                StorageKind::Artifacts => "Artifact storage is running low on disk space",
                StorageKind::Metadata => "Data storage is running low on disk space",
            },
            format!(
                "The server has only {free_mb}Mb available at {} (warning limit {}Mb)",
                root.path.display(),
                root.warning_limit_mb
            ),
        );
        self.registry.record(condition.clone());

        if previous != HealthLevel::Warning {
            self.dispatch(self.draft_low(
                root.kind,
                &root.path,
                root.warning_limit_mb,
                root.full_limit_mb,
            ));
        }
        condition
    }

    fn recover(&self, root: &StorageRoot, state: &HealthStateType) -> HealthCondition {
        self.registry.clear(state);
        self.flags.set_admitted(root.kind, true);
        HealthCondition::ok(state.clone())
    }

    fn draft_low(
        &self,
        kind: StorageKind,
        path: &Path,
        warning_limit_mb: u64,
        full_limit_mb: u64,
    ) -> DraftedMessage {
        let host = &self.identity.host_id;
        let admin = &self.identity.admin_email;
        match kind {
            StorageKind::Artifacts => {
                notify::low_artifact_space(host, admin, warning_limit_mb, full_limit_mb, path)
            }
            StorageKind::Metadata => {
                notify::low_metadata_space(host, admin, warning_limit_mb, full_limit_mb, path)
            }
        }
    }

    fn draft_full(&self, kind: StorageKind, path: &Path, full_limit_mb: u64) -> DraftedMessage {
        let host = &self.identity.host_id;
        let admin = &self.identity.admin_email;
        match kind {
            StorageKind::Artifacts => notify::full_artifact_space(host, admin, full_limit_mb, path),
            StorageKind::Metadata => notify::full_metadata_space(host, admin, full_limit_mb, path),
        }
    }

    fn dispatch(&self, message: DraftedMessage) {
        // Fire-and-forget: a failing transport must not stall the monitor.
        if let Err(e) = self.sink.send(message) {
            eprintln!("[SPK-NOTIFY] mail sink failed: {e}");
        }
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::SpkError;
    use crate::notify::RecordingMailSink;
    use parking_lot::Mutex;
    use std::path::PathBuf;

    /// Probe returning a scripted sequence of samples (or failures).
    struct ScriptedProbe {
        samples: Mutex<Vec<Result<u64>>>,
    }

    impl ScriptedProbe {
        fn new(samples: Vec<Result<u64>>) -> Self {
            Self {
                samples: Mutex::new(samples),
            }
        }
    }

    impl SpaceProbe for ScriptedProbe {
        fn available_mb(&self, path: &Path) -> Result<u64> {
            let mut samples = self.samples.lock();
            if samples.is_empty() {
                return Err(SpkError::Probe {
                    path: path.to_path_buf(),
                    details: "script exhausted".to_string(),
                });
            }
            samples.remove(0)
        }
    }

    struct Fixture {
        monitor: ThresholdMonitor,
        registry: Arc<HealthRegistry>,
        flags: Arc<AdmissionFlags>,
        sink: Arc<RecordingMailSink>,
        root: StorageRoot,
    }

    fn fixture(samples: Vec<Result<u64>>) -> Fixture {
        let registry = Arc::new(HealthRegistry::new());
        let flags = Arc::new(AdmissionFlags::new());
        let sink = Arc::new(RecordingMailSink::new());
        let monitor = ThresholdMonitor::new(
            Arc::new(ScriptedProbe::new(samples)),
            Arc::clone(&registry),
            Arc::clone(&flags),
            ServerIdentity {
                host_id: "10.0.0.7".to_string(),
                admin_email: "admins@example.com".to_string(),
            },
            Arc::clone(&sink) as Arc<dyn MailSink>,
        );
        let root = StorageRoot::new(StorageKind::Artifacts, PathBuf::from("/tmp/a"), 100, 50)
            .expect("valid root");
        Fixture {
            monitor,
            registry,
            flags,
            sink,
            root,
        }
    }

    #[test]
    fn sample_below_full_raises_error_and_blocks_admission() {
        let f = fixture(vec![Ok(40)]);
        let cond = f.monitor.check(&f.root).expect("check");
        assert_eq!(cond.level, HealthLevel::Error);
        assert!(!f.flags.is_admitted(StorageKind::Artifacts));
        assert!(
            f.registry
                .contains_error(&HealthStateType::disk_full(StorageKind::Artifacts))
        );
        let subjects = f.sink.subjects();
        assert_eq!(subjects.len(), 1);
        assert!(subjects[0].contains("scheduling stopped"));
    }

    #[test]
    fn consecutive_full_ticks_draft_exactly_one_notification() {
        let f = fixture(vec![Ok(40), Ok(30)]);
        f.monitor.check(&f.root).expect("first tick");
        f.monitor.check(&f.root).expect("second tick");
        assert_eq!(f.sink.count(), 1, "full alert must be edge-triggered");
        assert!(!f.flags.is_admitted(StorageKind::Artifacts));
    }

    #[test]
    fn sample_between_limits_raises_warning_once() {
        let f = fixture(vec![Ok(80), Ok(70)]);
        let cond = f.monitor.check(&f.root).expect("first tick");
        assert_eq!(cond.level, HealthLevel::Warning);
        // Warning does not gate scheduling.
        assert!(f.flags.is_admitted(StorageKind::Artifacts));
        f.monitor.check(&f.root).expect("second tick");
        assert_eq!(f.sink.count(), 1, "warning alert must be edge-triggered");
        let subjects = f.sink.subjects();
        assert!(subjects[0].contains("Low artifacts disk space"));
    }

    #[test]
    fn recovery_clears_condition_and_readmits() {
        let f = fixture(vec![Ok(40), Ok(500)]);
        f.monitor.check(&f.root).expect("full tick");
        assert!(!f.flags.is_admitted(StorageKind::Artifacts));

        let cond = f.monitor.check(&f.root).expect("recovery tick");
        assert_eq!(cond.level, HealthLevel::Ok);
        assert!(f.flags.is_admitted(StorageKind::Artifacts));
        assert!(
            f.registry
                .get(&HealthStateType::disk_full(StorageKind::Artifacts))
                .is_none()
        );
        // Recovery itself drafts nothing; only the full alert went out.
        assert_eq!(f.sink.count(), 1);
    }

    #[test]
    fn active_error_short_circuits_warning_branch() {
        // full -> sample between the limits: not recovery. The ERROR and the
        // closed flag hold, and no warning alert is drafted.
        let f = fixture(vec![Ok(40), Ok(80), Ok(500), Ok(80)]);
        f.monitor.check(&f.root).expect("full");
        let still_full = f.monitor.check(&f.root).expect("between limits");
        assert_eq!(still_full.level, HealthLevel::Error);
        assert!(!f.flags.is_admitted(StorageKind::Artifacts));
        assert_eq!(f.sink.count(), 1, "no warning alert while full");

        // Real recovery clears the error; the next low sample is a fresh
        // warning transition.
        f.monitor.check(&f.root).expect("recovered");
        assert!(f.flags.is_admitted(StorageKind::Artifacts));
        let warn = f.monitor.check(&f.root).expect("fresh warning");
        assert_eq!(warn.level, HealthLevel::Warning);
        assert_eq!(f.sink.count(), 2, "full alert then low alert");
    }

    #[test]
    fn warning_then_full_escalates_same_condition_key() {
        let f = fixture(vec![Ok(80), Ok(40)]);
        f.monitor.check(&f.root).expect("warning");
        f.monitor.check(&f.root).expect("full");
        let state = HealthStateType::disk_full(StorageKind::Artifacts);
        assert_eq!(f.registry.level_of(&state), HealthLevel::Error);
        assert_eq!(f.registry.snapshot().len(), 1, "one key, escalated");
        assert_eq!(f.sink.count(), 2, "one low alert, one full alert");
    }

    #[test]
    fn probe_failure_leaves_flags_and_registry_untouched() {
        let f = fixture(vec![
            Ok(40),
            Err(SpkError::Probe {
                path: PathBuf::from("/tmp/a"),
                details: "mount vanished".to_string(),
            }),
        ]);
        f.monitor.check(&f.root).expect("full tick");
        let err = f.monitor.check(&f.root).expect_err("probe failure");
        assert_eq!(err.code(), "SPK-2001");
        // State from the last good sample persists.
        assert!(!f.flags.is_admitted(StorageKind::Artifacts));
        assert!(
            f.registry
                .contains_error(&HealthStateType::disk_full(StorageKind::Artifacts))
        );
        assert_eq!(f.sink.count(), 1);
    }

    #[test]
    fn metadata_root_flips_only_its_own_flag() {
        let registry = Arc::new(HealthRegistry::new());
        let flags = Arc::new(AdmissionFlags::new());
        let sink = Arc::new(RecordingMailSink::new());
        let monitor = ThresholdMonitor::new(
            Arc::new(ScriptedProbe::new(vec![Ok(10)])),
            Arc::clone(&registry),
            Arc::clone(&flags),
            ServerIdentity {
                host_id: "10.0.0.7".to_string(),
                admin_email: "admins@example.com".to_string(),
            },
            Arc::clone(&sink) as Arc<dyn MailSink>,
        );
        let root = StorageRoot::new(StorageKind::Metadata, PathBuf::from("/tmp/db"), 100, 50)
            .expect("valid root");
        monitor.check(&root).expect("metadata full");
        assert!(!flags.is_admitted(StorageKind::Metadata));
        assert!(flags.is_admitted(StorageKind::Artifacts));
        let subjects = sink.subjects();
        assert!(subjects[0].contains("No disk space"));
    }

    #[test]
    fn exact_limit_values_are_not_breaches() {
        // free == full limit is not full; free == warning limit is not low.
        let f = fixture(vec![Ok(50), Ok(100)]);
        let at_full = f.monitor.check(&f.root).expect("at full limit");
        assert_eq!(at_full.level, HealthLevel::Warning);
        let at_warning = f.monitor.check(&f.root).expect("at warning limit");
        assert_eq!(at_warning.level, HealthLevel::Ok);
    }
}
