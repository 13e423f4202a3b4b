//! Process-wide health registry: at most one active condition per state key.
//!
//! The registry is an explicitly owned handle (constructed once at startup,
//! shared via `Arc`), never ambient global state. The threshold monitor is the
//! only writer for storage conditions; scheduling checks and operator-facing
//! status surfaces read concurrently.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::core::config::StorageKind;

// ──────────────────── identifiers ────────────────────

/// Condition id shared by the warning and full severities of one storage kind.
///
/// One id per kind with severity escalation: the warning branch records it at
/// WARNING, the full branch overwrites it at ERROR.
pub const DISK_FULL_ID: &str = "disk_full";

/// What part of the server a condition is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthScope {
    Global,
    Pipeline(String),
    Storage(StorageKind),
}

impl fmt::Display for HealthScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "global"),
            Self::Pipeline(name) => write!(f, "pipeline/{name}"),
            Self::Storage(kind) => write!(f, "storage/{kind}"),
        }
    }
}

/// Key of a health condition: scope plus condition id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct HealthStateType {
    pub scope: HealthScope,
    pub id: &'static str,
}

impl HealthStateType {
    /// General condition for an arbitrary scope.
    #[must_use]
    pub const fn general(scope: HealthScope) -> Self {
        Self {
            scope,
            id: "general",
        }
    }

    /// The disk-full condition key for a storage kind. The warning and full
    /// severities share this key.
    #[must_use]
    pub const fn disk_full(kind: StorageKind) -> Self {
        Self {
            scope: HealthScope::Storage(kind),
            id: DISK_FULL_ID,
        }
    }
}

// ──────────────────── conditions ────────────────────

/// Severity of a health condition, ordered by escalation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    #[default]
    Ok,
    Warning,
    Error,
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok => write!(f, "ok"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One active health condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthCondition {
    pub state: HealthStateType,
    pub level: HealthLevel,
    /// Headline shown to operators.
    pub message: String,
    /// Longer explanation with the offending numbers and paths.
    pub description: String,
    pub raised_at: DateTime<Utc>,
}

impl HealthCondition {
    #[must_use]
    pub fn new(
        state: HealthStateType,
        level: HealthLevel,
        message: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            state,
            level,
            message: message.into(),
            description: description.into(),
            raised_at: Utc::now(),
        }
    }

    /// An OK-level marker condition for a state key (nothing wrong).
    #[must_use]
    pub fn ok(state: HealthStateType) -> Self {
        Self::new(state, HealthLevel::Ok, "", "")
    }
}

// ──────────────────── registry ────────────────────

/// Keyed store of active health conditions.
///
/// Reads are linearizable single-key reads; no multi-key transactions are
/// offered since each storage root owns disjoint keys.
#[derive(Default)]
pub struct HealthRegistry {
    conditions: RwLock<HashMap<HealthStateType, HealthCondition>>,
}

impl HealthRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a condition, replacing any previous one under the same key.
    pub fn record(&self, condition: HealthCondition) {
        self.conditions
            .write()
            .insert(condition.state.clone(), condition);
    }

    /// Remove the condition under a key. Returns the removed condition.
    pub fn clear(&self, state: &HealthStateType) -> Option<HealthCondition> {
        self.conditions.write().remove(state)
    }

    /// Current condition for a key, if any.
    #[must_use]
    pub fn get(&self, state: &HealthStateType) -> Option<HealthCondition> {
        self.conditions.read().get(state).cloned()
    }

    /// Severity currently recorded for a key (`Ok` when absent).
    #[must_use]
    pub fn level_of(&self, state: &HealthStateType) -> HealthLevel {
        self.conditions
            .read()
            .get(state)
            .map_or(HealthLevel::Ok, |c| c.level)
    }

    /// Whether an ERROR-level condition is active under this key.
    ///
    /// This is the dedup query the admission path and the warning branch rely
    /// on: once an error is registered, lower-severity handling is skipped.
    #[must_use]
    pub fn contains_error(&self, state: &HealthStateType) -> bool {
        self.level_of(state) == HealthLevel::Error
    }

    /// All active conditions, for operator-facing status surfaces.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HealthCondition> {
        let mut all: Vec<HealthCondition> = self.conditions.read().values().cloned().collect();
        all.sort_by(|a, b| b.level.cmp(&a.level).then(a.raised_at.cmp(&b.raised_at)));
        all
    }
}
