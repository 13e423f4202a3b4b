//! Notification drafting: pure transformations from monitor/lifecycle events
//! into `(subject, body, recipient)` payloads.
//!
//! No network or filesystem I/O happens here. Drafted messages are handed to a
//! [`MailSink`], the seam to the external mail transport. Upstream data
//! collection failures are the caller's problem; by the time a drafter runs,
//! everything it needs is already in hand.

#![allow(missing_docs)]

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::errors::Result;

// ──────────────────── message and sink ────────────────────

/// An immutable drafted notification, ready for an external transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftedMessage {
    pub subject: String,
    pub body: String,
    pub recipient: String,
}

/// Seam to the external mail transport. This crate never opens a connection.
pub trait MailSink: Send + Sync {
    fn send(&self, message: DraftedMessage) -> Result<()>;
}

/// Sink that records drafted messages in memory. Used by tests and available
/// to embedders that route notifications themselves.
#[derive(Default)]
pub struct RecordingMailSink {
    messages: Mutex<Vec<DraftedMessage>>,
}

impl RecordingMailSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn drained(&self) -> Vec<DraftedMessage> {
        std::mem::take(&mut self.messages.lock())
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.messages.lock().len()
    }

    #[must_use]
    pub fn subjects(&self) -> Vec<String> {
        self.messages
            .lock()
            .iter()
            .map(|m| m.subject.clone())
            .collect()
    }
}

impl MailSink for RecordingMailSink {
    fn send(&self, message: DraftedMessage) -> Result<()> {
        self.messages.lock().push(message);
        Ok(())
    }
}

/// Sink that drops every message. For deployments with no admin recipient.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMailSink;

impl MailSink for NullMailSink {
    fn send(&self, _message: DraftedMessage) -> Result<()> {
        Ok(())
    }
}

// ──────────────────── agent descriptor ────────────────────

/// Everything the lost-contact notification lists about a build agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub hostname: String,
    pub free_space: String,
    pub sandbox: String,
    pub ip_address: String,
    pub operating_system: String,
    pub resources: Vec<String>,
    pub environments: Vec<String>,
    pub last_heard: DateTime<Utc>,
}

fn join_for_display(items: &[String]) -> String {
    if items.is_empty() {
        "none".to_string()
    } else {
        items.join(", ")
    }
}

// ──────────────────── disk-space drafters ────────────────────

const AUTO_SENT_PREAMBLE: &str =
    "This message was sent automatically by the build server at (%HOST%) to the server \
     administrators.";

fn preamble(host_id: &str) -> String {
    AUTO_SENT_PREAMBLE.replace("%HOST%", host_id)
}

/// "Running low on artifact space" warning.
#[must_use]
pub fn low_artifact_space(
    host_id: &str,
    recipient: &str,
    warning_limit_mb: u64,
    full_limit_mb: u64,
    target: &Path,
) -> DraftedMessage {
    DraftedMessage {
        subject: format!("Low artifacts disk space warning on {host_id}"),
        body: format!(
            "{}\n\nThis server has less than {warning_limit_mb}Mb of disk space available at {} \
             to store artifacts. When the available space goes below {full_limit_mb}Mb, the \
             server will stop scheduling. Please ensure enough space is available. Consider \
             placing the artifact repository on a separate partition.\n",
            preamble(host_id),
            target.display(),
        ),
        recipient: recipient.to_string(),
    }
}

/// "Out of artifact space — scheduling stopped" error.
#[must_use]
pub fn full_artifact_space(
    host_id: &str,
    recipient: &str,
    full_limit_mb: u64,
    target: &Path,
) -> DraftedMessage {
    DraftedMessage {
        subject: format!("No artifacts disk space, scheduling stopped on {host_id}"),
        body: format!(
            "{}\n\nThis server has stopped scheduling because it has less than \
             {full_limit_mb}Mb of disk space available at {} to store artifacts. Please ensure \
             enough space is available.\n",
            preamble(host_id),
            target.display(),
        ),
        recipient: recipient.to_string(),
    }
}

/// "Running low on metadata space" warning.
#[must_use]
pub fn low_metadata_space(
    host_id: &str,
    recipient: &str,
    warning_limit_mb: u64,
    full_limit_mb: u64,
    target: &Path,
) -> DraftedMessage {
    DraftedMessage {
        subject: format!("Low disk space warning on {host_id}"),
        body: format!(
            "{}\n\nThis server has less than {warning_limit_mb}Mb of disk space available at {} \
             to store data. When the available space goes below {full_limit_mb}Mb, the server \
             will stop scheduling. Please ensure enough space is available.\n",
            preamble(host_id),
            target.display(),
        ),
        recipient: recipient.to_string(),
    }
}

/// "Out of metadata space — scheduling stopped" error.
#[must_use]
pub fn full_metadata_space(
    host_id: &str,
    recipient: &str,
    full_limit_mb: u64,
    target: &Path,
) -> DraftedMessage {
    DraftedMessage {
        subject: format!("No disk space, scheduling stopped on {host_id}"),
        body: format!(
            "{}\n\nThis server has stopped scheduling because it has less than \
             {full_limit_mb}Mb of disk space available at {} to store data. Please ensure \
             enough space is available.\n",
            preamble(host_id),
            target.display(),
        ),
        recipient: recipient.to_string(),
    }
}

// ──────────────────── lifecycle drafters ────────────────────

/// Backup finished without errors.
#[must_use]
pub fn backup_completed(
    host_id: &str,
    recipient: &str,
    backup_dir: &Path,
    username: &str,
) -> DraftedMessage {
    DraftedMessage {
        subject: "Server backup completed successfully".to_string(),
        body: format!(
            "Backup of the server at '{host_id}' completed successfully. The backup is stored at \
             {}. This backup was triggered by '{username}'.",
            backup_dir.display(),
        ),
        recipient: recipient.to_string(),
    }
}

/// Backup failed with a reason.
#[must_use]
pub fn backup_failed(host_id: &str, recipient: &str, reason: &str) -> DraftedMessage {
    DraftedMessage {
        subject: "Server backup failed".to_string(),
        body: format!("Backup of the server at '{host_id}' failed. Reason: {reason}"),
        recipient: recipient.to_string(),
    }
}

/// The server lost contact with a build agent.
#[must_use]
pub fn agent_lost_contact(
    host_id: &str,
    recipient: &str,
    agent: &AgentDescriptor,
) -> DraftedMessage {
    DraftedMessage {
        subject: format!("[Lost Contact] build agent host: {}", agent.hostname),
        body: format!(
            "{}\n\nThe server has lost contact with agent:\n\nAgent name: {}\nFree space: {}\n\
             Sandbox: {}\nIP address: {}\nOS: {}\nResources: {}\nEnvironments: {}\n\n\
             Lost contact at: {}",
            preamble(host_id),
            agent.hostname,
            agent.free_space,
            agent.sandbox,
            agent.ip_address,
            agent.operating_system,
            join_for_display(&agent.resources),
            join_for_display(&agent.environments),
            agent.last_heard.to_rfc3339(),
        ),
        recipient: recipient.to_string(),
    }
}
