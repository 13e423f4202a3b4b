//! JSONL event log: append-only line-delimited JSON.
//!
//! Each line is a self-contained JSON object. Lines are assembled in memory
//! and written atomically via `write_all` to prevent interleaved partial
//! lines when the file is being tailed by another process.
//!
//! Three-level degradation chain:
//! 1. Primary file path
//! 2. stderr with `[SPK-LOG]` prefix
//! 3. Silent discard (the monitor must never crash for logging failures)

#![allow(missing_docs)]

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::notify::{DraftedMessage, MailSink};

// ──────────────────── severity and events ────────────────────

/// Severity attached to each log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSeverity {
    Info,
    Warning,
    Error,
}

/// Everything the monitor loop and admission surface log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MonitorEvent {
    MonitorStarted {
        version: String,
        roots: usize,
        poll_interval_ms: u64,
    },
    MonitorStopped {
        reason: String,
        uptime_secs: u64,
    },
    SpaceSampled {
        kind: String,
        path: String,
        free_mb: u64,
        level: String,
    },
    ConditionChanged {
        kind: String,
        from: String,
        to: String,
        free_mb: u64,
    },
    ProbeFailed {
        kind: String,
        path: String,
        error_code: String,
        error_message: String,
    },
    NotificationDrafted {
        subject: String,
        recipient: String,
    },
    ConfigReloaded {
        path: String,
    },
}

impl MonitorEvent {
    /// Default severity for this event kind.
    #[must_use]
    pub const fn severity(&self) -> LogSeverity {
        match self {
            Self::MonitorStarted { .. }
            | Self::MonitorStopped { .. }
            | Self::SpaceSampled { .. }
            | Self::NotificationDrafted { .. }
            | Self::ConfigReloaded { .. } => LogSeverity::Info,
            Self::ProbeFailed { .. } => LogSeverity::Warning,
            Self::ConditionChanged { .. } => LogSeverity::Warning,
        }
    }
}

/// A single JSONL line: timestamp, severity, event payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LogEntry {
    ts: String,
    severity: LogSeverity,
    #[serde(flatten)]
    event: MonitorEvent,
}

// ──────────────────── writer ────────────────────

/// Degradation state of the writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Normal,
    Stderr,
    Discard,
}

/// Configuration for the event log.
#[derive(Debug, Clone)]
pub struct JsonlConfig {
    /// Primary log file path.
    pub path: PathBuf,
    /// When true, skip the file entirely and discard (for embedders that
    /// route events themselves).
    pub disabled: bool,
}

impl Default for JsonlConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/var/log/spacekeeper/events.jsonl"),
            disabled: false,
        }
    }
}

/// Append-only JSONL event log with stderr fallback.
pub struct EventLog {
    writer: Option<BufWriter<File>>,
    state: WriterState,
}

impl EventLog {
    /// Open the log file, creating parent directories as needed. Falls
    /// through the degradation chain on failure instead of erroring.
    #[must_use]
    pub fn open(config: &JsonlConfig) -> Self {
        if config.disabled {
            return Self {
                writer: None,
                state: WriterState::Discard,
            };
        }
        if let Some(parent) = config.path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.path)
        {
            Ok(file) => Self {
                writer: Some(BufWriter::new(file)),
                state: WriterState::Normal,
            },
            Err(e) => {
                let _ = writeln!(
                    io::stderr(),
                    "[SPK-LOG] cannot open {}: {e}, falling back to stderr",
                    config.path.display()
                );
                Self {
                    writer: None,
                    state: WriterState::Stderr,
                }
            }
        }
    }

    /// A log that discards everything.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            writer: None,
            state: WriterState::Discard,
        }
    }

    /// Append one event with its default severity.
    pub fn record(&mut self, event: MonitorEvent) {
        let severity = event.severity();
        self.record_with(severity, event);
    }

    /// Append one event at an explicit severity.
    pub fn record_with(&mut self, severity: LogSeverity, event: MonitorEvent) {
        let entry = LogEntry {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            severity,
            event,
        };
        let line = match serde_json::to_string(&entry) {
            Ok(json) => format!("{json}\n"),
            Err(e) => {
                let _ = writeln!(io::stderr(), "[SPK-LOG] serialize error: {e}");
                return;
            }
        };
        self.write_line(&line);
    }

    /// Flush buffered lines.
    pub fn flush(&mut self) {
        if let Some(w) = self.writer.as_mut() {
            let _ = w.flush();
        }
    }

    /// Current degradation state label, for status surfaces.
    #[must_use]
    pub fn state(&self) -> &'static str {
        match self.state {
            WriterState::Normal => "normal",
            WriterState::Stderr => "stderr",
            WriterState::Discard => "discard",
        }
    }

    fn write_line(&mut self, line: &str) {
        match self.state {
            WriterState::Normal => {
                let failed = self
                    .writer
                    .as_mut()
                    .is_none_or(|w| w.write_all(line.as_bytes()).is_err());
                if failed {
                    // Demote to stderr; the file is gone or the disk is full
                    // (which is exactly when this log matters most).
                    self.writer = None;
                    self.state = WriterState::Stderr;
                    let _ = write!(io::stderr(), "[SPK-LOG] {line}");
                }
            }
            WriterState::Stderr => {
                if write!(io::stderr(), "[SPK-LOG] {line}").is_err() {
                    self.state = WriterState::Discard;
                }
            }
            WriterState::Discard => {}
        }
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        self.flush();
    }
}

// ──────────────────── mail sink adapter ────────────────────

/// [`MailSink`] that records drafted notifications as log events instead of
/// sending them. The daemon uses this when no real transport is wired up, so
/// operators can still see what would have gone out.
pub struct EventLogMailSink {
    log: Mutex<EventLog>,
}

impl EventLogMailSink {
    #[must_use]
    pub fn new(log: EventLog) -> Self {
        Self {
            log: Mutex::new(log),
        }
    }
}

impl MailSink for EventLogMailSink {
    fn send(&self, message: DraftedMessage) -> crate::core::errors::Result<()> {
        let mut log = self.log.lock();
        log.record(MonitorEvent::NotificationDrafted {
            subject: message.subject,
            recipient: message.recipient,
        });
        // Each drafted alert is a whole line on disk immediately; alerts are
        // rare and must survive a crash right after the transition.
        log.flush();
        Ok(())
    }
}

// ──────────────────── tests ────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> MonitorEvent {
        MonitorEvent::SpaceSampled {
            kind: "artifacts".to_string(),
            path: "/data/artifacts".to_string(),
            free_mb: 512,
            level: "ok".to_string(),
        }
    }

    #[test]
    fn writes_one_json_object_per_line() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = JsonlConfig {
            path: dir.path().join("events.jsonl"),
            disabled: false,
        };
        let mut log = EventLog::open(&config);
        assert_eq!(log.state(), "normal");
        log.record(sample_event());
        log.record(MonitorEvent::ConditionChanged {
            kind: "artifacts".to_string(),
            from: "ok".to_string(),
            to: "error".to_string(),
            free_mb: 40,
        });
        log.flush();

        let content = std::fs::read_to_string(&config.path).expect("read log");
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let value: serde_json::Value = serde_json::from_str(line).expect("valid json");
            assert!(value.get("ts").is_some());
            assert!(value.get("type").is_some());
            assert!(value.get("severity").is_some());
        }
    }

    #[test]
    fn event_tag_is_snake_case() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = JsonlConfig {
            path: dir.path().join("events.jsonl"),
            disabled: false,
        };
        let mut log = EventLog::open(&config);
        log.record(MonitorEvent::ProbeFailed {
            kind: "metadata".to_string(),
            path: "/data/db".to_string(),
            error_code: "SPK-2001".to_string(),
            error_message: "mount vanished".to_string(),
        });
        log.flush();
        let content = std::fs::read_to_string(&config.path).expect("read log");
        let value: serde_json::Value = serde_json::from_str(content.trim()).expect("json");
        assert_eq!(value["type"], "probe_failed");
        assert_eq!(value["severity"], "warning");
        assert_eq!(value["error_code"], "SPK-2001");
    }

    #[test]
    fn unopenable_path_degrades_to_stderr() {
        let config = JsonlConfig {
            path: PathBuf::from("/proc/definitely/not/writable/events.jsonl"),
            disabled: false,
        };
        let mut log = EventLog::open(&config);
        assert_eq!(log.state(), "stderr");
        // Recording must not panic in any degraded state.
        log.record(sample_event());
    }

    #[test]
    fn disabled_log_discards_quietly() {
        let mut log = EventLog::disabled();
        assert_eq!(log.state(), "discard");
        log.record(sample_event());
        log.flush();
    }

    #[test]
    fn mail_sink_adapter_records_notification_events() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = JsonlConfig {
            path: dir.path().join("events.jsonl"),
            disabled: false,
        };
        let sink = EventLogMailSink::new(EventLog::open(&config));
        sink.send(DraftedMessage {
            subject: "No artifacts disk space, scheduling stopped on ci".to_string(),
            body: "unused by the log".to_string(),
            recipient: "admins@example.com".to_string(),
        })
        .expect("send");

        let content = std::fs::read_to_string(&config.path).expect("read log");
        let value: serde_json::Value = serde_json::from_str(content.trim()).expect("json");
        assert_eq!(value["type"], "notification_drafted");
        assert_eq!(value["recipient"], "admins@example.com");
        assert!(value["subject"].as_str().unwrap().contains("scheduling stopped"));
    }

    #[test]
    fn severity_defaults_match_event_kinds() {
        assert_eq!(sample_event().severity(), LogSeverity::Info);
        assert_eq!(
            MonitorEvent::ProbeFailed {
                kind: String::new(),
                path: String::new(),
                error_code: String::new(),
                error_message: String::new(),
            }
            .severity(),
            LogSeverity::Warning
        );
    }
}
