//! Structured event logging: append-only JSONL with graceful degradation.

pub mod jsonl;

pub use jsonl::{EventLog, EventLogMailSink, JsonlConfig, LogSeverity, MonitorEvent};
