//! Daemon mode: periodic threshold checks driven by a crossbeam ticker.
//!
//! Single-threaded loop: tick, probe each storage root, advance the threshold
//! state machine, log transitions, poll signal flags. SIGHUP reloads the
//! config file between ticks; SIGTERM/SIGINT exit after the current tick.

#![allow(missing_docs)]

pub mod signals;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::tick;

use crate::core::config::{Config, StorageRoot};
use crate::core::errors::Result;
use crate::health::{HealthLevel, HealthRegistry};
use crate::logger::{EventLog, MonitorEvent};
use crate::monitor::{AdmissionFlags, SpaceProbe, ThresholdMonitor};
use crate::monitor::threshold::ServerIdentity;
use crate::notify::MailSink;

pub use signals::SignalHandler;

// ──────────────────── monitor loop ────────────────────

/// Owns the periodic check cycle and its observable side effects.
pub struct MonitorLoop {
    monitor: ThresholdMonitor,
    registry: Arc<HealthRegistry>,
    flags: Arc<AdmissionFlags>,
    roots: Vec<StorageRoot>,
    poll_interval: Duration,
    config_path: PathBuf,
    log: EventLog,
    /// Last observed level per root index, for transition logging.
    last_levels: Vec<HealthLevel>,
}

impl MonitorLoop {
    pub fn new(
        config: &Config,
        config_path: PathBuf,
        probe: Arc<dyn SpaceProbe>,
        registry: Arc<HealthRegistry>,
        flags: Arc<AdmissionFlags>,
        sink: Arc<dyn MailSink>,
        log: EventLog,
    ) -> Result<Self> {
        let roots = config.storage_roots()?;
        let monitor = ThresholdMonitor::new(
            probe,
            Arc::clone(&registry),
            Arc::clone(&flags),
            ServerIdentity {
                host_id: config.server.host_id.clone(),
                admin_email: config.server.admin_email.clone(),
            },
            sink,
        );
        let last_levels = vec![HealthLevel::Ok; roots.len()];
        Ok(Self {
            monitor,
            registry,
            flags,
            roots,
            poll_interval: Duration::from_millis(config.monitor.poll_interval_ms),
            config_path,
            log,
            last_levels,
        })
    }

    /// Shared health registry, for embedders wiring up admission checks.
    #[must_use]
    pub fn registry(&self) -> Arc<HealthRegistry> {
        Arc::clone(&self.registry)
    }

    /// Shared admission flags.
    #[must_use]
    pub fn flags(&self) -> Arc<AdmissionFlags> {
        Arc::clone(&self.flags)
    }

    /// Run one check over every storage root. Used by the loop and by the
    /// one-shot CLI mode.
    ///
    /// Probe failures are logged and skipped; the previous state for that
    /// root stays in force until the next successful sample.
    pub fn tick_all(&mut self) {
        for i in 0..self.roots.len() {
            let root = self.roots[i].clone();
            match self.monitor.sample(&root) {
                Ok((free_mb, condition)) => {
                    let level = condition.level;
                    self.log.record(MonitorEvent::SpaceSampled {
                        kind: root.kind.to_string(),
                        path: root.path.display().to_string(),
                        free_mb,
                        level: level_label(level).to_string(),
                    });
                    if level != self.last_levels[i] {
                        self.log.record(MonitorEvent::ConditionChanged {
                            kind: root.kind.to_string(),
                            from: level_label(self.last_levels[i]).to_string(),
                            to: level_label(level).to_string(),
                            free_mb,
                        });
                        self.last_levels[i] = level;
                    }
                }
                Err(e) => {
                    self.log.record(MonitorEvent::ProbeFailed {
                        kind: root.kind.to_string(),
                        path: root.path.display().to_string(),
                        error_code: e.code().to_string(),
                        error_message: e.to_string(),
                    });
                }
            }
        }
        self.log.flush();
    }

    /// Highest severity currently recorded, for one-shot exit codes.
    #[must_use]
    pub fn worst_level(&self) -> HealthLevel {
        self.registry
            .snapshot()
            .first()
            .map_or(HealthLevel::Ok, |c| c.level)
    }

    /// Run until the handler reports shutdown. Blocks the calling thread.
    pub fn run(&mut self, handler: &SignalHandler) {
        let started = Instant::now();
        self.log.record(MonitorEvent::MonitorStarted {
            version: env!("CARGO_PKG_VERSION").to_string(),
            roots: self.roots.len(),
            poll_interval_ms: u64::try_from(self.poll_interval.as_millis()).unwrap_or(u64::MAX),
        });

        self.tick_all();

        let mut ticker = tick(self.poll_interval);
        // recv_timeout keeps signal latency bounded even with long intervals.
        let poll_granularity = Duration::from_millis(200).min(self.poll_interval);
        loop {
            if handler.should_shutdown() {
                break;
            }
            if handler.should_reload() {
                let before = self.poll_interval;
                self.reload_config();
                if self.poll_interval != before {
                    ticker = tick(self.poll_interval);
                }
            }
            if ticker.recv_timeout(poll_granularity).is_ok() {
                self.tick_all();
            }
        }

        self.log.record(MonitorEvent::MonitorStopped {
            reason: "signal".to_string(),
            uptime_secs: started.elapsed().as_secs(),
        });
        self.log.flush();
    }

    /// Re-read the config file in place. A bad file keeps the running
    /// configuration; the monitor must not die because an operator fat-fingered
    /// an edit mid-reload.
    fn reload_config(&mut self) {
        match Config::load(&self.config_path) {
            Ok(config) => match config.storage_roots() {
                Ok(roots) => {
                    self.poll_interval = Duration::from_millis(config.monitor.poll_interval_ms);
                    if roots.len() != self.roots.len() {
                        self.last_levels = vec![HealthLevel::Ok; roots.len()];
                    }
                    self.roots = roots;
                    self.log.record(MonitorEvent::ConfigReloaded {
                        path: self.config_path.display().to_string(),
                    });
                }
                Err(e) => eprintln!("[SPK-RELOAD] invalid storage limits, keeping old: {e}"),
            },
            Err(e) => eprintln!("[SPK-RELOAD] config reload failed, keeping old: {e}"),
        }
    }
}

const fn level_label(level: HealthLevel) -> &'static str {
    match level {
        HealthLevel::Ok => "ok",
        HealthLevel::Warning => "warning",
        HealthLevel::Error => "error",
    }
}

// ──────────────────── tests ────────────────────
