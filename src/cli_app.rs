//! Top-level CLI definition and dispatch.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use spacekeeper::core::config::Config;
use spacekeeper::core::errors::Result;
use spacekeeper::daemon::{MonitorLoop, SignalHandler};
use spacekeeper::health::{HealthLevel, HealthRegistry};
use spacekeeper::logger::{EventLog, EventLogMailSink, JsonlConfig};
use spacekeeper::monitor::{AdmissionFlags, StatvfsProbe};
use spacekeeper::notify::{DraftedMessage, MailSink, NullMailSink};

const DEFAULT_CONFIG_PATH: &str = "/etc/spacekeeper/spacekeeper.toml";

/// Disk-space admission control and artifact retrieval for a CI server.
#[derive(Debug, Parser)]
#[command(
    name = "spacekeeper",
    author,
    version,
    about = "Disk-space admission control for CI servers",
    long_about = None,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Override config file path.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Run the threshold monitor until SIGTERM/SIGINT.
    Monitor(MonitorArgs),
    /// Probe every storage root once and exit with the worst level.
    Check(CheckArgs),
}

#[derive(Debug, Clone, Args, Default)]
struct MonitorArgs {
    /// JSONL event log path (default /var/log/spacekeeper/events.jsonl).
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// Disable the event log entirely.
    #[arg(long, conflicts_with = "log_file")]
    no_log: bool,
    /// Print drafted operator notifications to stderr instead of dropping
    /// them (useful without a configured mail transport).
    #[arg(long)]
    print_notifications: bool,
}

#[derive(Debug, Clone, Args, Default)]
struct CheckArgs {
    /// Print each active condition to stdout.
    #[arg(long)]
    verbose: bool,
}

/// Sink that narrates drafted notifications on stderr.
struct StderrMailSink;

impl MailSink for StderrMailSink {
    fn send(&self, message: DraftedMessage) -> Result<()> {
        eprintln!(
            "[SPK-NOTIFY] to <{}>: {}",
            message.recipient, message.subject
        );
        Ok(())
    }
}

/// Dispatch the parsed CLI. Returns the process exit code.
pub fn run(cli: &Cli) -> Result<i32> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = Config::load_or_default(&config_path)?;

    match &cli.command {
        Command::Monitor(args) => run_monitor(&config, config_path, args),
        Command::Check(args) => run_check(&config, config_path, args),
    }
}

fn build_loop(
    config: &Config,
    config_path: PathBuf,
    sink: Arc<dyn MailSink>,
    log: EventLog,
) -> Result<MonitorLoop> {
    MonitorLoop::new(
        config,
        config_path,
        Arc::new(StatvfsProbe),
        Arc::new(HealthRegistry::new()),
        Arc::new(AdmissionFlags::new()),
        sink,
        log,
    )
}

fn run_monitor(config: &Config, config_path: PathBuf, args: &MonitorArgs) -> Result<i32> {
    let mut jsonl = JsonlConfig::default();
    if let Some(path) = &args.log_file {
        jsonl.path.clone_from(path);
    }
    jsonl.disabled = args.no_log;
    let log = EventLog::open(&jsonl);

    // No mail transport ships with this crate; drafted alerts land in the
    // event log (or on stderr when requested) for an external relay.
    let sink: Arc<dyn MailSink> = if args.print_notifications {
        Arc::new(StderrMailSink)
    } else {
        Arc::new(EventLogMailSink::new(EventLog::open(&jsonl)))
    };

    let mut monitor_loop = build_loop(config, config_path, sink, log)?;
    let handler = SignalHandler::new();
    monitor_loop.run(&handler);
    Ok(0)
}

fn run_check(config: &Config, config_path: PathBuf, args: &CheckArgs) -> Result<i32> {
    let mut monitor_loop = build_loop(
        config,
        config_path,
        Arc::new(NullMailSink),
        EventLog::disabled(),
    )?;
    monitor_loop.tick_all();

    let registry = monitor_loop.registry();
    if args.verbose {
        for condition in registry.snapshot() {
            println!("{}: {}", condition.message, condition.description);
        }
    }
    Ok(match monitor_loop.worst_level() {
        HealthLevel::Ok => 0,
        HealthLevel::Warning => 1,
        HealthLevel::Error => 2,
    })
}
