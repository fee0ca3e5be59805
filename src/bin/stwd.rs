//! STW Daemon - foreground usage journal, budget monitor and query server
//!
//! This binary runs as a background daemon. Hook clients report
//! foreground transitions to it; the usage monitor enforces per-app
//! daily budgets against those reports; the `stw` CLI queries usage
//! and status over the same socket.
//!
//! # Usage
//!
//! ```bash
//! # Start the daemon (foreground)
//! stwd start
//!
//! # Start the daemon (background/daemonized)
//! stwd start -d
//!
//! # Stop the daemon
//! stwd stop
//!
//! # Check daemon status
//! stwd status
//!
//! # Start with a custom config file and socket path
//! STW_SOCKET=/run/stw.sock stwd --config ./stw.toml start
//!
//! # Enable debug logging
//! RUST_LOG=stwd=debug stwd start
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use stw_core::{JsonLimitStore, LimitStore};
use stw_protocol::MonitorStatus;
use stwd::actions::CommandActionSink;
use stwd::config::Config;
use stwd::journal::spawn_journal;
use stwd::launcher::ConfiguredLaunchers;
use stwd::monitor::{Clock, SystemClock, UsageMonitor};
use stwd::server::{DaemonServer, ServerContext};
use stwd::supervisor::{supervise, LifecycleResult};

/// stw daemon - enforces daily per-app time budgets
#[derive(Parser, Debug)]
#[command(name = "stwd", version, about)]
struct Args {
    /// Path to the config file (default: ~/.config/stw/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the daemon
    Start {
        /// Run as a background daemon (fork to background)
        #[arg(short = 'd', long)]
        daemon: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show daemon status
    Status,
}

fn state_dir() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("stw")
}

/// Returns the path to the PID file.
fn pid_file_path() -> PathBuf {
    state_dir().join("stwd.pid")
}

/// Returns the path to the log file.
fn log_file_path() -> PathBuf {
    state_dir().join("stwd.log")
}

/// Reads the PID from the PID file, if it exists.
fn read_pid() -> Option<u32> {
    let path = pid_file_path();
    let mut file = File::open(&path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

/// Writes the current PID to the PID file.
fn write_pid() -> Result<()> {
    let path = pid_file_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("Failed to create state directory")?;
    }
    let mut file = File::create(&path).context("Failed to create PID file")?;
    write!(file, "{}", process::id()).context("Failed to write PID")?;
    Ok(())
}

/// Removes the PID file.
fn remove_pid_file() {
    let _ = fs::remove_file(pid_file_path());
}

/// Checks if a process with the given PID is running.
fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{pid}")).exists()
}

/// Checks if the daemon is already running.
fn is_daemon_running() -> Option<u32> {
    if let Some(pid) = read_pid() {
        if is_process_running(pid) {
            return Some(pid);
        }
        // Stale PID file - remove it
        remove_pid_file();
    }
    None
}

/// Sends SIGTERM to the daemon process.
fn stop_daemon(pid: u32) -> Result<()> {
    let Ok(pid) = i32::try_from(pid) else {
        bail!("Invalid PID {pid}");
    };
    // SAFETY: kill(2) has no memory-safety preconditions.
    let result = unsafe { libc::kill(pid, libc::SIGTERM) };
    if result != 0 {
        bail!("Failed to send SIGTERM to process {pid}");
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Default to 'start' if no subcommand given
    let command = args.command.unwrap_or(Command::Start { daemon: false });

    match command {
        Command::Start { daemon } => {
            if let Some(pid) = is_daemon_running() {
                eprintln!("Daemon is already running (PID {pid})");
                eprintln!("Use 'stwd stop' to stop it first.");
                process::exit(1);
            }

            // Load before forking so config errors reach the terminal.
            let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

            if daemon {
                daemonize()?;
            }

            write_pid()?;
            let result = run_daemon(config);
            remove_pid_file();

            result
        }
        Command::Stop => {
            if let Some(pid) = is_daemon_running() {
                println!("Stopping daemon (PID {pid})...");
                stop_daemon(pid)?;

                // Wait for process to exit (up to 5 seconds)
                for _ in 0..50 {
                    if !is_process_running(pid) {
                        println!("Daemon stopped.");
                        return Ok(());
                    }
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }

                eprintln!("Daemon did not stop within 5 seconds.");
                process::exit(1);
            } else {
                println!("Daemon is not running.");
                Ok(())
            }
        }
        Command::Status => {
            if let Some(pid) = is_daemon_running() {
                println!("Daemon is running (PID {pid})");

                let config = Config::load(args.config.as_deref()).unwrap_or_default();
                let socket_path = config.socket_path();
                if socket_path.exists() {
                    println!("Socket: {}", socket_path.display());
                }
                println!("Limits: {}", config.limits_path().display());

                Ok(())
            } else {
                println!("Daemon is not running.");
                process::exit(1);
            }
        }
    }
}

/// Daemonizes the current process.
fn daemonize() -> Result<()> {
    use daemonize::Daemonize;

    let log_path = log_file_path();

    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file for stdout")?;
    let stderr = stdout.try_clone().context("Failed to open log file for stderr")?;

    Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;

    Ok(())
}

/// Runs the daemon (async entry point).
#[tokio::main]
async fn run_daemon(config: Config) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("stwd=info".parse()?)
                .add_directive("stw_core=info".parse()?)
                .add_directive("stw_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        "stw daemon starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let journal = spawn_journal(config.journal_retention());
    info!(retention_hours = config.journal_retention_hours, "Event journal started");

    let limits_path = config.limits_path();
    let limits: Arc<dyn LimitStore> = Arc::new(JsonLimitStore::new(&limits_path));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (status_tx, status_rx) = watch::channel(MonitorStatus::default());

    let monitor = Arc::new(UsageMonitor::new(
        Arc::new(journal.clone()),
        Arc::clone(&limits),
        Arc::new(ConfiguredLaunchers::new(config.launchers.iter().map(String::as_str))),
        Arc::new(CommandActionSink::new(
            config.home_command.clone(),
            config.notify_command.clone(),
        )),
        config.monitor_config(),
    ));

    let supervisor = tokio::spawn(supervise(
        monitor,
        Arc::clone(&clock),
        cancel_token.clone(),
        Arc::new(status_tx),
        config.retry_policy(),
    ));

    let socket_path = config.socket_path();
    let context = ServerContext {
        journal,
        limits,
        status: status_rx,
        clock,
        reset_hour: config.reset_hour,
    };
    let server = DaemonServer::new(&socket_path, context, cancel_token.clone());

    info!(
        socket = %socket_path.display(),
        limits = %limits_path.display(),
        reset_hour = %config.reset_hour,
        "Starting server"
    );

    let server_result = server.run().await;

    // The server only returns early on a socket error; stop the monitor too.
    cancel_token.cancel();
    match supervisor.await {
        Ok(LifecycleResult::PermanentFailure) => {
            warn!("Usage monitor was not running at shutdown (permanent failure)");
        }
        Ok(result) => info!(result = ?result, "Usage monitor stopped"),
        Err(e) => error!(error = %e, "Supervisor task failed"),
    }

    if let Err(e) = server_result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("stw daemon stopped");
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT");
        }
    }

    Ok(())
}
