//! stw - command line interface for the stw daemon
//!
//! Edits per-app budgets, reports foreground transitions from hook
//! scripts, and shows today's usage and the monitor status.
//!
//! # Usage
//!
//! ```bash
//! # Allow 30 minutes of "org.videolan.vlc" per day
//! stw limit set org.videolan.vlc 30
//!
//! # Remove a limit (a budget of zero does the same)
//! stw limit remove org.videolan.vlc
//!
//! # Report transitions from a window-manager hook
//! stw hook foreground firefox
//! stw hook background firefox
//!
//! # Today's usage since the reset hour
//! stw usage
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use stw_client::{ClientConfig, DaemonClient};
use stw_core::{AppId, EventKind, JsonLimitStore, LimitChange, LimitStore};
use stw_protocol::{MonitorStatus, UsageReport};
use stwd::config::Config;

/// stw - daily time budgets for desktop applications
#[derive(Parser, Debug)]
#[command(name = "stw", version, about)]
struct Args {
    /// Path to the config file (default: ~/.config/stw/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage per-app daily budgets
    #[command(subcommand)]
    Limit(LimitCommand),

    /// Report a foreground transition to the daemon
    #[command(subcommand)]
    Hook(HookCommand),

    /// Show usage in the current daily window
    Usage,

    /// Show the usage monitor status
    Status,
}

#[derive(Subcommand, Debug)]
enum LimitCommand {
    /// Set the daily budget in minutes; zero or less removes the limit
    Set {
        app: String,
        #[arg(allow_negative_numbers = true)]
        minutes: i64,
    },
    /// Remove the limit for an app
    Remove { app: String },
    /// List configured limits
    List,
}

#[derive(Subcommand, Debug)]
enum HookCommand {
    /// The app became the foreground application
    Foreground {
        app: String,
        /// When the transition happened (RFC 3339, default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// The app stopped being the foreground application
    Background {
        app: String,
        /// When the transition happened (RFC 3339, default: now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    match args.command {
        Command::Limit(cmd) => run_limit(&config, cmd),
        Command::Hook(HookCommand::Foreground { app, at }) => {
            report(&config, EventKind::MovedToForeground, &app, at).await
        }
        Command::Hook(HookCommand::Background { app, at }) => {
            report(&config, EventKind::MovedToBackground, &app, at).await
        }
        Command::Usage => {
            let mut client = connect(&config).await?;
            let report = client.query_usage().await.context("Usage query failed")?;
            client.disconnect().await?;
            print_usage(&report);
            Ok(())
        }
        Command::Status => {
            let mut client = connect(&config).await?;
            let status = client.status().await.context("Status query failed")?;
            client.disconnect().await?;
            print_status(&status);
            Ok(())
        }
    }
}

fn parse_app(app: &str) -> Result<AppId> {
    let app = AppId::new(app.trim());
    if app.is_blank() {
        bail!("Application identifier must not be empty");
    }
    Ok(app)
}

// ============================================================================
// Limits
// ============================================================================

fn run_limit(config: &Config, cmd: LimitCommand) -> Result<()> {
    let store = JsonLimitStore::new(config.limits_path());

    match cmd {
        LimitCommand::Set { app, minutes } => {
            let app = parse_app(&app)?;
            let change = store.set_limit(&app, minutes)?;
            print_change(&app, &change);
        }
        LimitCommand::Remove { app } => {
            let app = parse_app(&app)?;
            let change = store.set_limit(&app, 0)?;
            print_change(&app, &change);
        }
        LimitCommand::List => {
            let limits = store.get_all_limits()?;
            if limits.is_empty() {
                println!("No limits configured.");
                return Ok(());
            }

            let mut records: Vec<_> = limits.iter().collect();
            records.sort_by(|a, b| a.app.cmp(&b.app));
            let width = records.iter().map(|l| l.app.as_str().len()).max().unwrap_or(0);
            for limit in records {
                println!("{:<width$}  {} min", limit.app.as_str(), limit.budget_minutes);
            }
        }
    }

    Ok(())
}

fn print_change(app: &AppId, change: &LimitChange) {
    match change {
        LimitChange::Added(limit) => println!("Limit for {app} set to {} min", limit.budget_minutes),
        LimitChange::Updated { previous, limit } => {
            println!("Limit for {app} changed from {previous} to {} min", limit.budget_minutes);
        }
        LimitChange::Removed(_) => println!("Limit for {app} removed"),
        LimitChange::Unchanged => println!("{app} has no limit"),
    }
}

// ============================================================================
// Daemon requests
// ============================================================================

async fn connect(config: &Config) -> Result<DaemonClient> {
    let client_config = ClientConfig {
        connect_attempts: 3,
        ..ClientConfig::with_socket(config.socket_path())
    };
    Ok(DaemonClient::connect(&client_config, None).await?)
}

async fn report(config: &Config, kind: EventKind, app: &str, at: Option<DateTime<Utc>>) -> Result<()> {
    let app = parse_app(app)?;
    let mut client = connect(config).await?;
    client
        .report_transition(kind, app, at)
        .await
        .context("Transition was not recorded")?;
    client.disconnect().await?;
    Ok(())
}

fn print_usage(report: &UsageReport) {
    let since = report.window_start.with_timezone(&Local).format("%Y-%m-%d %H:%M");
    println!("Usage since {since}");

    if report.apps.is_empty() {
        println!("No usage recorded.");
        return;
    }

    let width = report
        .apps
        .iter()
        .map(|e| e.app.as_str().len())
        .max()
        .unwrap_or(0)
        .max(3);
    println!("{:<width$}  {:>8}  {:>8}", "APP", "USED", "LIMIT");
    for entry in &report.apps {
        let limit = entry
            .budget_minutes
            .map_or_else(|| "-".to_string(), |m| format!("{m}m"));
        let marker = if entry.blocked { "  blocked" } else { "" };
        println!(
            "{:<width$}  {:>8}  {:>8}{marker}",
            entry.app.as_str(),
            entry.used_display(),
            limit
        );
    }
}

fn print_status(status: &MonitorStatus) {
    println!("Monitor: {}", if status.running { "running" } else { "stopped" });

    if let Some(app) = &status.tracked_app {
        let since = status
            .session_started_at
            .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("Tracking: {app} (since {since})");
    }

    if !status.blocked.is_empty() {
        let blocked: Vec<&str> = status.blocked.iter().map(AppId::as_str).collect();
        println!("Blocked: {}", blocked.join(", "));
    }

    if let Some(at) = status.last_tick_at {
        println!("Last tick: {}", at.with_timezone(&Local).format("%H:%M:%S"));
    }
    if let Some(outcome) = &status.last_outcome {
        println!("Last outcome: {outcome}");
    }
}
