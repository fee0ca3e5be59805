//! Side effects of enforcement: returning to the home screen and
//! breach notifications.
//!
//! Actions are fire-and-forget. [`CommandActionSink`] spawns the
//! configured command and reaps it in the background, so a slow or
//! hanging helper never delays the monitor tick.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use stw_core::AppId;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Errors from preparing or running an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("command not found: {program}")]
    NotFound { program: String },

    #[error("failed to run {program}: {message}")]
    Spawn { program: String, message: String },
}

/// Receiver of enforcement actions.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Run once before the monitor loop starts. A failure rejects the
    /// start permanently.
    async fn prepare(&self) -> Result<(), ActionError> {
        Ok(())
    }

    /// Brings the home screen to the foreground.
    async fn return_to_home(&self) -> Result<(), ActionError>;

    /// Tells the user `app` reached its budget.
    async fn notify_breach(&self, app: &AppId, used_minutes: u64, budget_minutes: u32) -> Result<(), ActionError>;
}

/// Runs user-configured commands for each action.
///
/// An empty command disables the action.
#[derive(Debug, Clone)]
pub struct CommandActionSink {
    home_command: Vec<String>,
    notify_command: Vec<String>,
}

impl CommandActionSink {
    pub fn new(home_command: Vec<String>, notify_command: Vec<String>) -> Self {
        Self {
            home_command,
            notify_command,
        }
    }

    fn spawn(&self, action: &'static str, argv: &[String]) -> Result<(), ActionError> {
        let Some((program, args)) = argv.split_first() else {
            debug!(action, "Action disabled, no command configured");
            return Ok(());
        };

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ActionError::Spawn {
                program: program.clone(),
                message: e.to_string(),
            })?;

        let program = program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => debug!(action, program = %program, "Action completed"),
                Ok(status) => warn!(action, program = %program, status = %status, "Action command failed"),
                Err(e) => warn!(action, program = %program, error = %e, "Failed to wait for action command"),
            }
        });

        Ok(())
    }
}

#[async_trait]
impl ActionSink for CommandActionSink {
    async fn prepare(&self) -> Result<(), ActionError> {
        for argv in [&self.home_command, &self.notify_command] {
            if let Some(program) = argv.first() {
                if find_program(program).is_none() {
                    return Err(ActionError::NotFound {
                        program: program.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn return_to_home(&self) -> Result<(), ActionError> {
        self.spawn("return_to_home", &self.home_command)
    }

    async fn notify_breach(&self, app: &AppId, used_minutes: u64, budget_minutes: u32) -> Result<(), ActionError> {
        let argv = substitute(&self.notify_command, app, used_minutes, budget_minutes);
        self.spawn("notify_breach", &argv)
    }
}

/// Fills `{app}`, `{used}` and `{budget}` in every argument.
fn substitute(template: &[String], app: &AppId, used_minutes: u64, budget_minutes: u32) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            arg.replace("{app}", app.as_str())
                .replace("{used}", &used_minutes.to_string())
                .replace("{budget}", &budget_minutes.to_string())
        })
        .collect()
}

/// Resolves `program` the way a shell would: paths are checked
/// directly, bare names are searched in `PATH`.
fn find_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }

    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}
