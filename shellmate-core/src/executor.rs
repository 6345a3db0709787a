//! # Shell executor
//!
//! Runs an approved command against a [`Session`]:
//!
//! - `cd <dir>` moves the session directory; no process is spawned
//! - anything else goes to the host shell in the session directory, with
//!   stdout and stderr captured until the process exits
//!
//! Nothing here returns an error. Every failure, including a shell that
//! cannot be spawned, ends up as text for the transcript.

use crate::session::Session;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, info};

const CD_PREFIX: &str = "cd ";

/// Captured result of a spawned command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Each non-empty stream under its own label, trailing whitespace trimmed
    pub fn render(&self) -> String {
        let mut sections = Vec::new();
        let stdout = self.stdout.trim_end();
        let stderr = self.stderr.trim_end();
        if !stdout.is_empty() {
            sections.push(format!("STDOUT:\n{}", stdout));
        }
        if !stderr.is_empty() {
            sections.push(format!("STDERR:\n{}", stderr));
        }
        if sections.is_empty() {
            return "(no output)".to_string();
        }
        sections.join("\n\n")
    }
}

/// What running one command did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    Spawned(CommandOutput),
    ChangedDirectory(PathBuf),
    DirectoryNotFound { target: String, reason: String },
    SpawnFailed(String),
}

impl Execution {
    /// Text describing the result, as shown to the user and the model
    pub fn transcript(&self) -> String {
        match self {
            Execution::Spawned(output) => output.render(),
            Execution::ChangedDirectory(dir) => format!("Changed directory to {}", dir.display()),
            Execution::DirectoryNotFound { target, reason } => {
                format!("Directory not found: {} ({})", target, reason)
            }
            Execution::SpawnFailed(reason) => format!("Failed to run command: {}", reason),
        }
    }

    pub fn spawned_process(&self) -> bool {
        matches!(self, Execution::Spawned(_))
    }
}

/// The argument of a `cd <dir>` command, if this is one
pub fn cd_target(command: &str) -> Option<&str> {
    command.strip_prefix(CD_PREFIX)
}

/// Run `command` for `session`. `cd` mutates the session in place.
pub async fn execute(command: &str, session: &mut Session) -> Execution {
    if let Some(target) = cd_target(command) {
        return match session.change_dir(target) {
            Ok(dir) => {
                info!(dir = %dir.display(), "executor: changed directory");
                Execution::ChangedDirectory(dir.to_path_buf())
            }
            Err(e) => {
                debug!(error = %e, "executor: cd failed");
                Execution::DirectoryNotFound {
                    target: target.to_string(),
                    reason: e.message().to_string(),
                }
            }
        };
    }

    debug!(%command, cwd = %session.cwd().display(), "executor: spawning");
    match shell(command).current_dir(session.cwd()).output().await {
        Ok(output) => {
            let exit_code = output.status.code();
            debug!(?exit_code, "executor: command exited");
            Execution::Spawned(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code,
            })
        }
        Err(e) => {
            debug!(error = %e, "executor: spawn failed");
            Execution::SpawnFailed(e.to_string())
        }
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}
