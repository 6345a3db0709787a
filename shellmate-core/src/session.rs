//! # Session state
//!
//! A session lives for the whole process and holds two things:
//! - the conversation log, append-only, replayed to the service on every call
//! - the working directory every spawned command runs in
//!
//! The working directory is a plain field. The process-wide cwd is never
//! touched; only [`Session::change_dir`] moves it.

use crate::provider::{ChatMessage, LlmProvider, Role};
use crate::tokens::{self, TokenEstimate};
use shellmate_error::{Error, ErrorKind, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Session {
    history: Vec<ChatMessage>,
    cwd: PathBuf,
    turns: usize,
}

impl Session {
    /// Start a session whose log opens with `context` as the system message
    pub fn new(context: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            history: vec![ChatMessage::system(context)],
            cwd: cwd.into(),
            turns: 0,
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Append to the log. There is no way to edit or drop earlier entries.
    pub fn push(&mut self, message: ChatMessage) {
        debug!(role = message.role.as_str(), len = message.content.len(), "session::push");
        self.history.push(message);
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn turns(&self) -> usize {
        self.turns
    }

    /// Count a new user turn
    pub fn begin_turn(&mut self) -> usize {
        self.turns += 1;
        self.turns
    }

    /// Messages with the given role
    pub fn count_role(&self, role: Role) -> usize {
        self.history.iter().filter(|m| m.role == role).count()
    }

    /// The whole log as one string, for token estimation
    pub fn transcript(&self) -> String {
        self.history
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Estimated size of the log as it would be sent to `provider`
    pub async fn estimate_tokens<P: LlmProvider>(&self, provider: &P) -> TokenEstimate {
        tokens::estimate_tokens(provider, &self.transcript()).await
    }

    /// Resolve `target` against the current directory and move there.
    ///
    /// Relative targets are joined onto the session directory, `~` expands
    /// to the home directory. The result is canonicalized and must be an
    /// existing directory; on error the session directory is unchanged.
    pub fn change_dir(&mut self, target: &str) -> Result<&Path> {
        let resolved = self.resolve(target)?;
        let canonical = resolved.canonicalize().map_err(|e| {
            Error::from(e)
                .with_operation("session::change_dir")
                .with_context("target", target)
        })?;

        if !canonical.is_dir() {
            return Err(Error::new(ErrorKind::InvalidArgument, "not a directory")
                .with_operation("session::change_dir")
                .with_context("target", target));
        }

        debug!(from = %self.cwd.display(), to = %canonical.display(), "session::change_dir");
        self.cwd = canonical;
        Ok(&self.cwd)
    }

    fn resolve(&self, target: &str) -> Result<PathBuf> {
        let target = target.trim();
        if target.is_empty() {
            return Err(Error::invalid_argument("empty directory").with_operation("session::change_dir"));
        }

        let expanded = if target == "~" || target.starts_with("~/") {
            let home = dirs::home_dir().ok_or_else(|| {
                Error::new(ErrorKind::Unsupported, "home directory is unknown")
                    .with_operation("session::change_dir")
            })?;
            home.join(target.trim_start_matches('~').trim_start_matches('/'))
        } else {
            PathBuf::from(target)
        };

        // join() keeps absolute paths as they are
        Ok(self.cwd.join(expanded))
    }
}
