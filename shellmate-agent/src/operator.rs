//! The user boundary: whoever approves commands and reads replies

use shellmate_core::{Error, Result};
use std::collections::VecDeque;

/// The human at the terminal, as the loop sees them
pub trait Operator {
    /// Show a pending command verbatim and return the raw answer
    fn review(&mut self, command: &str) -> Result<String>;

    /// Show an ordinary model reply
    fn reply(&mut self, text: &str);

    /// Show what an executed command produced
    fn output(&mut self, text: &str);
}

/// Only an explicit `y` (any case) approves. Everything else is a denial.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// An operator that answers from a script and records what it was shown
#[derive(Debug, Default)]
pub struct ScriptedOperator {
    answers: VecDeque<String>,
    pub reviewed: Vec<String>,
    pub replies: Vec<String>,
    pub outputs: Vec<String>,
}

impl ScriptedOperator {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }
}

impl Operator for ScriptedOperator {
    fn review(&mut self, command: &str) -> Result<String> {
        self.reviewed.push(command.to_string());
        self.answers
            .pop_front()
            .ok_or_else(|| Error::interrupted("no scripted answer left").with_operation("operator::review"))
    }

    fn reply(&mut self, text: &str) {
        self.replies.push(text.to_string());
    }

    fn output(&mut self, text: &str) {
        self.outputs.push(text.to_string());
    }
}
