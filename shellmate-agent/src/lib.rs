//! # shellmate agent
//!
//! The mediation loop between the model and the shell:
//! 1. The user says something
//! 2. The model answers; a `<command>` tag pair means it wants a command run
//! 3. The command is shown to the user and runs only if they approve
//! 4. The output (or the refusal) goes back to the model
//! 5. Repeat until the model says `DONE` or answers in plain text
//!
//! The model proposes, the user disposes.

mod mediator;
mod operator;
pub mod prompts;

pub use mediator::{AgentConfig, Exchange, Mediator, Outcome, TurnEnd, TurnReport};
pub use operator::{is_affirmative, Operator, ScriptedOperator};
