//! # shellmate core
//!
//! The pieces the mediation loop is built from.
//!
//! ## Core Concepts
//! - **Provider**: trait-based access to a hosted text-generation service
//! - **Session**: append-only conversation log plus the working directory
//! - **Protocol**: sentinel detection, command extraction and normalization
//! - **Executor**: runs approved commands, handles `cd` inside the session
//! - **Tokens**: token estimation with a character fallback

pub mod error;
pub mod executor;
pub mod protocol;
pub mod provider;
pub mod session;
pub mod tokens;

pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use executor::{execute, CommandOutput, Execution};
pub use protocol::{Reply, SENTINEL};
pub use provider::{
    ChatMessage, CompletionRequest, CompletionResponse, FinishReason, GeminiProvider,
    HostedProvider, LlmProvider, OpenAIProvider, ProviderConfig, ProviderError, ProviderType,
    Role, ScriptedProvider, Usage, UsageTracker,
};
pub use session::Session;
pub use tokens::{estimate_tokens, heuristic_tokens, TokenEstimate, TokenSource};
