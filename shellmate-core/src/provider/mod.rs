//! # LLM Provider Interface
//!
//! A trait-based abstraction over hosted text-generation services.
//!
//! ## Design
//! - `LlmProvider` defines the interface: text in, text out
//! - Implementations for Gemini, OpenAI-compatible APIs, and a scripted
//!   provider that replays canned replies
//! - `HostedProvider` picks a hosted implementation at runtime
//! - Token counting is optional; providers without an endpoint say so

pub mod gemini;
pub mod openai;
pub mod scripted;

pub use gemini::GeminiProvider;
pub use openai::OpenAIProvider;
pub use scripted::ScriptedProvider;

use serde::{Deserialize, Serialize};
use shellmate_error::{Error, ErrorKind};
use std::collections::HashMap;

// ============================================================================
// Core Types
// ============================================================================

/// A message in the conversation log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// A message attributed to command execution rather than the user
    pub fn command(content: impl Into<String>) -> Self {
        Self {
            role: Role::Command,
            content: content.into(),
        }
    }

    /// Short one-line preview for listings
    pub fn preview(&self, max_chars: usize) -> String {
        let first_line = self.content.lines().next().unwrap_or("");
        let preview: String = first_line.chars().take(max_chars).collect();
        if preview.len() < self.content.len() {
            format!("{}...", preview)
        } else {
            preview
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Output of a command the loop ran; sent to services as a user message
    Command,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Command => "command",
        }
    }
}

/// Request parameters for a completion
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub model: String,
    pub content: Option<String>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown,
}

/// Token usage information
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

// ============================================================================
// Provider Errors
// ============================================================================

/// Transport-level failure talking to a provider
#[derive(Debug)]
pub enum ProviderError {
    /// Network/connection error
    Network(String),
    /// API returned an error
    Api { status: u16, message: String },
    /// Failed to parse response
    Parse(String),
    /// Rate limited or out of quota
    RateLimited { retry_after: Option<u64> },
    /// Authentication failed
    AuthenticationFailed,
    /// The provider has no such capability
    Unsupported(String),
    /// The model answered without text
    EmptyResponse,
    /// Other error
    Other(String),
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network(e) => write!(f, "Network error: {}", e),
            Self::Api { status, message } => write!(f, "API error ({}): {}", status, message),
            Self::Parse(e) => write!(f, "Parse error: {}", e),
            Self::RateLimited { retry_after } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after {
                    write!(f, " (retry after {}s)", secs)?;
                }
                Ok(())
            }
            Self::AuthenticationFailed => write!(f, "Authentication failed"),
            Self::Unsupported(what) => write!(f, "Unsupported: {}", what),
            Self::EmptyResponse => write!(f, "Empty response"),
            Self::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        let kind = match &err {
            ProviderError::Network(_) => ErrorKind::NetworkFailed,
            ProviderError::Api { status, .. } if *status >= 500 => ErrorKind::ProviderUnavailable,
            ProviderError::Api { .. } => ErrorKind::InferenceFailed,
            ProviderError::Parse(_) => ErrorKind::ParseFailed,
            ProviderError::RateLimited { .. } => ErrorKind::RateLimited,
            ProviderError::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            ProviderError::Unsupported(_) => ErrorKind::Unsupported,
            ProviderError::EmptyResponse => ErrorKind::EmptyResponse,
            ProviderError::Other(_) => ErrorKind::InferenceFailed,
        };
        let mut error = Error::new(kind, err.to_string()).with_operation("provider");
        if let ProviderError::Api { status, .. } = &err {
            error = error.with_context("status", status.to_string());
        }
        error.set_source(err)
    }
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn status_error(status: u16, body: String) -> ProviderError {
    match status {
        401 | 403 => ProviderError::AuthenticationFailed,
        429 => ProviderError::RateLimited { retry_after: None },
        _ => ProviderError::Api { status, message: body },
    }
}

// ============================================================================
// Provider Trait
// ============================================================================

/// The main LLM provider trait
#[allow(async_fn_in_trait)]
pub trait LlmProvider {
    /// Provider name (e.g. "gemini", "openai")
    fn name(&self) -> &str;

    fn default_model(&self) -> &str;

    /// Send a completion request and get a full response
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Count tokens of `text` with the service's tokenizer
    async fn count_tokens(&self, _text: &str) -> Result<usize, ProviderError> {
        Err(ProviderError::Unsupported(format!(
            "{} has no token counting endpoint",
            self.name()
        )))
    }

    /// Simple prompt -> response helper
    async fn prompt(&self, prompt: &str) -> Result<String, ProviderError> {
        self.chat(vec![ChatMessage::user(prompt)]).await
    }

    /// Chat with message history
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, ProviderError> {
        let request = CompletionRequest::new(messages);
        let response = self.complete(request).await?;
        response.content.ok_or(ProviderError::EmptyResponse)
    }
}

/// A hosted provider chosen at runtime from configuration
pub enum HostedProvider {
    Gemini(GeminiProvider),
    OpenAI(OpenAIProvider),
}

impl HostedProvider {
    pub fn from_config(config: ProviderConfig) -> shellmate_error::Result<Self> {
        match config.provider_type {
            ProviderType::Gemini => Ok(Self::Gemini(GeminiProvider::new(config)?)),
            ProviderType::OpenAI | ProviderType::Local => Ok(Self::OpenAI(OpenAIProvider::new(config)?)),
        }
    }
}

impl LlmProvider for HostedProvider {
    fn name(&self) -> &str {
        match self {
            Self::Gemini(p) => p.name(),
            Self::OpenAI(p) => p.name(),
        }
    }

    fn default_model(&self) -> &str {
        match self {
            Self::Gemini(p) => p.default_model(),
            Self::OpenAI(p) => p.default_model(),
        }
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        match self {
            Self::Gemini(p) => p.complete(request).await,
            Self::OpenAI(p) => p.complete(request).await,
        }
    }

    async fn count_tokens(&self, text: &str) -> Result<usize, ProviderError> {
        match self {
            Self::Gemini(p) => p.count_tokens(text).await,
            Self::OpenAI(p) => p.count_tokens(text).await,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const OPENAI_API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Configuration for creating providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    /// HTTP timeout; `None` waits as long as the service takes
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Gemini,
    OpenAI,
    /// OpenAI-compatible server without credentials (Ollama, vLLM)
    Local,
}

impl std::str::FromStr for ProviderType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            "local" | "ollama" => Ok(Self::Local),
            other => Err(Error::config_invalid(format!("unknown provider '{}'", other))
                .with_context("provider", other)),
        }
    }
}

impl ProviderConfig {
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Gemini,
            api_key: Some(api_key.into()),
            base_url: Some("https://generativelanguage.googleapis.com/v1beta".into()),
            default_model: Some("gemini-1.5-pro-latest".into()),
            timeout_secs: None,
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            api_key: Some(api_key.into()),
            base_url: Some("https://api.openai.com/v1".into()),
            default_model: Some("gpt-4o".into()),
            timeout_secs: None,
        }
    }

    pub fn local(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::Local,
            api_key: None,
            base_url: Some(base_url.into()),
            default_model: Some(model.into()),
            timeout_secs: None,
        }
    }

    /// Build a config for `provider_type` with its key read from the environment.
    ///
    /// A local provider needs no key and defaults to Ollama's endpoint.
    pub fn from_env(provider_type: ProviderType) -> shellmate_error::Result<Self> {
        match provider_type {
            ProviderType::Gemini => Ok(Self::gemini(read_key(GEMINI_API_KEY_VAR)?)),
            ProviderType::OpenAI => Ok(Self::openai(read_key(OPENAI_API_KEY_VAR)?)),
            ProviderType::Local => Ok(Self::local("http://localhost:11434/v1", "llama3")),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    /// Build the HTTP client this config describes
    pub(crate) fn http_client(&self) -> shellmate_error::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = self.timeout_secs {
            builder = builder.timeout(std::time::Duration::from_secs(secs));
        }
        builder.build().map_err(|e| {
            Error::config_invalid("failed to create HTTP client")
                .with_operation("provider::http_client")
                .set_source(e)
        })
    }
}

fn read_key(variable: &str) -> shellmate_error::Result<String> {
    match std::env::var(variable) {
        Ok(key) if !key.trim().is_empty() => Ok(key.trim().to_string()),
        _ => Err(Error::credentials_missing(variable).with_operation("provider::from_env")),
    }
}

// ============================================================================
// Usage Tracking
// ============================================================================

/// Tracks token usage across multiple calls
#[derive(Debug, Clone, Default)]
pub struct UsageTracker {
    pub total_calls: usize,
    pub total_prompt_tokens: usize,
    pub total_completion_tokens: usize,
    pub by_model: HashMap<String, Usage>,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, model: &str, usage: &Usage) {
        self.total_calls += 1;
        self.total_prompt_tokens += usage.prompt_tokens;
        self.total_completion_tokens += usage.completion_tokens;

        let entry = self.by_model.entry(model.to_string()).or_default();
        entry.prompt_tokens += usage.prompt_tokens;
        entry.completion_tokens += usage.completion_tokens;
        entry.total_tokens += usage.total_tokens;
    }

    pub fn total_tokens(&self) -> usize {
        self.total_prompt_tokens + self.total_completion_tokens
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_constructors() {
        let sys = ChatMessage::system("You are a terminal assistant");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "You are a terminal assistant");

        assert_eq!(ChatMessage::user("list files").role, Role::User);
        assert_eq!(ChatMessage::assistant("<command>ls</command>").role, Role::Assistant);
        assert_eq!(ChatMessage::command("STDOUT:\nhello").role, Role::Command);
    }

    #[test]
    fn test_message_preview() {
        let msg = ChatMessage::command("Command output:\nSTDOUT:\nhello");
        assert_eq!(msg.preview(7), "Command...");
        assert_eq!(ChatMessage::user("hi").preview(50), "hi");
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(vec![ChatMessage::user("Hello")])
            .with_model("gemini-1.5-flash")
            .with_temperature(0.2)
            .with_max_tokens(512);

        assert_eq!(request.model, Some("gemini-1.5-flash".into()));
        assert_eq!(request.temperature, Some(0.2));
        assert_eq!(request.max_tokens, Some(512));
    }

    #[test]
    fn test_provider_config() {
        let config = ProviderConfig::gemini("key");
        assert_eq!(config.provider_type, ProviderType::Gemini);
        assert_eq!(config.default_model.as_deref(), Some("gemini-1.5-pro-latest"));
        assert!(config.timeout_secs.is_none());

        let config = ProviderConfig::openai("sk-test").with_timeout(30);
        assert_eq!(config.provider_type, ProviderType::OpenAI);
        assert_eq!(config.timeout_secs, Some(30));
    }

    #[test]
    fn test_provider_type_parse() {
        assert_eq!("Gemini".parse::<ProviderType>().unwrap(), ProviderType::Gemini);
        assert_eq!("ollama".parse::<ProviderType>().unwrap(), ProviderType::Local);
        let err = "claude-cli".parse::<ProviderType>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn test_missing_key_is_reported() {
        let err = read_key("SHELLMATE_TEST_DEFINITELY_UNSET_KEY").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CredentialsMissing);
        assert!(err.message().contains("SHELLMATE_TEST_DEFINITELY_UNSET_KEY"));
    }

    #[test]
    fn test_provider_error_conversion() {
        let err: Error = ProviderError::RateLimited { retry_after: Some(3) }.into();
        assert_eq!(err.kind(), ErrorKind::RateLimited);
        assert!(err.is_retryable());

        let err: Error = ProviderError::Api { status: 503, message: "overloaded".into() }.into();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        assert_eq!(err.context()[0], ("status", "503".to_string()));

        let err: Error = ProviderError::AuthenticationFailed.into();
        assert_eq!(err.kind(), ErrorKind::AuthenticationFailed);
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(status_error(429, String::new()), ProviderError::RateLimited { .. }));
        assert!(matches!(status_error(403, String::new()), ProviderError::AuthenticationFailed));
        assert!(matches!(status_error(400, "bad".into()), ProviderError::Api { status: 400, .. }));
    }

    #[test]
    fn test_usage_tracker() {
        let mut tracker = UsageTracker::new();

        tracker.track("gemini-1.5-pro-latest", &Usage {
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
        });
        tracker.track("gemini-1.5-pro-latest", &Usage {
            prompt_tokens: 200,
            completion_tokens: 100,
            total_tokens: 300,
        });

        assert_eq!(tracker.total_calls, 2);
        assert_eq!(tracker.total_tokens(), 450);
        assert_eq!(tracker.by_model["gemini-1.5-pro-latest"].total_tokens, 450);
    }
}
