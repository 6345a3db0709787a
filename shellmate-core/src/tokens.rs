//! Token estimation
//!
//! Asks the provider's tokenizer first. On any failure it falls back to the
//! usual rough rule of one token per four characters.

use crate::provider::LlmProvider;
use tracing::warn;

/// Characters per token in the fallback heuristic
pub const CHARS_PER_TOKEN: usize = 4;

/// How a token count was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Provider,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenEstimate {
    pub tokens: usize,
    pub source: TokenSource,
}

/// `chars / 4`, counting characters rather than bytes
pub fn heuristic_tokens(text: &str) -> usize {
    text.chars().count() / CHARS_PER_TOKEN
}

pub async fn estimate_tokens<P: LlmProvider>(provider: &P, text: &str) -> TokenEstimate {
    match provider.count_tokens(text).await {
        Ok(tokens) => TokenEstimate {
            tokens,
            source: TokenSource::Provider,
        },
        Err(e) => {
            warn!(provider = provider.name(), error = %e, "could not count tokens, using character heuristic");
            TokenEstimate {
                tokens: heuristic_tokens(text),
                source: TokenSource::Heuristic,
            }
        }
    }
}
