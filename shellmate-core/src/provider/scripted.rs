//! Scripted provider: replays canned replies in order
//!
//! Used to drive the mediation loop without a network, and by tests to
//! check exactly which history each call received.

use super::*;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A provider that answers from a fixed queue of replies
pub struct ScriptedProvider {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<CompletionRequest>>,
    token_count: Option<usize>,
}

impl ScriptedProvider {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
            token_count: None,
        }
    }

    /// Make `count_tokens` succeed with a fixed value
    pub fn with_token_count(mut self, count: usize) -> Self {
        self.token_count = Some(count);
        self
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let reply = self
            .replies
            .lock()
            .map_err(|_| ProviderError::Other("reply queue poisoned".into()))?
            .pop_front()
            .ok_or_else(|| ProviderError::Other("No more scripted replies".into()))?;

        Ok(CompletionResponse {
            model: "scripted".into(),
            content: Some(reply),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        })
    }

    async fn count_tokens(&self, _text: &str) -> Result<usize, ProviderError> {
        self.token_count
            .ok_or_else(|| ProviderError::Unsupported("scripted provider has no tokenizer".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replays_in_order() {
        let provider = ScriptedProvider::new(["first", "second"]);

        assert_eq!(provider.prompt("a").await.unwrap(), "first");
        assert_eq!(provider.prompt("b").await.unwrap(), "second");
        assert_eq!(provider.call_count(), 2);
        assert_eq!(provider.requests()[1].messages[0].content, "b");
    }

    #[tokio::test]
    async fn test_errors_when_exhausted() {
        let provider = ScriptedProvider::new(Vec::<String>::new());
        assert!(provider.prompt("a").await.is_err());
        assert_eq!(provider.remaining(), 0);
    }

    #[tokio::test]
    async fn test_token_count() {
        let provider = ScriptedProvider::new(["x"]).with_token_count(7);
        assert_eq!(provider.count_tokens("anything").await.unwrap(), 7);
    }
}
