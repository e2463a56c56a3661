use crate::api_types::{Message, MessagesResponse, Tool};
use anyhow::Result;
use async_trait::async_trait;

/// Sampling parameters for one oracle request.
#[derive(Debug, Clone)]
pub struct CompletionParams {
    pub max_tokens: u32,
    /// Near-zero temperature keeps generated SQL stable across retries of
    /// the same question.
    pub temperature: f32,
}

impl Default for CompletionParams {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            temperature: 0.0,
        }
    }
}

/// The external language model behind the conversation loop. Implemented
/// over the Anthropic Messages wire shape in `providers`; tests script it.
#[async_trait]
pub trait Oracle: Send + Sync {
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        tools: Vec<Tool>,
        params: CompletionParams,
    ) -> Result<MessagesResponse>;
}
