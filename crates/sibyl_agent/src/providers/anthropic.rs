use crate::api_types::{Message, MessagesRequest, MessagesResponse, Tool};
use crate::oracle::{CompletionParams, Oracle};
use crate::retry::{with_retry, RetryConfig};
use anyhow::{Context, Result};
use reqwest::Client;
use sibyl_core::config::LlmConfig;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

#[derive(Debug, Clone)]
pub struct AnthropicOracle {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl AnthropicOracle {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY is not set")?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Ok(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(120))
                .build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Oracle for AnthropicOracle {
    #[tracing::instrument(skip(self, system, messages, tools, params), fields(model = %self.model))]
    async fn complete(
        &self,
        system: &str,
        messages: Vec<Message>,
        tools: Vec<Tool>,
        params: CompletionParams,
    ) -> Result<MessagesResponse> {
        let url = format!("{}/v1/messages", self.base_url);
        let request_body = MessagesRequest {
            model: self.model.clone(),
            system: if system.is_empty() {
                None
            } else {
                Some(system.to_string())
            },
            messages,
            max_tokens: params.max_tokens,
            temperature: Some(params.temperature),
            tools,
        };

        tracing::debug!(
            "Oracle request: {} messages, {} tools, max_tokens={}, temperature={:.2}",
            request_body.messages.len(),
            request_body.tools.len(),
            params.max_tokens,
            params.temperature
        );

        let retry_config = RetryConfig::default();
        let client = &self.client;
        let api_key = &self.api_key;
        let response = with_retry(&retry_config, "Anthropic", || async {
            let resp = client
                .post(&url)
                .header("x-api-key", api_key)
                .header("anthropic-version", "2023-06-01")
                .json(&request_body)
                .send()
                .await
                .context("Failed to send request to Anthropic")?;
            Ok(resp)
        })
        .await?;

        let body = response.text().await?;
        tracing::debug!(
            "Oracle raw response (first 2000 chars): {}",
            &body[..body.len().min(2000)]
        );
        serde_json::from_str(&body).context("Failed to parse Anthropic response")
    }
}
