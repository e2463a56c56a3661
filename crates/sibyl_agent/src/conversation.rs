//! The generate/act/observe loop.
//!
//! Each user turn runs: call the oracle with the full history and tool
//! declarations; if the response carries tool calls, execute them in order,
//! append their results, and go again; a plain text response ends the turn.
//! Rounds are capped so a confused model cannot spin forever.

use crate::api_types::{ContentBlock, Message, Role, Tool};
use crate::oracle::{CompletionParams, Oracle};
use crate::registry::{execute_tool, to_tool_result};
use crate::schema::build_declarations;
use anyhow::Result;
use regex::Regex;
use sibyl_tools::Toolkit;
use std::sync::{Arc, LazyLock};

const EMPTY_INPUT_REPLY: &str = "Please provide a message.";
const CAP_REPLY: &str =
    "I wasn't able to finish within the allowed number of tool steps. \
     Try narrowing the question or breaking it into smaller parts.";

/// The system prompt forbids showing raw SQL; strip any fenced SQL blocks
/// that slip through anyway.
static SQL_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:sql|snowflake)\n.*?```").unwrap());

pub struct Conversation {
    oracle: Arc<dyn Oracle>,
    toolkit: Arc<Toolkit>,
    system_prompt: String,
    declarations: Vec<Tool>,
    params: CompletionParams,
    max_tool_turns: usize,
}

impl Conversation {
    /// Declarations are built once here and stay fixed for the lifetime of
    /// the conversation.
    pub fn new(oracle: Arc<dyn Oracle>, toolkit: Arc<Toolkit>, system_prompt: String) -> Self {
        let params = CompletionParams {
            max_tokens: toolkit.config.llm.max_tokens,
            temperature: toolkit.config.llm.temperature,
        };
        let max_tool_turns = toolkit.config.agent.max_tool_turns;
        Self {
            oracle,
            toolkit,
            system_prompt,
            declarations: build_declarations(),
            params,
            max_tool_turns,
        }
    }

    pub fn declarations(&self) -> &[Tool] {
        &self.declarations
    }

    /// Run one user turn. `history` belongs to the caller and is extended
    /// in place with the user message, every intermediate assistant/tool
    /// exchange, and the final reply, so follow-up questions keep context.
    ///
    /// Never fails: transport and protocol errors are rendered as a
    /// readable reply instead of surfacing to the caller.
    pub async fn send(&self, history: &mut Vec<Message>, input: &str) -> String {
        match self.run_turn(history, input).await {
            Ok(reply) => reply,
            Err(e) => {
                tracing::error!("Turn failed: {:#}", e);
                format!("An error occurred: {:#}", e)
            }
        }
    }

    #[tracing::instrument(skip(self, history, input), fields(history_len = history.len()))]
    async fn run_turn(&self, history: &mut Vec<Message>, input: &str) -> Result<String> {
        if input.trim().is_empty() {
            return Ok(EMPTY_INPUT_REPLY.to_string());
        }

        history.push(Message::user_text(input));

        let mut last_text = String::new();
        for round in 0..self.max_tool_turns {
            let response = self
                .oracle
                .complete(
                    &self.system_prompt,
                    history.clone(),
                    self.declarations.clone(),
                    self.params.clone(),
                )
                .await?;

            history.push(Message {
                role: Role::Assistant,
                content: response.content.clone(),
            });

            last_text.clear();
            let mut tool_uses: Vec<(String, String, serde_json::Value)> = Vec::new();
            for block in &response.content {
                match block {
                    ContentBlock::Text { text } => {
                        if !last_text.is_empty() {
                            last_text.push('\n');
                        }
                        last_text.push_str(text);
                    }
                    ContentBlock::ToolUse { id, name, input } => {
                        tool_uses.push((id.clone(), name.clone(), input.clone()));
                    }
                    ContentBlock::ToolResult { .. } => {}
                }
            }

            if tool_uses.is_empty() {
                return Ok(clean_response(&last_text));
            }

            tracing::info!("Round {}: {} tool call(s)", round + 1, tool_uses.len());
            let mut result_blocks = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in &tool_uses {
                let result = execute_tool(&self.toolkit, name, input).await;
                result_blocks.push(to_tool_result(id, &result));
            }
            history.push(Message {
                role: Role::User,
                content: result_blocks,
            });
        }

        tracing::warn!(
            "Tool-turn cap ({}) reached without a final answer",
            self.max_tool_turns
        );
        let reply = if last_text.trim().is_empty() {
            CAP_REPLY.to_string()
        } else {
            clean_response(&last_text)
        };
        Ok(reply)
    }
}

fn clean_response(text: &str) -> String {
    SQL_FENCE.replace_all(text, "").trim().to_string()
}
