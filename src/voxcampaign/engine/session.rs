//! Conversational session: maintains dialogue history within a token
//! budget and mediates the back-and-forth between the model and the tool
//! registry, the same shape as a plain chat session but generalized to also
//! dispatch tool calls and resolve the workflow's next node.
//!
//! Token counting uses the same rough one-token-per-four-characters
//! estimate in place of a real tokenizer; it's accurate enough to decide
//! when to trim history and isn't relied on for anything that needs to be
//! exact.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::tools::{HandlerRegistry, ToolMetadata};
use crate::error::VoxResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// A tool invocation the model requested, to be dispatched through the
/// [`HandlerRegistry`] before the session continues.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool_name: String,
    pub arguments: serde_json::Value,
}

/// One model turn: either plain content, or one or more tool calls to
/// resolve before the model can produce its final content.
#[derive(Debug, Clone)]
pub struct LlmTurn {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolCallRequest>,
}

/// Abstraction over whichever LLM backend actually serves completions.
/// Kept minimal and provider-agnostic, mirroring how the telephony layer
/// abstracts over providers: the engine only depends on this trait.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message], tools: &[ToolMetadata]) -> VoxResult<LlmTurn>;
}

fn count_tokens(text: &str) -> usize {
    (text.len() / 4).max(1)
}

fn count_message_tokens(message: &Message) -> usize {
    1 + count_tokens(&message.content)
}

/// Outcome of one [`EngineSession::step`] call: the model's final spoken
/// content for this turn, plus any control signal a tool raised (end call,
/// transfer) that the pipeline needs to act on after this turn finishes.
pub struct StepOutcome {
    pub spoken_content: Option<String>,
    pub tool_results: Vec<(String, serde_json::Value)>,
}

pub struct EngineSession {
    client: Arc<dyn LlmClient>,
    tools: HandlerRegistry,
    system_prompt: Message,
    history: Vec<Message>,
    max_tokens: usize,
    token_count: usize,
    /// Guards against a model that keeps calling tools forever within one
    /// turn; after this many rounds we stop dispatching and return
    /// whatever text the model has produced.
    max_tool_rounds: usize,
}

impl EngineSession {
    pub fn new(client: Arc<dyn LlmClient>, tools: HandlerRegistry, system_prompt: impl Into<String>, max_tokens: usize) -> Self {
        let system_prompt = Message {
            role: Role::System,
            content: system_prompt.into(),
        };
        let token_count = count_message_tokens(&system_prompt);
        Self {
            client,
            tools,
            system_prompt,
            history: Vec::new(),
            max_tokens,
            token_count,
            max_tool_rounds: 4,
        }
    }

    /// Swap in a fresh tool registry, e.g. when the workflow graph moves to
    /// a node with a different set of available tools.
    pub fn set_tools(&mut self, tools: HandlerRegistry) {
        self.tools = tools;
    }

    pub fn client(&self) -> &dyn LlmClient {
        self.client.as_ref()
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt.content
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        let old_tokens = count_message_tokens(&self.system_prompt);
        self.system_prompt = Message {
            role: Role::System,
            content: prompt.into(),
        };
        let new_tokens = count_message_tokens(&self.system_prompt);
        self.token_count = self.token_count - old_tokens + new_tokens;
    }

    fn push(&mut self, message: Message) {
        self.token_count += count_message_tokens(&message);
        self.history.push(message);
        self.trim();
    }

    fn trim(&mut self) {
        while self.token_count > self.max_tokens && !self.history.is_empty() {
            let removed = self.history.remove(0);
            self.token_count -= count_message_tokens(&removed);
        }
    }

    /// Send the caller's utterance, resolving any tool calls the model
    /// makes along the way, and return the model's final spoken content
    /// for this turn.
    pub async fn step(&mut self, caller_utterance: &str) -> VoxResult<StepOutcome> {
        self.push(Message {
            role: Role::User,
            content: caller_utterance.to_string(),
        });

        let mut tool_results = Vec::new();
        let available_tools = self.tools.metadata().await;

        for _ in 0..self.max_tool_rounds {
            let mut messages = Vec::with_capacity(self.history.len() + 1);
            messages.push(self.system_prompt.clone());
            messages.extend(self.history.iter().cloned());

            let turn = self.client.complete(&messages, &available_tools).await?;

            if turn.tool_calls.is_empty() {
                if let Some(content) = &turn.content {
                    self.push(Message {
                        role: Role::Assistant,
                        content: content.clone(),
                    });
                }
                return Ok(StepOutcome {
                    spoken_content: turn.content,
                    tool_results,
                });
            }

            for call in turn.tool_calls {
                let result = self.tools.call(&call.tool_name, call.arguments).await;
                let (content, value) = match result {
                    Ok(value) => (serde_json::to_string(&value).unwrap_or_default(), value),
                    Err(err) => (format!("error: {err}"), serde_json::json!({"error": err.to_string()})),
                };
                self.push(Message { role: Role::Tool, content });
                tool_results.push((call.tool_name, value));
            }
        }

        Ok(StepOutcome {
            spoken_content: None,
            tool_results,
        })
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct ScriptedClient {
        turns: Mutex<Vec<LlmTurn>>,
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn complete(&self, _messages: &[Message], _tools: &[ToolMetadata]) -> VoxResult<LlmTurn> {
            Ok(self.turns.lock().unwrap().remove(0))
        }
    }

    #[tokio::test]
    async fn step_returns_plain_content_with_no_tool_calls() {
        let client = Arc::new(ScriptedClient {
            turns: Mutex::new(vec![LlmTurn {
                content: Some("Hello!".into()),
                tool_calls: vec![],
            }]),
        });
        let mut session = EngineSession::new(client, HandlerRegistry::new(), "You are helpful.", 1000);
        let outcome = session.step("Hi").await.unwrap();
        assert_eq!(outcome.spoken_content, Some("Hello!".into()));
    }

    #[tokio::test]
    async fn step_dispatches_tool_calls_before_returning_content() {
        use super::super::tools::{ParameterType, ToolHandler, ToolParameter};

        struct FixedTool;
        #[async_trait]
        impl ToolHandler for FixedTool {
            fn metadata(&self) -> ToolMetadata {
                ToolMetadata {
                    name: "fixed".into(),
                    description: "always returns 42".into(),
                    parameters: vec![ToolParameter {
                        name: "x".into(),
                        description: "unused".into(),
                        parameter_type: ParameterType::Number,
                        required: false,
                    }],
                }
            }
            async fn call(&self, _arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
                Ok(serde_json::json!(42))
            }
        }

        let registry = HandlerRegistry::new();
        registry.register(Arc::new(FixedTool)).await;

        let client = Arc::new(ScriptedClient {
            turns: Mutex::new(vec![
                LlmTurn {
                    content: None,
                    tool_calls: vec![ToolCallRequest {
                        tool_name: "fixed".into(),
                        arguments: serde_json::json!({}),
                    }],
                },
                LlmTurn {
                    content: Some("The answer is 42.".into()),
                    tool_calls: vec![],
                },
            ]),
        });

        let mut session = EngineSession::new(client, registry, "You are helpful.", 1000);
        let outcome = session.step("What's the answer?").await.unwrap();
        assert_eq!(outcome.spoken_content, Some("The answer is 42.".into()));
        assert_eq!(outcome.tool_results.len(), 1);
        assert_eq!(outcome.tool_results[0].1, serde_json::json!(42));
    }

    #[tokio::test]
    async fn history_trims_to_max_tokens() {
        let client = Arc::new(ScriptedClient {
            turns: Mutex::new(vec![LlmTurn {
                content: Some("ok".into()),
                tool_calls: vec![],
            }]),
        });
        let mut session = EngineSession::new(client, HandlerRegistry::new(), "sp", 5);
        session.step("a very long caller utterance indeed").await.unwrap();
        let total: usize = session.history().iter().map(count_message_tokens).sum();
        assert!(total <= 5 || session.history().len() <= 1);
    }
}
