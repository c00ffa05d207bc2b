//! Built-in tool handlers available to the conversational engine, and the
//! registry that dispatches a model's tool call to one of them by name.
//!
//! This is a typed analogue of a dynamic "call a function by its string
//! name" dispatcher: each handler declares its [`ToolMetadata`] (so it can be
//! advertised to the LLM) and is looked up by name at call time rather than
//! reflected into from a string.

pub mod calculator;
pub mod end_call;
pub mod http_tool;
pub mod knowledge_base;
pub mod time_tools;
pub mod transfer_call;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::{VoxError, VoxResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Number,
    Boolean,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    pub description: String,
    pub parameter_type: ParameterType,
    pub required: bool,
}

/// Everything the LLM needs to decide when, and with what arguments, to
/// call this tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolMetadata {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
}

/// A tool handler implemented in-process. Arguments arrive as a JSON object
/// (already parsed out of the LLM's tool-call payload); the result is
/// returned as JSON, to be serialized back into the conversation as the
/// tool's response message.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    fn metadata(&self) -> ToolMetadata;
    async fn call(&self, arguments: serde_json::Value) -> VoxResult<serde_json::Value>;
}

/// A registry of named tool handlers, shared across all concurrent calls
/// using the same workflow (handlers themselves are stateless or carry
/// their own internal synchronization).
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Arc<dyn ToolHandler>>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, handler: Arc<dyn ToolHandler>) {
        let name = handler.metadata().name.clone();
        self.handlers.write().await.insert(name, handler);
    }

    pub async fn metadata(&self) -> Vec<ToolMetadata> {
        self.handlers.read().await.values().map(|h| h.metadata()).collect()
    }

    pub async fn call(&self, name: &str, arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
        let handler = self
            .handlers
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| VoxError::UnknownTool(name.to_string()))?;
        handler.call(arguments).await
    }

    pub async fn is_registered(&self, name: &str) -> bool {
        self.handlers.read().await.contains_key(name)
    }

    /// Look up a registered handler by name, e.g. to carry it over into a
    /// differently-scoped registry built for another workflow node.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.handlers.read().await.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    #[async_trait]
    impl ToolHandler for EchoTool {
        fn metadata(&self) -> ToolMetadata {
            ToolMetadata {
                name: "echo".into(),
                description: "Echoes its input back".into(),
                parameters: vec![],
            }
        }

        async fn call(&self, arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
            Ok(arguments)
        }
    }

    #[tokio::test]
    async fn dispatches_by_registered_name() {
        let registry = HandlerRegistry::new();
        registry.register(Arc::new(EchoTool)).await;
        let result = registry.call("echo", serde_json::json!({"x": 1})).await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error() {
        let registry = HandlerRegistry::new();
        assert!(registry.call("nope", serde_json::json!({})).await.is_err());
    }
}
