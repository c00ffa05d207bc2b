//! Knowledge-base lookup tool: application-provided reference text (FAQ
//! answers, policy text, product details) the agent can retrieve by topic
//! rather than having to carry the whole thing in its system prompt.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::{ParameterType, ToolHandler, ToolMetadata, ToolParameter};
use crate::error::{VoxError, VoxResult};

/// A single entry: the topic it's filed under and its body text.
#[derive(Debug, Clone)]
pub struct KnowledgeEntry {
    pub topic: String,
    pub content: String,
}

/// In-memory knowledge base, keyed by topic. Populated by whatever loads a
/// workflow's reference material (a campaign config, an operator upload);
/// this crate only provides the lookup surface.
#[derive(Clone, Default)]
pub struct KnowledgeBase {
    entries: Arc<RwLock<HashMap<String, KnowledgeEntry>>>,
}

impl KnowledgeBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, entry: KnowledgeEntry) {
        self.entries.write().await.insert(entry.topic.clone(), entry);
    }

    pub async fn topics(&self) -> Vec<String> {
        self.entries.read().await.keys().cloned().collect()
    }

    async fn lookup(&self, topic: &str) -> Option<String> {
        self.entries.read().await.get(topic).map(|e| e.content.clone())
    }
}

#[derive(Deserialize)]
struct LookupArgs {
    topic: String,
}

pub struct KnowledgeBaseTool {
    kb: KnowledgeBase,
}

impl KnowledgeBaseTool {
    pub fn new(kb: KnowledgeBase) -> Self {
        Self { kb }
    }
}

#[async_trait]
impl ToolHandler for KnowledgeBaseTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "knowledge_base_lookup".into(),
            description: "Looks up reference material for a topic (policies, FAQs, product details).".into(),
            parameters: vec![ToolParameter {
                name: "topic".into(),
                description: "The topic to look up.".into(),
                parameter_type: ParameterType::String,
                required: true,
            }],
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
        let args: LookupArgs = serde_json::from_value(arguments)?;
        match self.kb.lookup(&args.topic).await {
            Some(content) => Ok(serde_json::json!({ "topic": args.topic, "content": content })),
            None => Err(VoxError::ToolFailed(
                "knowledge_base_lookup".into(),
                format!("no entry for topic '{}'", args.topic),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn looks_up_an_inserted_topic() {
        let kb = KnowledgeBase::new();
        kb.insert(KnowledgeEntry {
            topic: "refund_policy".into(),
            content: "Refunds are processed within 5 business days.".into(),
        })
        .await;
        let tool = KnowledgeBaseTool::new(kb);
        let result = tool.call(serde_json::json!({"topic": "refund_policy"})).await.unwrap();
        assert_eq!(result["content"], "Refunds are processed within 5 business days.");
    }

    #[tokio::test]
    async fn unknown_topic_is_an_error() {
        let tool = KnowledgeBaseTool::new(KnowledgeBase::new());
        assert!(tool.call(serde_json::json!({"topic": "nothing"})).await.is_err());
    }
}
