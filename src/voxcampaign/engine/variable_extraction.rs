//! Extracts structured variables a workflow node declared interest in
//! (`Node::extract_variables`) from the conversation so far, via a
//! dedicated LLM call with a JSON-shaped response rather than regex or
//! keyword matching — callers phrase things too many different ways for
//! pattern matching to hold up.

use std::collections::HashMap;

use async_trait::async_trait;

use super::session::{LlmClient, Message, Role};
use crate::error::{VoxError, VoxResult};

/// Asks the model to extract one or more named variables from the
/// conversation transcript, returning whatever it could confidently
/// determine (variables it couldn't find are simply absent from the map,
/// not set to null).
pub async fn extract_variables(
    client: &dyn LlmClient,
    transcript: &[Message],
    variable_names: &[String],
) -> VoxResult<HashMap<String, serde_json::Value>> {
    if variable_names.is_empty() {
        return Ok(HashMap::new());
    }

    let instruction = format!(
        "Given the conversation so far, extract the following variables if they can be determined: {}. \
         Respond with a JSON object mapping variable name to value, omitting any variable that cannot be determined.",
        variable_names.join(", ")
    );

    let mut messages = transcript.to_vec();
    messages.push(Message {
        role: Role::System,
        content: instruction,
    });

    let turn = client.complete(&messages, &[]).await?;
    let content = turn.content.ok_or_else(|| VoxError::PipelineStage("variable extraction produced no content".into()))?;

    let parsed: serde_json::Value = serde_json::from_str(content.trim()).map_err(VoxError::Serialization)?;
    let object = parsed
        .as_object()
        .ok_or_else(|| VoxError::PipelineStage("variable extraction did not return a JSON object".into()))?;

    Ok(object
        .iter()
        .filter(|(key, _)| variable_names.contains(key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect())
}
