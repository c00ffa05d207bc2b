//! Tool the LLM calls to end the conversation on its own initiative (the
//! caller said goodbye, the task is done). Rather than returning data to
//! the model, this pushes a control signal the pipeline runtime watches
//! for, so it can tear the call down cleanly after the current turn
//! finishes speaking.

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;

use super::{ParameterType, ToolHandler, ToolMetadata, ToolParameter};
use crate::engine::EngineControlSignal;
use crate::error::VoxResult;

#[derive(Deserialize)]
struct EndCallArgs {
    #[serde(default)]
    reason: Option<String>,
}

pub struct EndCallTool {
    signal_tx: Sender<EngineControlSignal>,
}

impl EndCallTool {
    pub fn new(signal_tx: Sender<EngineControlSignal>) -> Self {
        Self { signal_tx }
    }
}

#[async_trait]
impl ToolHandler for EndCallTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "end_call".into(),
            description: "Ends the call after the agent finishes speaking its current turn.".into(),
            parameters: vec![ToolParameter {
                name: "reason".into(),
                description: "Why the call is ending, for the run log.".into(),
                parameter_type: ParameterType::String,
                required: false,
            }],
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
        let args: EndCallArgs = serde_json::from_value(arguments)?;
        let reason = args.reason.unwrap_or_else(|| "agent requested end of call".to_string());
        // The receiver may already be gone if the call ended for another
        // reason in the same instant; that's not this tool's problem.
        let _ = self.signal_tx.send(EngineControlSignal::EndCall { reason: reason.clone() }).await;
        Ok(serde_json::json!({ "acknowledged": true, "reason": reason }))
    }
}
