//! Tool the LLM calls to hand the conversation off to a human agent or
//! another destination. Like [`super::end_call`], this signals the pipeline
//! rather than returning a result the model acts on further.

use async_trait::async_trait;
use bus::protocol::TransferKind;
use serde::Deserialize;
use tokio::sync::mpsc::Sender;

use super::{ParameterType, ToolHandler, ToolMetadata, ToolParameter};
use crate::engine::EngineControlSignal;
use crate::error::{VoxError, VoxResult};

#[derive(Deserialize)]
struct TransferCallArgs {
    destination: String,
    #[serde(default = "default_kind")]
    kind: String,
}

fn default_kind() -> String {
    "warm".to_string()
}

pub struct TransferCallTool {
    signal_tx: Sender<EngineControlSignal>,
}

impl TransferCallTool {
    pub fn new(signal_tx: Sender<EngineControlSignal>) -> Self {
        Self { signal_tx }
    }
}

#[async_trait]
impl ToolHandler for TransferCallTool {
    fn metadata(&self) -> ToolMetadata {
        ToolMetadata {
            name: "transfer_call".into(),
            description: "Transfers the caller to a human agent or another number.".into(),
            parameters: vec![
                ToolParameter {
                    name: "destination".into(),
                    description: "Phone number or extension to transfer to.".into(),
                    parameter_type: ParameterType::String,
                    required: true,
                },
                ToolParameter {
                    name: "kind".into(),
                    description: "'warm' (agent introduces the caller first) or 'cold' (direct bridge). Defaults to warm.".into(),
                    parameter_type: ParameterType::String,
                    required: false,
                },
            ],
        }
    }

    async fn call(&self, arguments: serde_json::Value) -> VoxResult<serde_json::Value> {
        let args: TransferCallArgs = serde_json::from_value(arguments)?;
        let kind = match args.kind.to_lowercase().as_str() {
            "warm" => TransferKind::Warm,
            "cold" => TransferKind::Cold,
            other => return Err(VoxError::ToolFailed("transfer_call".into(), format!("unknown transfer kind '{other}'"))),
        };
        let _ = self
            .signal_tx
            .send(EngineControlSignal::Transfer {
                destination: args.destination.clone(),
                kind,
            })
            .await;
        Ok(serde_json::json!({ "acknowledged": true, "destination": args.destination }))
    }
}
