//! Bridges pipeline frames into the durable per-run ledger: every final
//! transcript fragment and agent response becomes a transcript turn, and
//! every audio frame is appended to the run's audio buffer.

use std::sync::Arc;

use ledger::{Speaker, WorkflowRunLedger};

use crate::error::VoxResult;
use crate::pipeline::frame::Frame;

pub struct FrameRecorder {
    ledger: Arc<WorkflowRunLedger>,
}

impl FrameRecorder {
    pub fn new(ledger: Arc<WorkflowRunLedger>) -> Self {
        Self { ledger }
    }

    pub async fn observe(&self, frame: &Frame) -> VoxResult<()> {
        match frame {
            Frame::Transcript { text, is_final: true, .. } => {
                self.ledger.record_turn(Speaker::Caller, text.clone()).await?;
            }
            Frame::LlmResponse { text, .. } => {
                self.ledger.record_turn(Speaker::Agent, text.clone()).await?;
            }
            Frame::CallerAudio { samples, .. } => {
                self.ledger.audio.lock().await.push(samples).ok();
            }
            Frame::AgentAudio { samples, .. } => {
                self.ledger.audio.lock().await.push(samples).ok();
            }
            _ => {}
        }
        Ok(())
    }
}
