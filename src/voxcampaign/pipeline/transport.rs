//! The pipeline's view of the telephony transport: send agent audio out,
//! receive caller audio in. The actual provider-specific wire protocol
//! lives in [`crate::telephony`]; this trait is what the pipeline runtime
//! depends on so it never has to know which provider is on the other end.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::VoxResult;
use crate::pipeline::frame::Frame;

#[async_trait]
pub trait PipelineTransport: Send + Sync {
    /// Send one frame (agent audio or a control frame) to the caller leg.
    async fn send(&self, frame: Frame) -> VoxResult<()>;
}

/// An in-memory transport used for tests and the load-test harness: frames
/// sent to the caller are captured on a channel instead of reaching a real
/// telephony provider.
pub struct ChannelTransport {
    sender: mpsc::Sender<Frame>,
}

impl ChannelTransport {
    pub fn new(sender: mpsc::Sender<Frame>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl PipelineTransport for ChannelTransport {
    async fn send(&self, frame: Frame) -> VoxResult<()> {
        let _ = self.sender.send(frame).await;
        Ok(())
    }
}
