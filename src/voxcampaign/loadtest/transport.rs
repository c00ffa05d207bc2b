//! The duplex, in-memory transport connecting a load-test session's actor
//! and adversary pipelines. Each side's [`PipelineTransport::send`] hands
//! the frame to the other side's inbound channel after an artificial delay,
//! standing in for the network hop a real call would cross.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::VoxResult;
use crate::pipeline::frame::Frame;
use crate::pipeline::transport::PipelineTransport;

pub struct InternalTransport {
    partner_tx: mpsc::Sender<Frame>,
    latency: Duration,
}

impl InternalTransport {
    pub fn new(partner_tx: mpsc::Sender<Frame>, latency: Duration) -> Self {
        Self { partner_tx, latency }
    }

    /// Wire up a connected pair: frames sent on one side arrive on the
    /// other's returned receiver, each with `latency` applied.
    pub fn paired(latency: Duration) -> (Self, mpsc::Receiver<Frame>, Self, mpsc::Receiver<Frame>) {
        let (actor_to_adversary_tx, adversary_rx) = mpsc::channel(64);
        let (adversary_to_actor_tx, actor_rx) = mpsc::channel(64);
        let actor_transport = Self::new(actor_to_adversary_tx, latency);
        let adversary_transport = Self::new(adversary_to_actor_tx, latency);
        (actor_transport, actor_rx, adversary_transport, adversary_rx)
    }
}

#[async_trait]
impl PipelineTransport for InternalTransport {
    async fn send(&self, frame: Frame) -> VoxResult<()> {
        if self.latency.is_zero() {
            let _ = self.partner_tx.send(frame).await;
            return Ok(());
        }
        let partner_tx = self.partner_tx.clone();
        let latency = self.latency;
        tokio::spawn(async move {
            tokio::time::sleep(latency).await;
            let _ = partner_tx.send(frame).await;
        });
        Ok(())
    }
}
