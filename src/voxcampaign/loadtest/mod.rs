//! Agent-to-agent load-testing harness: runs a workflow's pipeline against
//! another pipeline instead of a real caller, so a workflow can be
//! exercised for regression testing or concurrent-call load without
//! placing a single real phone call.
//!
//! Two [`PipelineProcessor`]s (an "actor", running the workflow under test,
//! and an "adversary", a second workflow or scripted responder standing in
//! for the caller) are wired together by an [`InternalTransport`] pair —
//! each side's outgoing frames become the other side's incoming frames,
//! with an optional artificial delay standing in for network latency.

pub mod transport;

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::error::VoxResult;
use crate::pipeline::{Frame, PipelineProcessor};

pub use transport::InternalTransport;

/// The harness exchanges spoken text directly rather than synthesizing and
/// re-transcribing audio, so an `LlmResponse` arriving from the partner
/// pipeline is turned into the caller-side frames that would normally
/// result from a real caller speaking it: an energized `CallerAudio` frame
/// (so the receiving side's turn controller leaves
/// `WaitingForCallerStart`) followed by the final `Transcript` itself.
/// Anything else passes through as a single frame unchanged.
fn turn_frames(frame: Frame) -> Vec<Frame> {
    match frame {
        Frame::LlmResponse { pts, text } => vec![
            Frame::CallerAudio { pts, samples: vec![200; 160] },
            Frame::Transcript { pts, text, is_final: true },
        ],
        other => vec![other],
    }
}

/// One side's transcript: every frame it received from its partner, in
/// order, useful for offline inspection of a load-test run.
#[derive(Debug, Default)]
pub struct SideLog {
    pub received: Vec<Frame>,
}

pub struct LoadTestSession {
    pub session_id: Uuid,
    pub network_latency: Duration,
}

impl LoadTestSession {
    pub fn new(network_latency: Duration) -> Self {
        Self { session_id: Uuid::new_v4(), network_latency }
    }

    /// Build both sides' transports and hand them to `build_actor` /
    /// `build_adversary`, seed the conversation with `opening_line` (spoken
    /// as if the actor said it first), then drive both pipelines until one
    /// of them surfaces a control signal (end call / transfer) or
    /// `max_turns` frame exchanges have occurred.
    pub async fn run<A, FA, D, FD>(
        &self,
        build_actor: A,
        build_adversary: D,
        opening_line: &str,
        max_turns: usize,
    ) -> VoxResult<(SideLog, SideLog)>
    where
        A: FnOnce(Arc<InternalTransport>) -> FA,
        FA: std::future::Future<Output = PipelineProcessor>,
        D: FnOnce(Arc<InternalTransport>) -> FD,
        FD: std::future::Future<Output = PipelineProcessor>,
    {
        let (actor_transport, mut actor_rx, adversary_transport, mut adversary_rx) = InternalTransport::paired(self.network_latency);
        let actor_transport = Arc::new(actor_transport);
        let adversary_transport = Arc::new(adversary_transport);
        let mut actor = build_actor(actor_transport.clone()).await;
        let mut adversary = build_adversary(adversary_transport.clone()).await;

        let mut actor_log = SideLog::default();
        let mut adversary_log = SideLog::default();
        let mut turns = 0;

        actor_transport
            .send(Frame::LlmResponse { pts: 0, text: opening_line.to_string() })
            .await?;

        loop {
            if turns >= max_turns {
                info!(session_id = %self.session_id, max_turns, "load test session hit its turn cap");
                break;
            }
            tokio::select! {
                frame = actor_rx.recv() => {
                    let Some(frame) = frame else { break };
                    actor_log.received.push(frame.clone());
                    turns += 1;
                    let mut stop = false;
                    for f in turn_frames(frame) {
                        if actor.handle_frame(f).await?.is_some() {
                            stop = true;
                        }
                    }
                    if stop {
                        break;
                    }
                }
                frame = adversary_rx.recv() => {
                    let Some(frame) = frame else { break };
                    adversary_log.received.push(frame.clone());
                    turns += 1;
                    let mut stop = false;
                    for f in turn_frames(frame) {
                        if adversary.handle_frame(f).await?.is_some() {
                            stop = true;
                        }
                    }
                    if stop {
                        break;
                    }
                }
            }
        }

        Ok((actor_log, adversary_log))
    }
}
