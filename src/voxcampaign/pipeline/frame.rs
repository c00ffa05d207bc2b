//! Frame types carried through the pipeline's stages.
//!
//! Every frame carries a presentation timestamp (`pts`), milliseconds since
//! the call started, so a downstream stage can reason about ordering and
//! latency even after frames have been buffered or reordered by an
//! upstream stage's own internal batching.

use serde::{Deserialize, Serialize};

pub type Pts = u64;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Frame {
    /// Raw audio captured from the caller, not yet transcribed.
    CallerAudio { pts: Pts, samples: Vec<u8> },
    /// A transcript fragment from STT (see `engine::aggregation`).
    Transcript { pts: Pts, text: String, is_final: bool },
    /// The LLM's response content for the current turn.
    LlmResponse { pts: Pts, text: String },
    /// Synthesized audio ready for the transport layer to send to the
    /// caller.
    AgentAudio { pts: Pts, samples: Vec<u8> },
    /// Out-of-band control: start/stop speaking, interruption, or a
    /// terminal signal (end call / transfer).
    Control(ControlFrame),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ControlFrame {
    /// The caller started speaking (per the turn's start strategy).
    TurnStarted { pts: Pts },
    /// The caller appears to have finished speaking; the turn's stop
    /// strategy has not yet confirmed this.
    TurnStopCandidate { pts: Pts },
    /// The turn's stop strategy confirmed the caller is done; safe to
    /// begin the agent's response.
    TurnStopConfirmed { pts: Pts },
    /// The stop candidate was rejected (the caller kept talking, or a
    /// stop strategy vetoed it); every stop strategy resets.
    TurnStopRejected { pts: Pts },
    /// The caller interrupted the agent mid-response.
    Interruption { pts: Pts },
    CallEnding { pts: Pts, reason: String },
}

impl Frame {
    pub fn pts(&self) -> Pts {
        match self {
            Frame::CallerAudio { pts, .. }
            | Frame::Transcript { pts, .. }
            | Frame::LlmResponse { pts, .. }
            | Frame::AgentAudio { pts, .. } => *pts,
            Frame::Control(control) => match control {
                ControlFrame::TurnStarted { pts }
                | ControlFrame::TurnStopCandidate { pts }
                | ControlFrame::TurnStopConfirmed { pts }
                | ControlFrame::TurnStopRejected { pts }
                | ControlFrame::Interruption { pts }
                | ControlFrame::CallEnding { pts, .. } => *pts,
            },
        }
    }
}
