//! Observes pipeline frames to measure conversational latency: the gap
//! between the caller finishing a turn and the agent's first audio frame
//! going out, and between the agent finishing and the caller's next
//! utterance. These numbers are what an operator actually cares about when
//! judging whether a call "felt" responsive, as opposed to raw
//! component-level timings.

use std::time::Instant;

use tracing::{info, warn};

use crate::pipeline::frame::{ControlFrame, Frame};

#[derive(Debug, Clone, Copy, Default)]
pub struct LatencySample {
    pub turn_end_to_first_agent_audio_ms: Option<u64>,
}

/// Stateful observer; one instance per call.
pub struct RealtimeFeedbackObserver {
    call_id: uuid::Uuid,
    turn_ended_at: Option<Instant>,
    awaiting_first_agent_audio: bool,
    slow_response_threshold_ms: u64,
}

impl RealtimeFeedbackObserver {
    pub fn new(call_id: uuid::Uuid, slow_response_threshold_ms: u64) -> Self {
        Self {
            call_id,
            turn_ended_at: None,
            awaiting_first_agent_audio: false,
            slow_response_threshold_ms,
        }
    }

    /// Feed a frame as it passes through the pipeline. Returns a sample
    /// whenever the agent's first audio frame following a turn-stop has
    /// been observed.
    pub fn observe(&mut self, frame: &Frame) -> Option<LatencySample> {
        match frame {
            Frame::Control(ControlFrame::TurnStopConfirmed { .. }) => {
                self.turn_ended_at = Some(Instant::now());
                self.awaiting_first_agent_audio = true;
                None
            }
            Frame::AgentAudio { .. } if self.awaiting_first_agent_audio => {
                self.awaiting_first_agent_audio = false;
                let elapsed = self.turn_ended_at.take().map(|t| t.elapsed().as_millis() as u64);
                if let Some(ms) = elapsed {
                    if ms > self.slow_response_threshold_ms {
                        warn!(call_id = %self.call_id, latency_ms = ms, "slow turn-to-audio latency");
                    } else {
                        info!(call_id = %self.call_id, latency_ms = ms, "turn-to-audio latency");
                    }
                }
                Some(LatencySample { turn_end_to_first_agent_audio_ms: elapsed })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measures_latency_between_turn_stop_and_first_agent_audio() {
        let mut observer = RealtimeFeedbackObserver::new(uuid::Uuid::new_v4(), 500);
        assert!(observer.observe(&Frame::Control(ControlFrame::TurnStopConfirmed { pts: 0 })).is_none());
        let sample = observer.observe(&Frame::AgentAudio { pts: 1, samples: vec![0] }).unwrap();
        assert!(sample.turn_end_to_first_agent_audio_ms.is_some());
    }

    #[test]
    fn only_the_first_agent_audio_frame_after_a_turn_stop_counts() {
        let mut observer = RealtimeFeedbackObserver::new(uuid::Uuid::new_v4(), 500);
        observer.observe(&Frame::Control(ControlFrame::TurnStopConfirmed { pts: 0 }));
        observer.observe(&Frame::AgentAudio { pts: 1, samples: vec![0] });
        let second = observer.observe(&Frame::AgentAudio { pts: 2, samples: vec![0] });
        assert!(second.is_none());
    }
}
