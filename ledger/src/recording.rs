//! Bounded in-memory buffers for a call's audio and transcript, flushed
//! through a [`crate::chain::Chain`] once the call ends.
//!
//! Buffering in memory for the lifetime of a call (rather than streaming
//! writes straight to disk) keeps the hot path — frames arriving every 20ms
//! — free of filesystem latency. The bound exists because a call that never
//! hangs up (a stuck transfer, a provider that never sends an end event)
//! must not grow unbounded; once the cap is hit we stop accepting new
//! frames rather than evicting old ones, since partial-but-complete-prefix
//! audio is more useful for debugging than a sliding window of whatever
//! happened most recently.

use crate::error::{LedgerError, LedgerResult};

const DEFAULT_CAPACITY_BYTES: usize = 100 * 1024 * 1024;

/// An append-only, capacity-bounded byte buffer for one call's raw audio.
pub struct AudioBuffer {
    data: Vec<u8>,
    capacity: usize,
}

impl AudioBuffer {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY_BYTES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { data: Vec::new(), capacity }
    }

    pub fn push(&mut self, frame: &[u8]) -> LedgerResult<()> {
        if self.data.len() + frame.len() > self.capacity {
            return Err(LedgerError::CapacityExceeded { limit: self.capacity });
        }
        self.data.extend_from_slice(frame);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl Default for AudioBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// One recorded turn of a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptTurn {
    pub speaker: Speaker,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    Caller,
    Agent,
}

/// An append-only, turn-count-bounded transcript buffer.
pub struct TranscriptBuffer {
    turns: Vec<TranscriptTurn>,
    max_turns: usize,
}

impl TranscriptBuffer {
    pub fn new(max_turns: usize) -> Self {
        Self { turns: Vec::new(), max_turns }
    }

    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) -> LedgerResult<()> {
        if self.turns.len() >= self.max_turns {
            return Err(LedgerError::CapacityExceeded { limit: self.max_turns });
        }
        self.turns.push(TranscriptTurn { speaker, text: text.into() });
        Ok(())
    }

    pub fn turns(&self) -> &[TranscriptTurn] {
        &self.turns
    }

    /// Render the transcript as a flat string, one line per turn, suitable
    /// for handing to an LLM prompt or a human reviewer.
    pub fn render(&self) -> String {
        self.turns
            .iter()
            .map(|t| {
                let label = match t.speaker {
                    Speaker::Caller => "Caller",
                    Speaker::Agent => "Agent",
                };
                format!("{label}: {}", t.text)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
