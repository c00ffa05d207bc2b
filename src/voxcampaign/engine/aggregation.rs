//! Aggregates a speech-to-text stream's interim and final results into
//! complete caller utterances.
//!
//! Most streaming STT providers emit several interim transcripts per
//! utterance as their confidence improves, followed by one final one. The
//! engine only wants to act on finals; interims exist purely so a UI can
//! show live captions, which is out of scope here, so they're discarded as
//! soon as a newer one (interim or final) supersedes them.

#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptFragment {
    pub text: String,
    pub is_final: bool,
}

#[derive(Default)]
pub struct TranscriptAggregator {
    pending: Option<String>,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment from the STT stream. Returns the completed
    /// utterance once a final fragment arrives; otherwise buffers the
    /// interim text and returns `None`.
    pub fn push(&mut self, fragment: TranscriptFragment) -> Option<String> {
        if fragment.is_final {
            self.pending = None;
            Some(fragment.text)
        } else {
            self.pending = Some(fragment.text);
            None
        }
    }

    /// The most recent interim text, for live-caption use cases, without
    /// consuming it.
    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interim_fragments_are_buffered_not_returned() {
        let mut agg = TranscriptAggregator::new();
        assert_eq!(
            agg.push(TranscriptFragment { text: "I'd like".into(), is_final: false }),
            None
        );
        assert_eq!(agg.pending(), Some("I'd like"));
    }

    #[test]
    fn final_fragment_completes_the_utterance_and_clears_pending() {
        let mut agg = TranscriptAggregator::new();
        agg.push(TranscriptFragment { text: "I'd like".into(), is_final: false });
        let completed = agg.push(TranscriptFragment {
            text: "I'd like to cancel my order".into(),
            is_final: true,
        });
        assert_eq!(completed, Some("I'd like to cancel my order".to_string()));
        assert_eq!(agg.pending(), None);
    }
}
