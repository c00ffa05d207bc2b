//! Caller-silence watchdog: if the caller hasn't said anything for too
//! long, the engine should nudge them ("are you still there?") and
//! eventually end the call rather than holding the line open forever.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{interval, Instant};

/// What the idle watcher decided to do after a period of silence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    /// Prompt the caller; this is the `nth` prompt since the last utterance.
    Nudge { attempt: u32 },
    /// Enough nudges went unanswered; end the call.
    Abandon,
}

/// Tracks time since the caller's last utterance and decides what action
/// (if any) to take, without itself owning a task loop — callers drive it
/// from their own event loop by calling [`IdleWatcher::tick`] on a regular
/// interval or whenever new input resets it.
pub struct IdleWatcher {
    last_activity: Instant,
    nudge_interval: Duration,
    max_nudges: u32,
    nudges_sent: u32,
}

impl IdleWatcher {
    pub fn new(nudge_interval: Duration, max_nudges: u32) -> Self {
        Self {
            last_activity: Instant::now(),
            nudge_interval,
            max_nudges,
            nudges_sent: 0,
        }
    }

    pub fn reset(&mut self) {
        self.last_activity = Instant::now();
        self.nudges_sent = 0;
    }

    /// Call periodically; returns `Some(action)` when enough silence has
    /// elapsed to warrant a nudge or an abandonment.
    pub fn tick(&mut self) -> Option<IdleAction> {
        if self.last_activity.elapsed() < self.nudge_interval {
            return None;
        }
        self.nudges_sent += 1;
        self.last_activity = Instant::now();
        if self.nudges_sent > self.max_nudges {
            Some(IdleAction::Abandon)
        } else {
            Some(IdleAction::Nudge { attempt: self.nudges_sent })
        }
    }
}

/// Drives an [`IdleWatcher`] on its own task, pushing [`IdleAction`]s to
/// `tx` until the receiver is dropped, and resetting the watcher's clock
/// whenever a signal arrives on `reset_rx` (the caller said something).
/// `poll_every` governs how often the watcher is polled; it should be much
/// finer-grained than `nudge_interval` for timely nudges.
pub async fn run_idle_watcher(mut watcher: IdleWatcher, poll_every: Duration, tx: mpsc::Sender<IdleAction>, mut reset_rx: mpsc::Receiver<()>) {
    let mut ticker = interval(poll_every);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Some(action) = watcher.tick() {
                    let abandoning = action == IdleAction::Abandon;
                    if tx.send(action).await.is_err() || abandoning {
                        return;
                    }
                }
            }
            signal = reset_rx.recv() => {
                match signal {
                    Some(()) => watcher.reset(),
                    None => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_clears_the_nudge_count() {
        let mut watcher = IdleWatcher::new(Duration::from_millis(0), 2);
        assert_eq!(watcher.tick(), Some(IdleAction::Nudge { attempt: 1 }));
        watcher.reset();
        assert_eq!(watcher.tick(), Some(IdleAction::Nudge { attempt: 1 }));
    }

    #[test]
    fn abandons_after_max_nudges_exceeded() {
        let mut watcher = IdleWatcher::new(Duration::from_millis(0), 1);
        assert_eq!(watcher.tick(), Some(IdleAction::Nudge { attempt: 1 }));
        assert_eq!(watcher.tick(), Some(IdleAction::Abandon));
    }
}
