//! Evaluates a campaign's dialing schedule windows against a point in time.

use chrono::{DateTime, Utc};

use crate::model::ScheduleWindow;

/// Whether `at` falls inside any of `windows`, evaluated in each window's
/// own timezone. An empty window list means "always allowed" — a campaign
/// with no configured restriction dials around the clock.
pub fn is_within_schedule(windows: &[ScheduleWindow], at: DateTime<Utc>) -> bool {
    if windows.is_empty() {
        return true;
    }
    windows.iter().any(|window| window_contains(window, at))
}

fn window_contains(window: &ScheduleWindow, at: DateTime<Utc>) -> bool {
    let local = at.with_timezone(&window.timezone);
    if !window.days.contains(&local.weekday()) {
        return false;
    }
    let time = local.time();
    if window.start <= window.end {
        time >= window.start && time <= window.end
    } else {
        // A window that wraps past midnight in its own timezone.
        time >= window.start || time <= window.end
    }
}
