//! Playback gate: does a candidate element count as actively playing?

use crate::types::{PlaybackSnapshot, ReadyState};

/// True iff the element exists, is neither paused nor ended, has advanced
/// past position zero, and has buffered beyond the current frame.
pub fn is_playing(snapshot: Option<&PlaybackSnapshot>) -> bool {
    let Some(s) = snapshot else {
        return false;
    };
    !s.paused && !s.ended && s.current_time > 0.0 && s.ready_state > ReadyState::HaveCurrentData
}
