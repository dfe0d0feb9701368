//! Per-device playback bookkeeping

use crate::pattern::RumblePattern;
use tokio::time::Instant;

/// Mutable playback state for one device slot.
///
/// Entries are created lazily the first time a device identifier is touched
/// and never evicted; an idle entry is a handful of words. All fields are
/// owned by the engine task, nothing here is shared or locked.
#[derive(Debug, Clone)]
pub(crate) struct DeviceState {
    /// Loaded pattern. `Some` only if validation passed at load time, so a
    /// stored pattern is always playable shape-wise.
    pub pattern: Option<RumblePattern>,
    /// Index of the next step to evaluate. `None` while idle; equal to the
    /// pattern length once every step has been committed and only the final
    /// switch-off wake-up remains.
    pub cursor: Option<usize>,
    /// Pattern milliseconds consumed by all steps before `cursor`.
    pub elapsed_at_cursor_ms: i64,
    /// Wall-clock start of the current run, restarted by every `play`.
    pub playback_started: Option<Instant>,
    /// Gain applied to low-frequency speeds at commit time.
    pub low_multiplier: f32,
    /// Gain applied to high-frequency speeds at commit time.
    pub high_multiplier: f32,
}

impl Default for DeviceState {
    fn default() -> Self {
        Self {
            pattern: None,
            cursor: None,
            elapsed_at_cursor_ms: 0,
            playback_started: None,
            low_multiplier: 1.0,
            high_multiplier: 1.0,
        }
    }
}

impl DeviceState {
    /// True while a run is in flight, including the final switch-off window.
    pub fn is_playing(&self) -> bool {
        self.cursor.is_some()
    }

    /// Clears the run-scoped fields. The pattern and multipliers survive.
    pub fn reset_run(&mut self) {
        self.cursor = None;
        self.elapsed_at_cursor_ms = 0;
        self.playback_started = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_state_is_idle_with_unit_gain() {
        let state = DeviceState::default();
        assert!(!state.is_playing());
        assert!(state.pattern.is_none());
        assert_eq!(state.low_multiplier, 1.0);
        assert_eq!(state.high_multiplier, 1.0);
    }

    #[test]
    fn reset_run_keeps_pattern_and_gain() {
        let mut state = DeviceState {
            pattern: Some(RumblePattern::constant(100, 1.0, 1.0)),
            cursor: Some(1),
            elapsed_at_cursor_ms: 100,
            playback_started: Some(Instant::now()),
            low_multiplier: 0.5,
            high_multiplier: 0.25,
        };
        state.reset_run();
        assert!(!state.is_playing());
        assert_eq!(state.elapsed_at_cursor_ms, 0);
        assert!(state.playback_started.is_none());
        assert!(state.pattern.is_some());
        assert_eq!(state.low_multiplier, 0.5);
    }
}
