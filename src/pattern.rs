//! Rumble pattern data model
//!
//! A pattern is a flat sequence of steps: how long each step stays current and
//! how fast each of the two vibration motors (low-frequency "strong" and
//! high-frequency "weak") should spin while it is. Patterns carry no playback
//! state of their own; they are loaded by value into a device slot and owned
//! there until replaced or unloaded.
//!
//! Validation is deliberately fail-soft: a pattern whose arrays disagree in
//! length (or are empty) still deserializes and constructs, it just reports
//! `is_valid() == false` and is treated as "no pattern loaded" downstream.
//! Speed values outside `0.0..=1.0` are accepted here; they are clipped hard
//! at the device boundary, never at load time.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// Errors raised while reading pattern asset files
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// Pattern file could not be read from disk
    #[error("Failed to read pattern file: {0}")]
    Io(#[from] std::io::Error),

    /// Pattern file was not valid TOML for this schema
    #[error("Failed to parse pattern file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A single playback step: one duration plus a speed per motor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RumbleStep {
    /// How long this step stays current, in milliseconds
    pub duration_ms: u32,
    /// Low-frequency (strong) motor speed, nominally `0.0..=1.0`
    pub low: f32,
    /// High-frequency (weak) motor speed, nominally `0.0..=1.0`
    pub high: f32,
}

/// A discrete amplitude-vs-time rumble pattern.
///
/// Stored as three parallel arrays, the shape rumble assets ship in. The
/// struct round-trips through TOML so patterns can live next to the binary:
///
/// ```toml
/// durations_ms = [100, 50, 200]
/// low_freq_speeds = [0.0, 1.0, 0.0]
/// high_freq_speeds = [0.0, 0.0, 1.0]
/// ```
///
/// # Examples
///
/// ```rust
/// use rumblekit::pattern::{RumblePattern, RumbleStep};
///
/// let pattern = RumblePattern::from_steps(&[
///     RumbleStep { duration_ms: 120, low: 0.8, high: 0.2 },
///     RumbleStep { duration_ms: 80, low: 0.0, high: 0.0 },
/// ]);
/// assert!(pattern.is_valid());
/// assert_eq!(pattern.len(), 2);
/// assert_eq!(pattern.nominal_duration_ms(), 200);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RumblePattern {
    /// Per-step durations in milliseconds
    pub durations_ms: Vec<u32>,
    /// Per-step low-frequency motor speeds
    pub low_freq_speeds: Vec<f32>,
    /// Per-step high-frequency motor speeds
    pub high_freq_speeds: Vec<f32>,
    /// Informational sum of all step durations. Not authoritative: playback
    /// only ever walks `durations_ms`.
    #[serde(default)]
    pub total_duration_ms: u64,
}

impl RumblePattern {
    /// Builds a pattern from a step list, filling in the duration sum.
    pub fn from_steps(steps: &[RumbleStep]) -> Self {
        let mut pattern = Self {
            durations_ms: Vec::with_capacity(steps.len()),
            low_freq_speeds: Vec::with_capacity(steps.len()),
            high_freq_speeds: Vec::with_capacity(steps.len()),
            total_duration_ms: 0,
        };
        for step in steps {
            pattern.durations_ms.push(step.duration_ms);
            pattern.low_freq_speeds.push(step.low);
            pattern.high_freq_speeds.push(step.high);
            pattern.total_duration_ms += u64::from(step.duration_ms);
        }
        pattern
    }

    /// Single-step pattern holding both motors at fixed speeds.
    pub fn constant(duration_ms: u32, low: f32, high: f32) -> Self {
        Self::from_steps(&[RumbleStep {
            duration_ms,
            low,
            high,
        }])
    }

    /// Parses a pattern from a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, PatternError> {
        let pattern: Self = toml::from_str(content)?;
        debug!(
            "Parsed rumble pattern: {} steps, valid: {}",
            pattern.len(),
            pattern.is_valid()
        );
        Ok(pattern)
    }

    /// Reads and parses a pattern asset file.
    ///
    /// A file that parses but carries mismatched arrays is returned as-is;
    /// loading it into a device then behaves as an unload (fail-soft).
    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self, PatternError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// True iff the three arrays agree in length and hold at least one step.
    ///
    /// This is the only validity condition; speed ranges are not checked.
    pub fn is_valid(&self) -> bool {
        let n = self.durations_ms.len();
        n > 0 && self.low_freq_speeds.len() == n && self.high_freq_speeds.len() == n
    }

    /// Number of steps (length of the duration array).
    pub fn len(&self) -> usize {
        self.durations_ms.len()
    }

    /// True iff the pattern holds no steps.
    pub fn is_empty(&self) -> bool {
        self.durations_ms.is_empty()
    }

    /// Sum of the actual step durations, in milliseconds.
    ///
    /// Unlike [`RumblePattern::total_duration_ms`] this is always computed
    /// from the duration array.
    pub fn nominal_duration_ms(&self) -> u64 {
        self.durations_ms.iter().map(|&ms| u64::from(ms)).sum()
    }

    /// Iterates the pattern as steps. Truncates at the shortest array if the
    /// pattern is invalid.
    pub fn steps(&self) -> impl Iterator<Item = RumbleStep> + '_ {
        self.durations_ms
            .iter()
            .zip(&self.low_freq_speeds)
            .zip(&self.high_freq_speeds)
            .map(|((&duration_ms, &low), &high)| RumbleStep {
                duration_ms,
                low,
                high,
            })
    }

    pub(crate) fn duration_ms(&self, index: usize) -> u32 {
        debug_assert!(index < self.len(), "step index out of bounds");
        self.durations_ms[index]
    }

    pub(crate) fn low_speed(&self, index: usize) -> f32 {
        debug_assert!(index < self.low_freq_speeds.len(), "step index out of bounds");
        self.low_freq_speeds[index]
    }

    pub(crate) fn high_speed(&self, index: usize) -> f32 {
        debug_assert!(index < self.high_freq_speeds.len(), "step index out of bounds");
        self.high_freq_speeds[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_steps_builds_parallel_arrays() {
        let pattern = RumblePattern::from_steps(&[
            RumbleStep {
                duration_ms: 100,
                low: 0.0,
                high: 0.5,
            },
            RumbleStep {
                duration_ms: 50,
                low: 1.0,
                high: 0.0,
            },
        ]);

        assert!(pattern.is_valid());
        assert_eq!(pattern.durations_ms, vec![100, 50]);
        assert_eq!(pattern.low_freq_speeds, vec![0.0, 1.0]);
        assert_eq!(pattern.high_freq_speeds, vec![0.5, 0.0]);
        assert_eq!(pattern.total_duration_ms, 150);
        assert_eq!(pattern.nominal_duration_ms(), 150);
    }

    #[test]
    fn empty_pattern_is_invalid() {
        assert!(!RumblePattern::default().is_valid());
        assert!(RumblePattern::default().is_empty());
    }

    #[test]
    fn mismatched_arrays_are_invalid() {
        let pattern = RumblePattern {
            durations_ms: vec![100, 50],
            low_freq_speeds: vec![0.0],
            high_freq_speeds: vec![0.0, 1.0],
            total_duration_ms: 150,
        };
        assert!(!pattern.is_valid());
    }

    #[test]
    fn out_of_range_speeds_are_accepted() {
        // Range checks happen at the device boundary, not here.
        let pattern = RumblePattern::constant(100, 2.5, -1.0);
        assert!(pattern.is_valid());
        assert_eq!(pattern.low_freq_speeds[0], 2.5);
    }

    #[test]
    fn parses_toml_document() {
        let pattern = RumblePattern::from_toml_str(
            r#"
            durations_ms = [100, 50, 200]
            low_freq_speeds = [0.0, 1.0, 0.0]
            high_freq_speeds = [0.0, 0.0, 1.0]
            "#,
        )
        .expect("pattern should parse");

        assert!(pattern.is_valid());
        assert_eq!(pattern.len(), 3);
        // total_duration_ms is optional in the file
        assert_eq!(pattern.total_duration_ms, 0);
        assert_eq!(pattern.nominal_duration_ms(), 350);
    }

    #[test]
    fn parses_but_flags_mismatched_toml() {
        let pattern = RumblePattern::from_toml_str(
            r#"
            durations_ms = [100, 50]
            low_freq_speeds = [0.0]
            high_freq_speeds = [0.0, 1.0]
            "#,
        )
        .expect("mismatched arrays still parse");

        assert!(!pattern.is_valid());
    }

    #[test]
    fn steps_iterator_round_trips() {
        let steps = [
            RumbleStep {
                duration_ms: 30,
                low: 0.2,
                high: 0.8,
            },
            RumbleStep {
                duration_ms: 70,
                low: 0.9,
                high: 0.1,
            },
        ];
        let pattern = RumblePattern::from_steps(&steps);
        let collected: Vec<RumbleStep> = pattern.steps().collect();
        assert_eq!(collected, steps);
    }
}
