//! Synchronous playback core
//!
//! The engine owns every [`DeviceState`] and the drift-compensating
//! scheduling step. It never touches a timer or a channel itself: operations
//! return a [`TimerOp`] directive and the worker applies it against its
//! delay queue. That keeps this module synchronous and directly testable
//! with explicit instants.

use crate::device::{DeviceId, RumbleBackend};
use crate::pattern::RumblePattern;
use crate::player::state::DeviceState;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Timer directive returned by engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TimerOp {
    /// Replace the device's pending wake-up with one after `wait`.
    Arm { device: DeviceId, wait: Duration },
    /// Drop the device's pending wake-up, if any.
    Cancel { device: DeviceId },
    /// Leave timers untouched.
    None,
}

/// Per-device rumble playback over a [`RumbleBackend`].
///
/// One step of a pattern is committed per wake-up. Each commit arms exactly
/// one future wake-up whose delay is the step duration minus the timing
/// error accumulated so far, so the schedule tracks the wall clock instead
/// of drifting by the timer's delivery jitter. A wake-up arriving after a
/// step's whole window has passed consumes that step without ever
/// commanding its speeds.
pub(crate) struct RumbleEngine<B> {
    backend: B,
    states: HashMap<DeviceId, DeviceState>,
    current: DeviceId,
}

impl<B: RumbleBackend> RumbleEngine<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            states: HashMap::new(),
            current: DeviceId::Active,
        }
    }

    pub fn driver_name(&self) -> &'static str {
        self.backend.driver_name()
    }

    pub fn device_count(&self) -> usize {
        self.backend.device_count()
    }

    pub fn pump_backend(&mut self) {
        self.backend.pump_events();
    }

    /// Device used by the identifier-less operations.
    pub fn current_device(&self) -> DeviceId {
        self.current
    }

    /// Selects the device for the identifier-less operations. An index
    /// beyond the backend's device count is ignored and the prior selection
    /// kept.
    pub fn set_current_device(&mut self, device: DeviceId) {
        if let DeviceId::Index(n) = device {
            if n >= self.backend.device_count() {
                warn!(
                    "Ignoring selection of device {} with only {} available",
                    n,
                    self.backend.device_count()
                );
                return;
            }
        }
        debug!("Current device is now {:?}", device);
        self.current = device;
    }

    /// Stores a valid pattern and resets both gain multipliers. An invalid
    /// pattern behaves exactly as `unload`: fail-soft, never an error. A
    /// valid load does not interrupt a run already in flight.
    pub fn load(&mut self, device: DeviceId, pattern: RumblePattern) -> TimerOp {
        if !pattern.is_valid() {
            warn!(
                "Pattern for {:?} is invalid ({} durations, {} low, {} high speeds), clearing slot",
                device,
                pattern.durations_ms.len(),
                pattern.low_freq_speeds.len(),
                pattern.high_freq_speeds.len()
            );
            return self.unload(device);
        }
        debug!(
            "Loaded {}-step pattern ({} ms) on {:?}",
            pattern.len(),
            pattern.nominal_duration_ms(),
            device
        );
        let state = self.states.entry(device).or_default();
        state.pattern = Some(pattern);
        state.low_multiplier = 1.0;
        state.high_multiplier = 1.0;
        TimerOp::None
    }

    /// Stops playback and drops the stored pattern. Idempotent.
    pub fn unload(&mut self, device: DeviceId) -> TimerOp {
        let op = self.stop(device);
        if let Some(state) = self.states.get_mut(&device) {
            state.pattern = None;
        }
        op
    }

    /// True iff the device is connected and holds a valid pattern.
    pub fn can_play(&self, device: DeviceId) -> bool {
        if !self.backend.is_connected(device) {
            return false;
        }
        self.states
            .get(&device)
            .and_then(|state| state.pattern.as_ref())
            .is_some_and(|pattern| pattern.is_valid())
    }

    pub fn is_connected(&self, device: DeviceId) -> bool {
        self.backend.is_connected(device)
    }

    pub fn is_playing(&self, device: DeviceId) -> bool {
        self.states
            .get(&device)
            .is_some_and(|state| state.is_playing())
    }

    /// Sets the per-motor gains, effective from the next committed step.
    /// Negative values clamp to zero gain at commit time. Only `load`
    /// resets these.
    pub fn set_speed_multiplier(&mut self, device: DeviceId, low: f32, high: f32) {
        let state = self.states.entry(device).or_default();
        state.low_multiplier = low;
        state.high_multiplier = high;
        trace!("Speed multipliers on {:?} set to ({}, {})", device, low, high);
    }

    /// Starts (or restarts) playback from step 0. No-op unless `can_play`.
    ///
    /// The first scheduling pass runs right here in the same dispatch, so
    /// the opening step reaches the motors immediately instead of one timer
    /// tick later.
    pub fn play(&mut self, device: DeviceId, now: Instant) -> TimerOp {
        if !self.can_play(device) {
            debug!("Play ignored for {:?}: nothing playable", device);
            return TimerOp::None;
        }
        let state = self.states.entry(device).or_default();
        state.cursor = Some(0);
        state.elapsed_at_cursor_ms = 0;
        state.playback_started = Some(now);
        debug!("Playback started on {:?}", device);
        self.run_schedule(device, now)
    }

    /// Stops playback and zeroes the motors, armed run or not.
    pub fn stop(&mut self, device: DeviceId) -> TimerOp {
        let Self {
            backend, states, ..
        } = self;
        let state = states.entry(device).or_default();
        debug!("Stopping rumble on {:?}", device);
        Self::halt(backend, state, device)
    }

    /// Applies [`RumbleEngine::stop`] to every device touched so far.
    pub fn stop_all(&mut self) -> Vec<TimerOp> {
        let devices: Vec<DeviceId> = self.states.keys().copied().collect();
        debug!("Stopping rumble on {} known devices", devices.len());
        devices
            .into_iter()
            .map(|device| self.stop(device))
            .collect()
    }

    /// Handles a delivered wake-up. An idle cursor defuses late or spurious
    /// deliveries.
    pub fn on_wakeup(&mut self, device: DeviceId, now: Instant) -> TimerOp {
        self.run_schedule(device, now)
    }

    // Zeroes the motors and clears the run state.
    fn halt(backend: &mut B, state: &mut DeviceState, device: DeviceId) -> TimerOp {
        if !backend.set_motor_speeds(device, 0.0, 0.0) {
            trace!("No device reachable on {:?} to zero", device);
        }
        state.reset_run();
        TimerOp::Cancel { device }
    }

    // One scheduling pass: catch up past overdue steps, commit the current
    // one, advance, and arm the next wake-up.
    fn run_schedule(&mut self, device: DeviceId, now: Instant) -> TimerOp {
        let Self {
            backend, states, ..
        } = self;
        let Some(state) = states.get_mut(&device) else {
            return TimerOp::None;
        };
        let Some(start_cursor) = state.cursor else {
            trace!("Wake-up for {:?} with no active playback", device);
            return TimerOp::None;
        };
        let Some(started) = state.playback_started else {
            debug_assert!(false, "cursor engaged without a running stopwatch");
            return Self::halt(backend, state, device);
        };
        let Some(pattern) = &state.pattern else {
            debug_assert!(false, "cursor engaged without a loaded pattern");
            return Self::halt(backend, state, device);
        };

        let pattern_len = pattern.len();
        if start_cursor >= pattern_len {
            // Final wake-up of a run: every step is committed, switch off.
            debug!("Pattern finished on {:?}, zeroing motors", device);
            return Self::halt(backend, state, device);
        }

        let elapsed_wall_ms = now.saturating_duration_since(started).as_millis() as i64;
        let mut cursor = start_cursor;
        let mut elapsed_at = state.elapsed_at_cursor_ms;

        // Catch-up loop: a step whose nominal window has already passed is
        // consumed without ever commanding its speeds.
        let wait_ms = loop {
            let step_ms = i64::from(pattern.duration_ms(cursor));
            let timing_error = elapsed_wall_ms - elapsed_at;
            let wait_ms = step_ms - timing_error;
            if wait_ms > 0 {
                break wait_ms;
            }
            trace!(
                "Skipping overdue step {} on {:?} (late by {} ms)",
                cursor,
                device,
                -wait_ms
            );
            elapsed_at += step_ms;
            cursor += 1;
            if cursor >= pattern_len {
                debug!("Pattern finished on {:?} while catching up", device);
                return Self::halt(backend, state, device);
            }
        };

        let low = pattern.low_speed(cursor) * state.low_multiplier.max(0.0);
        let high = pattern.high_speed(cursor) * state.high_multiplier.max(0.0);
        let step_ms = i64::from(pattern.duration_ms(cursor));
        let wait = Duration::from_millis(wait_ms as u64);

        if !backend.set_motor_speeds(device, low, high) {
            // Device gone mid-run: keep the bookkeeping where it is and let
            // the next wake-up resume or finish the run once the device is
            // back.
            debug!(
                "Device {:?} unreachable at step {}, retrying in {} ms",
                device, cursor, wait_ms
            );
            state.cursor = Some(cursor);
            state.elapsed_at_cursor_ms = elapsed_at;
            return TimerOp::Arm { device, wait };
        }

        trace!(
            "Committed step {} on {:?}: ({}, {}) for {} ms",
            cursor,
            device,
            low,
            high,
            wait_ms
        );
        state.elapsed_at_cursor_ms = elapsed_at + step_ms;
        state.cursor = Some(cursor + 1);
        TimerOp::Arm { device, wait }
    }
}
