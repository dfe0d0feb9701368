//! Playback subsystem for timed rumble patterns
//!
//! Implements a three-layer pipeline:
//!
//! 1. [`engine`] - Per-device scheduling state machine (sync, clock-injected)
//! 2. [`worker`] - Async task owning the engine, its timers and the backend
//! 3. [`player_handle`] - Unified API and lifecycle management
//!
//! # Architecture
//!
//! ```text
//! RumblePlayer ──► RumbleWorker ──► RumbleEngine ──► RumbleBackend
//!  (commands)       (timers)        (scheduling)      (motors)
//! ```
//!
//! Timing lives entirely in the worker's one-shot wake-ups; the engine only
//! decides what each wake-up means for the device that caused it.

pub(crate) mod engine;
pub mod player_handle;
pub(crate) mod state;
pub(crate) mod worker;

pub use player_handle::{RumbleError, RumblePlayer, RumblerSettings};
