//! Dual-motor rumble playback for gamepads
//!
//! Plays timed rumble patterns on the low-frequency (strong) and
//! high-frequency (weak) motors of any force-feedback capable gamepad.
//! Patterns are step sequences with independent per-motor speed curves;
//! playback runs on a background task that re-arms a one-shot timer per
//! step and compensates wall-clock drift by skipping overdue steps, so a
//! pattern never slips against real time.
//!
//! # Features
//! - Per-device playback state: several gamepads rumble independently
//! - Runtime gain multipliers per motor, applied without restarting a run
//! - TOML pattern files next to programmatic construction
//! - Pluggable [`device::RumbleBackend`] trait; gilrs drives real hardware,
//!   [`device::NullBackend`] keeps headless rigs silent but functional
//! - Fail-soft semantics throughout: a missing pad or invalid pattern
//!   downgrades to a logged no-op, never an error
//!
//! # Quick start
//! ```no_run
//! use rumblekit::{RumblePattern, RumblePlayer, RumblerSettings};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut player = RumblePlayer::spawn_gilrs(RumblerSettings::default())?;
//!
//!     let pattern = RumblePattern::from_toml_path("patterns/heartbeat.toml")?;
//!     player.load(pattern).await?;
//!     if player.can_play().await? {
//!         player.play().await?;
//!         tokio::time::sleep(std::time::Duration::from_millis(900)).await;
//!     }
//!
//!     player.shutdown().await?;
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod pattern;
pub mod player;

pub use device::{BackendError, DeviceId, GilrsBackend, NullBackend, RumbleBackend};
pub use pattern::{PatternError, RumblePattern, RumbleStep};
pub use player::{RumbleError, RumblePlayer, RumblerSettings};
