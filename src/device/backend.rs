//! Backend seam between playback logic and motor hardware

use crate::device::DeviceId;

/// Errors raised while bringing up a rumble backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The underlying driver could not be initialized
    #[error("Failed to initialize rumble backend: {0}")]
    Initialization(String),
}

/// Driver abstraction the playback engine commands devices through.
///
/// Implementations translate normalized dual-motor speeds into whatever the
/// transport underneath needs. Every method is called from the playback task
/// only, so implementations need no interior locking. Identifier resolution
/// is re-queried on each call; implementations must not cache handles across
/// calls in a way that survives a disconnect.
pub trait RumbleBackend: Send + 'static {
    /// Short static name for log lines.
    fn driver_name(&self) -> &'static str;

    /// Number of rumble-capable devices currently visible.
    fn device_count(&self) -> usize;

    /// True iff `device` currently resolves to a live, rumble-capable device.
    fn is_connected(&self, device: DeviceId) -> bool;

    /// Commands both motors of `device` in one call. Speeds are nominally
    /// `0.0..=1.0`; values outside that range are clipped hard at the device
    /// boundary. `(0.0, 0.0)` must stop the motors.
    ///
    /// A commanded pair stays in force until the next call. Implementations
    /// whose platform bounds a single uninterrupted hold must keep it alive
    /// from [`RumbleBackend::pump_events`].
    ///
    /// Returns false when the identifier does not resolve or the device
    /// rejected the command; the caller treats that as a silent skip.
    fn set_motor_speeds(&mut self, device: DeviceId, low: f32, high: f32) -> bool;

    /// Drains the driver's event queue, refreshes device tracking and keeps
    /// long-held motor commands from expiring. Called periodically; mutates
    /// no playback state.
    fn pump_events(&mut self) {}
}

impl RumbleBackend for Box<dyn RumbleBackend> {
    fn driver_name(&self) -> &'static str {
        self.as_ref().driver_name()
    }

    fn device_count(&self) -> usize {
        self.as_ref().device_count()
    }

    fn is_connected(&self, device: DeviceId) -> bool {
        self.as_ref().is_connected(device)
    }

    fn set_motor_speeds(&mut self, device: DeviceId, low: f32, high: f32) -> bool {
        self.as_mut().set_motor_speeds(device, low, high)
    }

    fn pump_events(&mut self) {
        self.as_mut().pump_events()
    }
}
