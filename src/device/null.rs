use crate::device::{DeviceId, RumbleBackend};
use tracing::trace;

/// Backend that enumerates zero devices.
///
/// Every resolution fails: loads still succeed, but `can_play` stays false
/// and motor commands fall into the silent-skip path. Useful for headless
/// hosts and doc examples.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl RumbleBackend for NullBackend {
    fn driver_name(&self) -> &'static str {
        "null"
    }

    fn device_count(&self) -> usize {
        0
    }

    fn is_connected(&self, _device: DeviceId) -> bool {
        false
    }

    fn set_motor_speeds(&mut self, device: DeviceId, low: f32, high: f32) -> bool {
        trace!(
            "Discarding motor command for {:?}: ({}, {})",
            device,
            low,
            high
        );
        false
    }
}
