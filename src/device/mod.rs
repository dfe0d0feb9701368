//! Device identity and rumble backends
//!
//! [`DeviceId`] names a rumble target without holding any driver handle, so
//! identifiers stay valid across disconnects. [`RumbleBackend`] is the seam
//! the playback engine drives motors through; [`GilrsBackend`] is the
//! production implementation and [`NullBackend`] a headless stand-in.

pub mod backend;
pub mod gilrs_backend;
#[cfg(test)]
pub(crate) mod mock;
pub mod null;

pub use backend::{BackendError, RumbleBackend};
pub use gilrs_backend::GilrsBackend;
pub use null::NullBackend;

/// Identifies one rumble target.
///
/// `Active` follows whatever the backend currently considers the primary
/// gamepad; `Index(n)` addresses the n-th rumble-capable pad in enumeration
/// order. The two stay distinct bookkeeping keys even while `Active`
/// resolves to that same pad, so gain multipliers and loaded patterns set
/// through one never leak into the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DeviceId {
    /// The backend's primary gamepad, re-resolved on every command
    #[default]
    Active,
    /// A specific pad by enumeration position
    Index(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_and_index_are_distinct_keys() {
        use std::collections::HashMap;

        let mut map: HashMap<DeviceId, u8> = HashMap::new();
        map.insert(DeviceId::Active, 1);
        map.insert(DeviceId::Index(0), 2);
        assert_eq!(map.len(), 2);
        assert_eq!(map[&DeviceId::Active], 1);
    }

    #[test]
    fn default_is_active() {
        assert_eq!(DeviceId::default(), DeviceId::Active);
    }
}
