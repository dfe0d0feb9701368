//! Scriptable in-memory backend for tests
//!
//! [`MockBackend`] stands in for real hardware: it exposes a single device
//! whose connectivity the paired [`MockProbe`] can flip at will, records
//! every motor command and counts event pumps. Sync tests inspect the
//! recorded log, async tests await commands one at a time.

use crate::device::backend::RumbleBackend;
use crate::device::DeviceId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One motor update as seen by the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MotorCommand {
    pub device: DeviceId,
    pub low: f32,
    pub high: f32,
}

pub(crate) struct MockBackend {
    commands: Arc<Mutex<Vec<MotorCommand>>>,
    connected: Arc<AtomicBool>,
    pumps: Arc<AtomicUsize>,
    notify_tx: mpsc::UnboundedSender<MotorCommand>,
}

/// Test-side view of a [`MockBackend`], alive across the backend's moves.
pub(crate) struct MockProbe {
    commands: Arc<Mutex<Vec<MotorCommand>>>,
    connected: Arc<AtomicBool>,
    pumps: Arc<AtomicUsize>,
    notify_rx: mpsc::UnboundedReceiver<MotorCommand>,
}

impl MockBackend {
    /// Creates a connected backend and the probe that observes it.
    pub(crate) fn pair() -> (Self, MockProbe) {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let connected = Arc::new(AtomicBool::new(true));
        let pumps = Arc::new(AtomicUsize::new(0));
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let backend = Self {
            commands: Arc::clone(&commands),
            connected: Arc::clone(&connected),
            pumps: Arc::clone(&pumps),
            notify_tx,
        };
        let probe = MockProbe {
            commands,
            connected,
            pumps,
            notify_rx,
        };
        (backend, probe)
    }
}

impl MockProbe {
    /// Snapshot of every command recorded so far.
    pub(crate) fn commands(&self) -> Vec<MotorCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Number of event pumps the backend has seen.
    pub(crate) fn pump_count(&self) -> usize {
        self.pumps.load(Ordering::SeqCst)
    }

    /// Waits for the next motor command the backend accepts.
    pub(crate) async fn next_command(&mut self) -> MotorCommand {
        self.notify_rx
            .recv()
            .await
            .expect("mock backend was dropped")
    }
}

impl RumbleBackend for MockBackend {
    fn driver_name(&self) -> &'static str {
        "mock"
    }

    fn device_count(&self) -> usize {
        if self.connected.load(Ordering::SeqCst) {
            1
        } else {
            0
        }
    }

    fn is_connected(&self, _device: DeviceId) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn set_motor_speeds(&mut self, device: DeviceId, low: f32, high: f32) -> bool {
        if !self.connected.load(Ordering::SeqCst) {
            return false;
        }
        let command = MotorCommand { device, low, high };
        self.commands.lock().unwrap().push(command);
        // Probe may have been dropped already; recording alone is enough then.
        let _ = self.notify_tx.send(command);
        true
    }

    fn pump_events(&mut self) {
        self.pumps.fetch_add(1, Ordering::SeqCst);
    }
}
