//! Rumble worker task with statum state machine
//!
//! A single tokio task owns the playback engine, the command receiver and
//! the one-shot timer queue, so every state mutation is serialized by
//! construction. Wake-up cancellation happens on this same task, which is
//! why a stop processed before a pending expiry can never be overtaken by
//! that expiry.
//!
//! # State Machine
//!
//! ```text
//! Initializing ──► Running ──► Stopped
//!                     │
//!        (commands, wake-ups, hotplug pump)
//! ```
//!
//! # Architecture
//!
//! ```text
//! RumblePlayer ──commands──► [RumbleWorker] ──speeds──► RumbleBackend
//!                                ▲    │
//!                                │    └── arm / cancel
//!                            wake-ups
//!                                │
//!                           [DelayQueue]
//! ```

use crate::device::{DeviceId, RumbleBackend};
use crate::pattern::RumblePattern;
use crate::player::engine::{RumbleEngine, TimerOp};
use crate::player::player_handle::RumblerSettings;
use statum::{machine, state};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::time::{delay_queue, DelayQueue};
use tracing::{debug, info, trace, warn};

/// Commands posted from the public handle to the worker task.
///
/// `device: None` targets whichever device is currently selected on the
/// engine. Queries carry a oneshot sender for the reply.
#[derive(Debug)]
pub(crate) enum RumbleCommand {
    Load {
        device: Option<DeviceId>,
        pattern: RumblePattern,
    },
    Unload {
        device: Option<DeviceId>,
    },
    Play {
        device: Option<DeviceId>,
    },
    Stop {
        device: Option<DeviceId>,
    },
    StopAll,
    SetSpeedMultiplier {
        device: Option<DeviceId>,
        low: f32,
        high: f32,
    },
    SetCurrentDevice {
        device: DeviceId,
    },
    CurrentDevice {
        response_tx: tokio::sync::oneshot::Sender<DeviceId>,
    },
    CanPlay {
        device: Option<DeviceId>,
        response_tx: tokio::sync::oneshot::Sender<bool>,
    },
    IsConnected {
        device: Option<DeviceId>,
        response_tx: tokio::sync::oneshot::Sender<bool>,
    },
    IsPlaying {
        device: Option<DeviceId>,
        response_tx: tokio::sync::oneshot::Sender<bool>,
    },
}

/// Worker lifecycle states using statum
#[state]
#[derive(Debug, Clone)]
pub(crate) enum WorkerState {
    Initializing, // Engine constructed, loop not yet entered
    Running,      // Serializing commands and wake-ups
    Stopped,      // Loop exited, motors zeroed
}

/// Rumble worker with compile-time lifecycle safety via statum
#[machine]
pub(crate) struct RumbleWorker<S: WorkerState> {
    engine: RumbleEngine<Box<dyn RumbleBackend>>,
    command_rx: mpsc::Receiver<RumbleCommand>,
    timers: DelayQueue<DeviceId>,
    pending: HashMap<DeviceId, delay_queue::Key>,
    pump_interval: Duration,
}

impl RumbleWorker<Initializing> {
    pub fn create(
        backend: Box<dyn RumbleBackend>,
        command_rx: mpsc::Receiver<RumbleCommand>,
        settings: &RumblerSettings,
    ) -> Self {
        debug!("Creating rumble worker");
        Self::new(
            RumbleEngine::new(backend),
            command_rx,
            DelayQueue::new(),
            HashMap::new(), // pending wake-up keys
            // interval() panics on a zero period
            settings.pump_interval.max(Duration::from_millis(1)),
        )
    }

    pub fn start(self) -> RumbleWorker<Running> {
        info!(
            "Rumble worker starting with {} backend, {} device(s) visible",
            self.engine.driver_name(),
            self.engine.device_count()
        );
        self.transition()
    }
}

impl RumbleWorker<Running> {
    /// Main loop with graceful shutdown support
    ///
    /// Commands, timer expirations and the periodic hotplug pump are all
    /// handled here, one at a time. Exits on the shutdown signal or when
    /// every handle has been dropped; either way the motors are zeroed on
    /// the way out.
    pub async fn run_until_shutdown(
        mut self,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) -> RumbleWorker<Stopped> {
        let mut pump = tokio::time::interval(self.pump_interval);
        pump.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!("Shutdown signal received");
                    break;
                }

                command = self.command_rx.recv() => {
                    match command {
                        Some(command) => self.dispatch(command),
                        None => {
                            debug!("All handles dropped, shutting down");
                            break;
                        }
                    }
                }

                expired = std::future::poll_fn(|cx| self.timers.poll_expired(cx)), if !self.timers.is_empty() => {
                    if let Some(expired) = expired {
                        self.on_wakeup(expired);
                    }
                }

                _ = pump.tick() => {
                    self.engine.pump_backend();
                }
            }
        }

        self.finish()
    }

    fn dispatch(&mut self, command: RumbleCommand) {
        trace!("Dispatching {:?}", command);
        match command {
            RumbleCommand::Load { device, pattern } => {
                let device = self.target(device);
                let op = self.engine.load(device, pattern);
                self.apply(op);
            }
            RumbleCommand::Unload { device } => {
                let device = self.target(device);
                let op = self.engine.unload(device);
                self.apply(op);
            }
            RumbleCommand::Play { device } => {
                let device = self.target(device);
                let op = self.engine.play(device, Instant::now());
                self.apply(op);
            }
            RumbleCommand::Stop { device } => {
                let device = self.target(device);
                let op = self.engine.stop(device);
                self.apply(op);
            }
            RumbleCommand::StopAll => {
                for op in self.engine.stop_all() {
                    self.apply(op);
                }
            }
            RumbleCommand::SetSpeedMultiplier { device, low, high } => {
                let device = self.target(device);
                self.engine.set_speed_multiplier(device, low, high);
            }
            RumbleCommand::SetCurrentDevice { device } => {
                self.engine.set_current_device(device);
            }
            RumbleCommand::CurrentDevice { response_tx } => {
                if response_tx.send(self.engine.current_device()).is_err() {
                    warn!("Query response dropped before delivery");
                }
            }
            RumbleCommand::CanPlay {
                device,
                response_tx,
            } => {
                let device = self.target(device);
                if response_tx.send(self.engine.can_play(device)).is_err() {
                    warn!("Query response dropped before delivery");
                }
            }
            RumbleCommand::IsConnected {
                device,
                response_tx,
            } => {
                let device = self.target(device);
                if response_tx.send(self.engine.is_connected(device)).is_err() {
                    warn!("Query response dropped before delivery");
                }
            }
            RumbleCommand::IsPlaying {
                device,
                response_tx,
            } => {
                let device = self.target(device);
                if response_tx.send(self.engine.is_playing(device)).is_err() {
                    warn!("Query response dropped before delivery");
                }
            }
        }
    }

    fn on_wakeup(&mut self, expired: delay_queue::Expired<DeviceId>) {
        let device = expired.into_inner();
        self.pending.remove(&device);
        trace!("Wake-up fired for {:?}", device);
        let op = self.engine.on_wakeup(device, Instant::now());
        self.apply(op);
    }

    // Applies a timer directive, keeping at most one pending entry per
    // device.
    fn apply(&mut self, op: TimerOp) {
        match op {
            TimerOp::Arm { device, wait } => {
                if let Some(stale) = self.pending.remove(&device) {
                    self.timers.try_remove(&stale);
                }
                let key = self.timers.insert(device, wait);
                self.pending.insert(device, key);
            }
            TimerOp::Cancel { device } => {
                if let Some(key) = self.pending.remove(&device) {
                    self.timers.try_remove(&key);
                }
            }
            TimerOp::None => {}
        }
    }

    fn target(&self, device: Option<DeviceId>) -> DeviceId {
        device.unwrap_or_else(|| self.engine.current_device())
    }

    // Zero every motor before the task ends.
    fn finish(mut self) -> RumbleWorker<Stopped> {
        for op in self.engine.stop_all() {
            self.apply(op);
        }
        info!("Rumble worker stopped");
        self.transition()
    }
}

impl RumbleWorker<Stopped> {}
