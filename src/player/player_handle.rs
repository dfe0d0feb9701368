//! Rumble Player - unified async API for rumble playback
//!
//! Provides the public handle over the worker task: every operation is a
//! command posted onto the worker's queue, queries await a oneshot reply.
//! The handle is cheap to hold and safe to drop; both paths end with every
//! known motor zeroed.

use crate::device::{BackendError, DeviceId, GilrsBackend, RumbleBackend};
use crate::pattern::RumblePattern;
use crate::player::worker::{RumbleCommand, RumbleWorker};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Configuration settings for the rumble player runtime
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use rumblekit::RumblerSettings;
///
/// // Snappier hotplug detection for a desktop app
/// let settings = RumblerSettings {
///     command_buffer: 32,
///     pump_interval: Duration::from_millis(250),
/// };
/// ```
#[derive(Clone, Debug)]
pub struct RumblerSettings {
    /// Capacity of the handle-to-worker command channel
    ///
    /// Commands are tiny and drained quickly; this only needs to absorb
    /// bursts. Sends block (asynchronously) once the buffer is full. Zero
    /// is treated as a capacity of one.
    pub command_buffer: usize,

    /// Interval between backend event pumps
    ///
    /// The pump drains the driver's event queue so connects and disconnects
    /// are noticed while nothing is playing. It never touches playback
    /// state. Zero is raised to one millisecond.
    pub pump_interval: Duration,
}

impl Default for RumblerSettings {
    fn default() -> Self {
        Self {
            command_buffer: 64,
            pump_interval: Duration::from_millis(500), // Hotplug latency, not playback timing
        }
    }
}

/// Errors that can occur while operating the rumble player
#[derive(Debug, thiserror::Error)]
pub enum RumbleError {
    /// The device backend could not be brought up
    #[error("Backend error: {0}")]
    BackendError(#[from] BackendError),

    /// The worker task is gone, so the command could not be queued
    #[error("Failed to queue command: worker task is gone")]
    ChannelClosedError,

    /// The worker dropped the query before replying
    #[error("Failed to receive reply: worker dropped the query")]
    ReplyDroppedError,

    /// The worker task panicked or was cancelled during shutdown
    #[error("Failed to join worker task: {0}")]
    ShutdownError(String),
}

/// Async handle to the rumble worker task
///
/// Device-scoped operations come in two forms: the plain form targets the
/// currently selected device (see [`RumblePlayer::set_current_device`]), the
/// `_on` form names a device explicitly. Fire-and-forget operations resolve
/// as soon as the command is queued; queries await the worker's reply.
///
/// Dropping the handle closes the command channel, which stops the worker
/// and zeroes every motor it knows about. [`RumblePlayer::shutdown`] does
/// the same but waits for the worker to finish.
///
/// # Examples
///
/// ```no_run
/// use rumblekit::{RumblePattern, RumblePlayer, RumblerSettings};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let mut player = RumblePlayer::spawn_gilrs(RumblerSettings::default())?;
/// player.load(RumblePattern::constant(250, 0.8, 0.3)).await?;
/// player.play().await?;
/// # Ok(())
/// # }
/// ```
pub struct RumblePlayer {
    command_tx: mpsc::Sender<RumbleCommand>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task_handle: Option<JoinHandle<()>>,
}

impl RumblePlayer {
    /// Spawns the worker task over the given backend.
    pub fn spawn(backend: impl RumbleBackend, settings: RumblerSettings) -> Self {
        info!("Spawning rumble player with settings: {:?}", settings);
        // channel() panics on zero capacity
        let (command_tx, command_rx) = mpsc::channel(settings.command_buffer.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let worker = RumbleWorker::create(Box::new(backend), command_rx, &settings);
        let task_handle = tokio::spawn(async move {
            let _stopped = worker.start().run_until_shutdown(shutdown_rx).await;
        });

        Self {
            command_tx,
            shutdown_tx: Some(shutdown_tx),
            task_handle: Some(task_handle),
        }
    }

    /// Spawns the worker over the production gilrs backend.
    pub fn spawn_gilrs(settings: RumblerSettings) -> Result<Self, RumbleError> {
        let backend = GilrsBackend::new()?;
        Ok(Self::spawn(backend, settings))
    }

    /// Loads `pattern` onto the current device and resets its gain
    /// multipliers. An invalid pattern clears the slot instead, exactly as
    /// [`RumblePlayer::unload`] would.
    pub async fn load(&self, pattern: RumblePattern) -> Result<(), RumbleError> {
        self.post(RumbleCommand::Load {
            device: None,
            pattern,
        })
        .await
    }

    /// Loads `pattern` onto a specific device.
    pub async fn load_on(
        &self,
        device: DeviceId,
        pattern: RumblePattern,
    ) -> Result<(), RumbleError> {
        self.post(RumbleCommand::Load {
            device: Some(device),
            pattern,
        })
        .await
    }

    /// Drops the current device's pattern, stopping its playback first.
    pub async fn unload(&self) -> Result<(), RumbleError> {
        self.post(RumbleCommand::Unload { device: None }).await
    }

    /// Drops a specific device's pattern, stopping its playback first.
    pub async fn unload_on(&self, device: DeviceId) -> Result<(), RumbleError> {
        self.post(RumbleCommand::Unload {
            device: Some(device),
        })
        .await
    }

    /// Starts (or restarts) playback from step 0 on the current device.
    /// Silently does nothing unless the device can play right now.
    pub async fn play(&self) -> Result<(), RumbleError> {
        self.post(RumbleCommand::Play { device: None }).await
    }

    /// Starts (or restarts) playback on a specific device.
    pub async fn play_on(&self, device: DeviceId) -> Result<(), RumbleError> {
        self.post(RumbleCommand::Play {
            device: Some(device),
        })
        .await
    }

    /// Stops the current device and zeroes its motors, playing or not.
    pub async fn stop(&self) -> Result<(), RumbleError> {
        self.post(RumbleCommand::Stop { device: None }).await
    }

    /// Stops a specific device and zeroes its motors.
    pub async fn stop_on(&self, device: DeviceId) -> Result<(), RumbleError> {
        self.post(RumbleCommand::Stop {
            device: Some(device),
        })
        .await
    }

    /// Stops every device touched so far.
    pub async fn stop_all(&self) -> Result<(), RumbleError> {
        self.post(RumbleCommand::StopAll).await
    }

    /// Sets the current device's per-motor gains, effective from the next
    /// committed step. Only a `load` resets them.
    pub async fn set_speed_multiplier(&self, low: f32, high: f32) -> Result<(), RumbleError> {
        self.post(RumbleCommand::SetSpeedMultiplier {
            device: None,
            low,
            high,
        })
        .await
    }

    /// Sets a specific device's per-motor gains.
    pub async fn set_speed_multiplier_on(
        &self,
        device: DeviceId,
        low: f32,
        high: f32,
    ) -> Result<(), RumbleError> {
        self.post(RumbleCommand::SetSpeedMultiplier {
            device: Some(device),
            low,
            high,
        })
        .await
    }

    /// Selects the device targeted by the plain operation forms. An index
    /// beyond the backend's device count is ignored with a warning.
    pub async fn set_current_device(&self, device: DeviceId) -> Result<(), RumbleError> {
        self.post(RumbleCommand::SetCurrentDevice { device }).await
    }

    /// The device currently targeted by the plain operation forms.
    pub async fn current_device(&self) -> Result<DeviceId, RumbleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.post(RumbleCommand::CurrentDevice { response_tx })
            .await?;
        response_rx.await.map_err(|_| RumbleError::ReplyDroppedError)
    }

    /// True iff the current device is connected and holds a valid pattern.
    pub async fn can_play(&self) -> Result<bool, RumbleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.post(RumbleCommand::CanPlay {
            device: None,
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| RumbleError::ReplyDroppedError)
    }

    /// True iff a specific device is connected and holds a valid pattern.
    pub async fn can_play_on(&self, device: DeviceId) -> Result<bool, RumbleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.post(RumbleCommand::CanPlay {
            device: Some(device),
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| RumbleError::ReplyDroppedError)
    }

    /// True iff the current device resolves to live hardware right now.
    pub async fn is_connected(&self) -> Result<bool, RumbleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.post(RumbleCommand::IsConnected {
            device: None,
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| RumbleError::ReplyDroppedError)
    }

    /// True iff a specific device resolves to live hardware right now.
    pub async fn is_connected_on(&self, device: DeviceId) -> Result<bool, RumbleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.post(RumbleCommand::IsConnected {
            device: Some(device),
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| RumbleError::ReplyDroppedError)
    }

    /// True iff a run is in flight on the current device.
    pub async fn is_playing(&self) -> Result<bool, RumbleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.post(RumbleCommand::IsPlaying {
            device: None,
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| RumbleError::ReplyDroppedError)
    }

    /// True iff a run is in flight on a specific device.
    pub async fn is_playing_on(&self, device: DeviceId) -> Result<bool, RumbleError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.post(RumbleCommand::IsPlaying {
            device: Some(device),
            response_tx,
        })
        .await?;
        response_rx.await.map_err(|_| RumbleError::ReplyDroppedError)
    }

    /// Gracefully shuts down the worker and waits for task completion
    pub async fn shutdown(&mut self) -> Result<(), RumbleError> {
        debug!("Sending shutdown signal to rumble worker");
        if let Some(tx) = self.shutdown_tx.take() {
            if tx.send(()).is_err() {
                warn!("Rumble worker already terminated");
            }
        }

        if let Some(handle) = self.task_handle.take() {
            handle
                .await
                .map_err(|e| RumbleError::ShutdownError(format!("Worker task panicked: {}", e)))?;
        }
        Ok(())
    }

    async fn post(&self, command: RumbleCommand) -> Result<(), RumbleError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| RumbleError::ChannelClosedError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::{MockBackend, MotorCommand};
    use tokio::time::Instant;

    fn test_pattern() -> RumblePattern {
        RumblePattern {
            durations_ms: vec![100, 50, 200],
            low_freq_speeds: vec![0.0, 1.0, 0.0],
            high_freq_speeds: vec![0.0, 0.0, 1.0],
            total_duration_ms: 350,
        }
    }

    fn cmd(low: f32, high: f32) -> MotorCommand {
        MotorCommand {
            device: DeviceId::Active,
            low,
            high,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn plays_a_pattern_on_schedule() {
        let (backend, mut probe) = MockBackend::pair();
        let mut player = RumblePlayer::spawn(backend, RumblerSettings::default());

        player.load(test_pattern()).await.unwrap();
        player.play().await.unwrap();
        let t0 = Instant::now();

        assert_eq!(probe.next_command().await, cmd(0.0, 0.0));
        assert_eq!(t0.elapsed(), Duration::from_millis(0));

        assert_eq!(probe.next_command().await, cmd(1.0, 0.0));
        assert_eq!(t0.elapsed(), Duration::from_millis(100));

        assert_eq!(probe.next_command().await, cmd(0.0, 1.0));
        assert_eq!(t0.elapsed(), Duration::from_millis(150));

        // Switch-off after the final step's window.
        assert_eq!(probe.next_command().await, cmd(0.0, 0.0));
        assert_eq!(t0.elapsed(), Duration::from_millis(350));

        assert!(player.is_connected().await.unwrap());
        assert!(player.can_play().await.unwrap());
        assert!(!player.is_playing().await.unwrap());

        player.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_zeroes_motors_mid_run() {
        let (backend, mut probe) = MockBackend::pair();
        let mut player = RumblePlayer::spawn(backend, RumblerSettings::default());

        player
            .load(RumblePattern::constant(60_000, 1.0, 1.0))
            .await
            .unwrap();
        player.play().await.unwrap();
        assert_eq!(probe.next_command().await, cmd(1.0, 1.0));

        player.shutdown().await.unwrap();
        assert_eq!(probe.next_command().await, cmd(0.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_stops_the_worker() {
        let (backend, mut probe) = MockBackend::pair();
        let player = RumblePlayer::spawn(backend, RumblerSettings::default());

        player
            .load(RumblePattern::constant(60_000, 0.8, 0.0))
            .await
            .unwrap();
        player.play().await.unwrap();
        assert_eq!(probe.next_command().await, cmd(0.8, 0.0));

        drop(player);
        assert_eq!(probe.next_command().await, cmd(0.0, 0.0));
    }

    #[tokio::test(start_paused = true)]
    async fn replay_mid_run_reschedules_cleanly() {
        let (backend, mut probe) = MockBackend::pair();
        let mut player = RumblePlayer::spawn(backend, RumblerSettings::default());

        player.load(test_pattern()).await.unwrap();
        player.play().await.unwrap();
        let t0 = Instant::now();
        assert_eq!(probe.next_command().await, cmd(0.0, 0.0));
        assert_eq!(probe.next_command().await, cmd(1.0, 0.0));
        assert_eq!(t0.elapsed(), Duration::from_millis(100));

        // Restart while step 1 is current; the superseded wake-up must not
        // fire on top of the new run.
        player.play().await.unwrap();
        assert_eq!(probe.next_command().await, cmd(0.0, 0.0));
        assert_eq!(t0.elapsed(), Duration::from_millis(100));

        assert_eq!(probe.next_command().await, cmd(1.0, 0.0));
        assert_eq!(t0.elapsed(), Duration::from_millis(200));

        player.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn current_device_selection_routes_commands() {
        let (backend, mut probe) = MockBackend::pair();
        let mut player = RumblePlayer::spawn(backend, RumblerSettings::default());

        player.set_current_device(DeviceId::Index(0)).await.unwrap();
        assert_eq!(player.current_device().await.unwrap(), DeviceId::Index(0));

        player.load(test_pattern()).await.unwrap();
        assert!(player.can_play().await.unwrap());
        // The pattern landed on the indexed slot, not the active one.
        assert!(!player.can_play_on(DeviceId::Active).await.unwrap());

        player.play().await.unwrap();
        let first = probe.next_command().await;
        assert_eq!(first.device, DeviceId::Index(0));

        player.stop().await.unwrap();
        assert_eq!(
            probe.next_command().await,
            MotorCommand {
                device: DeviceId::Index(0),
                low: 0.0,
                high: 0.0,
            }
        );

        player.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn hotplug_pump_ticks_at_the_configured_interval() {
        let (backend, probe) = MockBackend::pair();
        let mut player = RumblePlayer::spawn(
            backend,
            RumblerSettings {
                command_buffer: 8,
                pump_interval: Duration::from_millis(200),
            },
        );

        player.load(test_pattern()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(1_100)).await;

        // Ticks land at 0, 200, ..., 1000 ms.
        assert_eq!(probe.pump_count(), 6);
        // Pumping touches no playback state and commands no motors.
        assert!(player.can_play().await.unwrap());
        assert!(!player.is_playing().await.unwrap());
        assert!(probe.commands().is_empty());

        player.shutdown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn degenerate_settings_are_raised_to_working_values() {
        let (backend, mut probe) = MockBackend::pair();
        let mut player = RumblePlayer::spawn(
            backend,
            RumblerSettings {
                command_buffer: 0,
                pump_interval: Duration::ZERO,
            },
        );

        player
            .load(RumblePattern::constant(100, 0.6, 0.0))
            .await
            .unwrap();
        player.play().await.unwrap();
        assert_eq!(probe.next_command().await, cmd(0.6, 0.0));

        // A worker killed by a zero interval would surface here as a panic.
        player.shutdown().await.unwrap();
    }
}
