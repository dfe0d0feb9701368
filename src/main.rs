use color_eyre::{eyre::eyre, Result};
use rumblekit::{RumblePattern, RumblePlayer, RumbleStep, RumblerSettings};
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let pattern = match std::env::args().nth(1) {
        Some(path) => {
            info!("Loading rumble pattern from {}", path);
            RumblePattern::from_toml_path(&path)?
        }
        None => heartbeat(),
    };
    info!(
        "Pattern has {} steps over {} ms",
        pattern.len(),
        pattern.nominal_duration_ms()
    );

    let mut player = RumblePlayer::spawn_gilrs(RumblerSettings::default())
        .map_err(|e| eyre!("Failed to spawn rumble player: {}", e))?;

    player.load(pattern.clone()).await?;
    if !player.can_play().await? {
        warn!("No rumble-capable gamepad connected, nothing to do");
        player.shutdown().await?;
        return Ok(());
    }

    info!("Playing at full strength");
    player.play().await?;
    tokio::time::sleep(Duration::from_millis(pattern.nominal_duration_ms() + 150)).await;

    // Same pattern again at half gain on both motors
    info!("Playing at half strength");
    player.set_speed_multiplier(0.5, 0.5).await?;
    player.play().await?;
    tokio::time::sleep(Duration::from_millis(pattern.nominal_duration_ms() + 150)).await;

    player.stop_all().await?;
    player.shutdown().await?;
    info!("Done");
    Ok(())
}

/// Built-in demo pattern: a lub-dub heartbeat with a rest between beats.
fn heartbeat() -> RumblePattern {
    RumblePattern::from_steps(&[
        RumbleStep {
            duration_ms: 120,
            low: 1.0,
            high: 0.3,
        },
        RumbleStep {
            duration_ms: 100,
            low: 0.0,
            high: 0.0,
        },
        RumbleStep {
            duration_ms: 120,
            low: 0.6,
            high: 0.2,
        },
        RumbleStep {
            duration_ms: 460,
            low: 0.0,
            high: 0.0,
        },
    ])
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
