use crate::device::{BackendError, DeviceId, RumbleBackend};
use gilrs::ff::{BaseEffect, BaseEffectType, Effect, EffectBuilder, Replay, Ticks};
use gilrs::{Event, EventType, GamepadId, Gilrs};
use std::collections::HashMap;
use std::time::Instant;
use tracing::{debug, error, info, warn};

// How long a single committed speed pair keeps driving the motors before the
// platform effect expires on its own. The event pump replays any effect held
// for half this window, so a step longer than the window stays live as long
// as pumping continues; the expiry itself guarantees a crashed caller cannot
// leave a pad buzzing forever.
const EFFECT_HOLD_MS: u32 = 60_000;

// Age at which a still-held effect is replayed, restarting its hold window.
const EFFECT_REFRESH_MS: u64 = (EFFECT_HOLD_MS as u64) / 2;

fn due_for_refresh(held_since: Instant, now: Instant) -> bool {
    now.duration_since(held_since).as_millis() >= u128::from(EFFECT_REFRESH_MS)
}

// Maps a normalized speed onto the platform magnitude range. The saturating
// cast is the hard device-boundary clip: negatives and NaN land at 0,
// anything above 1.0 lands at u16::MAX.
fn magnitude(speed: f32) -> u16 {
    (speed * 65_535.0) as u16
}

// An active effect plus the moment it was last (re)started.
struct HeldEffect {
    effect: Effect,
    held_since: Instant,
}

/// Production backend driving gamepad motors through gilrs force feedback.
///
/// `Strong` is the low-frequency motor, `Weak` the high-frequency one.
/// Commanding a pad replaces its previous effect wholesale; dropping the old
/// effect is what stops it, so the map below is the only cleanup needed.
pub struct GilrsBackend {
    gilrs: Gilrs,
    effects: HashMap<GamepadId, HeldEffect>,
}

impl GilrsBackend {
    pub fn new() -> Result<Self, BackendError> {
        info!("Initializing gilrs rumble backend");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(BackendError::Initialization(e.to_string()));
            }
        };

        let pad_count = gilrs.gamepads().count();
        if pad_count == 0 {
            warn!("No gamepad connected, rumble commands will be dropped");
        } else {
            info!("Found {} gamepads:", pad_count);
            for (idx, (id, pad)) in gilrs.gamepads().enumerate() {
                info!(
                    "  [{}] ID: {}, Name: {}, force feedback: {}",
                    idx,
                    id,
                    pad.name(),
                    pad.is_ff_supported()
                );
            }
        }

        Ok(Self {
            gilrs,
            effects: HashMap::new(),
        })
    }

    // Rumble-capable pads in enumeration order.
    fn rumble_pads(&self) -> impl Iterator<Item = GamepadId> + '_ {
        self.gilrs
            .gamepads()
            .filter(|(_, pad)| pad.is_ff_supported())
            .map(|(id, _)| id)
    }

    // Active resolves to the first rumble-capable pad; so does an index past
    // the end of the enumeration. Re-queried on every call, never cached.
    fn resolve(&self, device: DeviceId) -> Option<GamepadId> {
        let mut pads = self.rumble_pads();
        match device {
            DeviceId::Active => pads.next(),
            DeviceId::Index(n) => {
                let pads: Vec<GamepadId> = pads.collect();
                pads.get(n).or_else(|| pads.first()).copied()
            }
        }
    }

    fn build_effect(
        &mut self,
        pad: GamepadId,
        low: f32,
        high: f32,
    ) -> Result<Effect, gilrs::ff::Error> {
        let effect = EffectBuilder::new()
            .add_effect(BaseEffect {
                kind: BaseEffectType::Strong {
                    magnitude: magnitude(low),
                },
                scheduling: Replay {
                    play_for: Ticks::from_ms(EFFECT_HOLD_MS),
                    ..Default::default()
                },
                envelope: Default::default(),
            })
            .add_effect(BaseEffect {
                kind: BaseEffectType::Weak {
                    magnitude: magnitude(high),
                },
                scheduling: Replay {
                    play_for: Ticks::from_ms(EFFECT_HOLD_MS),
                    ..Default::default()
                },
                envelope: Default::default(),
            })
            .gamepads(&[pad])
            .finish(&mut self.gilrs)?;
        effect.play()?;
        Ok(effect)
    }
}

impl RumbleBackend for GilrsBackend {
    fn driver_name(&self) -> &'static str {
        "gilrs"
    }

    fn device_count(&self) -> usize {
        self.rumble_pads().count()
    }

    fn is_connected(&self, device: DeviceId) -> bool {
        self.resolve(device).is_some()
    }

    fn set_motor_speeds(&mut self, device: DeviceId, low: f32, high: f32) -> bool {
        let Some(pad) = self.resolve(device) else {
            debug!("No rumble-capable gamepad for {:?}", device);
            return false;
        };

        // Dropping the previous effect stops whatever the pad was doing.
        self.effects.remove(&pad);
        if low <= 0.0 && high <= 0.0 {
            return true;
        }

        match self.build_effect(pad, low, high) {
            Ok(effect) => {
                self.effects.insert(
                    pad,
                    HeldEffect {
                        effect,
                        held_since: Instant::now(),
                    },
                );
                true
            }
            Err(e) => {
                warn!("Failed to command motors on gamepad {}: {}", pad, e);
                false
            }
        }
    }

    fn pump_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => {
                    info!("Gamepad {} connected", id);
                }
                EventType::Disconnected => {
                    warn!("Gamepad {} disconnected", id);
                    // The cached effect handle died with the pad.
                    self.effects.remove(&id);
                }
                _ => {}
            }
        }

        let now = Instant::now();
        for held in self.effects.values_mut() {
            if due_for_refresh(held.held_since, now) {
                // play() restarts the platform hold window.
                if let Err(e) = held.effect.play() {
                    warn!("Failed to refresh rumble effect: {}", e);
                }
                held.held_since = now;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magnitude_saturates_at_the_device_range() {
        assert_eq!(magnitude(0.0), 0);
        assert_eq!(magnitude(1.0), u16::MAX);
        assert_eq!(magnitude(2.5), u16::MAX);
        assert_eq!(magnitude(-0.5), 0);
        assert_eq!(magnitude(0.5), 32_767);
    }

    #[test]
    fn refresh_falls_due_at_half_the_hold_window() {
        use std::time::Duration;

        let t0 = Instant::now();
        assert!(!due_for_refresh(t0, t0));
        assert!(!due_for_refresh(t0, t0 + Duration::from_millis(29_999)));
        assert!(due_for_refresh(t0, t0 + Duration::from_millis(30_000)));
    }
}
