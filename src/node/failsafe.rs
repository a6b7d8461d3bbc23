//! Failsafe playback for idle universes.
//!
//! When a port stops receiving data for the configured idle timeout, the
//! node can hold the last frame, black out, drive every slot full, or play
//! back a recorded scene. Playback disengages the moment live data returns.

use super::state::PortOutput;
use crate::PortAddress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default time a port may sit idle before failsafe engages
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(6);

/// Default failsafe sweep interval
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// The smallest sweep interval the configuration accepts
pub const MIN_TICK_INTERVAL: Duration = Duration::from_millis(10);

/// What a port outputs once its sources go quiet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailsafeMode {
    /// Keep re-transmitting the last frame
    #[default]
    Hold,
    /// Black out, all slots to zero
    Zero,
    /// Drive every slot to full
    Full,
    /// Play back the recorded scene
    Scene,
}

impl FailsafeMode {
    /// The 2-bit encoding reported in Status3 and programmed via ArtAddress
    pub fn status_bits(self) -> u8 {
        match self {
            FailsafeMode::Hold => 0b00,
            FailsafeMode::Zero => 0b01,
            FailsafeMode::Full => 0b10,
            FailsafeMode::Scene => 0b11,
        }
    }
}

/// An engaged playback on one port
#[derive(Debug, Clone)]
pub struct Playback {
    /// The mode that engaged
    pub mode: FailsafeMode,
    /// When it engaged
    pub engaged_at: Instant,
    /// The replacement data being output
    pub data: Vec<u8>,
}

/// A replacement frame the sweep wants output
#[derive(Debug, Clone, PartialEq)]
pub struct FailsafeFrame {
    /// The port going idle
    pub port_address: PortAddress,
    /// The mode that produced the data
    pub mode: FailsafeMode,
    /// The replacement slot data
    pub data: Vec<u8>,
}

/// The failsafe state of the node
#[derive(Debug)]
pub struct FailsafeEngine {
    /// Whether the engine may engage at all
    pub enabled: bool,
    /// The configured mode
    pub mode: FailsafeMode,
    /// How long a port may sit idle
    pub idle_timeout: Duration,
    /// How often the sweep runs
    pub tick_interval: Duration,
    scenes: HashMap<PortAddress, Vec<u8>>,
    playback: HashMap<PortAddress, Playback>,
}

impl FailsafeEngine {
    /// Build the engine
    pub fn new(enabled: bool, mode: FailsafeMode, idle_timeout: Duration, tick_interval: Duration) -> Self {
        Self {
            enabled,
            mode,
            idle_timeout,
            tick_interval: tick_interval.max(MIN_TICK_INTERVAL),
            scenes: HashMap::new(),
            playback: HashMap::new(),
        }
    }

    /// Record the given frame as the port's failsafe scene
    pub fn record_scene(&mut self, port_address: PortAddress, data: Vec<u8>) {
        self.scenes.insert(port_address, data);
    }

    /// The recorded scene for a port, if any
    pub fn scene(&self, port_address: PortAddress) -> Option<&Vec<u8>> {
        self.scenes.get(&port_address)
    }

    /// The active playback on a port, if any
    pub fn playback(&self, port_address: PortAddress) -> Option<&Playback> {
        self.playback.get(&port_address)
    }

    /// Disengage playback on a port because live data returned.
    /// Returns the playback that was active, if any.
    pub fn clear_playback(&mut self, port_address: PortAddress) -> Option<Playback> {
        self.playback.remove(&port_address)
    }

    /// Find idle ports and produce their replacement frames.
    ///
    /// Hold mode never replaces anything; the port keeps re-transmitting its
    /// last frame through the keep-alive path. A port already in playback is
    /// not re-engaged.
    pub fn sweep<'a>(
        &mut self,
        outputs: impl Iterator<Item = (&'a PortAddress, &'a PortOutput)>,
        now: Instant,
    ) -> Vec<FailsafeFrame> {
        if !self.enabled || self.mode == FailsafeMode::Hold {
            return Vec::new();
        }

        let mut frames = Vec::new();
        for (&port_address, output) in outputs {
            if now.duration_since(output.updated_at) < self.idle_timeout {
                continue;
            }
            if self.playback.contains_key(&port_address) {
                continue;
            }
            let data = match self.mode {
                FailsafeMode::Hold => unreachable!(),
                FailsafeMode::Zero => vec![0u8; output.data.len()],
                FailsafeMode::Full => vec![0xFFu8; output.data.len()],
                FailsafeMode::Scene => match self.scenes.get(&port_address) {
                    Some(scene) => scene.clone(),
                    None => continue,
                },
            };
            self.playback.insert(
                port_address,
                Playback {
                    mode: self.mode,
                    engaged_at: now,
                    data: data.clone(),
                },
            );
            frames.push(FailsafeFrame {
                port_address,
                mode: self.mode,
                data,
            });
        }
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outputs(port: u16, len: usize, updated_at: Instant) -> HashMap<PortAddress, PortOutput> {
        let mut map = HashMap::new();
        map.insert(
            PortAddress::try_from(port).unwrap(),
            PortOutput {
                data: vec![42; len],
                sequence: 0,
                updated_at,
                emitted_at: updated_at,
                sender: None,
            },
        );
        map
    }

    #[test]
    fn zero_mode_blacks_out_after_the_idle_timeout() {
        let mut engine = FailsafeEngine::new(
            true,
            FailsafeMode::Zero,
            DEFAULT_IDLE_TIMEOUT,
            DEFAULT_TICK_INTERVAL,
        );
        let t0 = Instant::now();
        let map = outputs(7, 3, t0);

        assert!(engine.sweep(map.iter(), t0 + Duration::from_secs(5)).is_empty());

        let frames = engine.sweep(map.iter(), t0 + Duration::from_millis(6001));
        assert_eq!(
            frames,
            vec![FailsafeFrame {
                port_address: 7u16.try_into().unwrap(),
                mode: FailsafeMode::Zero,
                data: vec![0, 0, 0],
            }]
        );
        // already engaged, the next sweep stays quiet
        assert!(engine
            .sweep(map.iter(), t0 + Duration::from_secs(7))
            .is_empty());
    }

    #[test]
    fn full_mode_drives_every_slot_up() {
        let mut engine = FailsafeEngine::new(
            true,
            FailsafeMode::Full,
            DEFAULT_IDLE_TIMEOUT,
            DEFAULT_TICK_INTERVAL,
        );
        let t0 = Instant::now();
        let map = outputs(1, 2, t0);
        let frames = engine.sweep(map.iter(), t0 + Duration::from_secs(7));
        assert_eq!(frames[0].data, vec![0xFF, 0xFF]);
    }

    #[test]
    fn scene_mode_needs_a_recorded_scene() {
        let mut engine = FailsafeEngine::new(
            true,
            FailsafeMode::Scene,
            DEFAULT_IDLE_TIMEOUT,
            DEFAULT_TICK_INTERVAL,
        );
        let t0 = Instant::now();
        let map = outputs(1, 2, t0);
        assert!(engine.sweep(map.iter(), t0 + Duration::from_secs(7)).is_empty());

        engine.record_scene(1u8.into(), vec![10, 20]);
        let frames = engine.sweep(map.iter(), t0 + Duration::from_secs(8));
        assert_eq!(frames[0].data, vec![10, 20]);
    }

    #[test]
    fn hold_mode_never_engages() {
        let mut engine = FailsafeEngine::new(
            true,
            FailsafeMode::Hold,
            DEFAULT_IDLE_TIMEOUT,
            DEFAULT_TICK_INTERVAL,
        );
        let t0 = Instant::now();
        let map = outputs(1, 2, t0);
        assert!(engine.sweep(map.iter(), t0 + Duration::from_secs(60)).is_empty());
    }

    #[test]
    fn live_data_disengages_playback() {
        let mut engine = FailsafeEngine::new(
            true,
            FailsafeMode::Zero,
            DEFAULT_IDLE_TIMEOUT,
            DEFAULT_TICK_INTERVAL,
        );
        let t0 = Instant::now();
        let map = outputs(1, 2, t0);
        engine.sweep(map.iter(), t0 + Duration::from_secs(7));
        assert!(engine.playback(1u8.into()).is_some());

        let cleared = engine.clear_playback(1u8.into()).unwrap();
        assert_eq!(cleared.mode, FailsafeMode::Zero);
        assert!(engine.playback(1u8.into()).is_none());
    }

    #[test]
    fn tick_interval_is_floored() {
        let engine = FailsafeEngine::new(
            true,
            FailsafeMode::Zero,
            DEFAULT_IDLE_TIMEOUT,
            Duration::from_millis(1),
        );
        assert_eq!(engine.tick_interval, MIN_TICK_INTERVAL);
    }
}
