//! Engine configuration.

use crate::tables::{SAMPLES_PER_BUFFER, SAMPLE_RATE};

/// Number of tracks (and of per-track mute flags).
pub const NUM_TRACKS: usize = 16;

/// Channels each instrument type may be allocated on, one bit per channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChannelMasks {
    pub pcm: u16,
    pub psg: u16,
    pub noise: u16,
}

impl Default for ChannelMasks {
    fn default() -> Self {
        Self { pcm: 0xFFFF, psg: 0x3F00, noise: 0xC000 }
    }
}

/// Playback settings shared by the player, mixer and pacing loop.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Frames (mixer buffers) per second.
    pub frame_rate: f64,
    pub channel_masks: ChannelMasks,
    /// Tracks whose channels are left out of the mix.
    pub mutes: [bool; NUM_TRACKS],
    /// Linear master gain applied after mixing.
    pub master_volume: f32,
    /// Sequence loops played before fading out; 0 plays forever.
    pub loops: u32,
    /// Seed for the random source used by random commands.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            frame_rate: SAMPLE_RATE as f64 / SAMPLES_PER_BUFFER as f64,
            channel_masks: ChannelMasks::default(),
            mutes: [false; NUM_TRACKS],
            master_volume: 1.0,
            loops: 0,
            seed: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_rate_matches_one_buffer() {
        let cfg = EngineConfig::default();
        let samples = cfg.frame_rate * SAMPLES_PER_BUFFER as f64;
        assert!((samples - SAMPLE_RATE as f64).abs() < 1e-6);
    }

    #[test]
    fn default_masks_split_psg_and_noise() {
        let masks = ChannelMasks::default();
        assert_eq!(masks.psg & masks.noise, 0);
        assert_eq!(masks.psg.count_ones(), 6);
        assert_eq!(masks.noise.count_ones(), 2);
    }
}
