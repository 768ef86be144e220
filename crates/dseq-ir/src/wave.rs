//! PCM wave data referenced by instruments.

use alloc::vec::Vec;
use arrayvec::ArrayString;

slotmap::new_key_type! {
    /// Key for referencing waves in a [`SoundBank`](crate::SoundBank).
    pub struct WaveKey;
}

/// Clock driving the hardware channel timers, in Hz.
pub const TIMER_CLOCK: u32 = 16_756_991;

/// A decoded mono wave.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Wave {
    /// Wave name
    pub name: ArrayString<26>,
    /// Signed 16-bit samples
    pub data: Vec<i16>,
    /// Native sample rate in Hz
    pub sample_rate: u32,
    /// Sample index playback returns to after the end, if looping
    pub loop_start: Option<u32>,
}

impl Wave {
    /// Create a one-shot wave from 16-bit samples.
    pub fn new(name: &str, data: Vec<i16>, sample_rate: u32) -> Self {
        let mut wave = Self { data, sample_rate, ..Default::default() };
        let _ = wave.name.try_push_str(name);
        wave
    }

    /// Create a one-shot wave from 8-bit samples.
    pub fn from_pcm8(name: &str, data: &[i8], sample_rate: u32) -> Self {
        Self::new(name, data.iter().map(|&s| (s as i16) << 8).collect(), sample_rate)
    }

    /// Loop from `start` to the end of the data.
    pub fn looping(mut self, start: u32) -> Self {
        self.loop_start = Some(start);
        self
    }

    /// One period of a sine wave, looped, at full scale.
    pub fn sine(name: &str, period: usize, sample_rate: u32) -> Self {
        let data = (0..period)
            .map(|i| {
                let phase = i as f32 / period as f32 * 2.0 * core::f32::consts::PI;
                (libm::sinf(phase) * i16::MAX as f32) as i16
            })
            .collect();
        Self::new(name, data, sample_rate).looping(0)
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the wave has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if playback wraps instead of ending.
    pub fn has_loop(&self) -> bool {
        matches!(self.loop_start, Some(start) if (start as usize) < self.data.len())
    }

    /// Sample at `pos`, or silence past the end.
    pub fn get(&self, pos: usize) -> i16 {
        self.data.get(pos).copied().unwrap_or(0)
    }

    /// Channel timer reload value that plays the wave at its native rate.
    pub fn timer(&self) -> u16 {
        if self.sample_rate == 0 {
            return 0;
        }
        (TIMER_CLOCK / self.sample_rate).min(u16::MAX as u32) as u16
    }
}
