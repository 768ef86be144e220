//! Numeric lookup tables and the rate/level conversions built on them.
//!
//! Levels are attenuations in 1/1280 dB below full scale (so `level / 128` is
//! tenths of a dB): 0 is full volume and [`VOLUME_FLOOR`] is silence.
//! Pitches are in 1/64 semitone steps.

/// Output rate of the mixer in Hz.
pub const SAMPLE_RATE: u32 = 65_456;
/// Samples rendered by one mixer buffer.
pub const SAMPLES_PER_BUFFER: usize = 341;
/// Lowest envelope/volume level; anything at or below is silent.
pub const VOLUME_FLOOR: i32 = -92_544;
/// Base timer of the PSG and noise generators.
pub const PSG_BASE_TIMER: u16 = 8006;
/// Number of entries in the pitch table (one octave).
const PITCH_STEPS: usize = 0x300;
/// Range of the amplitude table input.
const VOLUME_STEPS: usize = 724;

const ATTACK_LUT: [u8; 19] = [
    0, 1, 5, 14, 26, 38, 51, 63, 73, 84, 92, 100, 109, 116, 123, 127, 132, 137, 143,
];
const VOLUME_SHIFTS: [u8; 4] = [0, 1, 2, 4];

/// Precomputed tables used for envelope, volume and pitch conversion.
///
/// The values are generated from their closed forms rather than copied from
/// hardware dumps; any table with the same shape can be substituted.
#[derive(Clone, Debug)]
pub struct Tables {
    sustain: [i32; 128],
    sine: [i8; 33],
    pitch: [u16; PITCH_STEPS],
    volume: [u8; VOLUME_STEPS],
}

impl Tables {
    pub fn new() -> Self {
        let mut sustain = [0i32; 128];
        for (i, level) in sustain.iter_mut().enumerate() {
            *level = if i == 0 {
                VOLUME_FLOOR
            } else {
                let db = 20.0 * libm::log10(i as f64 / 127.0);
                (libm::round(db * 10.0 * 128.0) as i32).max(VOLUME_FLOOR)
            };
        }

        let mut sine = [0i8; 33];
        for (i, s) in sine.iter_mut().enumerate() {
            *s = libm::round(127.0 * libm::sin(i as f64 * core::f64::consts::PI / 64.0)) as i8;
        }

        let mut pitch = [0u16; PITCH_STEPS];
        for (i, p) in pitch.iter_mut().enumerate() {
            let ratio = libm::pow(2.0, i as f64 / PITCH_STEPS as f64) - 1.0;
            *p = libm::round(65536.0 * ratio) as u16;
        }

        let mut volume = [0u8; VOLUME_STEPS];
        for (a, v) in volume.iter_mut().enumerate() {
            let shift = VOLUME_SHIFTS[volume_shift_index(a as i32)];
            let amp = 127.0 * libm::pow(10.0, (a as f64 - 723.0) / 200.0) * (1u32 << shift) as f64;
            *v = libm::round(amp).min(127.0) as u8;
        }

        Self { sustain, sine, pitch, volume }
    }

    /// Attenuation for a 0..=127 level byte. Out-of-range input saturates.
    pub fn sustain(&self, index: u8) -> i32 {
        self.sustain[index.min(127) as usize]
    }

    /// Sine of `index * 2pi / 128`, scaled to +-127.
    pub fn sin(&self, index: i32) -> i32 {
        let i = index.rem_euclid(128) as usize;
        match i {
            0..=31 => self.sine[i] as i32,
            32..=63 => self.sine[64 - i] as i32,
            64..=95 => -(self.sine[i - 64] as i32),
            _ => -(self.sine[128 - i] as i32),
        }
    }

    /// Convert a summed level into a channel multiplier (0..=127) and shift.
    pub fn channel_volume(&self, level: i32) -> (u8, u8) {
        let a = (level / 128).clamp(-723, 0) + 723;
        let shift = VOLUME_SHIFTS[volume_shift_index(a)];
        (self.volume[a as usize], shift)
    }

    /// Channel timer for `base_timer` raised by `pitch` 1/64 semitones.
    pub fn channel_timer(&self, base_timer: u16, pitch: i32) -> u16 {
        let neg = -(pitch as i64);
        let steps = PITCH_STEPS as i64;
        let mut shift = neg.div_euclid(steps) - 16;
        let index = neg.rem_euclid(steps) as usize;

        let mut timer = (self.pitch[index] as u64 + 0x10000) * base_timer as u64;
        if shift <= 0 {
            shift = -shift;
            timer = if shift >= 64 { 0 } else { timer >> shift };
        } else if shift < 32 {
            if timer & (!0u64 << (32 - shift)) != 0 {
                return 0xFFFF;
            }
            timer <<= shift;
        } else {
            return 0xFFFF;
        }
        timer.clamp(0x10, 0xFFFF) as u16
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new()
    }
}

fn volume_shift_index(a: i32) -> usize {
    [723 - 60, 723 - 120, 723 - 240].iter().filter(|&&t| a < t).count()
}

/// Per-tick multiplier used by the attack stage, from a 0..=127 attack value.
pub fn attack_rate(attack: u8) -> i32 {
    let a = attack.min(127);
    if a < 109 {
        255 - a as i32
    } else {
        ATTACK_LUT[(127 - a) as usize] as i32
    }
}

/// Per-tick decrement used by the decay and release stages.
pub fn fall_rate(rate: u8) -> i32 {
    match rate {
        127..=u8::MAX => 0xFFFF,
        126 => 0x3C00,
        r if r < 50 => r as i32 * 2 + 1,
        r => 0x1E00 / (126 - r as i32),
    }
}
