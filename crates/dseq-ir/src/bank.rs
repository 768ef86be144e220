//! Instruments and the sound bank that maps programs to note parameters.

use alloc::collections::BTreeMap;
use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayString;
use slotmap::SlotMap;

use crate::wave::{Wave, WaveKey};

/// Which hardware voice type an instrument needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentType {
    /// Sampled wave playback (any channel)
    Pcm,
    /// Square wave generator (channels 8-13)
    Psg,
    /// White noise generator (channels 14-15)
    Noise,
}

/// Sound source of a note.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteSource {
    /// Play a wave from the bank.
    Pcm(WaveKey),
    /// Square wave with a duty cycle of `(duty + 1) / 8`.
    Psg { duty: u8 },
    Noise,
}

impl NoteSource {
    pub fn instrument_type(&self) -> InstrumentType {
        match self {
            NoteSource::Pcm(_) => InstrumentType::Pcm,
            NoteSource::Psg { .. } => InstrumentType::Psg,
            NoteSource::Noise => InstrumentType::Noise,
        }
    }
}

/// Parameters used to start a note on a channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteInfo {
    pub source: NoteSource,
    /// Key at which the source plays at its native pitch.
    pub base_key: u8,
    pub attack: u8,
    pub decay: u8,
    pub sustain: u8,
    /// Release rate; 0xFF makes notes hold until stopped.
    pub release: u8,
    /// Pan, 0..=127 with 64 as center.
    pub pan: u8,
}

impl NoteInfo {
    /// Note parameters with a fast attack, full sustain and medium release.
    pub fn new(source: NoteSource) -> Self {
        Self {
            source,
            base_key: 60,
            attack: 127,
            decay: 127,
            sustain: 127,
            release: 100,
            pan: 64,
        }
    }

    pub fn with_base_key(mut self, key: u8) -> Self {
        self.base_key = key;
        self
    }

    pub fn with_adsr(mut self, attack: u8, decay: u8, sustain: u8, release: u8) -> Self {
        self.attack = attack;
        self.decay = decay;
        self.sustain = sustain;
        self.release = release;
        self
    }

    pub fn with_pan(mut self, pan: u8) -> Self {
        self.pan = pan;
        self
    }
}

/// A key range mapped to note parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyRegion {
    /// Highest key (inclusive) covered by this region.
    pub max_key: u8,
    pub info: NoteInfo,
}

/// An instrument: key regions sorted by `max_key`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<26>,
    pub regions: Vec<KeyRegion>,
}

impl Instrument {
    /// Instrument that plays the same parameters on every key.
    pub fn single(name: &str, info: NoteInfo) -> Self {
        Self::split(name, vec![KeyRegion { max_key: 127, info }])
    }

    /// Instrument with one region per key range.
    pub fn split(name: &str, mut regions: Vec<KeyRegion>) -> Self {
        regions.sort_by_key(|r| r.max_key);
        let mut inst = Self { name: ArrayString::new(), regions };
        let _ = inst.name.try_push_str(name);
        inst
    }

    /// Parameters for `key`, if any region covers it.
    pub fn region(&self, key: u8) -> Option<&NoteInfo> {
        self.regions.iter().find(|r| key <= r.max_key).map(|r| &r.info)
    }
}

/// Waves and instruments available to a playing sequence.
#[derive(Clone, Debug, Default)]
pub struct SoundBank {
    /// Wave storage (owns all wave data).
    pub waves: SlotMap<WaveKey, Wave>,
    instruments: BTreeMap<u32, Instrument>,
}

impl SoundBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a wave and return its key.
    pub fn add_wave(&mut self, wave: Wave) -> WaveKey {
        self.waves.insert(wave)
    }

    /// Assign an instrument to a program number.
    pub fn set_instrument(&mut self, program: u32, instrument: Instrument) {
        self.instruments.insert(program, instrument);
    }

    pub fn instrument(&self, program: u32) -> Option<&Instrument> {
        self.instruments.get(&program)
    }

    /// Note parameters for a program and key.
    pub fn note_info(&self, program: u32, key: u8) -> Option<&NoteInfo> {
        self.instrument(program)?.region(key)
    }
}
