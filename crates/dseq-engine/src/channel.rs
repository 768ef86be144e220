//! Hardware voice state: envelope, pitch/pan/volume registers and synthesis.

use dseq_ir::{InstrumentType, NoteSource, Wave, WaveKey};
use slotmap::SlotMap;

use crate::envelope_state::{Envelope, EnvelopeStage};
use crate::tables::{Tables, VOLUME_FLOOR};

/// Timer units covered by one output sample.
const TIMER_STEP: u32 = 0x100;
const LFSR_SEED: u16 = 0x7FFF;
const SQUARE_HIGH: i32 = 0x7FFF;

/// Per-tick values a channel reads from its owning track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackOutput {
    /// Summed track attenuation (main volume, volume, expression, LFO).
    pub volume: i32,
    /// Pitch offset in 1/64 semitones (bend and LFO).
    pub pitch: i32,
    /// Pan offset, -64..=63.
    pub pan: i32,
    /// The track holds its notes until they finish on their own.
    pub waiting: bool,
}

/// One of the sixteen hardware voices.
#[derive(Clone, Debug)]
pub struct Channel {
    index: u8,
    owner: Option<u8>,
    source: Option<NoteSource>,
    envelope: Envelope,
    /// Key currently playing.
    pub key: u8,
    /// Key at which the source plays at its base timer.
    pub base_key: u8,
    pub note_velocity: u8,
    /// Ticks left before release; negative holds until stopped.
    pub note_duration: i32,
    /// Initial pitch offset of a sweep, in 1/64 semitones.
    pub sweep_pitch: i32,
    pub sweep_length: i32,
    pub sweep_counter: i32,
    /// The sweep advances on channel ticks rather than track ticks.
    pub auto_sweep: bool,
    /// Note pan, -64..=63, before track pan is added.
    pub start_pan: i8,
    base_timer: u16,

    // Registers refreshed on every channel tick
    volume: u8,
    shift: u8,
    pan: i8,
    timer: u16,

    // Synthesis state
    pos: u32,
    sample_pos: usize,
    psg_step: u8,
    lfsr: u16,
    last_sample: i32,
}

impl Channel {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            owner: None,
            source: None,
            envelope: Envelope::default(),
            key: 60,
            base_key: 60,
            note_velocity: 0,
            note_duration: 0,
            sweep_pitch: 0,
            sweep_length: 0,
            sweep_counter: 0,
            auto_sweep: false,
            start_pan: 0,
            base_timer: 0,
            volume: 0,
            shift: 0,
            pan: 0,
            timer: 0,
            pos: 0,
            sample_pos: 0,
            psg_step: 0,
            lfsr: LFSR_SEED,
            last_sample: 0,
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Track that owns this channel, if any.
    pub fn owner(&self) -> Option<u8> {
        self.owner
    }

    pub fn is_free(&self) -> bool {
        self.owner.is_none()
    }

    pub fn kind(&self) -> Option<InstrumentType> {
        self.source.map(|s| s.instrument_type())
    }

    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }

    pub fn is_releasing(&self) -> bool {
        self.envelope.is_releasing()
    }

    /// Output multiplier (0..=127) from the last tick.
    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Effective output amplitude, used to pick between equal-priority voices.
    pub fn amplitude(&self) -> u16 {
        ((self.volume as u16) << 4) >> self.shift
    }

    pub fn pan(&self) -> i8 {
        self.pan
    }

    pub fn timer(&self) -> u16 {
        self.timer
    }

    /// Claim the channel for `owner` and start `source` from the beginning.
    pub fn start(&mut self, owner: u8, source: NoteSource, base_timer: u16, duration: i32) {
        self.owner = Some(owner);
        self.source = Some(source);
        self.base_timer = base_timer;
        self.timer = base_timer;
        self.note_duration = duration;
        self.envelope.restart();
        self.sweep_pitch = 0;
        self.sweep_length = 0;
        self.sweep_counter = 0;
        self.auto_sweep = false;
        self.pos = 0;
        self.sample_pos = 0;
        self.psg_step = 0;
        self.lfsr = LFSR_SEED;
        self.last_sample = 0;
    }

    /// Free the channel immediately.
    pub fn stop(&mut self) {
        self.owner = None;
        self.source = None;
        self.volume = 0;
        self.last_sample = 0;
    }

    /// Current sweep offset. Advances the counter for automatic sweeps.
    pub fn sweep(&mut self) -> i32 {
        if self.sweep_pitch == 0 || self.sweep_counter >= self.sweep_length {
            return 0;
        }
        let remaining = (self.sweep_length - self.sweep_counter) as i64;
        let sweep = (self.sweep_pitch as i64 * remaining / self.sweep_length as i64) as i32;
        if self.auto_sweep {
            self.sweep_counter += 1;
        }
        sweep
    }

    /// Step the envelope and recompute volume, timer and pan. Frees the
    /// channel once a released note has decayed to silence.
    pub fn tick(&mut self, track: &TrackOutput, tables: &Tables) {
        if self.owner.is_none() {
            return;
        }
        self.envelope.step();
        if self.note_duration == 0 && !track.waiting {
            self.envelope.release();
        }

        let vol = tables.sustain(self.note_velocity) + self.envelope.level() + track.volume;
        let pitch = ((self.key as i32 - self.base_key as i32) << 6) + self.sweep() + track.pitch;

        if self.envelope.stage() == EnvelopeStage::Release && vol <= VOLUME_FLOOR {
            self.stop();
            return;
        }
        (self.volume, self.shift) = tables.channel_volume(vol);
        self.timer = tables.channel_timer(self.base_timer, pitch);
        self.pan = (self.start_pan as i32 + track.pan).clamp(-64, 63) as i8;
    }

    /// Render one output sample as `(left, right)`.
    pub fn process(&mut self, waves: &SlotMap<WaveKey, Wave>) -> (i32, i32) {
        let samp = self.advance(waves);
        if self.owner.is_none() {
            return (0, 0);
        }
        let samp = (samp * self.volume as i32 / 127) >> self.shift;
        let pan = self.pan as i32;
        (samp * (64 - pan) / 128, samp * (pan + 64) / 128)
    }

    /// Advance one output sample without producing audio.
    pub fn emulate_process(&mut self, waves: &SlotMap<WaveKey, Wave>) {
        let _ = self.advance(waves);
    }

    fn advance(&mut self, waves: &SlotMap<WaveKey, Wave>) -> i32 {
        let Some(source) = self.source else {
            return 0;
        };
        if self.timer == 0 {
            return self.last_sample;
        }
        let timer = self.timer as u32;
        let steps = (self.pos + TIMER_STEP) / timer;
        self.pos = (self.pos + TIMER_STEP) % timer;

        match source {
            NoteSource::Pcm(key) => {
                let Some(wave) = waves.get(key) else {
                    self.stop();
                    return 0;
                };
                for _ in 0..steps {
                    if self.sample_pos >= wave.len() {
                        match wave.loop_start {
                            Some(start) if wave.has_loop() => self.sample_pos = start as usize,
                            _ => {
                                self.stop();
                                return 0;
                            }
                        }
                    }
                    self.last_sample = wave.get(self.sample_pos) as i32;
                    self.sample_pos += 1;
                }
            }
            NoteSource::Psg { duty } => {
                for _ in 0..steps {
                    self.last_sample =
                        if self.psg_step <= duty { -SQUARE_HIGH } else { SQUARE_HIGH };
                    self.psg_step = (self.psg_step + 1) % 8;
                }
            }
            NoteSource::Noise => {
                for _ in 0..steps {
                    if self.lfsr & 1 != 0 {
                        self.lfsr = (self.lfsr >> 1) ^ 0x6000;
                        self.last_sample = -SQUARE_HIGH;
                    } else {
                        self.lfsr >>= 1;
                        self.last_sample = SQUARE_HIGH;
                    }
                }
            }
        }
        self.last_sample
    }
}
