//! Sequencer lane state: cursor, call stack, registers and LFO.

use arrayvec::ArrayVec;
use dseq_ir::{CommandIndex, Register};

use crate::channel::{Channel, TrackOutput};
use crate::tables::Tables;

/// Maximum nesting of calls and loops.
pub const MAX_CALL_DEPTH: usize = 3;
/// Variable slots local to each track.
pub const NUM_LOCAL_VARS: usize = 16;
/// ADSR register value meaning "use the instrument's value".
pub const ADSR_DEFAULT: u8 = 0xFF;

/// What the LFO modulates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoType {
    #[default]
    Pitch,
    Volume,
    Pan,
}

impl LfoType {
    pub fn from_register(value: i16) -> Self {
        match value {
            1 => LfoType::Volume,
            2 => LfoType::Pan,
            _ => LfoType::Pitch,
        }
    }
}

/// Low-frequency oscillator applied to one of the track outputs.
///
/// `phase` packs a 7-bit sine index in bits 8..15 above a running 8-bit
/// fraction, so it always fits in 15 bits.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Lfo {
    pub kind: LfoType,
    pub depth: u8,
    pub speed: u8,
    pub range: u8,
    /// Ticks after a note starts before the LFO moves.
    pub delay: u16,
    delay_count: u16,
    phase: u16,
}

impl Default for Lfo {
    fn default() -> Self {
        Self { kind: LfoType::Pitch, depth: 0, speed: 16, range: 1, delay: 0, delay_count: 0, phase: 0 }
    }
}

impl Lfo {
    pub fn phase(&self) -> u16 {
        self.phase
    }

    pub fn set_phase(&mut self, phase: u16) {
        self.phase = phase & 0x7FFF;
    }

    fn reset(&mut self) {
        self.phase = 0;
        self.delay_count = self.delay;
    }

    fn advance(&mut self) {
        if self.delay_count > 0 {
            self.delay_count -= 1;
            return;
        }
        let next = self.phase as u32 + ((self.speed as u32) << 6);
        let counter = (next >> 8) % 0x80;
        self.phase = ((next & 0xFF) | (counter << 8)) as u16;
    }

    /// Contribution to the output selected by `kind`, or 0 for the others.
    pub fn value(&self, kind: LfoType, tables: &Tables) -> i32 {
        if self.kind != kind || self.depth == 0 {
            return 0;
        }
        let raw = self.range as i32 * tables.sin((self.phase >> 8) as i32) * self.depth as i32;
        (raw.wrapping_shl(6) >> 6) >> 8
    }
}

/// One entry of the track's call/loop stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackFrame {
    /// Return position of a call.
    Call(CommandIndex),
    /// Loop body start and remaining passes (0 loops forever).
    Loop { start: CommandIndex, remaining: u8 },
}

/// Track mute mode set by the `Mute` register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MuteMode {
    #[default]
    Off,
    /// Keep sounding notes but start no new ones.
    NoNewNotes,
    /// Release sounding notes and start no new ones.
    Release,
    /// Stop sounding notes and start no new ones.
    Stop,
}

impl MuteMode {
    pub fn from_register(value: i16) -> Self {
        match value {
            1 => MuteMode::NoNewNotes,
            2 => MuteMode::Release,
            3 => MuteMode::Stop,
            _ => MuteMode::Off,
        }
    }
}

/// Linear interpolation of a register over a number of ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ramp {
    pub register: Register,
    from: i32,
    to: i32,
    ticks: u32,
    elapsed: u32,
}

impl Ramp {
    pub fn new(register: Register, from: i32, to: i32, ticks: u32) -> Self {
        Self { register, from, to, ticks: ticks.max(1), elapsed: 0 }
    }

    /// Advance one tick and return the new register value.
    pub fn step(&mut self) -> i32 {
        self.elapsed = (self.elapsed + 1).min(self.ticks);
        self.from + (self.to - self.from) * self.elapsed as i32 / self.ticks as i32
    }

    pub fn is_done(&self) -> bool {
        self.elapsed >= self.ticks
    }
}

/// Registers that are stored and reported but do not change the mix.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EffectRegisters {
    pub surround_pan: i16,
    pub lpf_cutoff: i16,
    pub biquad_type: i16,
    pub biquad_value: i16,
    pub send_a: i16,
    pub send_b: i16,
    pub send_c: i16,
    pub main_send: i16,
    pub damper: bool,
    pub env_hold: i16,
    pub velocity_range: i16,
    pub front_bypass: bool,
    pub timebase: i16,
    pub mod_period: i16,
    pub mod_curve: i16,
}

/// One of the sixteen sequencer lanes.
#[derive(Clone, Debug)]
pub struct Track {
    index: u8,
    pub enabled: bool,
    pub allocated: bool,
    /// Execution reached `Fin` or was stopped.
    pub stopped: bool,
    /// Waiting for an open-ended note to finish before continuing.
    pub waiting: bool,
    pub tie: bool,
    /// Notes occupy the track for their length (mono mode).
    pub note_wait: bool,
    pub portamento: bool,
    pub cursor: CommandIndex,
    /// Ticks left before the next command runs.
    pub rest: i32,
    stack: ArrayVec<StackFrame, MAX_CALL_DEPTH>,
    /// Result of the last comparison.
    pub condition: bool,
    pub vars: [i16; NUM_LOCAL_VARS],

    pub volume: u8,
    pub expression: u8,
    pub priority: u8,
    /// Pan, -64..=63.
    pub pan: i8,
    /// Pan given to notes started on this track, -64..=63.
    pub init_pan: i8,
    pub transpose: i8,
    pub pitch_bend: i8,
    pub bend_range: u8,
    pub lfo: Lfo,
    pub program: u32,
    pub bank: u16,
    pub attack: u8,
    pub decay: u8,
    pub sustain: u8,
    pub release: u8,
    pub portamento_key: u8,
    pub portamento_time: u8,
    pub sweep_pitch: i16,
    pub mute: MuteMode,
    pub effects: EffectRegisters,
    ramps: ArrayVec<Ramp, 5>,
    /// Channel of the most recent note, reused in tie mode.
    pub last_channel: Option<u8>,
}

impl Track {
    pub fn new(index: u8) -> Self {
        Self {
            index,
            enabled: index == 0,
            allocated: index == 0,
            stopped: false,
            waiting: false,
            tie: false,
            note_wait: true,
            portamento: false,
            cursor: 0,
            rest: 0,
            stack: ArrayVec::new(),
            condition: true,
            vars: [-1; NUM_LOCAL_VARS],
            volume: 127,
            expression: 127,
            priority: 64,
            pan: 0,
            init_pan: 0,
            transpose: 0,
            pitch_bend: 0,
            bend_range: 2,
            lfo: Lfo::default(),
            program: 0,
            bank: 0,
            attack: ADSR_DEFAULT,
            decay: ADSR_DEFAULT,
            sustain: ADSR_DEFAULT,
            release: ADSR_DEFAULT,
            portamento_key: 60,
            portamento_time: 0,
            sweep_pitch: 0,
            mute: MuteMode::Off,
            effects: EffectRegisters::default(),
            ramps: ArrayVec::new(),
            last_channel: None,
        }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// Reset every register to its power-on value and stop owned channels.
    pub fn init(&mut self, channels: &mut [Channel]) {
        *self = Track::new(self.index);
        self.stop_channels(channels);
    }

    /// Enable the track at `cursor`.
    pub fn open(&mut self, cursor: CommandIndex) {
        self.enabled = true;
        self.stopped = false;
        self.cursor = cursor;
    }

    /// Advance countdowns, owned-channel timers and the LFO by one tick.
    pub fn tick(&mut self, channels: &mut [Channel]) {
        if self.rest > 0 {
            self.rest -= 1;
        }
        let mut owned = false;
        for ch in channels.iter_mut().filter(|c| c.owner() == Some(self.index)) {
            owned = true;
            if ch.note_duration > 0 {
                ch.note_duration -= 1;
            }
            if !ch.auto_sweep && ch.sweep_counter < ch.sweep_length {
                ch.sweep_counter += 1;
            }
        }
        if owned {
            self.lfo.advance();
        } else {
            self.waiting = false;
            self.lfo.reset();
        }
    }

    pub fn owns_any(&self, channels: &[Channel]) -> bool {
        channels.iter().any(|c| c.owner() == Some(self.index))
    }

    pub fn stop_channels(&mut self, channels: &mut [Channel]) {
        for ch in channels.iter_mut().filter(|c| c.owner() == Some(self.index)) {
            ch.stop();
        }
        self.last_channel = None;
    }

    pub fn release_channels(&mut self, channels: &mut [Channel]) {
        for ch in channels.iter_mut().filter(|c| c.owner() == Some(self.index)) {
            ch.envelope_mut().release();
        }
    }

    /// Pitch offset: bend plus pitch LFO.
    pub fn pitch(&self, tables: &Tables) -> i32 {
        self.pitch_bend as i32 * self.bend_range as i32 / 2 + self.lfo.value(LfoType::Pitch, tables)
    }

    /// Summed attenuation of main volume, volume, expression and volume LFO.
    pub fn volume(&self, main_volume: u8, tables: &Tables) -> i32 {
        tables.sustain(main_volume)
            + tables.sustain(self.volume)
            + tables.sustain(self.expression)
            + self.lfo.value(LfoType::Volume, tables)
    }

    /// Pan plus pan LFO, clamped to -64..=63.
    pub fn pan(&self, tables: &Tables) -> i32 {
        (self.pan as i32 + self.lfo.value(LfoType::Pan, tables)).clamp(-64, 63)
    }

    pub fn output(&self, main_volume: u8, tables: &Tables) -> TrackOutput {
        TrackOutput {
            volume: self.volume(main_volume, tables),
            pitch: self.pitch(tables),
            pan: self.pan(tables),
            waiting: self.waiting,
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Push a frame. Returns false (and pushes nothing) when the stack is full.
    pub fn push(&mut self, frame: StackFrame) -> bool {
        self.stack.try_push(frame).is_ok()
    }

    /// Unwind to the innermost call frame, returning where to continue.
    /// Loop frames opened inside the subroutine are discarded. Without a
    /// call frame the stack is left alone.
    pub fn pop_call(&mut self) -> Option<CommandIndex> {
        let at = self.stack.iter().rposition(|f| matches!(f, StackFrame::Call(_)))?;
        let StackFrame::Call(ret) = self.stack[at] else {
            return None;
        };
        self.stack.truncate(at);
        Some(ret)
    }

    /// Close the innermost loop. Returns the loop start while passes remain.
    pub fn loop_end(&mut self) -> Option<CommandIndex> {
        let Some(StackFrame::Loop { start, remaining }) = self.stack.last_mut() else {
            return None;
        };
        let start = *start;
        if *remaining != 0 {
            *remaining -= 1;
            if *remaining == 0 {
                self.stack.pop();
                return None;
            }
        }
        Some(start)
    }

    /// Start a ramp, replacing any running ramp on the same register.
    pub fn start_ramp(&mut self, ramp: Ramp) {
        self.ramps.retain(|r| r.register != ramp.register);
        // Capacity covers one ramp per rampable register.
        let _ = self.ramps.try_push(ramp);
    }

    /// Drop any running ramp on `register`.
    pub fn cancel_ramp(&mut self, register: Register) {
        self.ramps.retain(|r| r.register != register);
    }

    pub fn ramps_mut(&mut self) -> &mut ArrayVec<Ramp, 5> {
        &mut self.ramps
    }

    /// Current value of a rampable register, in command units.
    pub fn register_value(&self, register: Register) -> Option<i32> {
        match register {
            Register::Volume => Some(self.volume as i32),
            Register::Expression => Some(self.expression as i32),
            Register::Pan => Some(self.pan as i32 + 64),
            Register::PitchBend => Some(self.pitch_bend as i32),
            _ => None,
        }
    }
}
