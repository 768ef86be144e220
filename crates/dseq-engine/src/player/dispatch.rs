//! Command dispatch, one function per command category.

use dseq_ir::{CmpOp, Command, CommandIndex, Register, VarOp};
use log::{debug, info, trace};

use super::resolve::Resolved;
use super::Player;
use crate::config::NUM_TRACKS;
use crate::track::{LfoType, MuteMode, Ramp, StackFrame, ADSR_DEFAULT};

fn clamp_u8(value: i16) -> u8 {
    value.clamp(0, u8::MAX as i16) as u8
}

fn clamp_i8(value: i16) -> i8 {
    value.clamp(i8::MIN as i16, i8::MAX as i16) as i8
}

/// Convert a 0..=127 pan value to -64..=63.
fn centered_pan(value: i16) -> i8 {
    (value.clamp(0, 127) - 64) as i8
}

impl Player {
    /// Execute a resolved command fetched from `at` on track `t`.
    pub(crate) fn dispatch(&mut self, t: usize, at: CommandIndex, resolved: Resolved) {
        let Resolved { command, duration } = resolved;
        match command {
            Command::Note { key, velocity, length } => self.play_note(t, key, velocity, length),
            Command::Wait(ticks) => self.tracks[t].rest = ticks.max(0),
            Command::ProgramChange(program) => self.tracks[t].program = program.max(0) as u32,
            Command::OpenTrack { .. }
            | Command::Jump(_)
            | Command::Call(_)
            | Command::Return
            | Command::LoopStart(_)
            | Command::LoopEnd
            | Command::AllocateTrack(_)
            | Command::Fin => self.flow(t, at, command),
            Command::EnvReset => {
                let track = &mut self.tracks[t];
                track.attack = ADSR_DEFAULT;
                track.decay = ADSR_DEFAULT;
                track.sustain = ADSR_DEFAULT;
                track.release = ADSR_DEFAULT;
            }
            Command::Var { op, var, value } => self.var_op(t, op, var, value),
            Command::Cmp { op, var, value } => self.compare(t, op, var, value),
            Command::Set { register, value } => match duration {
                Some(ticks) if ticks > 0 && register.is_rampable() => {
                    self.start_ramp(t, register, value, ticks)
                }
                _ => self.set_register(t, register, value),
            },
            Command::Unsupported(op) => trace!("track {t}: skipping unsupported opcode {op:#04x}"),
            other => trace!("track {t}: unresolved prefix {other:?} skipped"),
        }
    }

    fn flow(&mut self, t: usize, at: CommandIndex, command: Command) {
        match command {
            Command::OpenTrack { track, target } => {
                let track = track as usize;
                if t != 0 || track == 0 || track >= NUM_TRACKS {
                    debug!("track {t}: open of track {track} ignored");
                    return;
                }
                if !self.tracks[track].allocated {
                    debug!("track {t}: open of unallocated track {track} ignored");
                    return;
                }
                self.tracks[track].open(target);
            }
            Command::Jump(target) => {
                if t == 0 && target <= at {
                    self.count_loop();
                }
                self.tracks[t].cursor = target;
            }
            Command::Call(target) => {
                let ret = self.tracks[t].cursor;
                if self.tracks[t].push(StackFrame::Call(ret)) {
                    self.tracks[t].cursor = target;
                } else {
                    debug!("track {t}: call at {at} exceeds stack depth, ignored");
                }
            }
            Command::Return => match self.tracks[t].pop_call() {
                Some(ret) => self.tracks[t].cursor = ret,
                None => debug!("track {t}: return at {at} without a call, ignored"),
            },
            Command::LoopStart(count) => {
                let start = self.tracks[t].cursor;
                let remaining = count.clamp(0, u8::MAX as i32) as u8;
                if !self.tracks[t].push(StackFrame::Loop { start, remaining }) {
                    debug!("track {t}: loop at {at} exceeds stack depth, ignored");
                }
            }
            Command::LoopEnd => {
                if let Some(start) = self.tracks[t].loop_end() {
                    self.tracks[t].cursor = start;
                }
            }
            Command::AllocateTrack(mask) => {
                for (i, track) in self.tracks.iter_mut().enumerate() {
                    if mask & (1 << i) != 0 {
                        track.allocated = true;
                    }
                }
            }
            Command::Fin => self.tracks[t].stopped = true,
            _ => {}
        }
    }

    fn count_loop(&mut self) {
        self.loops_played += 1;
        debug!("sequence loop {}", self.loops_played);
        if self.loops > 0 && self.loops_played >= self.loops && !self.mixer.is_fading() {
            self.mixer.begin_fade_out();
        }
    }

    fn var_op(&mut self, t: usize, op: VarOp, var: u8, value: i16) {
        let current = self.var(t, var);
        let result = match op {
            VarOp::Set => value,
            VarOp::Add => current.wrapping_add(value),
            VarOp::Sub => current.wrapping_sub(value),
            VarOp::Mul => current.wrapping_mul(value),
            VarOp::Div | VarOp::Mod if value == 0 => {
                debug!("track {t}: {op:?} of var {var} by zero ignored");
                return;
            }
            VarOp::Div => current.wrapping_div(value),
            VarOp::Mod => current.wrapping_rem(value),
            VarOp::Shift if value >= 0 => {
                if value >= 16 {
                    0
                } else {
                    ((current as i32) << value) as i16
                }
            }
            VarOp::Shift => current >> value.unsigned_abs().min(15),
            VarOp::Rand => self.random_between(0, value) as i16,
            VarOp::And => current & value,
            VarOp::Or => current | value,
            VarOp::Xor => current ^ value,
            VarOp::Not => !value,
        };
        match self.var_mut(t, var) {
            Some(slot) => *slot = result,
            None => debug!("track {t}: write to missing var {var} ignored"),
        }
    }

    fn compare(&mut self, t: usize, op: CmpOp, var: u8, value: i16) {
        let current = self.var(t, var);
        self.tracks[t].condition = match op {
            CmpOp::Eq => current == value,
            CmpOp::Ge => current >= value,
            CmpOp::Gt => current > value,
            CmpOp::Le => current <= value,
            CmpOp::Lt => current < value,
            CmpOp::Ne => current != value,
        };
    }

    fn start_ramp(&mut self, t: usize, register: Register, target: i16, ticks: i32) {
        let from = match register {
            Register::MainVolume => Some(self.main_volume as i32),
            _ => self.tracks[t].register_value(register),
        };
        match from {
            Some(from) => {
                let ramp = Ramp::new(register, from, target as i32, ticks as u32);
                self.tracks[t].start_ramp(ramp);
            }
            None => self.set_register(t, register, target),
        }
    }

    /// Register write from a command: cancels any ramp on the register.
    fn set_register(&mut self, t: usize, register: Register, value: i16) {
        self.tracks[t].cancel_ramp(register);
        self.write_register(t, register, value);
    }

    pub(crate) fn write_register(&mut self, t: usize, register: Register, value: i16) {
        let track = &mut self.tracks[t];
        match register {
            Register::Pan => track.pan = centered_pan(value),
            Register::Volume => track.volume = clamp_u8(value),
            Register::MainVolume => self.main_volume = clamp_u8(value),
            Register::Transpose => track.transpose = clamp_i8(value),
            Register::PitchBend => track.pitch_bend = clamp_i8(value),
            Register::BendRange => track.bend_range = clamp_u8(value),
            Register::Priority => track.priority = clamp_u8(value),
            Register::NoteWait | Register::Monophonic => track.note_wait = value != 0,
            Register::Tie => {
                track.tie = value != 0;
                track.stop_channels(self.mixer.channels_mut());
            }
            Register::Portamento => {
                let key = value as i32 + track.transpose as i32;
                track.portamento_key = key.clamp(0, 127) as u8;
                track.portamento = true;
            }
            Register::PortamentoSwitch => track.portamento = value != 0,
            Register::PortamentoTime => track.portamento_time = clamp_u8(value),
            Register::ModDepth => track.lfo.depth = clamp_u8(value),
            Register::ModSpeed => track.lfo.speed = clamp_u8(value),
            Register::ModType => track.lfo.kind = LfoType::from_register(value),
            Register::ModRange => track.lfo.range = clamp_u8(value),
            Register::ModDelay => track.lfo.delay = value.max(0) as u16,
            Register::ModPhase => track.lfo.set_phase((clamp_u8(value) as u16) << 8),
            Register::ModPeriod => track.effects.mod_period = value,
            Register::ModCurve => track.effects.mod_curve = value,
            Register::Attack => track.attack = clamp_u8(value),
            Register::Decay => track.decay = clamp_u8(value),
            Register::Sustain => track.sustain = clamp_u8(value),
            Register::Release => track.release = clamp_u8(value),
            Register::Expression => track.expression = clamp_u8(value),
            Register::PrintVar => {
                let shown = self.var(t, clamp_u8(value));
                info!("track {t}: var {value} = {shown}");
            }
            Register::SurroundPan => track.effects.surround_pan = value,
            Register::LpfCutoff => track.effects.lpf_cutoff = value,
            Register::BiquadType => track.effects.biquad_type = value,
            Register::BiquadValue => track.effects.biquad_value = value,
            Register::FxSendA => track.effects.send_a = value,
            Register::FxSendB => track.effects.send_b = value,
            Register::FxSendC => track.effects.send_c = value,
            Register::MainSend => track.effects.main_send = value,
            Register::InitPan => track.init_pan = centered_pan(value),
            Register::Mute => {
                track.mute = MuteMode::from_register(value);
                match track.mute {
                    MuteMode::Release => track.release_channels(self.mixer.channels_mut()),
                    MuteMode::Stop => track.stop_channels(self.mixer.channels_mut()),
                    MuteMode::Off | MuteMode::NoNewNotes => {}
                }
            }
            Register::Damper => track.effects.damper = value != 0,
            Register::Tempo => self.tempo = value.max(0) as u16,
            Register::SweepPitch => track.sweep_pitch = value,
            Register::Timebase => track.effects.timebase = value,
            Register::EnvHold => track.effects.env_hold = value,
            Register::VelocityRange => track.effects.velocity_range = value,
            Register::BankSelect => track.bank = value.max(0) as u16,
            Register::FrontBypass => track.effects.front_bypass = value != 0,
        }
    }
}
