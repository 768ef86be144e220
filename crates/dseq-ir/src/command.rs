//! Decoded sequence commands.
//!
//! A [`Command`] is one instruction of the sequence bytecode after decoding.
//! Control-flow targets are generic so that a [`SequenceBuilder`](crate::SequenceBuilder)
//! can hold label names (`Command<String>`) until they are resolved into
//! command indices (`Command<CommandIndex>`).

use alloc::boxed::Box;

/// Position of a command inside a [`Sequence`](crate::Sequence).
pub type CommandIndex = usize;

/// One decoded sequence instruction.
///
/// The prefix variants (`Random`, `Variable`, `If`, `Time*`) wrap another
/// command. They never execute on their own: the player resolves them into
/// the wrapped command with its last argument (or its duration) substituted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<T = CommandIndex> {
    /// Play a note. `length` is in ticks. In note-wait mode a length of 0
    /// holds the note and the track waits until the channel is freed;
    /// otherwise a 0-length note is released on the next channel tick.
    Note { key: u8, velocity: u8, length: i32 },
    /// Rest for a number of ticks.
    Wait(i32),
    /// Select the instrument used by following notes.
    ProgramChange(i32),
    /// Start another track at `target` (only honored on track 0).
    OpenTrack { track: u8, target: T },
    /// Continue execution at `target`.
    Jump(T),
    /// Push the return position and continue at `target`.
    Call(T),
    /// Pop the call stack.
    Return,
    /// Open a loop body. A count of 0 loops forever.
    LoopStart(i32),
    /// Close the innermost loop body.
    LoopEnd,
    /// Mark the tracks in the bitmask as allocated.
    AllocateTrack(u16),
    /// Reset the track's envelope overrides to the instrument defaults.
    EnvReset,
    /// End of the track.
    Fin,
    /// Variable arithmetic: `vars[var] = vars[var] <op> value`.
    Var { op: VarOp, var: u8, value: i16 },
    /// Comparison setting the track's condition flag.
    Cmp { op: CmpOp, var: u8, value: i16 },
    /// Direct register write.
    Set { register: Register, value: i16 },
    /// Run `command` with its last argument drawn uniformly from `[min, max]`.
    Random { command: Box<Command<T>>, min: i16, max: i16 },
    /// Run `command` with its last argument read from a variable slot.
    Variable { command: Box<Command<T>>, var: u8 },
    /// Run `command` only when the last comparison succeeded.
    If(Box<Command<T>>),
    /// Run `command` over `time` ticks.
    Time { command: Box<Command<T>>, time: i16 },
    /// Run `command` over a duration drawn uniformly from `[min, max]`.
    TimeRandom { command: Box<Command<T>>, min: i16, max: i16 },
    /// Run `command` over a duration read from a variable slot.
    TimeVariable { command: Box<Command<T>>, var: u8 },
    /// An opcode this engine does not implement. Skipped during playback.
    Unsupported(u8),
}

/// Variable arithmetic operators. All arithmetic is 16-bit two's complement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VarOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    /// Left shift by a positive operand, arithmetic right shift by a negative one.
    Shift,
    /// Random value between 0 and the operand (inclusive).
    Rand,
    And,
    Or,
    Xor,
    /// Bitwise complement of the operand.
    Not,
    Mod,
}

/// Comparison operators for `Cmp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
    Ne,
}

/// Registers written by `Command::Set`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Register {
    /// Track pan, 0..=127 with 64 as center.
    Pan,
    /// Track volume.
    Volume,
    /// Player-wide volume shared by every track.
    MainVolume,
    /// Semitone offset added to every note key.
    Transpose,
    /// Signed pitch bend.
    PitchBend,
    /// Pitch bend range in semitones.
    BendRange,
    Priority,
    /// Note-wait (mono) mode: notes occupy the track for their length.
    NoteWait,
    Tie,
    /// Portamento start key; also switches portamento on.
    Portamento,
    PortamentoSwitch,
    PortamentoTime,
    ModDepth,
    ModSpeed,
    /// 0 = pitch, 1 = volume, 2 = pan.
    ModType,
    ModRange,
    /// Ticks before the LFO starts after a note.
    ModDelay,
    ModPeriod,
    ModPhase,
    ModCurve,
    Attack,
    Decay,
    Sustain,
    Release,
    /// Secondary volume ("volume 2").
    Expression,
    /// Log the value of a variable slot.
    PrintVar,
    SurroundPan,
    LpfCutoff,
    BiquadType,
    BiquadValue,
    FxSendA,
    FxSendB,
    FxSendC,
    MainSend,
    /// Starting pan applied at note start.
    InitPan,
    /// 0 = off, 1 = no new notes, 2 = release, 3 = stop.
    Mute,
    Damper,
    Tempo,
    SweepPitch,
    Timebase,
    EnvHold,
    Monophonic,
    VelocityRange,
    BankSelect,
    FrontBypass,
}

impl Register {
    /// Whether a `Time` prefix turns a write to this register into a ramp.
    pub fn is_rampable(self) -> bool {
        matches!(
            self,
            Register::Volume
                | Register::Expression
                | Register::Pan
                | Register::PitchBend
                | Register::MainVolume
        )
    }
}

impl<T> Command<T> {
    /// Note command.
    pub fn note(key: u8, velocity: u8, length: i32) -> Self {
        Command::Note { key, velocity, length }
    }

    /// Register write.
    pub fn set(register: Register, value: i16) -> Self {
        Command::Set { register, value }
    }

    /// Variable arithmetic.
    pub fn var(op: VarOp, var: u8, value: i16) -> Self {
        Command::Var { op, var, value }
    }

    /// Comparison.
    pub fn cmp(op: CmpOp, var: u8, value: i16) -> Self {
        Command::Cmp { op, var, value }
    }

    /// Unconditional jump.
    pub fn jump(target: impl Into<T>) -> Self {
        Command::Jump(target.into())
    }

    /// Subroutine call.
    pub fn call(target: impl Into<T>) -> Self {
        Command::Call(target.into())
    }

    /// Open track `track` at `target`.
    pub fn open_track(track: u8, target: impl Into<T>) -> Self {
        Command::OpenTrack { track, target: target.into() }
    }

    /// Wrap in a `Random` prefix.
    pub fn random(self, min: i16, max: i16) -> Self {
        Command::Random { command: Box::new(self), min, max }
    }

    /// Wrap in a `Variable` prefix.
    pub fn with_var(self, var: u8) -> Self {
        Command::Variable { command: Box::new(self), var }
    }

    /// Wrap in an `If` prefix.
    pub fn when(self) -> Self {
        Command::If(Box::new(self))
    }

    /// Wrap in a `Time` prefix.
    pub fn timed(self, time: i16) -> Self {
        Command::Time { command: Box::new(self), time }
    }

    /// Wrap in a `TimeRandom` prefix.
    pub fn timed_random(self, min: i16, max: i16) -> Self {
        Command::TimeRandom { command: Box::new(self), min, max }
    }

    /// Wrap in a `TimeVariable` prefix.
    pub fn timed_var(self, var: u8) -> Self {
        Command::TimeVariable { command: Box::new(self), var }
    }

    /// True for the prefix variants that wrap another command.
    pub fn is_prefix(&self) -> bool {
        matches!(
            self,
            Command::Random { .. }
                | Command::Variable { .. }
                | Command::If(_)
                | Command::Time { .. }
                | Command::TimeRandom { .. }
                | Command::TimeVariable { .. }
        )
    }

    /// Replace the last numeric argument of a concrete command.
    ///
    /// Commands without a numeric argument (control flow, prefixes) are
    /// returned unchanged.
    pub fn with_last_arg(self, value: i32) -> Self {
        match self {
            Command::Note { key, velocity, .. } => Command::Note { key, velocity, length: value },
            Command::Wait(_) => Command::Wait(value),
            Command::ProgramChange(_) => Command::ProgramChange(value),
            Command::LoopStart(_) => Command::LoopStart(value),
            Command::AllocateTrack(_) => Command::AllocateTrack(value as u16),
            Command::Var { op, var, .. } => Command::Var { op, var, value: value as i16 },
            Command::Cmp { op, var, .. } => Command::Cmp { op, var, value: value as i16 },
            Command::Set { register, .. } => Command::Set { register, value: value as i16 },
            other => other,
        }
    }

    /// Convert the target type, failing on the first target `f` rejects.
    pub fn try_map_target<U, E>(
        self,
        f: &mut impl FnMut(T) -> Result<U, E>,
    ) -> Result<Command<U>, E> {
        Ok(match self {
            Command::Note { key, velocity, length } => Command::Note { key, velocity, length },
            Command::Wait(n) => Command::Wait(n),
            Command::ProgramChange(p) => Command::ProgramChange(p),
            Command::OpenTrack { track, target } => Command::OpenTrack { track, target: f(target)? },
            Command::Jump(t) => Command::Jump(f(t)?),
            Command::Call(t) => Command::Call(f(t)?),
            Command::Return => Command::Return,
            Command::LoopStart(n) => Command::LoopStart(n),
            Command::LoopEnd => Command::LoopEnd,
            Command::AllocateTrack(mask) => Command::AllocateTrack(mask),
            Command::EnvReset => Command::EnvReset,
            Command::Fin => Command::Fin,
            Command::Var { op, var, value } => Command::Var { op, var, value },
            Command::Cmp { op, var, value } => Command::Cmp { op, var, value },
            Command::Set { register, value } => Command::Set { register, value },
            Command::Random { command, min, max } => Command::Random {
                command: Box::new(command.try_map_target(f)?),
                min,
                max,
            },
            Command::Variable { command, var } => Command::Variable {
                command: Box::new(command.try_map_target(f)?),
                var,
            },
            Command::If(command) => Command::If(Box::new(command.try_map_target(f)?)),
            Command::Time { command, time } => Command::Time {
                command: Box::new(command.try_map_target(f)?),
                time,
            },
            Command::TimeRandom { command, min, max } => Command::TimeRandom {
                command: Box::new(command.try_map_target(f)?),
                min,
                max,
            },
            Command::TimeVariable { command, var } => Command::TimeVariable {
                command: Box::new(command.try_map_target(f)?),
                var,
            },
            Command::Unsupported(op) => Command::Unsupported(op),
        })
    }

    /// The control-flow target of this command, looking through prefixes.
    pub fn target(&self) -> Option<&T> {
        match self {
            Command::Jump(t) | Command::Call(t) => Some(t),
            Command::OpenTrack { target, .. } => Some(target),
            Command::Random { command, .. }
            | Command::Variable { command, .. }
            | Command::If(command)
            | Command::Time { command, .. }
            | Command::TimeRandom { command, .. }
            | Command::TimeVariable { command, .. } => command.target(),
            _ => None,
        }
    }
}
