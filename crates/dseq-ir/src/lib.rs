//! Core data types for the dseq sequence player.
//!
//! This crate defines the decoded command model, the command arena with its
//! label pre-pass, and the sound bank (instruments and waves) that the
//! playback engine consumes. Encoding and container formats live elsewhere.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod bank;
mod command;
mod sequence;
mod wave;

pub use bank::{Instrument, InstrumentType, KeyRegion, NoteInfo, NoteSource, SoundBank};
pub use command::{CmpOp, Command, CommandIndex, Register, VarOp};
pub use sequence::{Sequence, SequenceBuilder, SequenceError};
pub use wave::{Wave, WaveKey, TIMER_CLOCK};
