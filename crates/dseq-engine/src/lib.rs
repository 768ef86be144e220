//! Playback engine for the dseq sequence player.
//!
//! Interprets a [`Sequence`](dseq_ir::Sequence) on sixteen tracks, drives
//! sixteen hardware-style channels and mixes them into 16-bit stereo PCM.
//! [`TimeBarrier`] paces the frame loop in real time (requires `std`).

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
mod config;
mod envelope_state;
mod frame;
mod mixer;
mod player;
pub mod tables;
#[cfg(feature = "std")]
mod time_barrier;
mod track;

pub use channel::{Channel, TrackOutput};
pub use config::{ChannelMasks, EngineConfig, NUM_TRACKS};
pub use envelope_state::{Envelope, EnvelopeStage};
pub use frame::{Frame, NullSink, PcmSink};
pub use mixer::{Mixer, BUFFER_BYTES, FADE_MICROFRAMES, NUM_CHANNELS};
pub use player::{
    Player, PlayerState, DEFAULT_TEMPO, NUM_GLOBAL_VARS, TEMPO_TICK, WATCHDOG_LIMIT,
};
pub use tables::{Tables, PSG_BASE_TIMER, SAMPLES_PER_BUFFER, SAMPLE_RATE, VOLUME_FLOOR};
#[cfg(feature = "std")]
pub use time_barrier::{Clock, MonotonicClock, TimeBarrier};
pub use track::{
    EffectRegisters, Lfo, LfoType, MuteMode, Ramp, StackFrame, Track, ADSR_DEFAULT,
    MAX_CALL_DEPTH, NUM_LOCAL_VARS,
};
