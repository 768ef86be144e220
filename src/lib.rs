//! dseq: tracked-sequence playback.
//!
//! The engine lives in the `dseq-*` crates; this crate bundles a small demo
//! sound bank and song used by the `dseq-cli` binary and the integration
//! tests.

use dseq_ir::{
    CmpOp, Command, Instrument, KeyRegion, NoteInfo, NoteSource, Register, Sequence,
    SequenceBuilder, SequenceError, SoundBank, VarOp, Wave,
};

pub use dseq_engine::EngineConfig;
pub use dseq_master::Controller;

pub const PROGRAM_LEAD: i32 = 0;
pub const PROGRAM_BASS: i32 = 1;
pub const PROGRAM_KIT: i32 = 2;
pub const PROGRAM_PAD: i32 = 3;

/// Entry points of the demo song.
pub const DEMO_LABELS: &[&str] = &["intro", "lead", "bass", "drums", "pad"];

/// A bank with a square lead, a sine bass, a split drum kit and a held pad.
pub fn demo_bank() -> SoundBank {
    let mut bank = SoundBank::new();
    let sine = bank.add_wave(Wave::sine("sine", 64, 32_728).looping(0));
    let kick = bank.add_wave(Wave::from_pcm8("kick", &kick_pcm(), 16_364));

    bank.set_instrument(
        PROGRAM_LEAD as u32,
        Instrument::single(
            "lead",
            NoteInfo::new(NoteSource::Psg { duty: 3 }).with_adsr(127, 110, 90, 105).with_pan(56),
        ),
    );
    bank.set_instrument(
        PROGRAM_BASS as u32,
        Instrument::single(
            "bass",
            NoteInfo::new(NoteSource::Pcm(sine)).with_base_key(48).with_adsr(127, 100, 110, 110),
        ),
    );
    bank.set_instrument(
        PROGRAM_KIT as u32,
        Instrument::split(
            "kit",
            vec![
                KeyRegion {
                    max_key: 47,
                    info: NoteInfo::new(NoteSource::Pcm(kick)).with_base_key(36),
                },
                KeyRegion {
                    max_key: 127,
                    info: NoteInfo::new(NoteSource::Noise).with_adsr(127, 120, 0, 120).with_pan(80),
                },
            ],
        ),
    );
    bank.set_instrument(
        PROGRAM_PAD as u32,
        Instrument::single(
            "pad",
            NoteInfo::new(NoteSource::Psg { duty: 7 }).with_adsr(90, 100, 100, 0xFF),
        ),
    );
    bank
}

/// Decaying low sine burst.
fn kick_pcm() -> Vec<i8> {
    (0..256)
        .map(|i| {
            let env = 1.0 - i as f32 / 256.0;
            let phase = i as f32 * (0.25 - i as f32 * 0.0007);
            (phase.sin() * env * 120.0) as i8
        })
        .collect()
}

/// A four-track loop: a vibrato lead with a random grace note and a
/// turnaround every other pass, a bass line, drums with a random hat
/// length, and a pad that swells in once.
pub fn demo_song() -> Result<Sequence, SequenceError> {
    SequenceBuilder::new()
        .label("intro")
        .push(Command::AllocateTrack(0b1111))
        .push(Command::set(Register::Tempo, 132))
        .push(Command::open_track(1, "bass"))
        .push(Command::open_track(2, "drums"))
        .push(Command::open_track(3, "pad"))
        .push(Command::var(VarOp::Set, 0, 0))
        .label("lead")
        .push(Command::ProgramChange(PROGRAM_LEAD))
        .push(Command::set(Register::ModDepth, 20))
        .push(Command::set(Register::ModDelay, 12))
        .push(Command::LoopStart(2))
        .push(Command::note(72, 110, 12))
        .push(Command::note(76, 100, 12))
        .push(Command::note(79, 100, 12))
        .push(Command::note(84, 90, 6).random(3, 9))
        .push(Command::LoopEnd)
        .push(Command::var(VarOp::Add, 0, 1))
        .push(Command::cmp(CmpOp::Ge, 0, 2))
        .push(Command::call("turnaround").when())
        .push(Command::jump("lead"))
        .label("turnaround")
        .push(Command::set(Register::Transpose, -2))
        .push(Command::note(74, 100, 24))
        .push(Command::set(Register::Transpose, 0))
        .push(Command::var(VarOp::Set, 0, 0))
        .push(Command::Return)
        .label("bass")
        .push(Command::ProgramChange(PROGRAM_BASS))
        .push(Command::LoopStart(0))
        .push(Command::note(36, 120, 12))
        .push(Command::note(36, 100, 12))
        .push(Command::note(43, 110, 12))
        .push(Command::note(41, 100, 12))
        .push(Command::LoopEnd)
        .label("drums")
        .push(Command::ProgramChange(PROGRAM_KIT))
        .push(Command::set(Register::NoteWait, 0))
        .push(Command::LoopStart(0))
        .push(Command::note(36, 127, 6))
        .push(Command::note(80, 70, 6))
        .push(Command::Wait(12))
        .push(Command::var(VarOp::Rand, 16, 4))
        .push(Command::var(VarOp::Add, 16, 2))
        .push(Command::note(80, 90, 6).with_var(16))
        .push(Command::Wait(12))
        .push(Command::LoopEnd)
        .label("pad")
        .push(Command::ProgramChange(PROGRAM_PAD))
        .push(Command::set(Register::Volume, 0))
        .push(Command::set(Register::Volume, 80).timed(96))
        .push(Command::note(60, 70, 0))
        .push(Command::Wait(192))
        .push(Command::set(Register::Volume, 0).timed(96))
        .push(Command::Wait(96))
        .push(Command::Fin)
        .build()
}
