//! End-to-end playback through the public engine API.

use std::sync::Arc;

use dseq_engine::{
    ChannelMasks, EngineConfig, Frame, Player, PlayerState, BUFFER_BYTES, FADE_MICROFRAMES,
};
use dseq_ir::{
    Command, Instrument, InstrumentType, KeyRegion, NoteInfo, NoteSource, Register,
    SequenceBuilder, SoundBank, VarOp, Wave,
};

fn bank() -> SoundBank {
    let mut bank = SoundBank::new();
    let sine = bank.add_wave(Wave::sine("sine", 32, 32_728));
    let click = bank.add_wave(Wave::from_pcm8("click", &[127, -128, 64, -64], 16_364));
    bank.set_instrument(0, Instrument::single("sine", NoteInfo::new(NoteSource::Pcm(sine))));
    bank.set_instrument(
        1,
        Instrument::split(
            "kit",
            vec![
                KeyRegion { max_key: 59, info: NoteInfo::new(NoteSource::Pcm(click)) },
                KeyRegion { max_key: 127, info: NoteInfo::new(NoteSource::Noise) },
            ],
        ),
    );
    bank.set_instrument(2, Instrument::single("square", NoteInfo::new(NoteSource::Psg { duty: 3 })));
    bank
}

fn start(seq: dseq_ir::Sequence, config: &EngineConfig) -> Player {
    let mut p = Player::new(Arc::new(seq), Arc::new(bank()), config);
    p.play();
    p
}

/// A small song: track 0 plays a bass line, track 1 chords, track 2 drums.
fn song() -> dseq_ir::Sequence {
    SequenceBuilder::new()
        .push(Command::AllocateTrack(0b0111))
        .push(Command::open_track(1, "chords"))
        .push(Command::open_track(2, "drums"))
        .push(Command::ProgramChange(2))
        .label("bass")
        .push(Command::note(36, 120, 12))
        .push(Command::note(43, 120, 12))
        .push(Command::jump("bass"))
        .label("chords")
        .push(Command::set(Register::NoteWait, 0))
        .push(Command::set(Register::ModDepth, 30))
        .label("chord_loop")
        .push(Command::note(60, 90, 20))
        .push(Command::note(64, 90, 20))
        .push(Command::note(67, 90, 20))
        .push(Command::Wait(24))
        .push(Command::jump("chord_loop"))
        .label("drums")
        .push(Command::ProgramChange(1))
        .push(Command::LoopStart(0))
        .push(Command::note(40, 127, 6))
        .push(Command::note(72, 80, 6).random(4, 8))
        .push(Command::LoopEnd)
        .build()
        .unwrap()
}

#[test]
fn song_plays_and_produces_audio() {
    let mut p = start(song(), &EngineConfig::default());
    let mut heard = false;
    for _ in 0..400 {
        let pcm = p.frame(None, None);
        assert_eq!(pcm.len(), BUFFER_BYTES);
        heard |= Frame::iter_le_bytes(pcm).any(|f| f != Frame::silence());
    }
    assert!(heard);
    assert!(p.is_playing());
    assert!(p.track(1).enabled && p.track(2).enabled);
}

#[test]
fn channels_respect_type_masks() {
    let masks = ChannelMasks::default();
    let mut p = start(song(), &EngineConfig::default());
    for _ in 0..2000 {
        p.frame(None, None);
        for ch in p.mixer().channels() {
            let Some(kind) = ch.kind() else { continue };
            let mask = match kind {
                InstrumentType::Pcm => masks.pcm,
                InstrumentType::Psg => masks.psg,
                InstrumentType::Noise => masks.noise,
            };
            assert_ne!(mask & (1 << ch.index()), 0, "{kind:?} on channel {}", ch.index());
        }
    }
}

#[test]
fn lfo_phase_stays_bounded_during_playback() {
    let mut p = start(song(), &EngineConfig::default());
    for _ in 0..5000 {
        p.emulate_frame();
        assert!(p.tracks().iter().all(|t| t.lfo.phase() < 0x8000));
        assert!(p.tracks().iter().all(|t| t.depth() <= dseq_engine::MAX_CALL_DEPTH));
    }
}

#[test]
fn same_seed_same_audio_different_seed_differs() {
    let render = |seed: u64| {
        let config = EngineConfig { seed, ..EngineConfig::default() };
        let mut p = start(song(), &config);
        let mut out: Vec<u8> = Vec::new();
        for _ in 0..300 {
            p.frame(None, Some(&mut out));
        }
        out
    };
    let a = render(1);
    assert_eq!(a, render(1));
    assert_ne!(a, render(2));
}

#[test]
fn finite_loop_count_fades_and_finishes() {
    let seq = SequenceBuilder::new()
        .push(Command::ProgramChange(2))
        .label("top")
        .push(Command::note(60, 127, 4))
        .push(Command::jump("top"))
        .build()
        .unwrap();
    let config = EngineConfig { loops: 2, ..EngineConfig::default() };
    let mut p = start(seq, &config);

    let mut frames = 0u64;
    let mut last = Vec::new();
    while p.is_playing() && frames < 10_000 {
        last = p.frame(None, None).to_vec();
        frames += 1;
    }
    assert_eq!(p.state(), PlayerState::Finished);
    assert!(frames > FADE_MICROFRAMES as u64);
    assert!(last.iter().all(|&b| b == 0));
    assert!(p.mixer().channels().iter().all(|c| c.is_free()));
}

#[test]
fn runaway_loop_does_not_hang() {
    let seq = SequenceBuilder::new()
        .label("spin")
        .push(Command::var(VarOp::Add, 0, 1))
        .push(Command::jump("spin"))
        .build()
        .unwrap();
    let mut p = start(seq, &EngineConfig::default());
    p.skip_frames(10);
    assert!(p.track(0).stopped);
    assert_eq!(p.state(), PlayerState::Finished);
}

#[test]
fn muted_tracks_are_silent() {
    let seq = SequenceBuilder::new()
        .push(Command::ProgramChange(0))
        .push(Command::note(69, 127, 200))
        .push(Command::Fin)
        .build()
        .unwrap();
    let mut config = EngineConfig::default();
    config.mutes[0] = true;
    let mut p = start(seq, &config);
    for _ in 0..50 {
        assert!(p.frame(None, None).iter().all(|&b| b == 0));
    }
    p.set_mute(0, false);
    let heard = (0..10).any(|_| p.frame(None, None).iter().any(|&b| b != 0));
    assert!(heard);
}

#[test]
fn skip_frames_matches_rendering_sequencer_state() {
    let mut rendered = start(song(), &EngineConfig::default());
    let mut skipped = start(song(), &EngineConfig::default());
    for _ in 0..500 {
        rendered.frame(None, None);
    }
    assert_eq!(skipped.skip_frames(500), 500);
    assert_eq!(rendered.ticks(), skipped.ticks());
    for t in 0..3 {
        assert_eq!(rendered.track(t).cursor, skipped.track(t).cursor);
        assert_eq!(rendered.track(t).vars, skipped.track(t).vars);
    }
}
