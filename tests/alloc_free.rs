//! Allocation-free render path tests.
//!
//! `Player::frame()` runs on the playback thread, so it must not touch the
//! heap. These tests render the demo song (every track, random and
//! variable prefixes, ramps, calls and loops) for several seconds.
//!
//! Just run `cargo test`; no feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use dseq::{demo_bank, demo_song};
use dseq_engine::{EngineConfig, Player, NullSink, PcmSink};
use std::sync::Arc;

const FRAMES_PER_SECOND: usize = 192;

fn player(config: &EngineConfig) -> Player {
    let mut p = Player::new(Arc::new(demo_song().unwrap()), Arc::new(demo_bank()), config);
    p.play();
    p
}

#[test]
fn demo_song_renders_alloc_free() {
    let mut p = player(&EngineConfig::default());
    let mut out = NullSink;
    assert_no_alloc(|| {
        for _ in 0..FRAMES_PER_SECOND * 10 {
            p.frame(Some(&mut out as &mut dyn PcmSink), None);
        }
    });
    assert!(p.is_playing());
}

#[test]
fn fade_out_and_finish_alloc_free() {
    let config = EngineConfig { loops: 1, ..EngineConfig::default() };
    let mut p = player(&config);
    assert_no_alloc(|| {
        for _ in 0..FRAMES_PER_SECOND * 60 {
            if !p.is_playing() {
                break;
            }
            p.frame(None, None);
        }
    });
    assert!(!p.is_playing());
}

#[test]
fn skip_frames_alloc_free() {
    let mut p = player(&EngineConfig::default());
    let skipped = assert_no_alloc(|| p.skip_frames(FRAMES_PER_SECOND as u64 * 5));
    assert_eq!(skipped, FRAMES_PER_SECOND as u64 * 5);
}
