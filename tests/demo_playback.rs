//! Integration test: build the demo song, render through the controller,
//! verify the output.

use dseq::{demo_bank, demo_song, Controller, EngineConfig};
use dseq_engine::{Frame, SAMPLES_PER_BUFFER, SAMPLE_RATE};

fn controller(config: EngineConfig) -> Controller {
    Controller::new(demo_song().unwrap(), demo_bank(), config)
}

fn has_nonsilent_frames(frames: &[Frame]) -> bool {
    frames.iter().any(|f| f.left != 0 || f.right != 0)
}

fn max_amplitude(frames: &[Frame]) -> i16 {
    frames
        .iter()
        .flat_map(|f| [f.left.saturating_abs(), f.right.saturating_abs()])
        .max()
        .unwrap_or(0)
}

#[test]
fn demo_renders_nonsilent() {
    let frames = controller(EngineConfig::default()).render_frames(SAMPLE_RATE as usize * 2);
    assert_eq!(frames.len(), SAMPLE_RATE as usize * 2);
    assert!(has_nonsilent_frames(&frames), "first two seconds are silent");
    assert!(max_amplitude(&frames) > 1000);
}

#[test]
fn demo_uses_both_stereo_sides() {
    let frames = controller(EngineConfig::default()).render_frames(SAMPLE_RATE as usize);
    assert!(frames.iter().any(|f| f.left != f.right));
}

#[test]
fn loop_count_ends_the_song() {
    let config = EngineConfig { loops: 1, ..EngineConfig::default() };
    let frames = controller(config).render_frames(SAMPLE_RATE as usize * 120);
    assert!(frames.len() < SAMPLE_RATE as usize * 120, "song never finished");
    assert_eq!(frames.len() % SAMPLES_PER_BUFFER, 0);

    // The fade leaves the last buffer silent.
    let tail = &frames[frames.len() - SAMPLES_PER_BUFFER..];
    assert!(!has_nonsilent_frames(tail));
}

#[test]
fn more_loops_play_longer() {
    let once = controller(EngineConfig { loops: 1, ..EngineConfig::default() })
        .render_frames(SAMPLE_RATE as usize * 120);
    let twice = controller(EngineConfig { loops: 2, ..EngineConfig::default() })
        .render_frames(SAMPLE_RATE as usize * 120);
    assert!(twice.len() > once.len());
}

#[test]
fn rendering_is_deterministic_per_seed() {
    let render = |seed| {
        controller(EngineConfig { seed, ..EngineConfig::default() })
            .render_frames(SAMPLE_RATE as usize * 3)
    };
    assert_eq!(render(7), render(7));
    assert_ne!(render(7), render(8));
}

#[test]
fn muting_every_track_is_silent() {
    let config = EngineConfig { mutes: [true; 16], ..EngineConfig::default() };
    let frames = controller(config).render_frames(SAMPLE_RATE as usize);
    assert!(!has_nonsilent_frames(&frames));
}

#[test]
fn muting_one_track_changes_the_mix() {
    let full = controller(EngineConfig::default()).render_frames(SAMPLE_RATE as usize);
    let mut mutes = [false; 16];
    mutes[1] = true;
    let no_bass = controller(EngineConfig { mutes, ..EngineConfig::default() })
        .render_frames(SAMPLE_RATE as usize);
    assert_ne!(full, no_bass);
    assert!(has_nonsilent_frames(&no_bass));
}

#[test]
fn master_volume_scales_output() {
    let full = controller(EngineConfig::default()).render_frames(SAMPLE_RATE as usize);
    let half = controller(EngineConfig { master_volume: 0.5, ..EngineConfig::default() })
        .render_frames(SAMPLE_RATE as usize);
    assert!(max_amplitude(&half) < max_amplitude(&full));
}

#[test]
fn render_to_file_writes_a_valid_wav() {
    let path = std::env::temp_dir().join(format!("dseq-demo-{}.wav", std::process::id()));
    let config = EngineConfig { loops: 1, ..EngineConfig::default() };
    let ctrl = controller(config);
    let frames = ctrl.render_to_file(&path, 2).unwrap();
    // Whole buffers until at least two seconds are written.
    let buffer = SAMPLES_PER_BUFFER as u64;
    assert_eq!(frames, (SAMPLE_RATE as u64 * 2).div_ceil(buffer) * buffer);

    let bytes = std::fs::read(&path).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(&bytes[0..4], b"RIFF");
    let data_size = u32::from_le_bytes([bytes[40], bytes[41], bytes[42], bytes[43]]);
    assert_eq!(data_size as u64, frames * 4);
    assert_eq!(bytes.len() as u64, 44 + frames * 4);

    let in_memory = ctrl.render_to_wav(1);
    assert_eq!(&in_memory[..4], b"RIFF");
}
