//! Headless controller for dseq.
//!
//! Owns a sequence and its sound bank and provides real-time playback on a
//! dedicated thread plus offline rendering, shared by the CLI and tests.

mod wav;

use dseq_audio::{AudioOutput, CpalOutput, NullOutput};
use dseq_engine::{EngineConfig, Player, PlayerState, TimeBarrier, NUM_TRACKS, SAMPLE_RATE};
use log::{info, warn};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

// Re-export common types so callers don't need dseq-ir/dseq-engine directly.
pub use dseq_engine::{Frame, PcmSink};
pub use dseq_ir::{Sequence, SoundBank};

pub use wav::{frames_to_wav, write_wav, WavWriter};

/// Errors from controller operations that touch the outside world.
#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("unknown entry point `{0}`")]
    UnknownLabel(String),
}

const FADE_NONE: u8 = 0;
const FADE_IN: u8 = 1;
const FADE_OUT: u8 = 2;

type Recorder = WavWriter<BufWriter<File>>;

/// Controls shared between the controller and the playback thread.
#[derive(Default)]
struct Shared {
    stop: AtomicBool,
    paused: AtomicBool,
    finished: AtomicBool,
    mute_mask: AtomicU32,
    fade_request: AtomicU8,
    frames: AtomicU64,
    ticks: AtomicU64,
}

/// Headless player controller: owns a sequence and manages playback.
pub struct Controller {
    sequence: Arc<Sequence>,
    bank: Arc<SoundBank>,
    config: EngineConfig,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<Option<Recorder>>>,
}

impl PlaybackHandle {
    fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Relaxed)
            || self.thread.as_ref().is_some_and(|t| t.is_finished())
    }
}

/// Wait for the playback thread and take back its recorder. A panicked
/// thread loses the recording.
fn join_playback(handle: JoinHandle<Option<Recorder>>) -> Option<Recorder> {
    match handle.join() {
        Ok(recorder) => recorder,
        Err(_) => {
            warn!("playback thread panicked; recording (if any) was lost");
            None
        }
    }
}

impl Controller {
    pub fn new(sequence: Sequence, bank: SoundBank, config: EngineConfig) -> Self {
        Self {
            sequence: Arc::new(sequence),
            bank: Arc::new(bank),
            config,
            playback: None,
        }
    }

    // --- Session ---

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn bank(&self) -> &SoundBank {
        &self.bank
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration used by the next `play` or render.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    fn player(&self, start: usize) -> Player {
        let mut player = Player::new(self.sequence.clone(), self.bank.clone(), &self.config);
        player.play_from(start);
        player
    }

    fn entry(&self, label: Option<&str>) -> Result<usize, ControllerError> {
        match label {
            None => Ok(0),
            Some(name) => self
                .sequence
                .label(name)
                .ok_or_else(|| ControllerError::UnknownLabel(name.to_string())),
        }
    }

    // --- Real-time playback ---

    /// Start real-time playback from the first command.
    pub fn play(&mut self) {
        self.spawn(0, None);
    }

    /// Start real-time playback at a named entry point.
    pub fn play_label(&mut self, label: &str) -> Result<(), ControllerError> {
        let start = self.entry(Some(label))?;
        self.spawn(start, None);
        Ok(())
    }

    /// Start real-time playback and record the output to a WAV file.
    /// The file is finalized by [`stop`](Self::stop).
    pub fn play_recorded(&mut self, path: impl AsRef<Path>) -> Result<(), ControllerError> {
        let file = BufWriter::new(File::create(path.as_ref())?);
        let recorder = WavWriter::new(file, SAMPLE_RATE)?;
        info!("recording to {}", path.as_ref().display());
        self.spawn(0, Some(recorder));
        Ok(())
    }

    fn spawn(&mut self, start: usize, recorder: Option<Recorder>) {
        if let Err(err) = self.stop() {
            warn!("failed to finish previous playback: {err}");
        }

        let player = self.player(start);
        let shared = Arc::new(Shared::default());
        shared.mute_mask.store(mute_mask(&self.config.mutes), Ordering::Relaxed);
        let fps = self.config.frame_rate;

        let thread_shared = shared.clone();
        let thread = std::thread::spawn(move || playback_thread(player, fps, thread_shared, recorder));

        self.playback = Some(PlaybackHandle { shared, thread: Some(thread) });
    }

    /// Stop playback and wait for the playback thread. Finalizes any
    /// recording started with [`play_recorded`](Self::play_recorded).
    pub fn stop(&mut self) -> Result<(), ControllerError> {
        let Some(mut pb) = self.playback.take() else {
            return Ok(());
        };
        pb.shared.stop.store(true, Ordering::Relaxed);
        let recorder = pb.thread.take().and_then(join_playback);
        if let Some(recorder) = recorder {
            let size = recorder.data_size();
            recorder.finish()?.flush()?;
            info!("recording finished ({size} bytes of audio)");
        }
        Ok(())
    }

    pub fn pause(&self) {
        if let Some(pb) = &self.playback {
            pb.shared.paused.store(true, Ordering::Relaxed);
        }
    }

    pub fn resume(&self) {
        if let Some(pb) = &self.playback {
            pb.shared.paused.store(false, Ordering::Relaxed);
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback.as_ref().is_some_and(|p| !p.is_finished())
    }

    /// Playback ended, was stopped, or the playback thread died.
    pub fn is_finished(&self) -> bool {
        self.playback.as_ref().is_some_and(PlaybackHandle::is_finished)
    }

    /// Mute or unmute a track during playback (and for later sessions).
    pub fn set_mute(&mut self, track: usize, muted: bool) {
        if let Some(m) = self.config.mutes.get_mut(track) {
            *m = muted;
        }
        if let Some(pb) = &self.playback {
            pb.shared.mute_mask.store(mute_mask(&self.config.mutes), Ordering::Relaxed);
        }
    }

    pub fn fade_in(&self) {
        self.request_fade(FADE_IN);
    }

    /// Fade out; playback finishes when the fade completes.
    pub fn fade_out(&self) {
        self.request_fade(FADE_OUT);
    }

    fn request_fade(&self, fade: u8) {
        if let Some(pb) = &self.playback {
            pb.shared.fade_request.store(fade, Ordering::Relaxed);
        }
    }

    /// Frames rendered by the current playback session.
    pub fn frames_played(&self) -> u64 {
        self.playback.as_ref().map_or(0, |p| p.shared.frames.load(Ordering::Relaxed))
    }

    /// Sequencer ticks run by the current playback session.
    pub fn ticks(&self) -> u64 {
        self.playback.as_ref().map_or(0, |p| p.shared.ticks.load(Ordering::Relaxed))
    }

    // --- Offline rendering ---

    /// Render up to `max_frames` stereo frames, stopping early when
    /// playback finishes.
    pub fn render_frames(&self, max_frames: usize) -> Vec<Frame> {
        let mut player = self.player(0);
        let mut frames = Vec::with_capacity(max_frames);
        while player.is_playing() && frames.len() < max_frames {
            let pcm = player.frame(None, None);
            let room = max_frames - frames.len();
            frames.extend(Frame::iter_le_bytes(pcm).take(room));
        }
        frames
    }

    /// Render up to `max_seconds` of audio into an in-memory WAV file.
    pub fn render_to_wav(&self, max_seconds: u32) -> Vec<u8> {
        let max_frames = SAMPLE_RATE as usize * max_seconds as usize;
        let frames = self.render_frames(max_frames);
        frames_to_wav(&frames, SAMPLE_RATE)
    }

    /// Render up to `max_seconds` of audio straight into a WAV file.
    /// Returns the number of stereo frames written.
    pub fn render_to_file(
        &self,
        path: impl AsRef<Path>,
        max_seconds: u32,
    ) -> Result<u64, ControllerError> {
        let file = BufWriter::new(File::create(path)?);
        let mut wav = WavWriter::new(file, SAMPLE_RATE)?;
        let max_bytes = SAMPLE_RATE as u64 * 4 * max_seconds as u64;
        let mut player = self.player(0);
        while player.is_playing() && (wav.data_size() as u64) < max_bytes {
            player.frame(None, Some(&mut wav));
        }
        let frames = wav.data_size() as u64 / 4;
        wav.finish()?.flush()?;
        Ok(frames)
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!("failed to finish playback: {err}");
        }
    }
}

fn mute_mask(mutes: &[bool; NUM_TRACKS]) -> u32 {
    mutes
        .iter()
        .enumerate()
        .filter(|(_, &m)| m)
        .fold(0, |mask, (i, _)| mask | (1 << i))
}

/// The device output, or a null sink when no device could be opened.
enum Output {
    Device(CpalOutput),
    Null(NullOutput),
}

impl Output {
    fn open() -> Self {
        let opened = CpalOutput::new().and_then(|(mut output, consumer)| {
            output.build_stream(consumer)?;
            output.start()?;
            Ok(output)
        });
        match opened {
            Ok(output) => Output::Device(output),
            Err(err) => {
                warn!("audio output unavailable ({err}); rendering to a null sink");
                Output::Null(NullOutput::new(SAMPLE_RATE))
            }
        }
    }

    fn stop(&mut self) {
        let result = match self {
            Output::Device(out) => out.stop(),
            Output::Null(out) => out.stop(),
        };
        if let Err(err) = result {
            warn!("failed to stop audio output: {err}");
        }
    }
}

impl PcmSink for Output {
    fn write_pcm(&mut self, pcm: &[u8]) {
        match self {
            Output::Device(out) => out.write_pcm(pcm),
            Output::Null(out) => out.write_pcm(pcm),
        }
    }
}

fn apply_controls(player: &mut Player, shared: &Shared, applied_mask: &mut u32) {
    let mask = shared.mute_mask.load(Ordering::Relaxed);
    if mask != *applied_mask {
        for t in 0..NUM_TRACKS {
            player.set_mute(t, mask & (1 << t) != 0);
        }
        *applied_mask = mask;
    }
    match shared.fade_request.swap(FADE_NONE, Ordering::Relaxed) {
        FADE_IN => player.mixer_mut().begin_fade_in(),
        FADE_OUT => player.mixer_mut().begin_fade_out(),
        _ => {}
    }
    if shared.paused.load(Ordering::Relaxed) {
        player.pause();
    } else {
        player.resume();
    }
}

#[cfg(feature = "alloc_check")]
fn render(player: &mut Player, output: &mut Output, recorder: Option<&mut dyn PcmSink>) {
    assert_no_alloc::assert_no_alloc(|| {
        player.frame(Some(output), recorder);
    });
}

#[cfg(not(feature = "alloc_check"))]
fn render(player: &mut Player, output: &mut Output, recorder: Option<&mut dyn PcmSink>) {
    player.frame(Some(output), recorder);
}

fn playback_thread(
    mut player: Player,
    fps: f64,
    shared: Arc<Shared>,
    mut recorder: Option<Recorder>,
) -> Option<Recorder> {
    let mut output = Output::open();
    let mut barrier = TimeBarrier::with_fps(fps);
    let mut applied_mask = 0;
    barrier.start();

    while !shared.stop.load(Ordering::Relaxed) {
        apply_controls(&mut player, &shared, &mut applied_mask);
        match player.state() {
            PlayerState::Playing => {
                let rec = recorder.as_mut().map(|r| r as &mut dyn PcmSink);
                render(&mut player, &mut output, rec);
                shared.frames.fetch_add(1, Ordering::Relaxed);
                shared.ticks.store(player.ticks(), Ordering::Relaxed);
            }
            PlayerState::Paused => {}
            PlayerState::Finished | PlayerState::Stopped => break,
        }
        barrier.wait();
    }

    player.stop();
    barrier.stop();
    output.stop();
    shared.finished.store(true, Ordering::Relaxed);
    info!("playback thread exiting after {} frames", shared.frames.load(Ordering::Relaxed));
    recorder
}
