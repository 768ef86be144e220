//! Audio output trait and error types.

use dseq_engine::{Frame, NullSink, PcmSink};

/// Error type for audio operations.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Failed to initialize audio device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create audio stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),
    /// No audio device available
    #[error("no audio device available")]
    NoDevice,
}

/// Trait for audio output backends.
///
/// Every backend is also a [`PcmSink`], so the player can hand it rendered
/// buffers directly.
pub trait AudioOutput: PcmSink {
    /// Device sample rate.
    fn sample_rate(&self) -> u32;

    /// Queue frames for playback. Frames that do not fit are dropped.
    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError>;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Output that discards everything, used when no device is available.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullOutput {
    sample_rate: u32,
}

impl NullOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }
}

impl PcmSink for NullOutput {
    fn write_pcm(&mut self, pcm: &[u8]) {
        NullSink.write_pcm(pcm);
    }
}

impl AudioOutput for NullOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, _frames: &[Frame]) -> Result<(), AudioError> {
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        Ok(())
    }
}
