//! Channel pool, allocation, per-tick channel update and buffer mixing.

use dseq_ir::{InstrumentType, Wave, WaveKey};
use log::debug;
use slotmap::SlotMap;

use crate::channel::{Channel, TrackOutput};
use crate::config::{ChannelMasks, EngineConfig, NUM_TRACKS};
use crate::frame::{Frame, PcmSink};
use crate::tables::{Tables, SAMPLES_PER_BUFFER};
use crate::track::Track;

/// Number of hardware channels.
pub const NUM_CHANNELS: usize = 16;
/// Length of a fade in mixer buffers (10 seconds worth of 192 units).
pub const FADE_MICROFRAMES: u32 = 10_000 * 192 / 1000;
/// Bytes in one rendered buffer of 16-bit stereo.
pub const BUFFER_BYTES: usize = SAMPLES_PER_BUFFER * 4;

const FADE_EXPONENT: f32 = 10.0 / 6.0;

fn fade_curve(pos: f32) -> f32 {
    if pos <= 0.0 {
        0.0
    } else {
        libm::powf(pos, FADE_EXPONENT)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Fade {
    pos: f32,
    step: f32,
    remaining: u32,
    out: bool,
}

/// Sixteen channels plus the master gain stage.
pub struct Mixer {
    channels: [Channel; NUM_CHANNELS],
    masks: ChannelMasks,
    /// Tracks whose channels are left out of the mix.
    pub mutes: [bool; NUM_TRACKS],
    /// Linear gain applied to the mix.
    pub master_volume: f32,
    fade: Option<Fade>,
    buffer: [u8; BUFFER_BYTES],
}

impl Mixer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            channels: core::array::from_fn(|i| Channel::new(i as u8)),
            masks: config.channel_masks,
            mutes: config.mutes,
            master_volume: config.master_volume,
            fade: None,
            buffer: [0; BUFFER_BYTES],
        }
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    pub fn channels_mut(&mut self) -> &mut [Channel] {
        &mut self.channels
    }

    pub fn channel(&self, index: u8) -> Option<&Channel> {
        self.channels.get(index as usize)
    }

    pub fn channel_mut(&mut self, index: u8) -> Option<&mut Channel> {
        self.channels.get_mut(index as usize)
    }

    pub fn mask(&self, kind: InstrumentType) -> u16 {
        match kind {
            InstrumentType::Pcm => self.masks.pcm,
            InstrumentType::Psg => self.masks.psg,
            InstrumentType::Noise => self.masks.noise,
        }
    }

    /// Pick a channel for a note of `kind` requested by track `requester`.
    ///
    /// Free channels are preferred over releasing ones, which are preferred
    /// over the lowest-priority owner; ties go to the quietest channel.
    /// Returns `None` if the best candidate belongs to a track with a higher
    /// priority than the requester.
    pub fn allocate_channel(
        &self,
        kind: InstrumentType,
        tracks: &[Track],
        requester: u8,
    ) -> Option<u8> {
        let score = |c: &Channel| -> i32 {
            match c.owner() {
                None => -2,
                Some(_) if c.is_releasing() => -1,
                Some(owner) => tracks.get(owner as usize).map_or(0, |t| t.priority as i32),
            }
        };

        let mask = self.mask(kind);
        let mut best: Option<&Channel> = None;
        for c in self.channels.iter().filter(|c| mask & (1 << c.index()) != 0) {
            best = match best {
                Some(b) => {
                    let (b_score, c_score) = (score(b), score(c));
                    if c_score <= b_score && (c_score < b_score || c.amplitude() <= b.amplitude()) {
                        Some(c)
                    } else {
                        Some(b)
                    }
                }
                None => Some(c),
            };
        }

        let priority = tracks.get(requester as usize).map_or(0, |t| t.priority as i32);
        let chosen = best?;
        if priority >= score(chosen) {
            Some(chosen.index())
        } else {
            None
        }
    }

    /// Step envelopes and refresh volume, timer and pan on owned channels.
    pub fn channel_tick(&mut self, tracks: &[Track], main_volume: u8, tables: &Tables) {
        let outputs: [TrackOutput; NUM_TRACKS] = core::array::from_fn(|i| {
            tracks.get(i).map_or(TrackOutput::default(), |t| t.output(main_volume, tables))
        });
        for ch in self.channels.iter_mut() {
            if let Some(owner) = ch.owner() {
                ch.tick(&outputs[owner as usize % NUM_TRACKS], tables);
            }
        }
    }

    /// The most recently rendered buffer.
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Stop every channel.
    pub fn stop_all(&mut self) {
        for ch in self.channels.iter_mut() {
            ch.stop();
        }
    }

    pub fn begin_fade_in(&mut self) {
        debug!("fade in");
        self.fade = Some(Fade {
            pos: 0.0,
            step: 1.0 / FADE_MICROFRAMES as f32,
            remaining: FADE_MICROFRAMES,
            out: false,
        });
    }

    pub fn begin_fade_out(&mut self) {
        debug!("fade out");
        self.fade = Some(Fade {
            pos: 1.0,
            step: -1.0 / FADE_MICROFRAMES as f32,
            remaining: FADE_MICROFRAMES,
            out: true,
        });
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// A fade-out has run to completion; output stays silent until reset.
    pub fn is_fade_done(&self) -> bool {
        matches!(self.fade, Some(Fade { remaining: 0, out: true, .. }))
    }

    pub fn reset_fade(&mut self) {
        self.fade = None;
    }

    /// Master level at the start of the next buffer and its per-sample step.
    fn master_ramp(&mut self) -> (f32, f32) {
        let Some(fade) = self.fade.as_mut() else {
            return (self.master_volume, 0.0);
        };
        if fade.remaining == 0 {
            return (0.0, 0.0);
        }
        let from = self.master_volume * fade_curve(fade.pos);
        fade.remaining -= 1;
        fade.pos = if fade.remaining == 0 {
            if fade.out { 0.0 } else { 1.0 }
        } else {
            (fade.pos + fade.step).clamp(0.0, 1.0)
        };
        let to = self.master_volume * fade_curve(fade.pos);
        if fade.remaining == 0 && !fade.out {
            self.fade = None;
        }
        (from, (to - from) / SAMPLES_PER_BUFFER as f32)
    }

    /// Render one buffer, forwarding it to the output and recording sinks.
    ///
    /// Returns the rendered interleaved little-endian stereo bytes.
    pub fn process(
        &mut self,
        waves: &SlotMap<WaveKey, Wave>,
        output: Option<&mut dyn PcmSink>,
        recording: Option<&mut dyn PcmSink>,
    ) -> &[u8] {
        let (mut level, step) = self.master_ramp();

        for out in self.buffer.chunks_exact_mut(4) {
            let (mut left, mut right) = (0i32, 0i32);
            for ch in self.channels.iter_mut() {
                let Some(owner) = ch.owner() else {
                    continue;
                };
                // Read before processing: the channel may free itself.
                let muted = self.mutes.get(owner as usize).copied().unwrap_or(false);
                let (l, r) = ch.process(waves);
                if !muted {
                    left += l;
                    right += r;
                }
            }
            out.copy_from_slice(&Frame::from_mix(left, right, level).to_le_bytes());
            level += step;
        }

        if let Some(sink) = output {
            sink.write_pcm(&self.buffer);
        }
        if let Some(sink) = recording {
            sink.write_pcm(&self.buffer);
        }
        &self.buffer
    }

    /// Advance owned channels and any fade by one buffer without rendering audio.
    pub fn emulate_process(&mut self, waves: &SlotMap<WaveKey, Wave>) {
        let _ = self.master_ramp();
        for _ in 0..SAMPLES_PER_BUFFER {
            for ch in self.channels.iter_mut().filter(|c| !c.is_free()) {
                ch.emulate_process(waves);
            }
        }
    }
}
