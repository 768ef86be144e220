//! Sequence interpreter.
//!
//! The [`Player`] owns a whole playback session: the sixteen tracks, the
//! mixer and its channels, the random source, the lookup tables and the
//! player-wide registers. One call to [`Player::frame`] advances the session
//! by one mixer buffer:
//!
//! 1. the tempo accumulator decides how many sequencer ticks are due;
//! 2. each due tick advances every enabled track's countdowns and LFO, then
//!    interprets its commands until it has to wait;
//! 3. the mixer refreshes channel envelopes, volume, pitch and pan;
//! 4. the mixer renders the buffer.

mod dispatch;
mod note;
mod resolve;

use alloc::sync::Arc;

use dseq_ir::{CommandIndex, Sequence, SoundBank};
use log::{info, warn};
use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::config::{EngineConfig, NUM_TRACKS};
use crate::frame::PcmSink;
use crate::mixer::Mixer;
use crate::tables::Tables;
use crate::track::{Track, NUM_LOCAL_VARS};

/// Player-wide variable slots, addressed after the track-local ones.
pub const NUM_GLOBAL_VARS: usize = 32;
/// Commands a track may run in one tick before it is considered stuck.
pub const WATCHDOG_LIMIT: u32 = 10_000;
/// Tempo accumulator threshold for one sequencer tick.
pub const TEMPO_TICK: i32 = 240;
pub const DEFAULT_TEMPO: u16 = 120;

/// Playback state of a [`Player`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayerState {
    #[default]
    Stopped,
    Playing,
    Paused,
    /// Every track ended, or the final fade-out completed.
    Finished,
}

/// A playback session for one sequence.
pub struct Player {
    sequence: Arc<Sequence>,
    bank: Arc<SoundBank>,
    tables: Tables,
    tracks: [Track; NUM_TRACKS],
    mixer: Mixer,
    rng: Pcg32,
    seed: u64,
    globals: [i16; NUM_GLOBAL_VARS],
    tempo: u16,
    tempo_stack: i32,
    main_volume: u8,
    state: PlayerState,
    loops: u32,
    loops_played: u32,
    ticks: u64,
}

impl Player {
    pub fn new(sequence: Arc<Sequence>, bank: Arc<SoundBank>, config: &EngineConfig) -> Self {
        Self {
            sequence,
            bank,
            tables: Tables::new(),
            tracks: core::array::from_fn(|i| Track::new(i as u8)),
            mixer: Mixer::new(config),
            rng: Pcg32::seed_from_u64(config.seed),
            seed: config.seed,
            globals: [-1; NUM_GLOBAL_VARS],
            tempo: DEFAULT_TEMPO,
            tempo_stack: 0,
            main_volume: 127,
            state: PlayerState::Stopped,
            loops: config.loops,
            loops_played: 0,
            ticks: 0,
        }
    }

    /// Replace the lookup tables.
    pub fn with_tables(mut self, tables: Tables) -> Self {
        self.tables = tables;
        self
    }

    /// Start playback with track 0 at the first command.
    pub fn play(&mut self) {
        self.play_from(0);
    }

    /// Start playback with track 0 at a named entry point. Returns false if
    /// the label does not exist.
    pub fn play_label(&mut self, label: &str) -> bool {
        match self.sequence.label(label) {
            Some(index) => {
                self.play_from(index);
                true
            }
            None => false,
        }
    }

    /// Reset the session and start track 0 at `start`.
    pub fn play_from(&mut self, start: CommandIndex) {
        self.mixer.stop_all();
        self.mixer.reset_fade();
        for track in self.tracks.iter_mut() {
            track.init(self.mixer.channels_mut());
        }
        self.tracks[0].cursor = start;
        self.globals = [-1; NUM_GLOBAL_VARS];
        self.rng = Pcg32::seed_from_u64(self.seed);
        self.tempo = DEFAULT_TEMPO;
        self.tempo_stack = 0;
        self.main_volume = 127;
        self.loops_played = 0;
        self.ticks = 0;
        self.state = PlayerState::Playing;
        info!("playback started at command {start}");
    }

    pub fn pause(&mut self) {
        if self.state == PlayerState::Playing {
            self.state = PlayerState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == PlayerState::Paused {
            self.state = PlayerState::Playing;
        }
    }

    /// Stop playback and silence every channel.
    pub fn stop(&mut self) {
        if matches!(self.state, PlayerState::Playing | PlayerState::Paused) {
            info!("playback stopped after {} ticks", self.ticks);
        }
        self.mixer.stop_all();
        self.state = PlayerState::Stopped;
    }

    /// Render one mixer buffer.
    ///
    /// Returns the rendered PCM, or an empty slice when not playing.
    pub fn frame(
        &mut self,
        output: Option<&mut dyn PcmSink>,
        recording: Option<&mut dyn PcmSink>,
    ) -> &[u8] {
        if self.state != PlayerState::Playing {
            return &[];
        }
        self.advance_sequencer();
        self.mixer.channel_tick(&self.tracks, self.main_volume, &self.tables);
        self.mixer.process(&self.bank.waves, output, recording);
        self.check_fade();
        self.mixer.buffer()
    }

    /// Advance one buffer worth of playback without rendering audio.
    pub fn emulate_frame(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        self.advance_sequencer();
        self.mixer.channel_tick(&self.tracks, self.main_volume, &self.tables);
        self.mixer.emulate_process(&self.bank.waves);
        self.check_fade();
    }

    /// Fast-forward `frames` buffers. Returns the number actually advanced.
    pub fn skip_frames(&mut self, frames: u64) -> u64 {
        let mut done = 0;
        while done < frames && self.state == PlayerState::Playing {
            self.emulate_frame();
            done += 1;
        }
        done
    }

    fn check_fade(&mut self) {
        if self.mixer.is_fade_done() {
            info!("fade-out complete after {} loops", self.loops_played);
            self.mixer.stop_all();
            self.state = PlayerState::Finished;
        }
    }

    fn advance_sequencer(&mut self) {
        self.tempo_stack += self.tempo as i32;
        while self.tempo_stack >= TEMPO_TICK {
            self.tempo_stack -= TEMPO_TICK;
            self.tick();
            if self.state != PlayerState::Playing {
                return;
            }
        }
    }

    /// Run one sequencer tick on every enabled track.
    pub fn tick(&mut self) {
        let sequence = Arc::clone(&self.sequence);
        let mut all_done = true;
        for t in 0..NUM_TRACKS {
            if !self.tracks[t].enabled {
                continue;
            }
            self.tracks[t].tick(self.mixer.channels_mut());
            self.step_ramps(t);
            self.run_track(&sequence, t);
            if !self.tracks[t].stopped || self.tracks[t].owns_any(self.mixer.channels()) {
                all_done = false;
            }
        }
        self.ticks += 1;
        if all_done {
            info!("all tracks finished after {} ticks", self.ticks);
            self.state = PlayerState::Finished;
        }
    }

    fn run_track(&mut self, sequence: &Sequence, t: usize) {
        let mut executed = 0u32;
        loop {
            let track = &self.tracks[t];
            if track.rest != 0 || track.waiting || track.stopped {
                break;
            }
            if executed >= WATCHDOG_LIMIT {
                warn!(
                    "track {t} ran {WATCHDOG_LIMIT} commands without waiting near command {}; stopping it",
                    track.cursor
                );
                self.tracks[t].stopped = true;
                break;
            }
            executed += 1;

            let cursor = track.cursor;
            let Some(command) = sequence.get(cursor) else {
                self.tracks[t].stopped = true;
                break;
            };
            self.tracks[t].cursor = cursor + 1;
            if let Some(resolved) = self.resolve(t, command) {
                self.dispatch(t, cursor, resolved);
            }
        }
    }

    fn step_ramps(&mut self, t: usize) {
        let mut updates = arrayvec::ArrayVec::<_, 5>::new();
        for ramp in self.tracks[t].ramps_mut().iter_mut() {
            updates.push((ramp.register, ramp.step()));
        }
        self.tracks[t].ramps_mut().retain(|r| !r.is_done());
        for (register, value) in updates {
            self.write_register(t, register, value as i16);
        }
    }

    // --- Accessors ---

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlayerState::Playing
    }

    pub fn track(&self, index: usize) -> &Track {
        &self.tracks[index % NUM_TRACKS]
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn tempo(&self) -> u16 {
        self.tempo
    }

    pub fn main_volume(&self) -> u8 {
        self.main_volume
    }

    pub fn loops_played(&self) -> u32 {
        self.loops_played
    }

    /// Sequencer ticks run since playback started.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn global(&self, index: usize) -> i16 {
        self.globals.get(index).copied().unwrap_or(0)
    }

    /// Value of variable slot `var` as seen from track `t`.
    pub fn var(&self, t: usize, var: u8) -> i16 {
        let var = var as usize;
        if var < NUM_LOCAL_VARS {
            self.tracks[t].vars[var]
        } else {
            self.global(var - NUM_LOCAL_VARS)
        }
    }

    fn var_mut(&mut self, t: usize, var: u8) -> Option<&mut i16> {
        let var = var as usize;
        if var < NUM_LOCAL_VARS {
            Some(&mut self.tracks[t].vars[var])
        } else {
            self.globals.get_mut(var - NUM_LOCAL_VARS)
        }
    }

    pub fn set_mute(&mut self, track: usize, muted: bool) {
        if let Some(m) = self.mixer.mutes.get_mut(track) {
            *m = muted;
        }
    }

    /// Reseed the random source used by random commands.
    pub fn reseed(&mut self, seed: u64) {
        self.seed = seed;
        self.rng = Pcg32::seed_from_u64(seed);
    }
}
