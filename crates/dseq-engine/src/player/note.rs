//! Note start: channel allocation, envelope setup, sweep and portamento.

use dseq_ir::{NoteInfo, NoteSource};
use log::debug;

use super::Player;
use crate::channel::Channel;
use crate::tables::PSG_BASE_TIMER;
use crate::track::{MuteMode, Track, ADSR_DEFAULT};

/// Track register if set, otherwise the instrument's value.
fn adsr(track: u8, instrument: u8) -> u8 {
    if track == ADSR_DEFAULT {
        instrument
    } else {
        track
    }
}

impl Player {
    /// Start a note on track `t`. `length` is in ticks.
    pub(crate) fn play_note(&mut self, t: usize, key: u8, velocity: u8, length: i32) {
        let key = (key as i32 + self.tracks[t].transpose as i32).clamp(0, 127) as u8;
        let velocity = velocity.min(127);

        if self.tracks[t].mute == MuteMode::Off {
            let tied = self.tracks[t].tie && self.retrigger_tied(t, key, velocity);
            if !tied {
                self.start_note(t, key, velocity, length);
            }
        }

        let track = &mut self.tracks[t];
        if track.note_wait {
            track.rest = length.max(0);
            if length == 0 {
                track.waiting = true;
            }
        }
    }

    /// Reuse the channel of the last tied note. Returns false if the track no
    /// longer owns it.
    fn retrigger_tied(&mut self, t: usize, key: u8, velocity: u8) -> bool {
        let Some(index) = self.tracks[t].last_channel else {
            return false;
        };
        let owner = t as u8;
        let track = &mut self.tracks[t];
        let Some(ch) = self.mixer.channel_mut(index).filter(|c| c.owner() == Some(owner)) else {
            return false;
        };
        ch.key = key;
        ch.note_velocity = velocity;
        apply_sweep(track, ch, key, 0);
        true
    }

    fn start_note(&mut self, t: usize, key: u8, velocity: u8, length: i32) {
        let track = &self.tracks[t];
        let Some(info) = self.bank.note_info(track.program, key).copied() else {
            debug!("track {t}: no instrument for program {} key {key}", track.program);
            return;
        };
        let Some(index) =
            self.mixer.allocate_channel(info.source.instrument_type(), &self.tracks, t as u8)
        else {
            debug!("track {t}: no free {:?} channel, note {key} dropped", info.source.instrument_type());
            return;
        };
        let base_timer = match info.source {
            NoteSource::Pcm(wave) => match self.bank.waves.get(wave) {
                Some(wave) => wave.timer(),
                None => {
                    debug!("track {t}: program {} refers to a missing wave", track.program);
                    return;
                }
            },
            NoteSource::Psg { .. } | NoteSource::Noise => PSG_BASE_TIMER,
        };

        let NoteInfo { attack, decay, sustain, release, .. } = info;
        let attack = adsr(track.attack, attack);
        let decay = adsr(track.decay, decay);
        let sustain = adsr(track.sustain, sustain);
        let mut release = adsr(track.release, release);
        let mut duration = length;
        if release == ADSR_DEFAULT {
            release = 0;
            duration = -1;
        }
        if track.tie {
            duration = -1;
        }
        let start_pan = (info.pan as i32 - 64 + track.init_pan as i32).clamp(-64, 63) as i8;

        let tables = &self.tables;
        let track = &mut self.tracks[t];
        let Some(ch) = self.mixer.channel_mut(index) else {
            return;
        };
        ch.start(t as u8, info.source, base_timer, duration);
        ch.key = key;
        ch.base_key = info.base_key;
        ch.note_velocity = velocity;
        ch.start_pan = start_pan;
        let envelope = ch.envelope_mut();
        envelope.set_attack(attack);
        envelope.set_decay(decay);
        envelope.set_sustain(sustain, tables);
        envelope.set_release(release);
        apply_sweep(track, ch, key, length);
        track.last_channel = Some(index);
    }
}

/// Set up the pitch sweep of a freshly keyed channel.
fn apply_sweep(track: &mut Track, ch: &mut Channel, key: u8, length: i32) {
    let mut sweep = track.sweep_pitch as i32;
    if track.portamento {
        sweep += (track.portamento_key as i32 - key as i32) << 6;
    }
    ch.sweep_pitch = sweep;
    if track.portamento_time > 0 {
        let time = track.portamento_time as i64;
        ch.sweep_length = ((time * time * sweep.unsigned_abs() as i64) >> 11) as i32;
        ch.auto_sweep = true;
    } else {
        ch.sweep_length = length;
        ch.auto_sweep = false;
    }
    ch.sweep_counter = 0;
    track.portamento_key = key;
}
