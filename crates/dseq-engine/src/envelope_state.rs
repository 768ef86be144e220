//! Per-channel ADSR envelope.

use crate::tables::{attack_rate, fall_rate, Tables, VOLUME_FLOOR};

/// Envelope stage of a playing channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopeStage {
    #[default]
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Runtime state for a channel envelope.
///
/// `level` is an attenuation in the same units as the sustain table:
/// 0 is full volume and [`VOLUME_FLOOR`] is silence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    stage: EnvelopeStage,
    level: i32,
    attack: i32,
    decay: i32,
    sustain: i32,
    release: i32,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            stage: EnvelopeStage::Attack,
            level: VOLUME_FLOOR,
            attack: 0,
            decay: fall_rate(127),
            sustain: 0,
            release: fall_rate(127),
        }
    }
}

impl Envelope {
    /// Restart at silence in the attack stage.
    pub fn restart(&mut self) {
        self.stage = EnvelopeStage::Attack;
        self.level = VOLUME_FLOOR;
    }

    pub fn set_attack(&mut self, attack: u8) {
        self.attack = attack_rate(attack);
    }

    pub fn set_decay(&mut self, decay: u8) {
        self.decay = fall_rate(decay);
    }

    pub fn set_sustain(&mut self, sustain: u8, tables: &Tables) {
        self.sustain = tables.sustain(sustain);
    }

    pub fn set_release(&mut self, release: u8) {
        self.release = fall_rate(release);
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn is_releasing(&self) -> bool {
        self.stage == EnvelopeStage::Release
    }

    /// Enter the release stage. Has no effect once releasing.
    pub fn release(&mut self) {
        self.stage = EnvelopeStage::Release;
    }

    /// Advance one tick.
    pub fn step(&mut self) {
        match self.stage {
            EnvelopeStage::Attack => {
                self.level = self.attack * self.level / 256;
                if self.level == 0 {
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                self.level -= self.decay;
                if self.level <= self.sustain {
                    self.level = self.sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {}
            EnvelopeStage::Release => {
                self.level = (self.level - self.release).max(VOLUME_FLOOR);
            }
        }
    }
}
