//! Prefix resolution: Random, Variable, If and the Time family.

use dseq_ir::Command;
use rand::Rng;

use super::Player;

/// A concrete command ready for dispatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Resolved {
    pub command: Command,
    /// Ticks over which a rampable register write is spread.
    pub duration: Option<i32>,
}

impl Player {
    /// Unwrap the prefixes around `command`, evaluating each one once.
    ///
    /// Returns `None` when an `If` prefix suppresses the command.
    pub(crate) fn resolve(&mut self, t: usize, command: &Command) -> Option<Resolved> {
        match command {
            Command::Random { command, min, max } => {
                let value = self.random_between(*min, *max);
                self.resolve(t, command).map(|r| r.with_last_arg(value))
            }
            Command::Variable { command, var } => {
                let value = self.var(t, *var) as i32;
                self.resolve(t, command).map(|r| r.with_last_arg(value))
            }
            Command::If(command) => {
                if self.tracks[t].condition {
                    self.resolve(t, command)
                } else {
                    None
                }
            }
            Command::Time { command, time } => self.resolve(t, command).map(|r| r.timed(*time as i32)),
            Command::TimeRandom { command, min, max } => {
                let time = self.random_between(*min, *max);
                self.resolve(t, command).map(|r| r.timed(time))
            }
            Command::TimeVariable { command, var } => {
                let time = self.var(t, *var) as i32;
                self.resolve(t, command).map(|r| r.timed(time))
            }
            concrete => Some(Resolved { command: concrete.clone(), duration: None }),
        }
    }

    /// Uniform value in `[min, max]` (bounds in either order).
    pub(crate) fn random_between(&mut self, min: i16, max: i16) -> i32 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        self.rng.random_range(lo as i32..=hi as i32)
    }
}

impl Resolved {
    fn with_last_arg(self, value: i32) -> Self {
        Self { command: self.command.with_last_arg(value), ..self }
    }

    fn timed(self, duration: i32) -> Self {
        Self { duration: Some(duration), ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use alloc::sync::Arc;
    use dseq_ir::{Register, Sequence, SoundBank};

    fn player() -> Player {
        let seq = Sequence::from_commands(vec![Command::Fin]).unwrap();
        let mut p = Player::new(Arc::new(seq), Arc::new(SoundBank::new()), &EngineConfig::default());
        p.play();
        p
    }

    #[test]
    fn concrete_commands_pass_through() {
        let mut p = player();
        let r = p.resolve(0, &Command::Wait(5)).unwrap();
        assert_eq!(r, Resolved { command: Command::Wait(5), duration: None });
    }

    #[test]
    fn variable_substitutes_last_argument() {
        let mut p = player();
        p.tracks[0].vars[2] = 42;
        let cmd = Command::set(Register::Volume, 0).with_var(2);
        assert_eq!(p.resolve(0, &cmd).unwrap().command, Command::set(Register::Volume, 42));
    }

    #[test]
    fn global_variables_are_shared() {
        let mut p = player();
        p.globals[0] = 7;
        let cmd: Command = Command::Wait(0).with_var(16);
        assert_eq!(p.resolve(0, &cmd).unwrap().command, Command::Wait(7));
        assert_eq!(p.resolve(3, &cmd).unwrap().command, Command::Wait(7));
    }

    #[test]
    fn random_stays_in_bounds() {
        let mut p = player();
        let cmd: Command = Command::Wait(0).random(-3, 3);
        for _ in 0..200 {
            let Command::Wait(n) = p.resolve(0, &cmd).unwrap().command else {
                panic!("expected wait");
            };
            assert!((-3..=3).contains(&n));
        }
        assert_eq!(p.random_between(5, 5), 5);
        assert!((1..=9).contains(&p.random_between(9, 1)));
    }

    #[test]
    fn random_is_reproducible_from_seed() {
        let mut a = player();
        let mut b = player();
        let draws_a: Vec<i32> = (0..16).map(|_| a.random_between(0, 1000)).collect();
        let draws_b: Vec<i32> = (0..16).map(|_| b.random_between(0, 1000)).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn if_follows_condition_flag() {
        let mut p = player();
        let cmd: Command = Command::Wait(3).when();
        p.tracks[0].condition = false;
        assert_eq!(p.resolve(0, &cmd), None);
        p.tracks[0].condition = true;
        assert_eq!(p.resolve(0, &cmd).unwrap().command, Command::Wait(3));
    }

    #[test]
    fn time_prefixes_produce_duration() {
        let mut p = player();
        let cmd = Command::set(Register::Volume, 20).timed(48);
        let r = p.resolve(0, &cmd).unwrap();
        assert_eq!(r.duration, Some(48));
        assert_eq!(r.command, Command::set(Register::Volume, 20));

        p.tracks[0].vars[0] = 12;
        let r = p.resolve(0, &Command::set(Register::Pan, 0).timed_var(0)).unwrap();
        assert_eq!(r.duration, Some(12));

        let r = p.resolve(0, &Command::set(Register::Pan, 0).timed_random(4, 8)).unwrap();
        assert!((4..=8).contains(&r.duration.unwrap()));
    }

    #[test]
    fn nested_prefixes_resolve_inside_out() {
        let mut p = player();
        p.tracks[0].vars[1] = 99;
        let cmd = Command::set(Register::Expression, 0).with_var(1).timed(10).when();
        let r = p.resolve(0, &cmd).unwrap();
        assert_eq!(r.command, Command::set(Register::Expression, 99));
        assert_eq!(r.duration, Some(10));
    }
}
