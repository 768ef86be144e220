//! Command arena and label resolution.

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::vec::Vec;

use crate::command::{Command, CommandIndex};

/// Errors raised while assembling a [`Sequence`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequenceError {
    /// A command refers to a label that was never defined.
    #[error("unknown label `{0}`")]
    UnknownLabel(String),
    /// The same label was defined twice.
    #[error("label `{0}` defined more than once")]
    DuplicateLabel(String),
    /// A command index target points past the end of the sequence.
    #[error("command {at} targets index {target}, past the end of the sequence")]
    TargetOutOfRange { at: CommandIndex, target: CommandIndex },
}

/// An immutable, indexable list of decoded commands.
///
/// All jump, call and open-track targets are command indices that are known
/// to be in range.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sequence {
    commands: Vec<Command>,
    labels: BTreeMap<String, CommandIndex>,
}

impl Sequence {
    /// Build a sequence from commands whose targets are already indices.
    pub fn from_commands(commands: Vec<Command>) -> Result<Self, SequenceError> {
        let len = commands.len();
        for (at, cmd) in commands.iter().enumerate() {
            if let Some(&target) = cmd.target() {
                if target >= len {
                    return Err(SequenceError::TargetOutOfRange { at, target });
                }
            }
        }
        Ok(Self { commands, labels: BTreeMap::new() })
    }

    /// Command at `index`, if any.
    pub fn get(&self, index: CommandIndex) -> Option<&Command> {
        self.commands.get(index)
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Index of a named entry point.
    pub fn label(&self, name: &str) -> Option<CommandIndex> {
        self.labels.get(name).copied()
    }

    /// All named entry points, sorted by name.
    pub fn labels(&self) -> impl Iterator<Item = (&str, CommandIndex)> {
        self.labels.iter().map(|(name, &idx)| (name.as_str(), idx))
    }
}

/// Assembles a [`Sequence`] from commands that refer to labels by name.
///
/// Labels mark the position of the next pushed command. Resolution happens
/// once, in [`build`](Self::build).
#[derive(Clone, Debug, Default)]
pub struct SequenceBuilder {
    commands: Vec<Command<String>>,
    labels: BTreeMap<String, CommandIndex>,
    duplicate: Option<String>,
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define `name` at the position of the next command.
    pub fn label(mut self, name: &str) -> Self {
        let at = self.commands.len();
        if self.labels.insert(name.to_string(), at).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(name.to_string());
        }
        self
    }

    /// Append one command.
    pub fn push(mut self, command: Command<String>) -> Self {
        self.commands.push(command);
        self
    }

    /// Append several commands.
    pub fn extend(mut self, commands: impl IntoIterator<Item = Command<String>>) -> Self {
        self.commands.extend(commands);
        self
    }

    /// Index the next pushed command will get.
    pub fn position(&self) -> CommandIndex {
        self.commands.len()
    }

    /// Resolve every label reference and produce the sequence.
    pub fn build(self) -> Result<Sequence, SequenceError> {
        if let Some(name) = self.duplicate {
            return Err(SequenceError::DuplicateLabel(name));
        }

        let len = self.commands.len();
        let labels = self.labels;
        let mut resolve = |name: String| match labels.get(&name) {
            // A label after the last command has nothing to execute.
            Some(&idx) if idx < len => Ok(idx),
            Some(&idx) => Err(SequenceError::TargetOutOfRange { at: len, target: idx }),
            None => Err(SequenceError::UnknownLabel(name)),
        };

        let commands = self
            .commands
            .into_iter()
            .map(|cmd| cmd.try_map_target(&mut resolve))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Sequence { commands, labels })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{CmpOp, Register, VarOp};

    #[test]
    fn forward_and_backward_labels_resolve() {
        let seq = SequenceBuilder::new()
            .label("start")
            .push(Command::jump("end"))
            .push(Command::Wait(4))
            .label("end")
            .push(Command::jump("start"))
            .build()
            .unwrap();

        assert_eq!(seq.len(), 3);
        assert_eq!(seq.get(0), Some(&Command::Jump(2)));
        assert_eq!(seq.get(2), Some(&Command::Jump(0)));
        assert_eq!(seq.label("end"), Some(2));
    }

    #[test]
    fn unknown_label_is_rejected() {
        let err = SequenceBuilder::new().push(Command::call("missing")).build().unwrap_err();
        assert_eq!(err, SequenceError::UnknownLabel("missing".to_string()));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let err = SequenceBuilder::new()
            .label("a")
            .push(Command::Fin)
            .label("a")
            .push(Command::Fin)
            .build()
            .unwrap_err();
        assert_eq!(err, SequenceError::DuplicateLabel("a".to_string()));
    }

    #[test]
    fn dangling_trailing_label_is_rejected() {
        let err = SequenceBuilder::new()
            .push(Command::jump("tail"))
            .label("tail")
            .build()
            .unwrap_err();
        assert!(matches!(err, SequenceError::TargetOutOfRange { target: 1, .. }));
    }

    #[test]
    fn prefixed_targets_resolve() {
        let seq = SequenceBuilder::new()
            .push(Command::cmp(CmpOp::Eq, 0, 1))
            .push(Command::jump("done").when())
            .push(Command::set(Register::Volume, 100))
            .label("done")
            .push(Command::Fin)
            .build()
            .unwrap();
        assert_eq!(seq.get(1), Some(&Command::If(alloc::boxed::Box::new(Command::Jump(3)))));
    }

    #[test]
    fn from_commands_checks_targets() {
        let ok = Sequence::from_commands(vec![Command::var(VarOp::Set, 0, 5), Command::Jump(0)]);
        assert!(ok.is_ok());

        let err = Sequence::from_commands(vec![Command::Call(9)]).unwrap_err();
        assert_eq!(err, SequenceError::TargetOutOfRange { at: 0, target: 9 });
    }

    #[test]
    fn labels_iterate_sorted() {
        let seq = SequenceBuilder::new()
            .label("b")
            .push(Command::Fin)
            .label("a")
            .push(Command::Fin)
            .build()
            .unwrap();
        let labels: Vec<_> = seq.labels().collect();
        assert_eq!(labels, vec![("a", 1), ("b", 0)]);
    }
}
