//! Input event identifiers
//!
//! Every physical control (and every keyboard or HTTP command that mimics
//! one) is addressed by a key of the form `{kind}_{number}`, e.g.
//! `note_on_36` or `control_change_6`. The number doubles as the id of the
//! indicator LED that belongs to the control.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of control-surface message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ControlKind {
    NoteOn,
    NoteOff,
    ControlChange,
}

impl ControlKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControlKind::NoteOn => "note_on",
            ControlKind::NoteOff => "note_off",
            ControlKind::ControlChange => "control_change",
        }
    }
}

impl fmt::Display for ControlKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseInputIdError {
    #[error("input id {0:?} is not of the form <kind>_<number>")]
    Malformed(String),

    #[error("unknown control kind {0:?} (expected note_on, note_off or control_change)")]
    UnknownKind(String),

    #[error("control number {0:?} is not in 0..=127")]
    BadNumber(String),
}

/// Normalized key identifying a physical control or an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InputEventId {
    kind: ControlKind,
    number: u8,
}

impl InputEventId {
    pub fn new(kind: ControlKind, number: u8) -> Self {
        Self {
            kind,
            number: number & 0x7F,
        }
    }

    pub fn kind(&self) -> ControlKind {
        self.kind
    }

    /// Indicator LED bound to this control
    pub fn indicator(&self) -> u8 {
        self.number
    }
}

impl fmt::Display for InputEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.number)
    }
}

impl FromStr for InputEventId {
    type Err = ParseInputIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, number) = s
            .rsplit_once('_')
            .ok_or_else(|| ParseInputIdError::Malformed(s.to_string()))?;

        let kind = match kind {
            "note_on" => ControlKind::NoteOn,
            "note_off" => ControlKind::NoteOff,
            "control_change" => ControlKind::ControlChange,
            other => return Err(ParseInputIdError::UnknownKind(other.to_string())),
        };

        // Only the canonical spelling names a control: no sign, no leading zeros
        let number: u8 = number
            .parse()
            .ok()
            .filter(|n: &u8| *n <= 127 && n.to_string() == number)
            .ok_or_else(|| ParseInputIdError::BadNumber(number.to_string()))?;

        Ok(Self { kind, number })
    }
}

impl TryFrom<String> for InputEventId {
    type Error = ParseInputIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<InputEventId> for String {
    fn from(id: InputEventId) -> Self {
        id.to_string()
    }
}
