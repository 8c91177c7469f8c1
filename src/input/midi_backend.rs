//! Control surface input over midir

use anyhow::{anyhow, Context, Result};
use midir::{Ignore, MidiInput, MidiInputConnection};
use tracing::{debug, info, warn};

use super::{find_port, DeskEvent, EventSender, InputBackend, InputOrigin};
use crate::actions::{ControlKind, InputEventId};

/// Turn a raw MIDI message into an input id and its value.
///
/// Channel bits are ignored. A note-on with velocity 0 is reported as a
/// note-off, the way most surfaces release pads.
pub fn decode_message(message: &[u8]) -> Option<(InputEventId, u8)> {
    if message.len() < 3 {
        return None;
    }

    let number = message[1] & 0x7F;
    let value = message[2] & 0x7F;
    let kind = match message[0] & 0xF0 {
        0x90 if value > 0 => ControlKind::NoteOn,
        0x90 | 0x80 => ControlKind::NoteOff,
        0xB0 => ControlKind::ControlChange,
        _ => return None,
    };

    Some((InputEventId::new(kind, number), value))
}

/// Listens on the first MIDI input port whose name matches a pattern
pub struct MidiBackend {
    pattern: String,
    connection: Option<MidiInputConnection<()>>,
}

impl MidiBackend {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            connection: None,
        }
    }
}

impl InputBackend for MidiBackend {
    fn start(&mut self, tx: EventSender) -> Result<()> {
        let mut midi_in = MidiInput::new("booth-control-input")
            .context("Failed to create MIDI input")?;
        midi_in.ignore(Ignore::All);

        let port = find_port(&midi_in, &self.pattern)
            .with_context(|| format!("No MIDI input port matching '{}'", self.pattern))?;
        let port_name = midi_in
            .port_name(&port)
            .unwrap_or_else(|_| "<unknown>".to_string());

        let connection = midi_in
            .connect(
                &port,
                "booth-control-surface",
                move |_timestamp, message, _| {
                    let Some((id, value)) = decode_message(message) else {
                        return;
                    };
                    debug!("MIDI {} value {}", id, value);

                    let event = DeskEvent {
                        input: id.to_string(),
                        value: Some(value),
                        source_indicator: Some(id.indicator()),
                        origin: InputOrigin::Hardware,
                        done: None,
                    };
                    // The callback runs on the midir thread and must not block
                    if let Err(e) = tx.try_send(event) {
                        warn!("Dropped MIDI event {}: {}", id, e);
                    }
                },
                (),
            )
            .map_err(|_| anyhow!("Failed to connect MIDI input '{}'", port_name))?;

        info!("Listening for control surface events on {}", port_name);
        self.connection = Some(connection);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "midi"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_note_on() {
        let (id, value) = decode_message(&[0x90, 36, 100]).unwrap();
        assert_eq!(id.to_string(), "note_on_36");
        assert_eq!(value, 100);

        // Channel 2
        let (id, _) = decode_message(&[0x91, 40, 1]).unwrap();
        assert_eq!(id.to_string(), "note_on_40");
    }

    #[test]
    fn test_decode_release() {
        let (id, value) = decode_message(&[0x90, 36, 0]).unwrap();
        assert_eq!(id.to_string(), "note_off_36");
        assert_eq!(value, 0);

        let (id, _) = decode_message(&[0x80, 44, 64]).unwrap();
        assert_eq!(id.to_string(), "note_off_44");
    }

    #[test]
    fn test_decode_control_change() {
        let (id, value) = decode_message(&[0xB0, 1, 127]).unwrap();
        assert_eq!(id.to_string(), "control_change_1");
        assert_eq!(id.indicator(), 1);
        assert_eq!(value, 127);
    }

    #[test]
    fn test_decode_ignores_other_messages() {
        assert!(decode_message(&[0xF8]).is_none());
        assert!(decode_message(&[0xC0, 5]).is_none());
        assert!(decode_message(&[0xE0, 0, 64]).is_none());
    }
}
