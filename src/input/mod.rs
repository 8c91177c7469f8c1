//! Input adapters
//!
//! Every adapter turns its raw events into [`DeskEvent`]s on one channel that
//! the sequencer drains. Adapters never touch desk state themselves.

mod backend;
pub mod http;
pub mod keyboard;
mod midi_backend;

pub use backend::*;
pub use midi_backend::{decode_message, MidiBackend};

use midir::{MidiIO, MidiInput, MidiOutput};
use tokio::sync::{mpsc, oneshot};

/// Capacity of the shared input channel
pub const INPUT_CHANNEL_CAPACITY: usize = 64;

/// Where an input event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOrigin {
    Hardware,
    Keyboard,
    Http,
}

impl std::fmt::Display for InputOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputOrigin::Hardware => f.write_str("hardware"),
            InputOrigin::Keyboard => f.write_str("keyboard"),
            InputOrigin::Http => f.write_str("http"),
        }
    }
}

/// One input event on its way to the sequencer
#[derive(Debug)]
pub struct DeskEvent {
    /// Raw input id text, e.g. `note_on_36`. Unknown or malformed ids are no-ops.
    pub input: String,
    /// Control value (third MIDI byte), hardware only
    pub value: Option<u8>,
    /// Indicator of the control that fired, hardware only
    pub source_indicator: Option<u8>,
    pub origin: InputOrigin,
    /// Signalled once the event has been fully handled
    pub done: Option<oneshot::Sender<()>>,
}

impl DeskEvent {
    /// A text command from the keyboard or the HTTP panel
    pub fn command(input: impl Into<String>, origin: InputOrigin) -> Self {
        Self {
            input: input.into(),
            value: None,
            source_indicator: None,
            origin,
            done: None,
        }
    }

    /// Attach a completion channel, returning the receiving end
    pub fn with_completion(mut self) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        self.done = Some(tx);
        (self, rx)
    }

    /// Tell the waiting adapter (if any) that handling is finished
    pub fn complete(&mut self) {
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
    }
}

pub type EventSender = mpsc::Sender<DeskEvent>;
pub type EventReceiver = mpsc::Receiver<DeskEvent>;

pub fn event_channel() -> (EventSender, EventReceiver) {
    mpsc::channel(INPUT_CHANNEL_CAPACITY)
}

/// First port whose name contains `pattern`
pub fn find_port<T: MidiIO>(io: &T, pattern: &str) -> Option<T::Port> {
    io.ports().into_iter().find(|port| {
        io.port_name(port)
            .map(|name| name.contains(pattern))
            .unwrap_or(false)
    })
}

fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

/// Names of the MIDI input and output ports currently visible
pub fn list_ports() -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let inputs = port_names(&MidiInput::new("booth-control-list")?);
    let outputs = port_names(&MidiOutput::new("booth-control-list")?);
    Ok((inputs, outputs))
}
