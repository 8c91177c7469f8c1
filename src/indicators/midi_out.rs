//! MIDI output port driving the surface LEDs

use anyhow::{anyhow, Context, Result};
use midir::{MidiOutput, MidiOutputConnection};
use tracing::info;

use super::IndicatorOutput;
use crate::input::find_port;

/// LED sink backed by a midir output connection
pub struct MidiIndicatorOutput {
    connection: MidiOutputConnection,
    port_name: String,
}

impl MidiIndicatorOutput {
    /// Open the first output port whose name contains `pattern`
    pub fn connect(pattern: &str) -> Result<Self> {
        let midi_out = MidiOutput::new("booth-control-leds")
            .context("Failed to create MIDI output")?;

        let port = find_port(&midi_out, pattern)
            .with_context(|| format!("No MIDI output port matching '{}'", pattern))?;
        let port_name = midi_out
            .port_name(&port)
            .unwrap_or_else(|_| "<unknown>".to_string());

        let connection = midi_out
            .connect(&port, "booth-control-led-output")
            .map_err(|_| anyhow!("Failed to connect MIDI output '{}'", port_name))?;

        info!("Indicator output connected to {}", port_name);
        Ok(Self {
            connection,
            port_name,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl IndicatorOutput for MidiIndicatorOutput {
    fn send(&mut self, message: [u8; 3]) -> Result<()> {
        self.connection
            .send(&message)
            .map_err(|e| anyhow!("Failed to send MIDI to {}: {}", self.port_name, e))
    }
}
