//! Indicator LEDs on the control surface
//!
//! The desk keeps a cached lit/unlit flag per indicator and repaints the
//! whole surface on every refresh. The LPD8 has no reliable partial-update
//! protocol, so there is no diffing.

mod midi_out;

pub use midi_out::MidiIndicatorOutput;

use anyhow::Result;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Note-on status byte used for every LED message
pub const LED_STATUS: u8 = 0x90;

/// Build the LED message for one indicator
pub fn led_message(indicator: u8, lit: bool) -> [u8; 3] {
    [LED_STATUS, indicator & 0x7F, if lit { 0x01 } else { 0x00 }]
}

/// Sink for raw LED messages (the MIDI output port in production)
pub trait IndicatorOutput: Send {
    fn send(&mut self, message: [u8; 3]) -> Result<()>;
}

/// Cached lit/unlit status per hardware indicator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndicatorState {
    leds: BTreeMap<u8, bool>,
}

impl IndicatorState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, indicator: u8, lit: bool) {
        self.leds.insert(indicator, lit);
    }

    pub fn get(&self, indicator: u8) -> Option<bool> {
        self.leds.get(&indicator).copied()
    }

    /// Indicators currently lit, ascending
    pub fn lit(&self) -> Vec<u8> {
        self.leds
            .iter()
            .filter(|(_, lit)| **lit)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u8, bool)> + '_ {
        self.leds.iter().map(|(id, lit)| (*id, *lit))
    }

    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }
}

/// Owns the indicator cache and pushes it to the surface
pub struct IndicatorReflector {
    state: IndicatorState,
    output: Option<Box<dyn IndicatorOutput>>,
}

impl IndicatorReflector {
    pub fn new(output: Option<Box<dyn IndicatorOutput>>) -> Self {
        Self {
            state: IndicatorState::new(),
            output,
        }
    }

    pub fn state(&self) -> &IndicatorState {
        &self.state
    }

    pub fn set(&mut self, indicator: u8, lit: bool) {
        self.state.set(indicator, lit);
    }

    pub fn is_connected(&self) -> bool {
        self.output.is_some()
    }

    /// Send one LED message per known indicator
    pub fn refresh(&mut self) {
        let Some(output) = self.output.as_mut() else {
            debug!("Indicator refresh skipped, control surface output not connected");
            return;
        };

        debug!("Refreshing indicators: {:?}", self.state.leds);
        for (indicator, lit) in self.state.iter() {
            if let Err(e) = output.send(led_message(indicator, lit)) {
                warn!("Failed to update indicator {}: {}", indicator, e);
            }
        }
    }
}
