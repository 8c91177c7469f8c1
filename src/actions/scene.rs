//! Scene to mixer-channel mapping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Highest input channel on the mixer (X32 layout; X-Air uses 01-16)
pub const MAX_MIXER_CHANNEL: u8 = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("mixer channel {0:?} must be a two-digit id between 01 and 32")]
pub struct InvalidChannel(pub String);

/// Two-digit mixer channel id as used in OSC addresses (`/ch/07/mix/on`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MixerChannel(u8);

impl MixerChannel {
    pub fn new(number: u8) -> Result<Self, InvalidChannel> {
        if (1..=MAX_MIXER_CHANNEL).contains(&number) {
            Ok(Self(number))
        } else {
            Err(InvalidChannel(number.to_string()))
        }
    }

    pub fn number(&self) -> u8 {
        self.0
    }

    /// OSC address of the channel's mix-on switch
    pub fn mix_on_address(&self) -> String {
        format!("/ch/{}/mix/on", self)
    }
}

impl fmt::Display for MixerChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl TryFrom<String> for MixerChannel {
    type Error = InvalidChannel;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.len() != 2 || !value.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidChannel(value));
        }
        let number: u8 = value.parse().map_err(|_| InvalidChannel(value.clone()))?;
        Self::new(number).map_err(|_| InvalidChannel(value))
    }
}

impl From<MixerChannel> for String {
    fn from(channel: MixerChannel) -> Self {
        channel.to_string()
    }
}

/// Mixer channels switched by a scene
///
/// Channels listed in neither set keep whatever state they had.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneChannels {
    /// Channels unmuted when the scene becomes active
    #[serde(default)]
    pub on: Vec<MixerChannel>,

    /// Channels muted when the scene becomes active
    #[serde(default)]
    pub off: Vec<MixerChannel>,
}

impl SceneChannels {
    pub fn new(on: &[u8], off: &[u8]) -> Result<Self, InvalidChannel> {
        Ok(Self {
            on: on.iter().map(|n| MixerChannel::new(*n)).collect::<Result<_, _>>()?,
            off: off.iter().map(|n| MixerChannel::new(*n)).collect::<Result<_, _>>()?,
        })
    }

    /// Channels present in both sets
    pub fn overlap(&self) -> Vec<MixerChannel> {
        self.on
            .iter()
            .filter(|c| self.off.contains(c))
            .copied()
            .collect()
    }

    /// Mute commands for this scene, `(channel, on)` with unmutes first
    pub fn commands(&self) -> impl Iterator<Item = (MixerChannel, bool)> + '_ {
        self.on
            .iter()
            .map(|c| (*c, true))
            .chain(self.off.iter().map(|c| (*c, false)))
    }
}

/// Scene name to channel sets, read-only after startup
pub type SceneMap = BTreeMap<String, SceneChannels>;
