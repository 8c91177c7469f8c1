//! Mixer channel control

mod osc;

pub use osc::OscMixer;

use async_trait::async_trait;

use crate::actions::MixerChannel;
use crate::error::DeskResult;

/// Switches mixer channels on and off
#[async_trait]
pub trait MixerClient: Send + Sync {
    /// Unmute (`on == true`) or mute a channel
    async fn set_channel_on(&self, channel: MixerChannel, on: bool) -> DeskResult<()>;
}
