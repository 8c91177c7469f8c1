//! Backing track playback

mod player;

pub use player::RodioPlayer;

use std::path::Path;

use crate::error::DeskResult;

/// Local music playback. Calls are synchronous and return immediately;
/// playback continues in the audio backend.
pub trait MusicPlayer {
    /// Replace whatever is playing with `path`, looped forever, at `volume`
    fn play_looped(&mut self, path: &Path, volume: f32) -> DeskResult<()>;

    fn stop(&mut self);

    /// Volume in `[0, 1]`, applied to the current track immediately
    fn set_volume(&mut self, volume: f32);
}

/// Scale a 0-127 control value to a volume in `[0, 1]`
pub fn volume_from_control(value: u8) -> f32 {
    (value.min(127) as f32 / 127.0).clamp(0.0, 1.0)
}
