//! rodio-backed music player

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::MusicPlayer;
use crate::error::{DeskError, DeskResult};

/// Plays one looped track at a time on the default output device.
///
/// The output stream is opened on first use so the desk can run on machines
/// without an audio device as long as no music control is pressed.
pub struct RodioPlayer {
    stream: Option<OutputStream>,
    sink: Option<Sink>,
    current_file: Option<PathBuf>,
    volume: f32,
}

impl RodioPlayer {
    pub fn new() -> Self {
        Self {
            stream: None,
            sink: None,
            current_file: None,
            volume: 0.0,
        }
    }

    fn output(&mut self) -> DeskResult<&OutputStream> {
        if self.stream.is_none() {
            let mut stream = OutputStreamBuilder::open_default_stream()
                .map_err(|e| DeskError::Audio(format!("Failed to open audio output stream: {}", e)))?;
            stream.log_on_drop(false);
            info!("Audio output stream opened");
            self.stream = Some(stream);
        }

        self.stream
            .as_ref()
            .ok_or_else(|| DeskError::Audio("Audio output stream unavailable".to_string()))
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }
}

impl Default for RodioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

impl MusicPlayer for RodioPlayer {
    fn play_looped(&mut self, path: &Path, volume: f32) -> DeskResult<()> {
        let file = File::open(path)
            .map_err(|e| DeskError::Audio(format!("Failed to open {:?}: {}", path, e)))?;
        let source = Decoder::new(BufReader::new(file))
            .map_err(|e| DeskError::Audio(format!("Failed to decode {:?}: {}", path, e)))?;

        if let Some(previous) = self.sink.take() {
            previous.stop();
        }

        self.volume = volume.clamp(0.0, 1.0);
        let sink = Sink::connect_new(self.output()?.mixer());
        sink.set_volume(self.volume);
        sink.append(source.repeat_infinite());
        sink.play();

        info!("Playing {:?} on loop at volume {:.2}", path, self.volume);
        self.sink = Some(sink);
        self.current_file = Some(path.to_path_buf());
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            debug!("Stopped {:?}", self.current_file);
        }
        self.current_file = None;
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
        debug!("Music volume set to {:.2}", self.volume);
    }
}
