//! Configuration management for booth-control
//!
//! Everything venue-specific lives in one TOML file: connection settings for
//! OBS, the mixer and YouTube, the scene to mixer-channel layouts and the
//! control bindings. The sample venue layout is written on first run.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::actions::{Action, ActionTable, InputEventId, SceneMap};
use crate::broadcast::BroadcastSettings;
use crate::sync::GoLiveSettings;

/// Sample venue configuration, written when no config file exists
pub const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

const ANNOUNCEMENT_FILE: &str = "whatsapp_message.txt";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub obs: ObsConfig,

    /// Control surface
    #[serde(default)]
    pub controller: ControllerConfig,

    #[serde(default)]
    pub mixer: MixerConfig,

    /// Web control panel
    #[serde(default)]
    pub http: HttpConfig,

    /// Going live
    #[serde(default)]
    pub stream: StreamConfig,

    #[serde(default)]
    pub youtube: YouTubeConfig,

    /// Scene name to mixer channel layout
    #[serde(default)]
    pub scenes: SceneMap,

    /// Input id to actions
    #[serde(default)]
    pub controls: BTreeMap<InputEventId, Vec<Action>>,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObsConfig {
    #[serde(default = "default_obs_host")]
    pub host: String,

    #[serde(default = "default_obs_port")]
    pub port: u16,

    pub password: Option<String>,

    /// Fixed delay between connection attempts at startup
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Substring matched against MIDI port names
    #[serde(default = "default_port_name")]
    pub port_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixerConfig {
    #[serde(default = "default_mixer_host")]
    pub host: String,

    #[serde(default = "default_mixer_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_http_bind")]
    pub bind: String,

    /// Target of the `/obs` redirect
    pub obs_web_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// OBS scene shown while the broadcast is prepared
    #[serde(default = "default_preroll_scene")]
    pub preroll_scene: String,

    /// Mixer layout applied with the pre-roll scene
    #[serde(default = "default_preroll_mixer_scene")]
    pub preroll_mixer_scene: String,

    /// Id of the persistent YouTube stream OBS sends to
    pub stream_key_id: Option<String>,

    #[serde(default = "default_title")]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(default = "default_privacy_status")]
    pub privacy_status: String,

    pub playlist_id: Option<String>,

    /// Open the watch link in the browser after the broadcast is ready
    #[serde(default = "default_true")]
    pub open_browser: bool,

    /// Defaults to a file in the data directory
    pub announcement_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YouTubeConfig {
    pub client_id: Option<String>,

    pub client_secret: Option<String>,

    pub refresh_token: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_token_url")]
    pub token_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("scene '{scene}' lists channel(s) {channels} as both on and off")]
    OverlappingChannels { scene: String, channels: String },

    #[error("control {control} switches to scene '{scene}', which has no entry in [scenes]")]
    UnknownScene { control: String, scene: String },

    #[error("stream.preroll_mixer_scene '{0}' has no entry in [scenes]")]
    UnknownPrerollScene(String),

    #[error("missing configuration: {0} (required by a start/stop streaming control)")]
    Missing(&'static str),
}

// Default value functions
fn default_obs_host() -> String {
    "127.0.0.1".to_string()
}

fn default_obs_port() -> u16 {
    4455
}

fn default_retry_delay() -> u64 {
    3
}

fn default_port_name() -> String {
    "LPD8".to_string()
}

fn default_mixer_host() -> String {
    "192.168.0.50".to_string()
}

fn default_mixer_port() -> u16 {
    10024
}

fn default_true() -> bool {
    true
}

fn default_http_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_preroll_scene() -> String {
    "incepem in curand".to_string()
}

fn default_preroll_mixer_scene() -> String {
    "sala".to_string()
}

fn default_title() -> String {
    "Serviciu divin".to_string()
}

fn default_privacy_status() -> String {
    "public".to_string()
}

fn default_api_base() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Default for ObsConfig {
    fn default() -> Self {
        Self {
            host: default_obs_host(),
            port: default_obs_port(),
            password: None,
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            port_name: default_port_name(),
        }
    }
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            host: default_mixer_host(),
            port: default_mixer_port(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: default_http_bind(),
            obs_web_url: None,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            preroll_scene: default_preroll_scene(),
            preroll_mixer_scene: default_preroll_mixer_scene(),
            stream_key_id: None,
            title: default_title(),
            description: String::new(),
            privacy_status: default_privacy_status(),
            playlist_id: None,
            open_browser: true,
            announcement_path: None,
        }
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            refresh_token: None,
            api_base: default_api_base(),
            token_url: default_token_url(),
        }
    }
}

impl YouTubeConfig {
    pub fn has_credentials(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some() && self.refresh_token.is_some()
    }
}

impl Config {
    /// Load configuration from `path`, or the default location when `None`.
    /// A missing file is created from the sample venue layout.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
            }
            std::fs::write(&config_path, DEFAULT_CONFIG)
                .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
            tracing::info!("Wrote sample configuration to {:?}", config_path);
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

        let mut config = Self::parse(&contents)
            .with_context(|| format!("Failed to parse config file: {:?}", config_path))?;

        config.config_path = Some(config_path);
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Get the config file path
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Get default config path
    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("dev", "booth-control", "desk")
            .context("Failed to determine config directory")?;

        Ok(proj_dirs.config_dir().join("config.toml"))
    }

    /// Check the bindings and layouts against each other
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (scene, channels) in &self.scenes {
            let overlap = channels.overlap();
            if !overlap.is_empty() {
                return Err(ValidationError::OverlappingChannels {
                    scene: scene.clone(),
                    channels: overlap
                        .iter()
                        .map(|c| c.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }
        }

        let mut streams = false;
        for (control, actions) in &self.controls {
            for action in actions {
                match action {
                    Action::ChangeScene { scene } if !self.scenes.contains_key(scene) => {
                        return Err(ValidationError::UnknownScene {
                            control: control.to_string(),
                            scene: scene.clone(),
                        });
                    }
                    Action::ChangeStreamingState => streams = true,
                    _ => {}
                }
            }
        }

        if !self.scenes.contains_key(&self.stream.preroll_mixer_scene) {
            return Err(ValidationError::UnknownPrerollScene(
                self.stream.preroll_mixer_scene.clone(),
            ));
        }

        if streams {
            if self.stream.stream_key_id.is_none() {
                return Err(ValidationError::Missing("stream.stream_key_id"));
            }
            if self.youtube.client_id.is_none() {
                return Err(ValidationError::Missing("youtube.client_id"));
            }
            if self.youtube.client_secret.is_none() {
                return Err(ValidationError::Missing("youtube.client_secret"));
            }
            if self.youtube.refresh_token.is_none() {
                return Err(ValidationError::Missing("youtube.refresh_token"));
            }
        }

        Ok(())
    }

    pub fn action_table(&self) -> ActionTable {
        ActionTable::new(self.controls.clone())
    }

    pub fn mixer_addr(&self) -> Result<SocketAddr> {
        resolve(&self.mixer.host, self.mixer.port)
    }

    pub fn http_addr(&self) -> Result<SocketAddr> {
        self.http
            .bind
            .parse()
            .with_context(|| format!("Invalid http.bind address: {}", self.http.bind))
    }

    /// Where the going-live announcement is written
    pub fn announcement_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.stream.announcement_path {
            return Ok(path.clone());
        }
        let proj_dirs = directories::ProjectDirs::from("dev", "booth-control", "desk")
            .context("Failed to determine data directory")?;
        Ok(proj_dirs.data_dir().join(ANNOUNCEMENT_FILE))
    }

    pub fn go_live_settings(&self) -> Result<GoLiveSettings> {
        Ok(GoLiveSettings {
            preroll_scene: self.stream.preroll_scene.clone(),
            preroll_mixer_scene: self.stream.preroll_mixer_scene.clone(),
            broadcast: BroadcastSettings {
                title: self.stream.title.clone(),
                description: self.stream.description.clone(),
                privacy_status: self.stream.privacy_status.clone(),
                stream_key_id: self.stream.stream_key_id.clone().unwrap_or_default(),
                playlist_id: self.stream.playlist_id.clone(),
            },
            open_browser: self.stream.open_browser,
            announcement_path: self.announcement_path()?,
        })
    }
}

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()
        .with_context(|| format!("Failed to resolve {}:{}", host, port))?
        .next()
        .with_context(|| format!("No address for {}:{}", host, port))
}
