//! Action table: which domain actions a control triggers

mod input_id;
mod scene;

pub use input_id::*;
pub use scene::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One domain-level effect triggered by an input event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Action {
    /// Switch OBS to a scene and apply its mixer layout
    #[serde(rename = "change-obs-scene")]
    ChangeScene { scene: String },

    /// Start the broadcast sequence, or stop streaming when live
    #[serde(rename = "change-obs-streaming-state")]
    ChangeStreamingState,

    /// Loop a backing track
    #[serde(rename = "play-music")]
    PlayMusic { file: PathBuf },

    #[serde(rename = "stop-music")]
    StopMusic,

    /// Set the backing track volume from the control value (0-127)
    #[serde(rename = "set-music-volume")]
    SetVolume,
}

impl Action {
    pub fn scene(name: &str) -> Self {
        Action::ChangeScene {
            scene: name.to_string(),
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::ChangeScene { scene } => write!(f, "scene '{}'", scene),
            Action::ChangeStreamingState => f.write_str("start/stop streaming"),
            Action::PlayMusic { file } => write!(f, "play {}", file.display()),
            Action::StopMusic => f.write_str("stop music"),
            Action::SetVolume => f.write_str("music volume"),
        }
    }
}

/// Static mapping from input event to an ordered list of actions
#[derive(Debug, Clone, Default)]
pub struct ActionTable {
    controls: BTreeMap<InputEventId, Vec<Action>>,
}

impl ActionTable {
    pub fn new(controls: BTreeMap<InputEventId, Vec<Action>>) -> Self {
        Self { controls }
    }

    /// Actions bound to `id`, empty when the control is unmapped
    pub fn lookup(&self, id: &InputEventId) -> &[Action] {
        self.controls.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Lookup by raw text as typed on the keyboard or sent over HTTP.
    /// Text that is not a valid input id maps to nothing.
    pub fn lookup_raw(&self, raw: &str) -> &[Action] {
        match raw.trim().parse::<InputEventId>() {
            Ok(id) => self.lookup(&id),
            Err(_) => &[],
        }
    }

    /// Every binding in key order
    pub fn entries(&self) -> impl Iterator<Item = (&InputEventId, &[Action])> {
        self.controls.iter().map(|(id, actions)| (id, actions.as_slice()))
    }

    /// `(indicator, scene)` for every scene-select binding
    pub fn scene_indicators(&self) -> Vec<(u8, &str)> {
        self.entries()
            .flat_map(|(id, actions)| {
                actions.iter().filter_map(move |action| match action {
                    Action::ChangeScene { scene } => Some((id.indicator(), scene.as_str())),
                    _ => None,
                })
            })
            .collect()
    }

    /// Indicators of controls that start a backing track
    pub fn music_indicators(&self) -> Vec<u8> {
        self.indicators_where(|action| matches!(action, Action::PlayMusic { .. }))
    }

    /// Indicators of controls that toggle streaming
    pub fn streaming_indicators(&self) -> Vec<u8> {
        self.indicators_where(|action| matches!(action, Action::ChangeStreamingState))
    }

    /// Scene names referenced by any binding
    pub fn referenced_scenes(&self) -> Vec<&str> {
        let mut scenes: Vec<&str> = self.scene_indicators().into_iter().map(|(_, s)| s).collect();
        scenes.sort_unstable();
        scenes.dedup();
        scenes
    }

    fn indicators_where(&self, predicate: impl Fn(&Action) -> bool) -> Vec<u8> {
        let mut indicators: Vec<u8> = self
            .entries()
            .filter(|(_, actions)| actions.iter().any(&predicate))
            .map(|(id, _)| id.indicator())
            .collect();
        indicators.sort_unstable();
        indicators.dedup();
        indicators
    }
}
