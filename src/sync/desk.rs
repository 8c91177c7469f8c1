//! Desk state and action dispatch
//!
//! `Desk` owns every piece of mutable state: the indicator cache, the
//! streaming flag mirrored from OBS and the music volume. Only the sequencer
//! touches it, one event at a time.

use chrono::{Local, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::actions::{Action, ActionTable, SceneMap};
use crate::audio::{volume_from_control, MusicPlayer};
use crate::broadcast::{
    announcement_text, broadcast_link, open_in_browser, prepare_broadcast, write_announcement,
    BroadcastPlatform, BroadcastSettings,
};
use crate::error::{DeskError, DeskResult};
use crate::indicators::{IndicatorReflector, IndicatorState};
use crate::input::{DeskEvent, InputOrigin};
use crate::mixer::MixerClient;
use crate::obs::{ObsClient, ObsEvent};

/// Whether OBS is streaming, as last reported by OBS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamingState {
    #[default]
    Idle,
    Live,
}

impl StreamingState {
    pub fn is_live(&self) -> bool {
        matches!(self, StreamingState::Live)
    }
}

/// What going live does besides talking to the platform
#[derive(Debug, Clone, PartialEq)]
pub struct GoLiveSettings {
    /// OBS scene shown while the broadcast is being prepared
    pub preroll_scene: String,
    /// Mixer layout applied together with the pre-roll scene
    pub preroll_mixer_scene: String,
    pub broadcast: BroadcastSettings,
    pub open_browser: bool,
    pub announcement_path: PathBuf,
}

/// External systems the desk drives
pub struct DeskClients {
    pub obs: Arc<dyn ObsClient>,
    pub mixer: Arc<dyn MixerClient>,
    /// `None` when no broadcast platform is configured
    pub platform: Option<Arc<dyn BroadcastPlatform>>,
    pub music: Box<dyn MusicPlayer>,
}

/// Read-only view of the desk for the HTTP panel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeskSnapshot {
    pub streaming: bool,
    pub volume: f32,
    pub indicators: BTreeMap<u8, bool>,
}

pub struct Desk {
    table: Arc<ActionTable>,
    scenes: SceneMap,
    go_live: GoLiveSettings,
    clients: DeskClients,
    indicators: IndicatorReflector,
    streaming: StreamingState,
    volume: f32,
}

impl Desk {
    pub fn new(
        table: Arc<ActionTable>,
        scenes: SceneMap,
        go_live: GoLiveSettings,
        clients: DeskClients,
        mut indicators: IndicatorReflector,
    ) -> Self {
        // Every bound indicator starts dark until the remote state is known
        for (indicator, _) in table.scene_indicators() {
            indicators.set(indicator, false);
        }
        for indicator in table.music_indicators() {
            indicators.set(indicator, false);
        }
        for indicator in table.streaming_indicators() {
            indicators.set(indicator, false);
        }

        Self {
            table,
            scenes,
            go_live,
            clients,
            indicators,
            streaming: StreamingState::Idle,
            volume: 0.0,
        }
    }

    pub fn indicators(&self) -> &IndicatorState {
        self.indicators.state()
    }

    pub fn streaming(&self) -> StreamingState {
        self.streaming
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn snapshot(&self) -> DeskSnapshot {
        DeskSnapshot {
            streaming: self.streaming.is_live(),
            volume: self.volume,
            indicators: self.indicators.state().iter().collect(),
        }
    }

    /// Resolve an input event and run its actions, then release the adapter.
    /// Unbound hardware messages still repaint, since pads light themselves
    /// on press and release.
    pub async fn handle_event(&mut self, mut event: DeskEvent) {
        let table = self.table.clone();
        let actions = table.lookup_raw(&event.input);
        if actions.is_empty() {
            debug!("No actions for {} input {:?}", event.origin, event.input);
            if event.origin == InputOrigin::Hardware {
                self.indicators.refresh();
            }
        } else {
            debug!(
                "{} input {} -> {} action(s)",
                event.origin,
                event.input.trim(),
                actions.len()
            );
        }

        if let Err(e) = self
            .dispatch(actions, event.source_indicator, event.value)
            .await
        {
            error!("Failed to handle {}: {}", event.input.trim(), e);
        }
        event.complete();
    }

    /// Run `actions` in order, stopping at the first failure. The surface is
    /// repainted afterwards whether or not an action failed. An empty list
    /// does nothing at all.
    pub async fn dispatch(
        &mut self,
        actions: &[Action],
        source_indicator: Option<u8>,
        value: Option<u8>,
    ) -> DeskResult<()> {
        if actions.is_empty() {
            return Ok(());
        }

        let mut result = Ok(());
        for action in actions {
            if let Err(e) = self.execute(action, source_indicator, value).await {
                warn!("Action {} failed: {}", action, e);
                result = Err(e);
                break;
            }
        }

        self.indicators.refresh();
        result
    }

    async fn execute(
        &mut self,
        action: &Action,
        source_indicator: Option<u8>,
        value: Option<u8>,
    ) -> DeskResult<()> {
        match action {
            Action::ChangeScene { scene } => {
                self.clients.obs.set_scene(scene).await?;
                self.apply_scene(scene).await
            }
            Action::ChangeStreamingState => self.toggle_streaming().await,
            Action::PlayMusic { file } => {
                self.clients.music.play_looped(file, self.volume)?;
                for indicator in self.table.music_indicators() {
                    self.indicators.set(indicator, false);
                }
                if let Some(indicator) = source_indicator {
                    self.indicators.set(indicator, true);
                }
                Ok(())
            }
            Action::StopMusic => {
                self.clients.music.stop();
                Ok(())
            }
            Action::SetVolume => {
                match value {
                    Some(value) => {
                        self.volume = volume_from_control(value);
                        self.clients.music.set_volume(self.volume);
                    }
                    None => debug!("Volume change without a control value, skipping"),
                }
                Ok(())
            }
        }
    }

    /// Mirror a scene locally: mixer layout and scene indicators. OBS is not
    /// contacted. Scenes without a mixer layout leave the mixer untouched.
    async fn apply_scene(&mut self, name: &str) -> DeskResult<()> {
        debug!("Applying scene {}", name);
        if let Some(channels) = self.scenes.get(name) {
            for (channel, on) in channels.commands() {
                self.clients.mixer.set_channel_on(channel, on).await?;
            }
        }

        let bindings = self.table.scene_indicators();
        let selected: BTreeSet<u8> = bindings
            .iter()
            .filter(|(_, scene)| *scene == name)
            .map(|(indicator, _)| *indicator)
            .collect();
        for (indicator, _) in bindings {
            self.indicators.set(indicator, selected.contains(&indicator));
        }
        Ok(())
    }

    fn set_streaming(&mut self, state: StreamingState) {
        if self.streaming != state {
            info!("Streaming state {:?} -> {:?}", self.streaming, state);
        }
        self.streaming = state;
        for indicator in self.table.streaming_indicators() {
            self.indicators.set(indicator, state.is_live());
        }
    }

    /// Stop when live. Otherwise prepare the broadcast and start streaming.
    /// The cached state only changes when OBS reports it.
    async fn toggle_streaming(&mut self) -> DeskResult<()> {
        if self.streaming.is_live() {
            info!("Stopping stream");
            return self.clients.obs.stop_stream().await;
        }

        let platform = self.clients.platform.clone().ok_or_else(|| {
            DeskError::ConfigurationMissing("youtube credentials for going live".to_string())
        })?;

        info!("Going live");
        let preroll_scene = self.go_live.preroll_scene.clone();
        self.clients.obs.set_scene(&preroll_scene).await?;
        let preroll_mixer_scene = self.go_live.preroll_mixer_scene.clone();
        self.apply_scene(&preroll_mixer_scene).await?;

        let broadcast_id =
            prepare_broadcast(platform.as_ref(), &self.go_live.broadcast, Utc::now()).await?;
        let link = broadcast_link(&broadcast_id);
        info!("Broadcast ready at {}", link);

        if self.go_live.open_browser {
            if let Err(e) = open_in_browser(&link) {
                warn!("Failed to open {} in the browser: {}", link, e);
            }
        }

        self.clients.obs.start_stream().await?;

        let text = announcement_text(Local::now().naive_local(), &link);
        write_announcement(&self.go_live.announcement_path, &text)?;
        Ok(())
    }

    /// Pull the current scene and streaming status from OBS and repaint.
    /// Also warns about bound scenes that OBS does not have.
    pub async fn sync_from_remote(&mut self) -> DeskResult<()> {
        match self.clients.obs.scene_names().await {
            Ok(known) => {
                let mut expected: Vec<&str> = self.table.referenced_scenes();
                expected.push(&self.go_live.preroll_scene);
                for scene in expected {
                    if !known.iter().any(|k| k == scene) {
                        warn!("Scene '{}' is bound to a control but does not exist in OBS", scene);
                    }
                }
            }
            Err(e) => warn!("Failed to list OBS scenes: {}", e),
        }

        let result = self.pull_remote_state().await;
        self.indicators.refresh();
        result
    }

    async fn pull_remote_state(&mut self) -> DeskResult<()> {
        let scene = self.clients.obs.current_scene().await?;
        info!("OBS program scene is {}", scene);
        self.apply_scene(&scene).await?;

        let live = self.clients.obs.is_streaming().await?;
        self.set_streaming(if live {
            StreamingState::Live
        } else {
            StreamingState::Idle
        });
        Ok(())
    }

    /// React to a notification from OBS. Remote state always wins over the cache.
    pub async fn handle_obs_event(&mut self, event: ObsEvent) {
        debug!("OBS event {:?}", event);
        match event {
            ObsEvent::SceneChanged(scene) => {
                if let Err(e) = self.apply_scene(&scene).await {
                    warn!("Failed to apply scene {} from OBS: {}", scene, e);
                }
            }
            ObsEvent::StreamingStarted => self.set_streaming(StreamingState::Live),
            ObsEvent::StreamingStopped => self.set_streaming(StreamingState::Idle),
        }
        self.indicators.refresh();
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Harness;
    use super::*;
    use crate::broadcast::setup_testing::FakePlatform;
    use crate::input::InputOrigin;

    fn mixer_calls(calls: &[String]) -> Vec<&str> {
        calls
            .iter()
            .filter(|c| c.starts_with("mixer"))
            .map(String::as_str)
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_input_is_noop() {
        let mut h = Harness::new(FakePlatform::default());
        let before = h.desk.indicators().clone();

        let (event, done) = DeskEvent::command("note_on_99", InputOrigin::Keyboard).with_completion();
        h.desk.handle_event(event).await;
        done.await.unwrap();

        let (event, done) = DeskEvent::command("garbage", InputOrigin::Http).with_completion();
        h.desk.handle_event(event).await;
        done.await.unwrap();

        assert!(h.calls().is_empty());
        assert!(h.surface.sent.lock().unwrap().is_empty());
        assert_eq!(h.desk.indicators(), &before);
    }

    #[tokio::test]
    async fn test_padded_input_ids_are_noops() {
        let mut h = Harness::new(FakePlatform::default());
        for input in ["note_on_037", "note_on_+37", " note_on_037 "] {
            let (event, done) = DeskEvent::command(input, InputOrigin::Keyboard).with_completion();
            h.desk.handle_event(event).await;
            done.await.unwrap();
        }

        assert!(h.calls().is_empty());
        assert!(h.surface.sent.lock().unwrap().is_empty());
        assert_eq!(h.desk.indicators().get(37), Some(false));
    }

    #[tokio::test]
    async fn test_unbound_hardware_message_repaints() {
        let mut h = Harness::new(FakePlatform::default());
        h.desk.handle_obs_event(ObsEvent::StreamingStarted).await;
        h.clear();

        let (event, done) =
            DeskEvent::command("note_on_99", InputOrigin::Keyboard).with_completion();
        h.desk.handle_event(event).await;
        done.await.unwrap();
        assert!(h.surface.sent.lock().unwrap().is_empty());

        // Releasing the streaming pad is unbound but the pad LED must come back
        let mut release = DeskEvent::command("note_off_40", InputOrigin::Hardware);
        release.value = Some(0);
        release.source_indicator = Some(40);
        h.desk.handle_event(release).await;

        assert!(h.calls().is_empty());
        assert_eq!(h.surface.lit_on_surface(), vec![40]);
        assert_eq!(h.desk.indicators().lit(), vec![40]);
    }

    #[tokio::test]
    async fn test_change_scene_applies_mixer_and_indicators() {
        let mut h = Harness::new(FakePlatform::default());
        h.press("note_on_37", Some(100)).await.unwrap();

        let calls = h.calls();
        assert_eq!(calls[0], "obs scene solo");
        let mut expected = vec!["mixer 16 on".to_string()];
        for ch in [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 14, 15] {
            expected.push(format!("mixer {:02} off", ch));
        }
        assert_eq!(mixer_calls(&calls), expected);
        // Channel 13 is in neither set
        assert!(!calls.iter().any(|c| c.starts_with("mixer 13")));

        assert_eq!(h.desk.indicators().get(37), Some(true));
        assert_eq!(h.desk.indicators().get(36), Some(false));
        assert_eq!(h.desk.indicators().get(38), Some(false));
        assert_eq!(h.surface.lit_on_surface(), vec![37]);
    }

    #[tokio::test]
    async fn test_change_scene_is_idempotent() {
        let mut once = Harness::new(FakePlatform::default());
        once.press("note_on_37", None).await.unwrap();

        let mut twice = Harness::new(FakePlatform::default());
        twice.press("note_on_37", None).await.unwrap();
        twice.press("note_on_37", None).await.unwrap();

        assert_eq!(once.desk.indicators(), twice.desk.indicators());
        assert_eq!(once.surface.lit_on_surface(), twice.surface.lit_on_surface());

        // The second press leaves the mixer where the first one put it
        let once_calls = once.calls();
        let twice_calls = twice.calls();
        let once_mixer = mixer_calls(&once_calls);
        let twice_mixer = mixer_calls(&twice_calls);
        assert_eq!(once_mixer.len(), 15);
        assert_eq!(twice_mixer.len(), 30);
        assert_eq!(&twice_mixer[15..], &once_mixer[..]);
    }

    #[tokio::test]
    async fn test_remote_scene_matches_local_change() {
        let mut local = Harness::new(FakePlatform::default());
        local.press("note_on_36", None).await.unwrap();

        let mut remote = Harness::new(FakePlatform::default());
        remote
            .desk
            .handle_obs_event(ObsEvent::SceneChanged("predicator".to_string()))
            .await;

        assert_eq!(local.desk.indicators(), remote.desk.indicators());
        // The remote path never sets the scene back on OBS
        assert!(!remote.calls().iter().any(|c| c.starts_with("obs scene")));
        assert_eq!(
            mixer_calls(&remote.calls()),
            vec!["mixer 01 on", "mixer 02 on", "mixer 16 off"]
        );
    }

    #[tokio::test]
    async fn test_surface_matches_state_after_refresh() {
        let mut h = Harness::new(FakePlatform::default());
        h.press("note_on_38", None).await.unwrap();
        h.press("control_change_5", Some(3)).await.unwrap();
        h.desk.handle_obs_event(ObsEvent::StreamingStarted).await;

        assert_eq!(h.surface.lit_on_surface(), h.desk.indicators().lit());
        assert_eq!(h.desk.indicators().lit(), vec![5, 38, 40]);
    }

    #[tokio::test]
    async fn test_empty_actions_skip_refresh() {
        let mut h = Harness::new(FakePlatform::default());
        h.desk.dispatch(&[], Some(36), None).await.unwrap();
        assert!(h.surface.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_error_aborts_but_refreshes() {
        let mut h = Harness::new(FakePlatform::default());
        let err = h.press("note_on_39", None).await.unwrap_err();

        assert!(matches!(err, DeskError::RemoteCall { .. }));
        assert_eq!(h.calls(), vec!["obs scene broken"]);
        assert!(!h.surface.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_play_music_is_radio_button() {
        let mut h = Harness::new(FakePlatform::default());
        h.press("control_change_1", Some(127)).await.unwrap();
        h.press("control_change_5", Some(10)).await.unwrap();
        h.press("control_change_6", Some(10)).await.unwrap();

        assert_eq!(h.desk.indicators().get(5), Some(false));
        assert_eq!(h.desk.indicators().get(6), Some(true));
        assert_eq!(
            h.calls(),
            vec!["volume 1.00", "play song1.ogg 1.00", "play song2.ogg 1.00"]
        );
    }

    #[tokio::test]
    async fn test_play_music_from_keyboard_lights_nothing() {
        let mut h = Harness::new(FakePlatform::default());
        h.press("control_change_5", None).await.unwrap();

        let (event, done) =
            DeskEvent::command("control_change_6", InputOrigin::Keyboard).with_completion();
        h.desk.handle_event(event).await;
        done.await.unwrap();

        assert_eq!(h.desk.indicators().get(5), Some(false));
        assert_eq!(h.desk.indicators().get(6), Some(false));
    }

    #[tokio::test]
    async fn test_set_volume_without_value_is_skipped() {
        let mut h = Harness::new(FakePlatform::default());
        h.desk.dispatch(&[Action::SetVolume], None, None).await.unwrap();
        assert!(h.calls().is_empty());
        assert_eq!(h.desk.volume(), 0.0);

        h.press("control_change_1", Some(0)).await.unwrap();
        assert_eq!(h.desk.volume(), 0.0);
        h.press("control_change_1", Some(127)).await.unwrap();
        assert_eq!(h.desk.volume(), 1.0);
    }

    #[tokio::test]
    async fn test_go_live_reuses_single_active_broadcast() {
        let mut h = Harness::new(FakePlatform::with_active(&["live-1"]));
        h.press("note_on_40", None).await.unwrap();

        let calls = h.calls();
        assert_eq!(calls[0], "obs scene incepem in curand");
        assert_eq!(calls.last().unwrap(), "obs start");
        assert_eq!(mixer_calls(&calls).len(), 13);

        let platform = h.platform.calls();
        assert!(platform.contains(&"bind live-1 key-1".to_string()));
        assert!(!platform.iter().any(|c| c.starts_with("insert")));

        let message =
            std::fs::read_to_string(h.announcement.path().join("message.txt")).unwrap();
        assert!(message.ends_with(" \nhttps://youtu.be/live-1"));

        // The flag follows OBS, not the request
        assert_eq!(h.desk.streaming(), StreamingState::Idle);
        assert_eq!(h.desk.indicators().get(40), Some(false));
    }

    #[tokio::test]
    async fn test_go_live_with_two_active_broadcasts_fails() {
        let mut h = Harness::new(FakePlatform::with_active(&["live-1", "live-2"]));
        let err = h.press("note_on_40", None).await.unwrap_err();

        assert!(matches!(err, DeskError::MultipleActiveBroadcasts(2)));
        assert_eq!(h.platform.calls(), vec!["list upcoming", "list active"]);
        assert!(!h.calls().contains(&"obs start".to_string()));
        assert!(!h.announcement.path().join("message.txt").exists());
    }

    #[tokio::test]
    async fn test_go_live_bind_failure_stops_before_streaming() {
        let platform = FakePlatform {
            fail_bind: true,
            ..FakePlatform::with_active(&["live-1"])
        };
        let mut h = Harness::new(platform);
        let err = h.press("note_on_40", None).await.unwrap_err();

        match err {
            DeskError::BindFailed { broadcast_id, .. } => assert_eq!(broadcast_id, "live-1"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(!h.calls().contains(&"obs start".to_string()));
        assert!(!h.platform.calls().iter().any(|c| c.starts_with("playlist")));
        assert!(!h.announcement.path().join("message.txt").exists());

        // Pre-roll scene was applied and the surface still repainted
        assert_eq!(h.desk.indicators().get(38), Some(true));
        assert_eq!(h.surface.lit_on_surface(), vec![38]);
    }

    #[tokio::test]
    async fn test_streaming_toggle_when_live_only_stops() {
        let mut h = Harness::with_obs(FakePlatform::default(), "predicator", true);
        h.desk.sync_from_remote().await.unwrap();
        h.clear();

        h.press("note_on_40", None).await.unwrap();
        assert_eq!(h.calls(), vec!["obs stop"]);
        assert!(h.platform.calls().is_empty());
        assert_eq!(h.desk.streaming(), StreamingState::Live);

        h.desk.handle_obs_event(ObsEvent::StreamingStopped).await;
        assert_eq!(h.desk.streaming(), StreamingState::Idle);
        assert_eq!(h.desk.indicators().get(40), Some(false));
        assert_eq!(h.surface.lit_on_surface(), vec![36]);
    }

    #[tokio::test]
    async fn test_sync_from_remote() {
        let mut h = Harness::with_obs(FakePlatform::default(), "solo", true);
        h.desk.sync_from_remote().await.unwrap();

        assert_eq!(h.desk.streaming(), StreamingState::Live);
        assert_eq!(h.desk.indicators().lit(), vec![37, 40]);
        assert_eq!(h.surface.lit_on_surface(), vec![37, 40]);
        assert!(!h.calls().iter().any(|c| c.starts_with("obs scene")));
    }

    #[tokio::test]
    async fn test_snapshot() {
        let mut h = Harness::new(FakePlatform::default());
        h.press("note_on_36", None).await.unwrap();
        h.press("control_change_1", Some(127)).await.unwrap();

        let snapshot = h.desk.snapshot();
        assert!(!snapshot.streaming);
        assert_eq!(snapshot.volume, 1.0);
        assert_eq!(snapshot.indicators.get(&36), Some(&true));
        assert_eq!(snapshot.indicators.get(&37), Some(&false));
    }
}
