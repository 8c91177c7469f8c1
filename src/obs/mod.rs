//! OBS Studio integration

mod controller;

pub use controller::ObsController;

use async_trait::async_trait;

use crate::error::DeskResult;

/// Remote notification relevant to the desk
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObsEvent {
    /// Program scene changed, from any client
    SceneChanged(String),
    StreamingStarted,
    StreamingStopped,
}

/// The OBS operations the desk needs
#[async_trait]
pub trait ObsClient: Send + Sync {
    async fn set_scene(&self, scene: &str) -> DeskResult<()>;

    async fn current_scene(&self) -> DeskResult<String>;

    /// Names of all scenes in the active scene collection
    async fn scene_names(&self) -> DeskResult<Vec<String>>;

    async fn is_streaming(&self) -> DeskResult<bool>;

    async fn start_stream(&self) -> DeskResult<()>;

    async fn stop_stream(&self) -> DeskResult<()>;
}
