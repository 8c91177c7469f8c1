//! OBS WebSocket controller

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use obws::events::{Event, OutputState};
use obws::Client;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{ObsClient, ObsEvent};
use crate::config::ObsConfig;
use crate::error::{DeskError, DeskResult};

pub struct ObsController {
    client: Client,
}

impl ObsController {
    /// Connect to obs-websocket once
    pub async fn connect(config: &ObsConfig) -> Result<Self> {
        let client = Client::connect(&config.host, config.port, config.password.as_deref())
            .await
            .context("Failed to connect to OBS WebSocket")?;

        info!("Connected to OBS at {}:{}", config.host, config.port);
        Ok(Self { client })
    }

    /// Keep trying to connect, sleeping a fixed delay between attempts
    pub async fn connect_with_retry(config: &ObsConfig) -> Self {
        let delay = Duration::from_secs(config.retry_delay_secs);
        let mut attempt: u64 = 1;
        loop {
            match Self::connect(config).await {
                Ok(controller) => return controller,
                Err(e) => {
                    warn!(
                        "OBS connection attempt {} failed: {:#}. Retrying in {:?}",
                        attempt, e, delay
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Subscribe to OBS events and forward the relevant ones to a channel
    ///
    /// Spawns a background task that ends when OBS disconnects or the
    /// receiver is dropped.
    pub fn subscribe_events(&self) -> Result<mpsc::UnboundedReceiver<ObsEvent>> {
        let raw_events = self
            .client
            .events()
            .context("Failed to subscribe to OBS events")?;

        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            tokio::pin!(raw_events);

            while let Some(event) = raw_events.next().await {
                let obs_event = match event {
                    Event::CurrentProgramSceneChanged { id, .. } => {
                        Some(ObsEvent::SceneChanged(id.name))
                    }
                    Event::StreamStateChanged { state, .. } => match state {
                        OutputState::Started => Some(ObsEvent::StreamingStarted),
                        OutputState::Stopped => Some(ObsEvent::StreamingStopped),
                        other => {
                            debug!("Ignoring stream state {:?}", other);
                            None
                        }
                    },
                    _ => None,
                };

                if let Some(e) = obs_event {
                    if tx.send(e).is_err() {
                        break;
                    }
                }
            }

            warn!("OBS event stream ended");
        });

        Ok(rx)
    }
}

#[async_trait]
impl ObsClient for ObsController {
    async fn set_scene(&self, scene: &str) -> DeskResult<()> {
        self.client
            .scenes()
            .set_current_program_scene(scene)
            .await
            .map_err(DeskError::obs)?;
        debug!("Requested OBS scene {}", scene);
        Ok(())
    }

    async fn current_scene(&self) -> DeskResult<String> {
        let scene = self
            .client
            .scenes()
            .current_program_scene()
            .await
            .map_err(DeskError::obs)?;
        Ok(scene.id.name)
    }

    async fn scene_names(&self) -> DeskResult<Vec<String>> {
        let scenes = self.client.scenes().list().await.map_err(DeskError::obs)?;
        Ok(scenes.scenes.into_iter().map(|scene| scene.id.name).collect())
    }

    async fn is_streaming(&self) -> DeskResult<bool> {
        let status = self
            .client
            .streaming()
            .status()
            .await
            .map_err(DeskError::obs)?;
        Ok(status.active)
    }

    async fn start_stream(&self) -> DeskResult<()> {
        self.client
            .streaming()
            .start()
            .await
            .map_err(DeskError::obs)?;
        info!("Started OBS streaming");
        Ok(())
    }

    async fn stop_stream(&self) -> DeskResult<()> {
        self.client
            .streaming()
            .stop()
            .await
            .map_err(DeskError::obs)?;
        info!("Stopped OBS streaming");
        Ok(())
    }
}
