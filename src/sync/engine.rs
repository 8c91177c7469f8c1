//! Sequencer
//!
//! One loop owns the [`Desk`] and handles, strictly one at a time, input
//! events from every adapter, notifications from OBS and engine commands.
//! Adapters only ever talk to it through channels.

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::desk::Desk;
use super::EngineCommand;
use crate::input::EventReceiver;
use crate::obs::ObsEvent;

pub struct SyncEngine {
    desk: Desk,
    cmd_rx: mpsc::Receiver<EngineCommand>,
    input_rx: EventReceiver,
    /// Taken out of the engine if OBS stops sending events
    obs_rx: Option<mpsc::UnboundedReceiver<ObsEvent>>,
}

impl SyncEngine {
    pub fn new(
        desk: Desk,
        cmd_rx: mpsc::Receiver<EngineCommand>,
        input_rx: EventReceiver,
        obs_rx: Option<mpsc::UnboundedReceiver<ObsEvent>>,
    ) -> Self {
        Self {
            desk,
            cmd_rx,
            input_rx,
            obs_rx,
        }
    }

    pub fn desk(&self) -> &Desk {
        &self.desk
    }

    /// Sync with OBS, then serve events until shutdown
    pub async fn run(&mut self) -> Result<()> {
        info!("Sync engine starting");

        if let Err(e) = self.desk.sync_from_remote().await {
            warn!("Initial sync with OBS failed: {}", e);
        }

        loop {
            let obs_rx = &mut self.obs_rx;
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(EngineCommand::Snapshot(reply)) => {
                            let _ = reply.send(self.desk.snapshot());
                        }
                        Some(EngineCommand::Shutdown) => {
                            info!("Shutdown command received");
                            break;
                        }
                        None => {
                            debug!("All command senders dropped");
                            break;
                        }
                    }
                }

                Some(event) = self.input_rx.recv() => {
                    self.desk.handle_event(event).await;
                }

                event = async {
                    match obs_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    match event {
                        Some(event) => self.desk.handle_obs_event(event).await,
                        None => {
                            warn!("OBS notifications stopped; the desk no longer follows remote changes");
                            self.obs_rx = None;
                        }
                    }
                }
            }
        }

        info!("Sync engine stopped");
        Ok(())
    }
}

/// Command channel for the engine
pub fn create_engine_channels() -> (mpsc::Sender<EngineCommand>, mpsc::Receiver<EngineCommand>) {
    mpsc::channel(32)
}
