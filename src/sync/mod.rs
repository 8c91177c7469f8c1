//! Synchronization engine - the desk state and the loop that drives it

pub mod desk;
mod engine;

pub use desk::{Desk, DeskClients, DeskSnapshot, GoLiveSettings, StreamingState};
pub use engine::{create_engine_channels, SyncEngine};

use tokio::sync::oneshot;

/// Commands that can be sent to the sync engine
#[derive(Debug)]
pub enum EngineCommand {
    /// Reply with the current desk state
    Snapshot(oneshot::Sender<DeskSnapshot>),
    /// Shutdown the engine
    Shutdown,
}
