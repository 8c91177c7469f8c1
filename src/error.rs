//! Errors surfaced by desk actions

use thiserror::Error;

/// External system a remote call went to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteSystem {
    Obs,
    Mixer,
    YouTube,
}

impl std::fmt::Display for RemoteSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteSystem::Obs => f.write_str("OBS"),
            RemoteSystem::Mixer => f.write_str("mixer"),
            RemoteSystem::YouTube => f.write_str("YouTube"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DeskError {
    /// Could not reach a remote system (only retried at startup)
    #[error("cannot connect to {system}: {message}")]
    RemoteConnection {
        system: RemoteSystem,
        message: String,
    },

    /// A remote request failed; the running dispatch is aborted
    #[error("{system} call failed: {source}")]
    RemoteCall {
        system: RemoteSystem,
        #[source]
        source: anyhow::Error,
    },

    #[error("missing configuration: {0}")]
    ConfigurationMissing(String),

    /// More than one live broadcast exists; someone has to close the extras by hand
    #[error("{0} active broadcasts found, expected at most one")]
    MultipleActiveBroadcasts(usize),

    /// Broadcast exists on YouTube but is not bound to the stream key.
    /// It is left in place for manual cleanup.
    #[error("broadcast {broadcast_id} was created but could not be bound to the stream: {source}")]
    BindFailed {
        broadcast_id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("audio playback failed: {0}")]
    Audio(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DeskError {
    pub fn obs(source: impl Into<anyhow::Error>) -> Self {
        DeskError::RemoteCall {
            system: RemoteSystem::Obs,
            source: source.into(),
        }
    }

    pub fn mixer(source: impl Into<anyhow::Error>) -> Self {
        DeskError::RemoteCall {
            system: RemoteSystem::Mixer,
            source: source.into(),
        }
    }

    pub fn youtube(source: impl Into<anyhow::Error>) -> Self {
        DeskError::RemoteCall {
            system: RemoteSystem::YouTube,
            source: source.into(),
        }
    }
}

pub type DeskResult<T> = Result<T, DeskError>;
