//! Get a broadcast ready before OBS starts streaming

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::{BroadcastPlatform, NewBroadcast};
use crate::error::{DeskError, DeskResult};

/// What a new broadcast looks like and where it goes
#[derive(Debug, Clone, PartialEq)]
pub struct BroadcastSettings {
    pub title: String,
    pub description: String,
    pub privacy_status: String,
    /// Id of the persistent ingestion stream OBS pushes to
    pub stream_key_id: String,
    pub playlist_id: Option<String>,
}

/// Delete stale upcoming broadcasts, reuse or create the live one, bind it to
/// the stream key and file it in the playlist. Returns the broadcast id.
///
/// Fails with [`DeskError::MultipleActiveBroadcasts`] before touching anything
/// else when more than one broadcast is active. A broadcast that cannot be
/// bound is left on the platform and reported through
/// [`DeskError::BindFailed`].
pub async fn prepare_broadcast(
    platform: &dyn BroadcastPlatform,
    settings: &BroadcastSettings,
    now: DateTime<Utc>,
) -> DeskResult<String> {
    for upcoming in platform.upcoming_broadcasts().await? {
        match platform.delete_broadcast(&upcoming.id).await {
            Ok(()) => info!("Deleted upcoming broadcast {} ({})", upcoming.id, upcoming.title),
            Err(e) => warn!("Failed to delete upcoming broadcast {}: {}", upcoming.id, e),
        }
    }

    let active = platform.active_broadcasts().await?;
    let broadcast_id = match active.as_slice() {
        [] => {
            let id = platform
                .insert_broadcast(&NewBroadcast {
                    title: settings.title.clone(),
                    description: settings.description.clone(),
                    scheduled_start: now,
                    privacy_status: settings.privacy_status.clone(),
                })
                .await?;
            info!("Inserted broadcast {}", id);
            id
        }
        [existing] => {
            info!("Reusing active broadcast {} ({})", existing.id, existing.title);
            existing.id.clone()
        }
        many => return Err(DeskError::MultipleActiveBroadcasts(many.len())),
    };

    if let Err(e) = platform
        .bind_broadcast(&broadcast_id, &settings.stream_key_id)
        .await
    {
        warn!(
            "Failed to bind broadcast {} to stream {}",
            broadcast_id, settings.stream_key_id
        );
        match platform.list_streams().await {
            Ok(streams) => {
                for stream in streams {
                    warn!("Available stream: {} ({})", stream.title, stream.id);
                }
            }
            Err(list_err) => warn!("Failed to list streams: {}", list_err),
        }
        return Err(DeskError::BindFailed {
            broadcast_id,
            source: e.into(),
        });
    }
    debug!("Bound broadcast {} to stream {}", broadcast_id, settings.stream_key_id);

    if let Some(playlist_id) = &settings.playlist_id {
        platform.add_to_playlist(playlist_id, &broadcast_id).await?;
        info!("Added broadcast {} to playlist {}", broadcast_id, playlist_id);
    }

    Ok(broadcast_id)
}


#[cfg(test)]
mod tests {
    use super::testing::{settings, FakePlatform};
    use super::*;
    use crate::broadcast::BroadcastSummary;

    #[tokio::test]
    async fn test_inserts_when_nothing_active() {
        let platform = FakePlatform::default();
        let id = prepare_broadcast(&platform, &settings(), Utc::now()).await.unwrap();

        assert_eq!(id, "new-broadcast");
        assert_eq!(
            platform.calls(),
            vec![
                "list upcoming",
                "list active",
                "insert Serviciu",
                "bind new-broadcast key-1",
                "playlist PL1 new-broadcast",
            ]
        );
    }

    #[tokio::test]
    async fn test_reuses_single_active_broadcast() {
        let platform = FakePlatform::with_active(&["live-1"]);
        let id = prepare_broadcast(&platform, &settings(), Utc::now()).await.unwrap();

        assert_eq!(id, "live-1");
        assert!(!platform.calls().iter().any(|c| c.starts_with("insert")));
        assert!(platform.calls().contains(&"bind live-1 key-1".to_string()));
    }

    #[tokio::test]
    async fn test_two_active_broadcasts_fail_before_mutation() {
        let platform = FakePlatform::with_active(&["live-1", "live-2"]);
        let err = prepare_broadcast(&platform, &settings(), Utc::now())
            .await
            .unwrap_err();

        assert!(matches!(err, DeskError::MultipleActiveBroadcasts(2)));
        assert_eq!(platform.calls(), vec!["list upcoming", "list active"]);
    }

    #[tokio::test]
    async fn test_deletes_upcoming_and_tolerates_failures() {
        let platform = FakePlatform {
            upcoming: vec![
                BroadcastSummary {
                    id: "undeletable".to_string(),
                    title: "Old".to_string(),
                },
                BroadcastSummary {
                    id: "stale".to_string(),
                    title: "Old".to_string(),
                },
            ],
            ..Default::default()
        };

        prepare_broadcast(&platform, &settings(), Utc::now()).await.unwrap();

        let calls = platform.calls();
        assert_eq!(calls[1], "delete undeletable");
        assert_eq!(calls[2], "delete stale");
    }

    #[tokio::test]
    async fn test_bind_failure_leaves_broadcast() {
        let platform = FakePlatform {
            fail_bind: true,
            ..Default::default()
        };

        let err = prepare_broadcast(&platform, &settings(), Utc::now())
            .await
            .unwrap_err();

        match err {
            DeskError::BindFailed { broadcast_id, .. } => assert_eq!(broadcast_id, "new-broadcast"),
            other => panic!("unexpected error {:?}", other),
        }
        let calls = platform.calls();
        assert_eq!(calls.last().unwrap(), "list streams");
        assert!(!calls.iter().any(|c| c.starts_with("delete new-broadcast")));
        assert!(!calls.iter().any(|c| c.starts_with("playlist")));
    }

    #[tokio::test]
    async fn test_playlist_optional() {
        let platform = FakePlatform::default();
        let mut settings = settings();
        settings.playlist_id = None;

        prepare_broadcast(&platform, &settings, Utc::now()).await.unwrap();
        assert!(!platform.calls().iter().any(|c| c.starts_with("playlist")));
    }
}
