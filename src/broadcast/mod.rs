//! Live broadcast lifecycle on the streaming platform

mod announcement;
mod setup;
mod youtube;

pub use announcement::{announcement_text, weekday_label, write_announcement};
pub use setup::{prepare_broadcast, BroadcastSettings};
pub use youtube::YouTubeClient;

#[cfg(test)]
pub(crate) use setup::testing as setup_testing;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DeskResult;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSummary {
    pub id: String,
    pub title: String,
}

/// An ingestion stream on the account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveStreamSummary {
    pub id: String,
    pub title: String,
}

/// Parameters for a freshly inserted broadcast
#[derive(Debug, Clone, PartialEq)]
pub struct NewBroadcast {
    pub title: String,
    pub description: String,
    pub scheduled_start: DateTime<Utc>,
    pub privacy_status: String,
}

/// Broadcast operations used when going live
#[async_trait]
pub trait BroadcastPlatform: Send + Sync {
    async fn upcoming_broadcasts(&self) -> DeskResult<Vec<BroadcastSummary>>;

    async fn active_broadcasts(&self) -> DeskResult<Vec<BroadcastSummary>>;

    async fn delete_broadcast(&self, broadcast_id: &str) -> DeskResult<()>;

    /// Insert a broadcast with auto start/stop enabled, returning its id
    async fn insert_broadcast(&self, broadcast: &NewBroadcast) -> DeskResult<String>;

    async fn bind_broadcast(&self, broadcast_id: &str, stream_id: &str) -> DeskResult<()>;

    async fn list_streams(&self) -> DeskResult<Vec<LiveStreamSummary>>;

    async fn add_to_playlist(&self, playlist_id: &str, video_id: &str) -> DeskResult<()>;
}

/// Public watch link for a broadcast
pub fn broadcast_link(broadcast_id: &str) -> String {
    format!("https://youtu.be/{}", broadcast_id)
}

/// Platform command that opens `url` in the default browser
fn browser_command(url: &str) -> tokio::process::Command {
    #[cfg(target_os = "macos")]
    let command = {
        let mut command = tokio::process::Command::new("open");
        command.arg(url);
        command
    };

    #[cfg(target_os = "windows")]
    let command = {
        let mut command = tokio::process::Command::new("cmd");
        command.args(["/C", "start", "", url]);
        command
    };

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let command = {
        let mut command = tokio::process::Command::new("xdg-open");
        command.arg(url);
        command
    };

    command
}

/// Open a link in the default browser without waiting for it. The child is
/// reaped by the runtime once it exits. Must be called inside a tokio runtime.
pub fn open_in_browser(url: &str) -> std::io::Result<()> {
    browser_command(url).spawn()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_link() {
        assert_eq!(broadcast_link("abc123"), "https://youtu.be/abc123");
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_browser_command() {
        let command = browser_command("https://youtu.be/abc123");
        let command = command.as_std();
        assert_eq!(command.get_program(), "xdg-open");
        assert_eq!(
            command.get_args().collect::<Vec<_>>(),
            vec!["https://youtu.be/abc123"]
        );
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn test_spawned_child_is_reaped() {
        // Same spawn-and-drop path as open_in_browser, with a command that
        // exits at once
        let mut command = tokio::process::Command::new("true");
        let child = command.spawn().unwrap();
        let pid = child.id().unwrap();
        drop(child);

        let stat = format!("/proc/{}/stat", pid);
        let mut reaped = false;
        for _ in 0..100 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            // Give the orphan queue a chance to run on the next spawn
            let _ = tokio::process::Command::new("true").status().await;
            if !std::path::Path::new(&stat).exists() {
                reaped = true;
                break;
            }
        }
        assert!(reaped, "child {} left as a zombie", pid);
    }
}
