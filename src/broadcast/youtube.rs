//! YouTube Data API v3 client
//!
//! Only the refresh-token grant is implemented. The refresh token is obtained
//! once, out of band, and stored in the config file.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::{BroadcastPlatform, BroadcastSummary, LiveStreamSummary, NewBroadcast};
use crate::config::YouTubeConfig;
use crate::error::{DeskError, DeskResult};

/// Refresh the access token this long before it expires
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

const STREAMS_PAGE_SIZE: &str = "50";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct ListResponse<T> {
    #[serde(default)]
    items: Vec<T>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Snippet {
    #[serde(default)]
    title: String,
}

#[derive(Debug, Deserialize)]
struct Resource {
    id: String,
    #[serde(default)]
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct Inserted {
    id: String,
}

pub struct YouTubeClient {
    http: Client,
    config: YouTubeConfig,
    token: Mutex<Option<AccessToken>>,
}

impl YouTubeClient {
    pub fn new(config: YouTubeConfig) -> Self {
        Self {
            http: Client::new(),
            config,
            token: Mutex::new(None),
        }
    }

    /// Current access token, refreshed when missing or about to expire
    async fn access_token(&self) -> Result<String> {
        let mut token = self.token.lock().await;
        if let Some(current) = token.as_ref() {
            if Instant::now() + TOKEN_EXPIRY_MARGIN < current.expires_at {
                return Ok(current.value.clone());
            }
        }

        let refresh_token = self
            .config
            .refresh_token
            .as_deref()
            .context("youtube.refresh_token is not configured")?;
        let client_id = self
            .config
            .client_id
            .as_deref()
            .context("youtube.client_id is not configured")?;
        let client_secret = self
            .config
            .client_secret
            .as_deref()
            .context("youtube.client_secret is not configured")?;

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .context("Failed to request access token")?;
        let refreshed: TokenResponse = check(response)
            .await?
            .json()
            .await
            .context("Failed to parse token response")?;

        debug!("Refreshed YouTube access token (expires in {}s)", refreshed.expires_in);
        let value = refreshed.access_token.clone();
        *token = Some(AccessToken {
            value: refreshed.access_token,
            expires_at: Instant::now() + Duration::from_secs(refreshed.expires_in),
        });
        Ok(value)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_base.trim_end_matches('/'), path)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .context("YouTube request failed")?;
        check(response).await
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        self.send(request)
            .await?
            .json()
            .await
            .context("Failed to parse YouTube response")
    }

    async fn broadcasts_with_status(&self, status: &str) -> Result<Vec<BroadcastSummary>> {
        let request = self
            .http
            .get(self.url("liveBroadcasts"))
            .query(&[("part", "id,snippet"), ("broadcastStatus", status)]);
        let list: ListResponse<Resource> = self.send_json(request).await?;

        Ok(list
            .items
            .into_iter()
            .map(|item| BroadcastSummary {
                id: item.id,
                title: item.snippet.title,
            })
            .collect())
    }
}

/// Turn an error status into an error carrying the response body
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().clone();
    let body = response.text().await.unwrap_or_default();
    Err(anyhow!("{} returned {}: {}", url.path(), status, body.trim()))
}

#[async_trait]
impl BroadcastPlatform for YouTubeClient {
    async fn upcoming_broadcasts(&self) -> DeskResult<Vec<BroadcastSummary>> {
        self.broadcasts_with_status("upcoming")
            .await
            .map_err(DeskError::youtube)
    }

    async fn active_broadcasts(&self) -> DeskResult<Vec<BroadcastSummary>> {
        self.broadcasts_with_status("active")
            .await
            .map_err(DeskError::youtube)
    }

    async fn delete_broadcast(&self, broadcast_id: &str) -> DeskResult<()> {
        let request = self
            .http
            .delete(self.url("liveBroadcasts"))
            .query(&[("id", broadcast_id)]);
        self.send(request).await.map_err(DeskError::youtube)?;
        Ok(())
    }

    async fn insert_broadcast(&self, broadcast: &NewBroadcast) -> DeskResult<String> {
        let body = json!({
            "snippet": {
                "title": broadcast.title,
                "description": broadcast.description,
                "scheduledStartTime": broadcast.scheduled_start.to_rfc3339(),
            },
            "status": {
                "privacyStatus": broadcast.privacy_status,
                "selfDeclaredMadeForKids": false,
            },
            "contentDetails": {
                "enableAutoStart": true,
                "enableAutoStop": true,
            },
        });
        let request = self
            .http
            .post(self.url("liveBroadcasts"))
            .query(&[("part", "snippet,status,contentDetails")])
            .json(&body);

        let inserted: Inserted = self.send_json(request).await.map_err(DeskError::youtube)?;
        Ok(inserted.id)
    }

    async fn bind_broadcast(&self, broadcast_id: &str, stream_id: &str) -> DeskResult<()> {
        let request = self.http.post(self.url("liveBroadcasts/bind")).query(&[
            ("part", "id,contentDetails"),
            ("id", broadcast_id),
            ("streamId", stream_id),
        ]);
        self.send(request).await.map_err(DeskError::youtube)?;
        Ok(())
    }

    async fn list_streams(&self) -> DeskResult<Vec<LiveStreamSummary>> {
        let mut streams = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.http.get(self.url("liveStreams")).query(&[
                ("part", "id,snippet"),
                ("mine", "true"),
                ("maxResults", STREAMS_PAGE_SIZE),
            ]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let page: ListResponse<Resource> =
                self.send_json(request).await.map_err(DeskError::youtube)?;
            streams.extend(page.items.into_iter().map(|item| LiveStreamSummary {
                id: item.id,
                title: item.snippet.title,
            }));

            match page.next_page_token {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        Ok(streams)
    }

    async fn add_to_playlist(&self, playlist_id: &str, video_id: &str) -> DeskResult<()> {
        let body = json!({
            "snippet": {
                "playlistId": playlist_id,
                "resourceId": {
                    "kind": "youtube#video",
                    "videoId": video_id,
                },
            },
        });
        let request = self
            .http
            .post(self.url("playlistItems"))
            .query(&[("part", "snippet")])
            .json(&body);
        self.send(request).await.map_err(DeskError::youtube)?;
        Ok(())
    }
}
