//! HTTP control panel
//!
//! A handful of GET routes for driving the desk from a phone or a browser
//! on the venue network. There is no authentication.

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::{DeskEvent, EventSender, InputBackend, InputOrigin};
use crate::actions::ActionTable;
use crate::sync::EngineCommand;

#[derive(Clone)]
pub struct PanelState {
    events: EventSender,
    commands: mpsc::Sender<EngineCommand>,
    table: Arc<ActionTable>,
    obs_web_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommandQuery {
    c: Option<String>,
}

pub fn build_router(state: PanelState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/obs", get(obs_web))
        .route("/advanced", get(advanced))
        .route("/command", get(command))
        .route("/state", get(snapshot))
        .with_state(state)
}

async fn index() -> Redirect {
    Redirect::to("/obs")
}

async fn obs_web(State(state): State<PanelState>) -> Redirect {
    match state.obs_web_url.as_deref() {
        Some(url) => Redirect::to(url),
        None => Redirect::to("/advanced"),
    }
}

async fn advanced(State(state): State<PanelState>) -> Html<String> {
    Html(render_advanced(&state.table))
}

/// Queue the command, wait until the desk has handled it, then go home
async fn command(State(state): State<PanelState>, Query(query): Query<CommandQuery>) -> Redirect {
    let Some(input) = query.c.filter(|c| !c.trim().is_empty()) else {
        return Redirect::to("/");
    };

    debug!("HTTP command {}", input);
    let (event, done) = DeskEvent::command(input, InputOrigin::Http).with_completion();
    if state.events.send(event).await.is_err() {
        error!("Desk is not running, dropping HTTP command");
        return Redirect::to("/");
    }
    let _ = done.await;

    Redirect::to("/")
}

async fn snapshot(State(state): State<PanelState>) -> Response {
    let (tx, rx) = oneshot::channel();
    if state.commands.send(EngineCommand::Snapshot(tx)).await.is_err() {
        return (StatusCode::SERVICE_UNAVAILABLE, "desk is not running").into_response();
    }

    match rx.await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "desk is not running").into_response(),
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn render_advanced(table: &ActionTable) -> String {
    let mut page = String::from(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width\">\
         <title>booth-control</title></head><body>\n<table>\n",
    );

    for (id, actions) in table.entries() {
        let description = actions
            .iter()
            .map(|action| escape(&action.to_string()))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            page,
            "<tr><td><a href=\"/command?c={id}\">{id}</a></td><td>{description}</td></tr>"
        );
    }

    page.push_str("</table>\n</body></html>\n");
    page
}

/// Serves the panel on a local address
pub struct HttpPanel {
    bind: SocketAddr,
    commands: mpsc::Sender<EngineCommand>,
    table: Arc<ActionTable>,
    obs_web_url: Option<String>,
}

impl HttpPanel {
    pub fn new(
        bind: SocketAddr,
        commands: mpsc::Sender<EngineCommand>,
        table: Arc<ActionTable>,
        obs_web_url: Option<String>,
    ) -> Self {
        Self {
            bind,
            commands,
            table,
            obs_web_url,
        }
    }
}

impl InputBackend for HttpPanel {
    fn start(&mut self, tx: EventSender) -> Result<()> {
        let listener = std::net::TcpListener::bind(self.bind)
            .with_context(|| format!("Failed to bind HTTP panel on {}", self.bind))?;
        listener
            .set_nonblocking(true)
            .context("Failed to configure HTTP listener")?;
        let listener = tokio::net::TcpListener::from_std(listener)
            .context("Failed to register HTTP listener")?;

        let app = build_router(PanelState {
            events: tx,
            commands: self.commands.clone(),
            table: self.table.clone(),
            obs_web_url: self.obs_web_url.clone(),
        });

        info!(addr = %self.bind, "HTTP panel listening");
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("HTTP panel stopped: {}", e);
            }
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::input::event_channel;
    use crate::sync::DeskSnapshot;
    use axum::body::Body;
    use axum::http::{header, Request};
    use std::collections::BTreeMap;
    use tower::ServiceExt;

    fn table() -> Arc<ActionTable> {
        let mut controls = BTreeMap::new();
        controls.insert("note_on_36".parse().unwrap(), vec![Action::scene("rugaciune")]);
        controls.insert("note_on_40".parse().unwrap(), vec![Action::ChangeStreamingState]);
        Arc::new(ActionTable::new(controls))
    }

    fn state(
        obs_web_url: Option<&str>,
    ) -> (PanelState, crate::input::EventReceiver, mpsc::Receiver<EngineCommand>) {
        let (events, event_rx) = event_channel();
        let (commands, command_rx) = mpsc::channel(4);
        let state = PanelState {
            events,
            commands,
            table: table(),
            obs_web_url: obs_web_url.map(str::to_string),
        };
        (state, event_rx, command_rx)
    }

    async fn get_path(router: Router, uri: &str) -> Response {
        router
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_root_redirects() {
        let (state, _events, _commands) = state(Some("http://obs.local:8080/"));
        let router = build_router(state);

        let response = get_path(router.clone(), "/").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/obs");

        let response = get_path(router, "/obs").await;
        assert_eq!(location(&response), "http://obs.local:8080/");
    }

    #[tokio::test]
    async fn test_obs_without_remote_goes_to_advanced() {
        let (state, _events, _commands) = state(None);
        let response = get_path(build_router(state), "/obs").await;
        assert_eq!(location(&response), "/advanced");
    }

    #[tokio::test]
    async fn test_command_waits_for_desk() {
        let (state, mut events, _commands) = state(None);
        let desk = tokio::spawn(async move {
            let mut event = events.recv().await.unwrap();
            let seen = (event.input.clone(), event.origin, event.value);
            event.complete();
            seen
        });

        let response = get_path(build_router(state), "/command?c=note_on_40").await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let (input, origin, value) = desk.await.unwrap();
        assert_eq!(input, "note_on_40");
        assert_eq!(origin, InputOrigin::Http);
        assert_eq!(value, None);
    }

    #[tokio::test]
    async fn test_command_without_id_is_noop() {
        let (state, mut events, _commands) = state(None);
        let response = get_path(build_router(state), "/command").await;
        assert_eq!(location(&response), "/");
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_advanced_lists_controls() {
        let (state, _events, _commands) = state(None);
        let response = get_path(build_router(state), "/advanced").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("<a href=\"/command?c=note_on_36\">note_on_36</a>"));
        assert!(body.contains("scene &#39;rugaciune&#39;"));
        assert!(body.contains("start/stop streaming"));
    }

    #[tokio::test]
    async fn test_state_snapshot() {
        let (state, _events, mut commands) = state(None);
        tokio::spawn(async move {
            if let Some(EngineCommand::Snapshot(reply)) = commands.recv().await {
                let mut indicators = BTreeMap::new();
                indicators.insert(36, true);
                indicators.insert(40, false);
                let _ = reply.send(DeskSnapshot {
                    streaming: true,
                    volume: 0.5,
                    indicators,
                });
            }
        });

        let response = get_path(build_router(state), "/state").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["streaming"], true);
        assert_eq!(json["volume"], 0.5);
        assert_eq!(json["indicators"]["36"], true);
        assert_eq!(json["indicators"]["40"], false);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }
}
