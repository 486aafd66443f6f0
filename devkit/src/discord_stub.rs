/*!
Stub Discord REST API

Serves the three endpoints the watcher calls and records everything it
receives, so tests can assert on posted messages and registered commands.
Can be switched to fail every message post with a 500.
*/

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const STUB_APPLICATION_ID: &str = "424242";

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub channel_id: String,
    pub content: String,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommandRegistration {
    pub application_id: String,
    pub guild_id: String,
    pub commands: Value,
}

#[derive(Clone, Default)]
struct StubState {
    messages: Arc<Mutex<Vec<PostedMessage>>>,
    registrations: Arc<Mutex<Vec<CommandRegistration>>>,
    failing: Arc<AtomicBool>,
}

pub struct StubDiscordApi {
    addr: SocketAddr,
    state: StubState,
    server: JoinHandle<()>,
}

impl StubDiscordApi {
    pub async fn start() -> Result<Self> {
        let state = StubState::default();
        let app = Router::new()
            .route("/channels/{channel_id}/messages", post(post_message))
            .route("/oauth2/applications/@me", get(current_application))
            .route(
                "/applications/{application_id}/guilds/{guild_id}/commands",
                put(register_commands),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let server = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::warn!(error = %e, "stub discord api stopped");
            }
        });

        tracing::info!(%addr, "stub discord api listening");
        Ok(Self { addr, state, server })
    }

    /// Value for `DISCORD_API_BASE`.
    pub fn api_base(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn messages(&self) -> Vec<PostedMessage> {
        self.state.messages.lock().unwrap().clone()
    }

    pub fn registrations(&self) -> Vec<CommandRegistration> {
        self.state.registrations.lock().unwrap().clone()
    }

    /// While set, message posts answer 500 and are not recorded.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }
}

impl Drop for StubDiscordApi {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn post_message(
    State(state): State<StubState>,
    Path(channel_id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<Value>, StatusCode> {
    if state.failing.load(Ordering::SeqCst) {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    let content = body["content"].as_str().unwrap_or_default().to_string();
    let authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let mut messages = state.messages.lock().unwrap();
    messages.push(PostedMessage { channel_id: channel_id.clone(), content, authorization });
    Ok(Json(json!({ "id": messages.len().to_string(), "channel_id": channel_id })))
}

async fn current_application() -> Json<Value> {
    Json(json!({ "id": STUB_APPLICATION_ID, "name": "mcwatch-stub" }))
}

async fn register_commands(
    State(state): State<StubState>,
    Path((application_id, guild_id)): Path<(String, String)>,
    Json(commands): Json<Value>,
) -> Json<Value> {
    state.registrations.lock().unwrap().push(CommandRegistration {
        application_id,
        guild_id,
        commands: commands.clone(),
    });
    Json(commands)
}
