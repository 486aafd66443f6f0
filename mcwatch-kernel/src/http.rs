/**
 * HTTP SURFACE - liveness stub and `players` command endpoints
 *
 * ROUTES:
 * - GET  /               liveness stub for the hosting platform
 * - GET  /health         "ok"
 * - GET  /system/health  watcher counters (JSON)
 * - GET  /players        on-demand status, plain text
 * - POST /interactions   Discord HTTP interactions (PING + `players`)
 *
 * Every command route goes through `StatusQuery`; nothing here can touch
 * the change detector.
 */

use crate::discord::{verify_interaction, PLAYERS_COMMAND};
use crate::health::{WatchHealth, WatchHealthReport};
use crate::query::StatusQuery;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use ed25519_dalek::VerifyingKey;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

const PING: u8 = 1;
const APPLICATION_COMMAND: u8 = 2;
const PONG: u8 = 1;
const CHANNEL_MESSAGE_WITH_SOURCE: u8 = 4;

#[derive(Clone)]
pub struct AppState {
    pub query: StatusQuery,
    pub health: WatchHealth,
    /// `None` disables `/interactions`.
    pub interaction_key: Option<VerifyingKey>,
}

#[derive(Debug, Deserialize)]
struct Interaction {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    data: Option<InteractionData>,
}

#[derive(Debug, Deserialize)]
struct InteractionData {
    name: String,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Bot is running!" }))
        .route("/health", get(|| async { "ok" }))
        .route("/system/health", get(get_system_health))
        .route("/players", get(get_players))
        .route("/interactions", post(handle_interaction))
        .with_state(app_state)
}

// GET /system/health
async fn get_system_health(State(app): State<AppState>) -> Json<WatchHealthReport> {
    Json(app.health.report())
}

// GET /players
async fn get_players(State(app): State<AppState>) -> String {
    app.query.query_now().await
}

// POST /interactions
async fn handle_interaction(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, StatusCode> {
    let Some(key) = app.interaction_key.as_ref() else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).unwrap_or_default();
    if !verify_interaction(key, header("x-signature-ed25519"), header("x-signature-timestamp"), &body) {
        warn!("rejected interaction with bad signature");
        return Err(StatusCode::UNAUTHORIZED);
    }

    let interaction: Interaction = serde_json::from_slice(&body).map_err(|_| StatusCode::BAD_REQUEST)?;
    let command = interaction.data.as_ref().map(|d| d.name.as_str());
    match (interaction.kind, command) {
        (PING, _) => Ok(Json(json!({ "type": PONG }))),
        (APPLICATION_COMMAND, Some(PLAYERS_COMMAND)) => {
            debug!("players command received");
            let content = app.query.query_now().await;
            Ok(Json(json!({
                "type": CHANNEL_MESSAGE_WITH_SOURCE,
                "data": { "content": content }
            })))
        }
        _ => Err(StatusCode::BAD_REQUEST),
    }
}
