use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::config::RepliesConfig;
use crate::platform::telegram::Update;
use crate::platform::{IncomingMessage, MessageSender};

const START_COMMAND: &str = "/start";

/// Shared application state
pub struct AppState {
    sender: Arc<dyn MessageSender>,
    replies: RepliesConfig,
}

impl AppState {
    pub fn new(sender: Arc<dyn MessageSender>, replies: RepliesConfig) -> Self {
        Self { sender, replies }
    }
}

/// Pick the canned answer for a message text.
pub fn reply_for<'a>(text: Option<&str>, replies: &'a RepliesConfig) -> &'a str {
    if text == Some(START_COMMAND) {
        &replies.greeting
    } else {
        &replies.fallback
    }
}

/// Answer one incoming message. Returns `true` when a reply was sent.
pub async fn handle_update(state: &AppState, update: Update) -> Result<bool> {
    let incoming = match update.into_incoming() {
        Some(incoming) => incoming,
        None => {
            debug!("Update without a message, nothing to answer");
            return Ok(false);
        }
    };

    let IncomingMessage {
        platform,
        chat_id,
        text,
    } = incoming;

    info!(
        "{} message from chat {}: {}",
        platform,
        chat_id,
        text.as_deref().unwrap_or("<no text>")
    );

    let reply = reply_for(text.as_deref(), &state.replies);
    state.sender.send_message(&chat_id, reply).await?;

    Ok(true)
}

/// `POST /webhook`. Always 200: the platform only needs to know the update
/// arrived, and a non-2xx makes Telegram redeliver it.
async fn webhook(State(state): State<Arc<AppState>>, body: Bytes) -> StatusCode {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            debug!("Ignoring malformed update: {}", e);
            return StatusCode::OK;
        }
    };

    if let Err(e) = handle_update(&state, update).await {
        warn!("Failed to send reply: {:#}", e);
    }

    StatusCode::OK
}

async fn index() -> &'static str {
    "Hello, this is your Zoo-bot!"
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/webhook", post(webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the webhook on `listener` until `shutdown` resolves.
pub async fn run<F>(
    state: Arc<AppState>,
    listener: tokio::net::TcpListener,
    shutdown: F,
) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    info!("Webhook listening on {}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
