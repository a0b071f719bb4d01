use std::sync::Arc;

use axum::{
    body::Bytes,
    debug_handler,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use teloxide::types::Update;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::{dispatch::Batch, transport::map_update};

pub(crate) const SECRET_TOKEN_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Entry point of the webhook: checks where an update came from and queues
/// it for the dispatch loop.
pub struct Webhook {
    hook_id: String,
    secret_token: String,
    bot_name: String,
    tx: mpsc::Sender<Batch>,
}

impl Webhook {
    pub fn new(
        hook_id: impl Into<String>,
        secret_token: impl Into<String>,
        bot_name: impl Into<String>,
        tx: mpsc::Sender<Batch>,
    ) -> Self {
        Self {
            hook_id: hook_id.into(),
            secret_token: secret_token.into(),
            bot_name: bot_name.into(),
            tx,
        }
    }
}

#[debug_handler(state = crate::AppState)]
pub(crate) async fn receive(
    Path(hook_id): Path<String>,
    State(webhook): State<Arc<Webhook>>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    if hook_id != webhook.hook_id {
        return StatusCode::NOT_FOUND;
    }
    let token = headers
        .get(SECRET_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());
    if token != Some(webhook.secret_token.as_str()) {
        warn!("webhook call with a bad secret token");
        return StatusCode::UNAUTHORIZED;
    }

    // Acknowledge what we cannot read, or Telegram keeps redelivering it.
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("undecodable update: {e}");
            return StatusCode::OK;
        }
    };

    let batch = map_update(&update, &webhook.bot_name);
    if batch.is_empty() {
        debug!(update_id = update.id.0, "nothing to do for update");
        return StatusCode::OK;
    }

    match webhook.tx.send(batch).await {
        Ok(()) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
