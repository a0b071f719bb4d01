pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hub;
pub mod location;
pub mod membership;
pub mod store;
pub mod transport;
pub mod web;

use std::sync::Arc;

use axum::{extract::FromRef, http::StatusCode, response::{IntoResponse, Response}};
use tokio_util::sync::CancellationToken;
use tracing::error;

use hub::SseHub;
use store::IdentityStore;
use web::Webhook;

pub use error::{Error, Result};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub store: Arc<dyn IdentityStore>,
    pub hub: Arc<SseHub>,
    pub webhook: Arc<Webhook>,
    pub shutdown: CancellationToken,
}

pub type AppResult<T> = std::result::Result<T, AppError>;

/// Handler failure. Logged in full, answered with a bare 500.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("request failed: {:#}", self.0);
        StatusCode::INTERNAL_SERVER_ERROR.into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
