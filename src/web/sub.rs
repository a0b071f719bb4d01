use std::{convert::Infallible, sync::Arc};

use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
};
use futures_util::{StreamExt, stream};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::hub::{HubFull, SseHub, channel_path};

/// Long-lived event stream of one subscription. Ends when the hub closes or
/// the service shuts down.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn stream(
    Path(secret): Path<String>,
    State(hub): State<Arc<SseHub>>,
    State(shutdown): State<CancellationToken>,
) -> Response {
    let listener = match hub.subscribe(&channel_path(&secret)) {
        Ok(listener) => listener,
        Err(HubFull { limit }) => {
            info!(limit, "subscriber refused, channel full");
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
    };

    // The listener lives in the stream state, so a disconnect releases it.
    let events = stream::unfold(listener, |mut listener| async move {
        loop {
            match listener.recv().await {
                Ok(payload) => {
                    let event = Event::default().data(payload);
                    return Some((Ok::<_, Infallible>(event), listener));
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "slow subscriber skipped events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    })
    .take_until(shutdown.cancelled_owned());

    Sse::new(events).keep_alive(KeepAlive::default()).into_response()
}
