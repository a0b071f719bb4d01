use std::sync::Arc;

use axum::{
    debug_handler,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};

use crate::{AppResult, store::IdentityStore};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn picture(
    Path(handle): Path<String>,
    State(store): State<Arc<dyn IdentityStore>>,
) -> AppResult<Response> {
    let Some(profile) = store.profile_by_handle(&handle).await? else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };

    Ok(([(header::CONTENT_TYPE, "image/jpeg")], profile.picture).into_response())
}
