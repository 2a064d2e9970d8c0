use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};

use crate::{
    dto::display::DisplaySnapshot,
    error::AppResult,
    response::ApiResponse,
    services::display_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/{device_key}", get(snapshot))
}

// Display devices authenticate with their device key, not a tenant token:
// the key resolves to exactly one terminal and leaks nothing else.
#[utoipa::path(get, path = "/display/{device_key}", tag = "Display")]
pub async fn snapshot(
    State(state): State<AppState>,
    Path(device_key): Path<String>,
) -> AppResult<Json<ApiResponse<DisplaySnapshot>>> {
    display_service::snapshot_by_device_key(&state, &device_key)
        .await
        .map(Json)
}
