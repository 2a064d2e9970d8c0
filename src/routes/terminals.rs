use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use uuid::Uuid;

use crate::{
    dto::display::{DisplaySnapshot, ShowOrderRequest},
    error::AppResult,
    middleware::auth::AuthTenant,
    response::ApiResponse,
    services::display_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{terminal_id}/show", post(show_order))
        .route("/{terminal_id}/clear", post(clear_terminal))
}

#[utoipa::path(post, path = "/terminals/{terminal_id}/show", tag = "Terminals")]
pub async fn show_order(
    State(state): State<AppState>,
    tenant: AuthTenant,
    Path(terminal_id): Path<Uuid>,
    Json(payload): Json<ShowOrderRequest>,
) -> AppResult<Json<ApiResponse<DisplaySnapshot>>> {
    display_service::show_order(&state, &tenant, terminal_id, payload.order_id)
        .await
        .map(Json)
}

#[utoipa::path(post, path = "/terminals/{terminal_id}/clear", tag = "Terminals")]
pub async fn clear_terminal(
    State(state): State<AppState>,
    tenant: AuthTenant,
    Path(terminal_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DisplaySnapshot>>> {
    display_service::clear_terminal(&state, &tenant, terminal_id)
        .await
        .map(Json)
}
