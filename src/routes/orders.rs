use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, CreatedOrder, MarkPaidRequest, OrderList, OrderWithItems},
    error::AppResult,
    middleware::auth::AuthTenant,
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::order_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_order).get(list_orders))
        .route("/{id}", get(get_order))
        .route("/{id}/pay", post(pay_order))
        .route("/{id}/cancel", post(cancel_order))
}

#[utoipa::path(post, path = "/orders", tag = "Orders")]
pub async fn create_order(
    State(state): State<AppState>,
    tenant: AuthTenant,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<Json<ApiResponse<CreatedOrder>>> {
    order_service::create_order(&state, &tenant, payload)
        .await
        .map(Json)
}

#[utoipa::path(get, path = "/orders", tag = "Orders")]
pub async fn list_orders(
    State(state): State<AppState>,
    tenant: AuthTenant,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    order_service::list_orders(&state, &tenant, query)
        .await
        .map(Json)
}

#[utoipa::path(get, path = "/orders/{id}", tag = "Orders")]
pub async fn get_order(
    State(state): State<AppState>,
    tenant: AuthTenant,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    order_service::get_order(&state, &tenant, id).await.map(Json)
}

#[utoipa::path(post, path = "/orders/{id}/pay", tag = "Orders")]
pub async fn pay_order(
    State(state): State<AppState>,
    tenant: AuthTenant,
    Path(id): Path<Uuid>,
    Json(payload): Json<MarkPaidRequest>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    order_service::mark_paid(&state, &tenant, id, payload)
        .await
        .map(Json)
}

#[utoipa::path(post, path = "/orders/{id}/cancel", tag = "Orders")]
pub async fn cancel_order(
    State(state): State<AppState>,
    tenant: AuthTenant,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    order_service::cancel_order(&state, &tenant, id)
        .await
        .map(Json)
}
