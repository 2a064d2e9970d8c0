use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Order, OrderItem, Payment};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct OrderItemInput {
    pub catalog_item_id: Option<Uuid>,
    pub name: String,
    /// Unit price in minor currency units (cents).
    pub unit_price_cents: i64,
    pub quantity: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateOrderRequest {
    /// Total in minor units. Ignored when `items` is non-empty; the total is
    /// then derived from the items.
    pub amount_cents: Option<i64>,
    pub items: Option<Vec<OrderItemInput>>,
    pub terminal_id: Option<Uuid>,
    pub reference: Option<String>,
    pub idempotency_key: Option<String>,
    /// Pre-rendered PayNow EMV text, passed through to displays.
    pub qr_code: Option<String>,
    /// Pre-rendered QR image (data URL), stored with the order.
    pub qr_image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatedOrder {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
    /// True when an idempotency key matched a prior order and no new row was
    /// created.
    pub duplicate: bool,
    /// Non-fatal degradations (item inserts, display sync) that did not fail
    /// the creation.
    pub warnings: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkPaidRequest {
    pub note: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderWithItems {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderList {
    pub items: Vec<Order>,
}
