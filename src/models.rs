use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Paid,
    Canceled,
    Expired,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Canceled => "canceled",
            OrderStatus::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "paid" => Some(OrderStatus::Paid),
            "canceled" => Some(OrderStatus::Canceled),
            "expired" => Some(OrderStatus::Expired),
            _ => None,
        }
    }

    /// Only `pending` accepts further transitions.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Order {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub terminal_id: Option<Uuid>,
    pub reference: String,
    pub total_amount: i64,
    pub status: OrderStatus,
    pub qr_code: Option<String>,
    pub qr_image: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub catalog_item_id: Option<Uuid>,
    pub name: String,
    pub unit_price: i64,
    pub quantity: i32,
    pub line_total: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub amount: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// What a terminal should currently render: the whole payload travels on
/// every channel (durable row, push, cache, URL fragment) so any one of
/// them alone is enough to draw the screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DisplayPayload {
    pub order_id: Uuid,
    pub amount: i64,
    pub reference: String,
    pub qr_code: Option<String>,
    pub expires_at: DateTime<Utc>,
    /// Recency stamp used by subscribers to discard out-of-order deliveries.
    pub updated_at: DateTime<Utc>,
}

impl DisplayPayload {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Message pushed on the realtime channel and mirrored into the fast-path
/// cache. A hide carries only its issue time: clears are always applied
/// (a clear may win over a stale show), and `at` advances the subscriber's
/// recency watermark so shows older than the clear stay discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DisplayEvent {
    ShowQr(DisplayPayload),
    HideQr { at: DateTime<Utc> },
}
