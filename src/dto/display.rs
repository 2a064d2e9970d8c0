use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::DisplayPayload;

#[derive(Debug, Deserialize, ToSchema)]
pub struct ShowOrderRequest {
    pub order_id: Uuid,
}

/// Snapshot returned to display devices; the polling fallback when push
/// delivery was missed.
#[derive(Debug, Serialize, ToSchema)]
pub struct DisplaySnapshot {
    pub terminal_id: Uuid,
    pub terminal_label: String,
    /// "idle" or "show". An expired show row is reported as idle.
    pub state: String,
    pub payload: Option<DisplayPayload>,
    /// URL-fragment encoding of the payload for manual cross-device delivery.
    pub share_fragment: Option<String>,
}
