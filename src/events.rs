use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{db::DbPool, error::AppResult};

/// Append one row to the broadcast event log. Callers treat this as
/// fire-and-forget; the terminal_displays row stays authoritative.
pub async fn append_event(
    pool: &DbPool,
    tenant_id: Uuid,
    terminal_id: Uuid,
    event_type: &str,
    order_id: Option<Uuid>,
    payload: Option<Value>,
    expires_at: Option<DateTime<Utc>>,
) -> AppResult<()> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO broadcast_events (id, tenant_id, terminal_id, event_type, order_id, payload, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(id)
    .bind(tenant_id)
    .bind(terminal_id)
    .bind(event_type)
    .bind(order_id)
    .bind(payload)
    .bind(expires_at)
    .execute(pool)
    .await?;

    Ok(())
}
