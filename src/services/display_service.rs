//! Terminal display state and broadcast fanout.
//!
//! Per terminal this is a two-state machine, `idle` ⇄ `show`. Every
//! transition is pushed through a layered set of sinks: the durable
//! terminal_displays row (truth), the broadcast event log (catch-up /
//! debugging), the realtime hub (low latency), and the fast-path cache
//! (same-process consumers). Only the durable write can fail a caller;
//! every other sink is fire-and-forget.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

use crate::{
    dto::display::DisplaySnapshot,
    entity::{
        orders::{Column as OrderCol, Entity as Orders, Model as OrderModel},
        terminal_displays::{
            ActiveModel as DisplayActive, Column as DisplayCol, Entity as TerminalDisplays,
            Model as DisplayModel,
        },
        terminals::{Column as TerminalCol, Entity as Terminals, Model as TerminalModel},
    },
    error::{AppError, AppResult},
    events,
    middleware::auth::AuthTenant,
    models::{DisplayEvent, DisplayPayload, OrderStatus},
    realtime::display_topic,
    response::{ApiResponse, Meta},
    services::order_service,
    state::AppState,
};

pub const STATE_IDLE: &str = "idle";
pub const STATE_SHOW: &str = "show";

/// Build the display payload for an order. The recency stamp is set here;
/// `broadcast_show` re-stamps it after the force-clear so the new show always
/// postdates the clear it follows.
pub fn payload_from_order(order: &OrderModel) -> DisplayPayload {
    DisplayPayload {
        order_id: order.id,
        amount: order.total_amount,
        reference: order.reference.clone(),
        qr_code: order.qr_code.clone(),
        expires_at: order.expires_at.with_timezone(&Utc),
        updated_at: Utc::now(),
    }
}

/// Publish a `show` for one terminal across every channel.
///
/// Returns the share fragment for manual cross-device delivery. The durable
/// upsert is the only error that propagates; the event log, the push channel
/// and the cache are each best-effort and independent.
pub async fn broadcast_show(
    state: &AppState,
    tenant_id: Uuid,
    terminal_id: Uuid,
    mut payload: DisplayPayload,
) -> AppResult<String> {
    let topic = display_topic(tenant_id, terminal_id);

    // Force-clear first so a reordered delivery of an older show can never
    // outlive this one: the clear advances every subscriber's watermark.
    let cleared_at = Utc::now();
    state.realtime.publish(&topic, DisplayEvent::HideQr { at: cleared_at });
    state.cache.set(tenant_id, terminal_id, None);

    payload.updated_at = Utc::now();

    upsert_show(state, tenant_id, terminal_id, &payload).await?;

    if let Err(err) = events::append_event(
        &state.pool,
        tenant_id,
        terminal_id,
        "show_qr",
        Some(payload.order_id),
        serde_json::to_value(&payload).ok(),
        Some(payload.expires_at),
    )
    .await
    {
        tracing::warn!(terminal_id = %terminal_id, error = %err, "broadcast event append failed");
    }

    let reached = state
        .realtime
        .publish(&topic, DisplayEvent::ShowQr(payload.clone()));
    tracing::debug!(terminal_id = %terminal_id, subscribers = reached, "show published");

    state.cache.set(tenant_id, terminal_id, Some(payload.clone()));

    Ok(encode_share_fragment(&payload))
}

/// Publish a clear for one terminal across every channel.
pub async fn broadcast_hide(state: &AppState, tenant_id: Uuid, terminal_id: Uuid) -> AppResult<()> {
    let now = Utc::now();

    upsert_idle(state, tenant_id, terminal_id, now).await?;

    if let Err(err) = events::append_event(
        &state.pool,
        tenant_id,
        terminal_id,
        "hide_qr",
        None,
        None,
        None,
    )
    .await
    {
        tracing::warn!(terminal_id = %terminal_id, error = %err, "broadcast event append failed");
    }

    let topic = display_topic(tenant_id, terminal_id);
    state.realtime.publish(&topic, DisplayEvent::HideQr { at: now });
    state.cache.set(tenant_id, terminal_id, None);

    Ok(())
}

/// Explicit "show this order on terminal T" from the POS.
pub async fn show_order(
    state: &AppState,
    tenant: &AuthTenant,
    terminal_id: Uuid,
    order_id: Uuid,
) -> AppResult<ApiResponse<DisplaySnapshot>> {
    let terminal = find_terminal(state, tenant.tenant_id, terminal_id).await?;

    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::TenantId.eq(tenant.tenant_id))
                .add(OrderCol::Id.eq(order_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let now = Utc::now();
    let status = OrderStatus::parse(&order.status).unwrap_or(OrderStatus::Pending);
    if status.is_terminal()
        || order_service::evaluate_expiry(status, order.expires_at.with_timezone(&Utc), now)
    {
        let shown = if status.is_terminal() {
            status
        } else {
            OrderStatus::Expired
        };
        return Err(AppError::InvalidState {
            status: shown.to_string(),
        });
    }

    let payload = payload_from_order(&order);
    let fragment = broadcast_show(state, tenant.tenant_id, terminal_id, payload.clone()).await?;

    Ok(ApiResponse::success(
        "Showing",
        DisplaySnapshot {
            terminal_id,
            terminal_label: terminal.label,
            state: STATE_SHOW.into(),
            payload: Some(payload),
            share_fragment: Some(fragment),
        },
        Some(Meta::empty()),
    ))
}

/// Explicit clear from the POS.
pub async fn clear_terminal(
    state: &AppState,
    tenant: &AuthTenant,
    terminal_id: Uuid,
) -> AppResult<ApiResponse<DisplaySnapshot>> {
    let terminal = find_terminal(state, tenant.tenant_id, terminal_id).await?;

    broadcast_hide(state, tenant.tenant_id, terminal_id).await?;

    Ok(ApiResponse::success(
        "Cleared",
        DisplaySnapshot {
            terminal_id,
            terminal_label: terminal.label,
            state: STATE_IDLE.into(),
            payload: None,
            share_fragment: None,
        },
        Some(Meta::empty()),
    ))
}

/// Snapshot for a display device identified by its device key. This is the
/// reconciliation fallback that heals missed pushes.
pub async fn snapshot_by_device_key(
    state: &AppState,
    device_key: &str,
) -> AppResult<ApiResponse<DisplaySnapshot>> {
    let terminal = Terminals::find()
        .filter(TerminalCol::DeviceKey.eq(device_key))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    // Fast path: a live cached payload skips the durable read.
    let payload = match state.cache.get(terminal.tenant_id, terminal.id) {
        Some(p) => Some(p),
        None => read_durable(state, terminal.tenant_id, terminal.id).await?,
    };

    let fragment = payload.as_ref().map(encode_share_fragment);
    let display_state = if payload.is_some() { STATE_SHOW } else { STATE_IDLE };

    Ok(ApiResponse::success(
        "OK",
        DisplaySnapshot {
            terminal_id: terminal.id,
            terminal_label: terminal.label,
            state: display_state.into(),
            payload,
            share_fragment: fragment,
        },
        Some(Meta::empty()),
    ))
}

/// Fetch the raw terminal_displays row for one terminal.
pub async fn read_display_row(
    state: &AppState,
    tenant_id: Uuid,
    terminal_id: Uuid,
) -> AppResult<Option<DisplayModel>> {
    let row = TerminalDisplays::find()
        .filter(
            Condition::all()
                .add(DisplayCol::TenantId.eq(tenant_id))
                .add(DisplayCol::TerminalId.eq(terminal_id)),
        )
        .one(&state.orm)
        .await?;
    Ok(row)
}

/// Read the durable display payload for one terminal, expiry-suppressed.
pub async fn read_durable(
    state: &AppState,
    tenant_id: Uuid,
    terminal_id: Uuid,
) -> AppResult<Option<DisplayPayload>> {
    let row = read_display_row(state, tenant_id, terminal_id).await?;
    Ok(snapshot_from_row(row, Utc::now()))
}

/// Interpret a terminal_displays row. A missing row, an idle row, an
/// incomplete show row and an expired show row all read as idle.
pub fn snapshot_from_row(row: Option<DisplayModel>, now: DateTime<Utc>) -> Option<DisplayPayload> {
    let row = row?;
    if row.state != STATE_SHOW {
        return None;
    }
    let order_id = row.order_id?;
    let expires_at = row.expires_at?.with_timezone(&Utc);
    let payload = DisplayPayload {
        order_id,
        amount: row.amount.unwrap_or_default(),
        reference: row.reference.unwrap_or_default(),
        qr_code: row.qr_code,
        expires_at,
        updated_at: row.updated_at.with_timezone(&Utc),
    };
    if payload.is_expired(now) {
        return None;
    }
    Some(payload)
}

/// URL-fragment encoding of a payload: base64url over the JSON document, the
/// last-resort channel for carrying a QR across devices by hand.
pub fn encode_share_fragment(payload: &DisplayPayload) -> String {
    let json = serde_json::to_vec(payload).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

pub fn decode_share_fragment(fragment: &str) -> Option<DisplayPayload> {
    let bytes = URL_SAFE_NO_PAD.decode(fragment).ok()?;
    serde_json::from_slice(&bytes).ok()
}

async fn find_terminal(
    state: &AppState,
    tenant_id: Uuid,
    terminal_id: Uuid,
) -> AppResult<TerminalModel> {
    Terminals::find()
        .filter(
            Condition::all()
                .add(TerminalCol::TenantId.eq(tenant_id))
                .add(TerminalCol::Id.eq(terminal_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn upsert_show(
    state: &AppState,
    tenant_id: Uuid,
    terminal_id: Uuid,
    payload: &DisplayPayload,
) -> AppResult<()> {
    let active = DisplayActive {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        terminal_id: Set(terminal_id),
        state: Set(STATE_SHOW.into()),
        order_id: Set(Some(payload.order_id)),
        amount: Set(Some(payload.amount)),
        reference: Set(Some(payload.reference.clone())),
        qr_code: Set(payload.qr_code.clone()),
        expires_at: Set(Some(payload.expires_at.into())),
        updated_at: Set(payload.updated_at.into()),
    };
    TerminalDisplays::insert(active)
        .on_conflict(upsert_conflict())
        .exec(&state.orm)
        .await?;
    Ok(())
}

async fn upsert_idle(
    state: &AppState,
    tenant_id: Uuid,
    terminal_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let active = DisplayActive {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        terminal_id: Set(terminal_id),
        state: Set(STATE_IDLE.into()),
        order_id: Set(None),
        amount: Set(None),
        reference: Set(None),
        qr_code: Set(None),
        expires_at: Set(None),
        updated_at: Set(now.into()),
    };
    TerminalDisplays::insert(active)
        .on_conflict(upsert_conflict())
        .exec(&state.orm)
        .await?;
    Ok(())
}

// Upsert-by-(tenant, terminal): the row is replaced wholesale, last writer
// wins. No version check; the usage pattern is replace, never merge.
fn upsert_conflict() -> OnConflict {
    OnConflict::columns([DisplayCol::TenantId, DisplayCol::TerminalId])
        .update_columns([
            DisplayCol::State,
            DisplayCol::OrderId,
            DisplayCol::Amount,
            DisplayCol::Reference,
            DisplayCol::QrCode,
            DisplayCol::ExpiresAt,
            DisplayCol::UpdatedAt,
        ])
        .to_owned()
}
