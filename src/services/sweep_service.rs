//! Periodic expiry sweep.
//!
//! Advisory cleanup: readers already suppress expired shows and treat
//! expired-pending orders as expired, so nothing depends on this running on
//! time. It exists to keep the stored rows converging on the logical truth
//! and to push an explicit clear to displays still showing a dead QR.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::{
    entity::{
        orders::{Column as OrderCol, Entity as Orders},
        terminal_displays::{Column as DisplayCol, Entity as TerminalDisplays},
    },
    error::AppResult,
    models::OrderStatus,
    services::display_service,
    state::AppState,
};

pub fn spawn(state: AppState, token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(state.config.sweep_interval_secs));
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = tick.tick() => {
                    match sweep_once(&state).await {
                        Ok((orders, displays)) if orders > 0 || displays > 0 => {
                            tracing::info!(expired_orders = orders, cleared_displays = displays, "expiry sweep");
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!(error = %err, "expiry sweep failed");
                        }
                    }
                }
            }
        }
    })
}

/// One sweep pass. Returns (orders expired, displays cleared).
pub async fn sweep_once(state: &AppState) -> AppResult<(u64, u64)> {
    let now = Utc::now();

    let expired = Orders::update_many()
        .col_expr(OrderCol::Status, Expr::value(OrderStatus::Expired.as_str()))
        .col_expr(OrderCol::UpdatedAt, Expr::value(now))
        .filter(
            Condition::all()
                .add(OrderCol::Status.eq(OrderStatus::Pending.as_str()))
                .add(OrderCol::ExpiresAt.lte(now)),
        )
        .exec(&state.orm)
        .await?
        .rows_affected;

    let stale = TerminalDisplays::find()
        .filter(
            Condition::all()
                .add(DisplayCol::State.eq(display_service::STATE_SHOW))
                .add(DisplayCol::ExpiresAt.lte(now)),
        )
        .all(&state.orm)
        .await?;

    let mut cleared = 0u64;
    for row in stale {
        // Full fanout so attached devices hear the clear instead of waiting
        // for their own expiry suppression.
        match display_service::broadcast_hide(state, row.tenant_id, row.terminal_id).await {
            Ok(()) => cleared += 1,
            Err(err) => {
                tracing::warn!(terminal_id = %row.terminal_id, error = %err, "stale display clear failed");
            }
        }
    }

    Ok((expired, cleared))
}
