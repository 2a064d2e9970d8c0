//! Display-client reconciliation.
//!
//! A watcher is what a display device runs for its terminal: a realtime push
//! subscription for latency, plus a periodic re-read of the durable row that
//! heals missed pushes, dropped connections and late joins. Deliveries from
//! either source go through the same recency resolution, so transport
//! reordering cannot resurrect a stale QR.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    entity::terminal_displays::Model as DisplayModel,
    models::{DisplayEvent, DisplayPayload},
    realtime::display_topic,
    services::display_service,
    state::AppState,
};

/// Callback invoked with the new screen content: `Some(payload)` to render a
/// QR, `None` to go idle.
pub type OnChange = Arc<dyn Fn(Option<DisplayPayload>) + Send + Sync>;

/// One delivered state, from any transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Show(DisplayPayload),
    Hide { at: DateTime<Utc> },
}

impl From<DisplayEvent> for Delivery {
    fn from(event: DisplayEvent) -> Self {
        match event {
            DisplayEvent::ShowQr(p) => Delivery::Show(p),
            DisplayEvent::HideQr { at } => Delivery::Hide { at },
        }
    }
}

/// Interpret a durable row as a delivery. An idle or expired row becomes a
/// hide stamped with the row's own update time, so a poll that races a
/// concurrent show cannot advance the watermark past it.
pub fn delivery_from_row(row: Option<DisplayModel>, now: DateTime<Utc>) -> Option<Delivery> {
    let row = row?;
    let row_updated_at = row.updated_at.with_timezone(&Utc);
    match display_service::snapshot_from_row(Some(row), now) {
        Some(payload) => Some(Delivery::Show(payload)),
        None => Some(Delivery::Hide { at: row_updated_at }),
    }
}

/// Conflict resolution state: what the screen currently renders plus the
/// recency watermark of the newest state ever applied.
#[derive(Debug, Default)]
pub struct RenderState {
    current: Option<DisplayPayload>,
    watermark: Option<DateTime<Utc>>,
}

impl RenderState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&DisplayPayload> {
        self.current.as_ref()
    }

    /// Resolve one delivery by payload recency, not arrival order.
    ///
    /// Rules: an expired show is a hide; a clear is always applied and
    /// advances the watermark; a show older than the watermark is discarded.
    /// Returns the new screen content when it changed, `None` when the
    /// delivery was stale or a no-op.
    pub fn apply(&mut self, delivery: Delivery, now: DateTime<Utc>) -> Option<Option<DisplayPayload>> {
        match delivery {
            Delivery::Show(payload) => {
                if payload.is_expired(now) {
                    return self.apply(
                        Delivery::Hide {
                            at: payload.updated_at,
                        },
                        now,
                    );
                }
                if self.watermark.is_some_and(|w| payload.updated_at < w) {
                    return None;
                }
                self.watermark = Some(payload.updated_at);
                if self.current.as_ref() == Some(&payload) {
                    return None;
                }
                self.current = Some(payload.clone());
                Some(Some(payload))
            }
            Delivery::Hide { at } => {
                self.watermark = Some(self.watermark.map_or(at, |w| w.max(at)));
                if self.current.is_none() {
                    return None;
                }
                self.current = None;
                Some(None)
            }
        }
    }
}

pub struct DisplayWatcher {
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl DisplayWatcher {
    /// Subscribe to a terminal. The callback fires immediately with the
    /// current durable state, then on every accepted change.
    pub fn spawn(
        state: AppState,
        tenant_id: Uuid,
        terminal_id: Uuid,
        on_change: OnChange,
    ) -> Self {
        let token = CancellationToken::new();
        let task = tokio::spawn(run(
            state,
            tenant_id,
            terminal_id,
            on_change,
            token.clone(),
        ));
        Self {
            token,
            task: Some(task),
        }
    }

    /// Stop both the push subscription and the poll loop. No further
    /// callbacks fire after this returns.
    pub async fn unsubscribe(mut self) {
        self.token.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for DisplayWatcher {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(
    state: AppState,
    tenant_id: Uuid,
    terminal_id: Uuid,
    on_change: OnChange,
    token: CancellationToken,
) {
    let topic = display_topic(tenant_id, terminal_id);
    let mut rx = state.realtime.subscribe(&topic);
    let mut render = RenderState::new();

    // Initial delivery: current durable truth, without waiting for a push or
    // the first poll tick.
    match display_service::read_display_row(&state, tenant_id, terminal_id).await {
        Ok(row) => {
            let now = Utc::now();
            if let Some(delivery) = delivery_from_row(row, now) {
                render.apply(delivery, now);
            }
            on_change(render.current().cloned());
        }
        Err(err) => {
            tracing::warn!(terminal_id = %terminal_id, error = %err, "initial display fetch failed");
            on_change(None);
        }
    }

    let mut poll = tokio::time::interval(Duration::from_millis(state.config.display_poll_ms));
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    poll.reset();

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            msg = rx.recv() => match msg {
                Ok(event) => {
                    if let Some(next) = render.apply(event.into(), Utc::now()) {
                        on_change(next);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    // Dropped pushes are fine; the next poll reconciles.
                    tracing::debug!(terminal_id = %terminal_id, skipped, "push channel lagged");
                }
                Err(RecvError::Closed) => {
                    rx = state.realtime.subscribe(&topic);
                }
            },
            _ = poll.tick() => {
                match display_service::read_display_row(&state, tenant_id, terminal_id).await {
                    Ok(row) => {
                        let now = Utc::now();
                        if let Some(delivery) = delivery_from_row(row, now) {
                            if let Some(next) = render.apply(delivery, now) {
                                on_change(next);
                            }
                        }
                    }
                    Err(err) => {
                        tracing::warn!(terminal_id = %terminal_id, error = %err, "display poll failed");
                    }
                }
            }
        }
    }
}
