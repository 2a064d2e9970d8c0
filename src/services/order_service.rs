use chrono::{DateTime, Duration, Utc};
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::orders::{CreateOrderRequest, CreatedOrder, MarkPaidRequest, OrderItemInput, OrderList, OrderWithItems},
    entity::{
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems, Model as OrderItemModel},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, Model as OrderModel},
        payments::{ActiveModel as PaymentActive, Column as PaymentCol, Entity as Payments, Model as PaymentModel},
        terminals::{Column as TerminalCol, Entity as Terminals},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthTenant,
    models::{Order, OrderItem, OrderStatus, Payment},
    response::{ApiResponse, Meta},
    routes::params::{Cursor, OrderListQuery},
    services::display_service,
    state::AppState,
};

/// Hard cap on a manually entered amount: 999999.99 major units.
pub const MAX_AMOUNT_CENTS: i64 = 99_999_999;

const MAX_REFERENCE_LEN: usize = 64;

pub async fn create_order(
    state: &AppState,
    tenant: &AuthTenant,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<CreatedOrder>> {
    // Idempotency guard: a previously seen (tenant, key) returns the prior
    // order verbatim instead of creating a second one.
    let idempotency_key = payload
        .idempotency_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned);

    if let Some(key) = idempotency_key.as_deref() {
        if let Some(existing) = find_by_idempotency_key(state, tenant.tenant_id, key).await? {
            return hydrate_created(state, existing, true, Vec::new()).await;
        }
    }

    let items = payload.items.unwrap_or_default();
    let total_amount = if items.is_empty() {
        let amount = payload
            .amount_cents
            .ok_or_else(|| AppError::Validation("amount_cents or items is required".into()))?;
        if amount <= 0 {
            return Err(AppError::Validation("amount_cents must be positive".into()));
        }
        if amount > MAX_AMOUNT_CENTS {
            return Err(AppError::Validation(format!(
                "amount_cents exceeds maximum of {MAX_AMOUNT_CENTS}"
            )));
        }
        amount
    } else {
        derive_total(&items)?
    };

    if let Some(reference) = payload.reference.as_deref() {
        if reference.len() > MAX_REFERENCE_LEN {
            return Err(AppError::Validation(format!(
                "reference longer than {MAX_REFERENCE_LEN} characters"
            )));
        }
    }

    if let Some(terminal_id) = payload.terminal_id {
        let terminal = Terminals::find()
            .filter(
                Condition::all()
                    .add(TerminalCol::TenantId.eq(tenant.tenant_id))
                    .add(TerminalCol::Id.eq(terminal_id)),
            )
            .one(&state.orm)
            .await?;
        if terminal.is_none() {
            return Err(AppError::NotFound);
        }
    }

    let order_id = Uuid::new_v4();
    let now = Utc::now();
    let reference = payload
        .reference
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| build_reference(order_id, now));
    let expires_at = now + Duration::minutes(state.config.order_ttl_minutes);

    let active = OrderActive {
        id: Set(order_id),
        tenant_id: Set(tenant.tenant_id),
        terminal_id: Set(payload.terminal_id),
        reference: Set(reference),
        total_amount: Set(total_amount),
        status: Set(OrderStatus::Pending.as_str().into()),
        idempotency_key: Set(idempotency_key.clone()),
        qr_code: Set(payload.qr_code),
        qr_image: Set(payload.qr_image),
        expires_at: Set(expires_at.into()),
        paid_at: Set(None),
        canceled_at: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    };

    let order = match active.insert(&state.orm).await {
        Ok(order) => order,
        Err(err) => {
            // Concurrent retries can both miss the guard; the unique index on
            // (tenant_id, idempotency_key) is the arbiter. The loser re-reads
            // the winner's row and reports it as a duplicate.
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                if let Some(key) = idempotency_key.as_deref() {
                    if let Some(winner) =
                        find_by_idempotency_key(state, tenant.tenant_id, key).await?
                    {
                        return hydrate_created(state, winner, true, Vec::new()).await;
                    }
                }
            }
            return Err(err.into());
        }
    };

    // Line items are a best-effort secondary write: a failure degrades the
    // order to item-less rather than rolling back the creation.
    let mut warnings = Vec::new();
    for input in &items {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            catalog_item_id: Set(input.catalog_item_id),
            name: Set(input.name.clone()),
            unit_price: Set(input.unit_price_cents),
            quantity: Set(input.quantity),
            line_total: Set(input.unit_price_cents * input.quantity as i64),
            created_at: NotSet,
        };
        if let Err(err) = item.insert(&state.orm).await {
            tracing::warn!(order_id = %order.id, item = %input.name, error = %err, "order item insert failed");
            warnings.push(format!("item '{}' was not persisted", input.name));
        }
    }

    if let Some(terminal_id) = order.terminal_id {
        let display = display_service::payload_from_order(&order);
        if let Err(err) =
            display_service::broadcast_show(state, tenant.tenant_id, terminal_id, display).await
        {
            tracing::warn!(order_id = %order.id, terminal_id = %terminal_id, error = %err, "display handoff failed");
            warnings.push("terminal display was not updated".into());
        }
    }

    hydrate_created(state, order, false, warnings).await
}

pub async fn mark_paid(
    state: &AppState,
    tenant: &AuthTenant,
    id: Uuid,
    payload: MarkPaidRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let order = lock_pending(&txn, tenant.tenant_id, id, now).await?;

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Paid.as_str().into());
    active.paid_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    PaymentActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        tenant_id: Set(tenant.tenant_id),
        amount: Set(order.total_amount),
        note: Set(payload.note),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    clear_terminal_best_effort(state, tenant.tenant_id, &order).await;

    hydrate(state, order).await.map(|data| {
        ApiResponse::success("Payment recorded", data, Some(Meta::empty()))
    })
}

pub async fn cancel_order(
    state: &AppState,
    tenant: &AuthTenant,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let now = Utc::now();
    let txn = state.orm.begin().await?;

    let order = lock_pending(&txn, tenant.tenant_id, id, now).await?;

    let mut active: OrderActive = order.into();
    active.status = Set(OrderStatus::Canceled.as_str().into());
    active.canceled_at = Set(Some(now.into()));
    active.updated_at = Set(now.into());
    let order = active.update(&txn).await?;

    txn.commit().await?;

    clear_terminal_best_effort(state, tenant.tenant_id, &order).await;

    hydrate(state, order)
        .await
        .map(|data| ApiResponse::success("Order canceled", data, Some(Meta::empty())))
}

pub async fn get_order(
    state: &AppState,
    tenant: &AuthTenant,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::TenantId.eq(tenant.tenant_id))
                .add(OrderCol::Id.eq(id)),
        )
        .one(&state.orm)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    hydrate(state, order)
        .await
        .map(|data| ApiResponse::success("OK", data, Some(Meta::empty())))
}

pub async fn list_orders(
    state: &AppState,
    tenant: &AuthTenant,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let page_size = query.page_size();

    let mut condition = Condition::all().add(OrderCol::TenantId.eq(tenant.tenant_id));
    if let Some(status) = query.status.as_deref().filter(|s| !s.is_empty()) {
        if OrderStatus::parse(status).is_none() {
            return Err(AppError::Validation(format!("unknown status '{status}'")));
        }
        condition = condition.add(OrderCol::Status.eq(status));
    }
    if let Some(terminal_id) = query.terminal_id {
        condition = condition.add(OrderCol::TerminalId.eq(terminal_id));
    }
    if let Some(from) = query.from {
        condition = condition.add(OrderCol::CreatedAt.gte(from));
    }
    if let Some(to) = query.to {
        condition = condition.add(OrderCol::CreatedAt.lte(to));
    }
    if let Some(raw) = query.cursor.as_deref() {
        let cursor = Cursor::parse(raw)
            .ok_or_else(|| AppError::Validation("malformed cursor".into()))?;
        // Keyset over (created_at, id) descending: everything strictly after
        // the cursor position.
        condition = condition.add(
            Condition::any()
                .add(OrderCol::CreatedAt.lt(cursor.created_at))
                .add(
                    Condition::all()
                        .add(OrderCol::CreatedAt.eq(cursor.created_at))
                        .add(OrderCol::Id.lt(cursor.id)),
                ),
        );
    }

    // One extra row decides has_more without a second count query.
    let mut rows = Orders::find()
        .filter(condition)
        .order_by_desc(OrderCol::CreatedAt)
        .order_by_desc(OrderCol::Id)
        .limit(page_size + 1)
        .all(&state.orm)
        .await?;

    let has_more = rows.len() as u64 > page_size;
    rows.truncate(page_size as usize);

    let next_cursor = if has_more {
        rows.last().map(|row| {
            Cursor {
                created_at: row.created_at.with_timezone(&Utc),
                id: row.id,
            }
            .encode()
        })
    } else {
        None
    };

    let now = Utc::now();
    let items = rows
        .into_iter()
        .map(|row| order_from_entity(row, now))
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        OrderList { items },
        Some(Meta::cursor(next_cursor, has_more)),
    ))
}

/// Pure expiry rule: a pending order whose expiry has passed is logically
/// expired for every reader, whether or not the sweep has persisted it yet.
pub fn evaluate_expiry(
    status: OrderStatus,
    expires_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> bool {
    status == OrderStatus::Pending && expires_at <= now
}

/// Display reference: fixed prefix + date + time + a short disambiguator from
/// the order id. Not unique, and deliberately not guarded against collision.
pub fn build_reference(order_id: Uuid, now: DateTime<Utc>) -> String {
    let stamp = now.format("%Y%m%d-%H%M%S");
    let suffix = order_id.to_string();
    let short = &suffix[..8];
    format!("PN-{stamp}-{short}")
}

/// Σ(unit_price × quantity) with overflow and input checks.
pub fn derive_total(items: &[OrderItemInput]) -> AppResult<i64> {
    let mut total: i64 = 0;
    for item in items {
        if item.name.trim().is_empty() {
            return Err(AppError::Validation("item name is required".into()));
        }
        if item.quantity <= 0 {
            return Err(AppError::Validation(format!(
                "item '{}' has non-positive quantity",
                item.name
            )));
        }
        if item.unit_price_cents < 0 {
            return Err(AppError::Validation(format!(
                "item '{}' has negative unit price",
                item.name
            )));
        }
        let line = item
            .unit_price_cents
            .checked_mul(item.quantity as i64)
            .ok_or_else(|| AppError::Validation("line total overflow".into()))?;
        total = total
            .checked_add(line)
            .ok_or_else(|| AppError::Validation("order total overflow".into()))?;
    }
    Ok(total)
}

async fn find_by_idempotency_key(
    state: &AppState,
    tenant_id: Uuid,
    key: &str,
) -> AppResult<Option<OrderModel>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::TenantId.eq(tenant_id))
                .add(OrderCol::IdempotencyKey.eq(key)),
        )
        .one(&state.orm)
        .await?;
    Ok(order)
}

/// Fetch an order inside a transaction with a row lock and require it to be
/// actionable: present in the tenant and still pending (a past expiry counts
/// as the terminal `expired` state even before the sweep wrote it).
async fn lock_pending<C: ConnectionTrait>(
    conn: &C,
    tenant_id: Uuid,
    id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<OrderModel> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::TenantId.eq(tenant_id))
                .add(OrderCol::Id.eq(id)),
        )
        .lock(LockType::Update)
        .one(conn)
        .await?;
    let order = match order {
        Some(o) => o,
        None => return Err(AppError::NotFound),
    };

    let status = OrderStatus::parse(&order.status).unwrap_or(OrderStatus::Pending);
    if status.is_terminal() {
        return Err(AppError::InvalidState {
            status: status.to_string(),
        });
    }
    if evaluate_expiry(status, order.expires_at.with_timezone(&Utc), now) {
        return Err(AppError::InvalidState {
            status: OrderStatus::Expired.to_string(),
        });
    }
    Ok(order)
}

async fn clear_terminal_best_effort(state: &AppState, tenant_id: Uuid, order: &OrderModel) {
    if let Some(terminal_id) = order.terminal_id {
        if let Err(err) = display_service::broadcast_hide(state, tenant_id, terminal_id).await {
            tracing::warn!(order_id = %order.id, terminal_id = %terminal_id, error = %err, "terminal clear failed");
        }
    }
}

async fn hydrate_created(
    state: &AppState,
    order: OrderModel,
    duplicate: bool,
    warnings: Vec<String>,
) -> AppResult<ApiResponse<CreatedOrder>> {
    let OrderWithItems { order, items, payments } = hydrate(state, order).await?;
    let message = if duplicate {
        "Order already exists"
    } else {
        "Order created"
    };
    Ok(ApiResponse::success(
        message,
        CreatedOrder {
            order,
            items,
            payments,
            duplicate,
            warnings,
        },
        Some(Meta::empty()),
    ))
}

async fn hydrate(state: &AppState, order: OrderModel) -> AppResult<OrderWithItems> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(order_item_from_entity)
        .collect();

    let payments = Payments::find()
        .filter(PaymentCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(payment_from_entity)
        .collect();

    Ok(OrderWithItems {
        order: order_from_entity(order, Utc::now()),
        items,
        payments,
    })
}

pub fn order_from_entity(model: OrderModel, now: DateTime<Utc>) -> Order {
    let stored = OrderStatus::parse(&model.status).unwrap_or(OrderStatus::Pending);
    let expires_at = model.expires_at.with_timezone(&Utc);
    let status = if evaluate_expiry(stored, expires_at, now) {
        OrderStatus::Expired
    } else {
        stored
    };
    Order {
        id: model.id,
        tenant_id: model.tenant_id,
        terminal_id: model.terminal_id,
        reference: model.reference,
        total_amount: model.total_amount,
        status,
        qr_code: model.qr_code,
        qr_image: model.qr_image,
        expires_at,
        paid_at: model.paid_at.map(|dt| dt.with_timezone(&Utc)),
        canceled_at: model.canceled_at.map(|dt| dt.with_timezone(&Utc)),
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    }
}

fn order_item_from_entity(model: OrderItemModel) -> OrderItem {
    OrderItem {
        id: model.id,
        order_id: model.order_id,
        catalog_item_id: model.catalog_item_id,
        name: model.name,
        unit_price: model.unit_price,
        quantity: model.quantity,
        line_total: model.line_total,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

fn payment_from_entity(model: PaymentModel) -> Payment {
    Payment {
        id: model.id,
        order_id: model.order_id,
        amount: model.amount,
        note: model.note,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
