use paynow_pos_api::{
    cache::FastPathCache,
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::orders::{CreateOrderRequest, MarkPaidRequest, OrderItemInput},
    entity::terminals::ActiveModel as TerminalActive,
    error::AppError,
    middleware::auth::AuthTenant,
    models::OrderStatus,
    realtime::RealtimeHub,
    routes::params::OrderListQuery,
    services::{order_service, sweep_service},
    state::AppState,
};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, Set};
use uuid::Uuid;

// Integration flows against a real database. Tests isolate by tenant id, so
// no table cleanup is needed between runs.
fn database_url() -> Option<String> {
    std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
}

async fn setup_state(database_url: &str, ttl_minutes: i64) -> anyhow::Result<AppState> {
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;
    let pool = create_pool(database_url).await?;

    Ok(AppState {
        pool,
        orm,
        realtime: RealtimeHub::new(),
        cache: FastPathCache::new(),
        config: AppConfig {
            database_url: database_url.into(),
            host: "127.0.0.1".into(),
            port: 0,
            order_ttl_minutes: ttl_minutes,
            sweep_interval_secs: 60,
            display_poll_ms: 50,
        },
    })
}

async fn create_terminal(state: &AppState, tenant_id: Uuid, label: &str) -> anyhow::Result<Uuid> {
    let terminal = TerminalActive {
        id: Set(Uuid::new_v4()),
        tenant_id: Set(tenant_id),
        label: Set(label.into()),
        device_key: Set(format!("display-{}", Uuid::new_v4())),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(terminal.id)
}

fn create_request() -> CreateOrderRequest {
    CreateOrderRequest {
        amount_cents: None,
        items: None,
        terminal_id: None,
        reference: None,
        idempotency_key: None,
        qr_code: None,
        qr_image: None,
    }
}

#[tokio::test]
async fn create_with_items_derives_total_then_pay() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&url, 15).await?;
    let tenant = AuthTenant {
        tenant_id: Uuid::new_v4(),
    };

    let created = order_service::create_order(
        &state,
        &tenant,
        CreateOrderRequest {
            items: Some(vec![OrderItemInput {
                catalog_item_id: None,
                name: "Coffee".into(),
                unit_price_cents: 450,
                quantity: 2,
            }]),
            ..create_request()
        },
    )
    .await?
    .data
    .unwrap();

    assert_eq!(created.order.total_amount, 900);
    assert_eq!(created.order.status, OrderStatus::Pending);
    assert!(!created.duplicate);
    assert!(created.warnings.is_empty());
    assert_eq!(created.items.len(), 1);
    assert_eq!(created.items[0].line_total, 900);
    assert!(created.payments.is_empty());
    assert!(created.order.reference.starts_with("PN-"));

    let paid = order_service::mark_paid(
        &state,
        &tenant,
        created.order.id,
        MarkPaidRequest {
            note: Some("cash drawer 2".into()),
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(paid.order.status, OrderStatus::Paid);
    assert!(paid.order.paid_at.is_some());
    assert_eq!(paid.payments.len(), 1);
    assert_eq!(paid.payments[0].amount, 900);

    // Terminal states are immutable: a second mark-paid reports the status.
    let err = order_service::mark_paid(&state, &tenant, created.order.id, MarkPaidRequest { note: None })
        .await
        .unwrap_err();
    match err {
        AppError::InvalidState { status } => assert_eq!(status, "paid"),
        other => panic!("expected InvalidState, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn idempotency_key_returns_prior_order() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&url, 15).await?;
    let tenant = AuthTenant {
        tenant_id: Uuid::new_v4(),
    };

    let request = || CreateOrderRequest {
        amount_cents: Some(1000),
        idempotency_key: Some("abc123".into()),
        ..create_request()
    };

    let first = order_service::create_order(&state, &tenant, request())
        .await?
        .data
        .unwrap();
    assert!(!first.duplicate);

    let second = order_service::create_order(&state, &tenant, request())
        .await?
        .data
        .unwrap();
    assert!(second.duplicate);
    assert_eq!(second.order.id, first.order.id);
    assert_eq!(second.order.reference, first.order.reference);
    assert_eq!(second.order.total_amount, first.order.total_amount);
    assert_eq!(second.order.status, first.order.status);

    // Exactly one persisted order for this tenant.
    let list = order_service::list_orders(
        &state,
        &tenant,
        OrderListQuery {
            limit: None,
            cursor: None,
            status: None,
            terminal_id: None,
            from: None,
            to: None,
        },
    )
    .await?
    .data
    .unwrap();
    assert_eq!(list.items.len(), 1);

    // The same key under a different tenant is unrelated.
    let other_tenant = AuthTenant {
        tenant_id: Uuid::new_v4(),
    };
    let third = order_service::create_order(&state, &other_tenant, request())
        .await?
        .data
        .unwrap();
    assert!(!third.duplicate);
    assert_ne!(third.order.id, first.order.id);

    Ok(())
}

#[tokio::test]
async fn cancel_is_terminal() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&url, 15).await?;
    let tenant = AuthTenant {
        tenant_id: Uuid::new_v4(),
    };

    let created = order_service::create_order(
        &state,
        &tenant,
        CreateOrderRequest {
            amount_cents: Some(500),
            ..create_request()
        },
    )
    .await?
    .data
    .unwrap();

    let canceled = order_service::cancel_order(&state, &tenant, created.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(canceled.order.status, OrderStatus::Canceled);
    assert!(canceled.order.canceled_at.is_some());

    let err = order_service::mark_paid(&state, &tenant, created.order.id, MarkPaidRequest { note: None })
        .await
        .unwrap_err();
    match err {
        AppError::InvalidState { status } => assert_eq!(status, "canceled"),
        other => panic!("expected InvalidState, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn create_rejects_bad_amounts_and_unknown_terminal() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&url, 15).await?;
    let tenant = AuthTenant {
        tenant_id: Uuid::new_v4(),
    };

    for request in [
        create_request(),
        CreateOrderRequest {
            amount_cents: Some(0),
            ..create_request()
        },
        CreateOrderRequest {
            amount_cents: Some(order_service::MAX_AMOUNT_CENTS + 1),
            ..create_request()
        },
        CreateOrderRequest {
            amount_cents: Some(100),
            reference: Some("x".repeat(65)),
            ..create_request()
        },
    ] {
        assert!(matches!(
            order_service::create_order(&state, &tenant, request).await,
            Err(AppError::Validation(_))
        ));
    }

    // A terminal id the tenant does not own is NotFound, not a silent write.
    let foreign_terminal = create_terminal(&state, Uuid::new_v4(), "Someone else's").await?;
    assert!(matches!(
        order_service::create_order(
            &state,
            &tenant,
            CreateOrderRequest {
                amount_cents: Some(100),
                terminal_id: Some(foreign_terminal),
                ..create_request()
            },
        )
        .await,
        Err(AppError::NotFound)
    ));

    Ok(())
}

#[tokio::test]
async fn expired_pending_order_is_not_payable() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    // TTL of zero: the order expires the moment it is created.
    let state = setup_state(&url, 0).await?;
    let tenant = AuthTenant {
        tenant_id: Uuid::new_v4(),
    };

    let created = order_service::create_order(
        &state,
        &tenant,
        CreateOrderRequest {
            amount_cents: Some(700),
            ..create_request()
        },
    )
    .await?
    .data
    .unwrap();

    // Logical expiry precedes any persisted write.
    let fetched = order_service::get_order(&state, &tenant, created.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.status, OrderStatus::Expired);

    let err = order_service::mark_paid(&state, &tenant, created.order.id, MarkPaidRequest { note: None })
        .await
        .unwrap_err();
    match err {
        AppError::InvalidState { status } => assert_eq!(status, "expired"),
        other => panic!("expected InvalidState, got {other:?}"),
    }

    // The sweep persists what readers already report.
    sweep_service::sweep_once(&state).await?;
    let fetched = order_service::get_order(&state, &tenant, created.order.id)
        .await?
        .data
        .unwrap();
    assert_eq!(fetched.order.status, OrderStatus::Expired);

    Ok(())
}

#[tokio::test]
async fn cursor_pagination_is_stable_across_page_sizes() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&url, 15).await?;
    let tenant = AuthTenant {
        tenant_id: Uuid::new_v4(),
    };

    for i in 0..7 {
        order_service::create_order(
            &state,
            &tenant,
            CreateOrderRequest {
                amount_cents: Some(100 + i),
                ..create_request()
            },
        )
        .await?;
    }

    let query = |limit: u64, cursor: Option<String>| OrderListQuery {
        limit: Some(limit),
        cursor,
        status: None,
        terminal_id: None,
        from: None,
        to: None,
    };

    // Reference ordering from a single oversized page.
    let reference = order_service::list_orders(&state, &tenant, query(100, None))
        .await?
        .data
        .unwrap()
        .items
        .into_iter()
        .map(|o| o.id)
        .collect::<Vec<_>>();
    assert_eq!(reference.len(), 7);

    // Iterate with a page size that changes mid-iteration.
    let mut collected = Vec::new();
    let mut cursor: Option<String> = None;
    let sizes = [3u64, 2, 2, 2, 2];
    for size in sizes {
        let response = order_service::list_orders(&state, &tenant, query(size, cursor.clone())).await?;
        let meta = response.meta.unwrap();
        let page = response.data.unwrap().items;
        collected.extend(page.iter().map(|o| o.id));
        if meta.has_more != Some(true) {
            assert!(meta.next_cursor.is_none());
            break;
        }
        cursor = meta.next_cursor;
        assert!(cursor.is_some());
    }

    assert_eq!(collected, reference, "every order exactly once, in order");

    Ok(())
}

#[tokio::test]
async fn orders_are_tenant_scoped() -> anyhow::Result<()> {
    let Some(url) = database_url() else {
        eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration tests.");
        return Ok(());
    };
    let state = setup_state(&url, 15).await?;
    let tenant = AuthTenant {
        tenant_id: Uuid::new_v4(),
    };
    let intruder = AuthTenant {
        tenant_id: Uuid::new_v4(),
    };

    let created = order_service::create_order(
        &state,
        &tenant,
        CreateOrderRequest {
            amount_cents: Some(300),
            ..create_request()
        },
    )
    .await?
    .data
    .unwrap();

    assert!(matches!(
        order_service::get_order(&state, &intruder, created.order.id).await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        order_service::cancel_order(&state, &intruder, created.order.id).await,
        Err(AppError::NotFound)
    ));

    Ok(())
}
