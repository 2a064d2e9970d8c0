use chrono::{Duration, Utc};
use paynow_pos_api::{
    dto::orders::OrderItemInput,
    error::AppError,
    models::OrderStatus,
    services::order_service::{build_reference, derive_total, evaluate_expiry},
};
use uuid::Uuid;

fn item(name: &str, unit_price_cents: i64, quantity: i32) -> OrderItemInput {
    OrderItemInput {
        catalog_item_id: None,
        name: name.into(),
        unit_price_cents,
        quantity,
    }
}

#[test]
fn total_is_sum_of_line_totals() {
    let total = derive_total(&[item("Coffee", 450, 2)]).expect("total");
    assert_eq!(total, 900);

    let total = derive_total(&[item("Coffee", 450, 2), item("Muffin", 320, 3)]).expect("total");
    assert_eq!(total, 900 + 960);
}

#[test]
fn empty_item_set_totals_zero() {
    assert_eq!(derive_total(&[]).expect("total"), 0);
}

#[test]
fn invalid_items_are_rejected_before_any_write() {
    assert!(matches!(
        derive_total(&[item("Coffee", 450, 0)]),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        derive_total(&[item("Coffee", -1, 1)]),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        derive_total(&[item("  ", 450, 1)]),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        derive_total(&[item("Coffee", i64::MAX, 2)]),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn pending_past_expiry_is_logically_expired() {
    let now = Utc::now();
    assert!(evaluate_expiry(
        OrderStatus::Pending,
        now - Duration::seconds(1),
        now
    ));
    assert!(!evaluate_expiry(
        OrderStatus::Pending,
        now + Duration::minutes(15),
        now
    ));
    // Terminal states never re-enter expiry.
    assert!(!evaluate_expiry(
        OrderStatus::Paid,
        now - Duration::minutes(30),
        now
    ));
    assert!(!evaluate_expiry(
        OrderStatus::Canceled,
        now - Duration::minutes(30),
        now
    ));
}

#[test]
fn reference_carries_prefix_date_time_and_disambiguator() {
    let id = Uuid::new_v4();
    let now = Utc::now();
    let reference = build_reference(id, now);

    let parts: Vec<&str> = reference.split('-').collect();
    assert_eq!(parts[0], "PN");
    assert_eq!(parts[1], now.format("%Y%m%d").to_string());
    assert_eq!(parts[2], now.format("%H%M%S").to_string());
    assert_eq!(parts[3], &id.to_string()[..8]);
}
