use chrono::{Duration, Utc};
use paynow_pos_api::{
    cache::FastPathCache,
    models::{DisplayEvent, DisplayPayload},
    realtime::{RealtimeHub, display_topic},
    routes::params::Cursor,
    services::display_service::{decode_share_fragment, encode_share_fragment},
    services::display_watcher::{Delivery, RenderState},
};
use uuid::Uuid;

fn payload(minutes_ago_updated: i64, expires_in_minutes: i64) -> DisplayPayload {
    let now = Utc::now();
    DisplayPayload {
        order_id: Uuid::new_v4(),
        amount: 900,
        reference: "PN-20260825-120000-abcd1234".into(),
        qr_code: Some("00020101021226...".into()),
        expires_at: now + Duration::minutes(expires_in_minutes),
        updated_at: now - Duration::minutes(minutes_ago_updated),
    }
}

#[test]
fn show_then_newer_show_replaces() {
    let mut render = RenderState::new();
    let now = Utc::now();

    let old = payload(2, 15);
    let new = payload(0, 15);

    assert!(render.apply(Delivery::Show(old), now).is_some());
    let delivered = render.apply(Delivery::Show(new.clone()), now);
    assert_eq!(delivered, Some(Some(new.clone())));
    assert_eq!(render.current(), Some(&new));
}

#[test]
fn stale_show_after_newer_show_is_discarded() {
    let mut render = RenderState::new();
    let now = Utc::now();

    let newer = payload(0, 15);
    let stale = payload(5, 15);

    render.apply(Delivery::Show(newer.clone()), now);
    assert_eq!(render.apply(Delivery::Show(stale), now), None);
    assert_eq!(render.current(), Some(&newer));
}

// Show then hide, with the show delivered after the hide due to transport
// reordering. The final rendered state must be idle.
#[test]
fn clear_dominates_reordered_show() {
    let mut render = RenderState::new();
    let now = Utc::now();

    let shown = payload(1, 15);
    let hide_at = now;

    assert!(render.apply(Delivery::Show(payload(3, 15)), now).is_some());
    assert_eq!(render.apply(Delivery::Hide { at: hide_at }, now), Some(None));
    // Reordered show, stamped before the hide.
    assert_eq!(render.apply(Delivery::Show(shown), now), None);
    assert_eq!(render.current(), None);
}

#[test]
fn hide_when_already_idle_is_a_noop() {
    let mut render = RenderState::new();
    assert_eq!(
        render.apply(Delivery::Hide { at: Utc::now() }, Utc::now()),
        None
    );
}

#[test]
fn expired_show_renders_as_idle() {
    let mut render = RenderState::new();
    let now = Utc::now();

    let expired = payload(20, -1);
    assert_eq!(render.apply(Delivery::Show(expired), now), None);
    assert_eq!(render.current(), None);

    // An expired show must also clear a currently rendered one.
    let live = payload(10, 15);
    render.apply(Delivery::Show(live), now);
    let mut expired_newer = payload(0, 15);
    expired_newer.expires_at = now - Duration::seconds(1);
    assert_eq!(render.apply(Delivery::Show(expired_newer), now), Some(None));
}

#[test]
fn duplicate_show_is_not_redelivered() {
    let mut render = RenderState::new();
    let now = Utc::now();

    let p = payload(0, 15);
    assert!(render.apply(Delivery::Show(p.clone()), now).is_some());
    assert_eq!(render.apply(Delivery::Show(p), now), None);
}

#[tokio::test]
async fn realtime_hub_delivers_to_subscribers() {
    let hub = RealtimeHub::new();
    let topic = display_topic(Uuid::new_v4(), Uuid::new_v4());

    let mut rx = hub.subscribe(&topic);
    let p = payload(0, 15);
    assert_eq!(hub.publish(&topic, DisplayEvent::ShowQr(p.clone())), 1);

    match rx.recv().await.expect("event") {
        DisplayEvent::ShowQr(got) => assert_eq!(got, p),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn realtime_hub_publish_without_subscribers_is_dropped() {
    let hub = RealtimeHub::new();
    let topic = display_topic(Uuid::new_v4(), Uuid::new_v4());
    assert_eq!(hub.publish(&topic, DisplayEvent::HideQr { at: Utc::now() }), 0);
}

#[test]
fn fast_path_cache_suppresses_expired_payloads() {
    let cache = FastPathCache::new();
    let tenant = Uuid::new_v4();
    let terminal = Uuid::new_v4();

    let live = payload(0, 15);
    cache.set(tenant, terminal, Some(live.clone()));
    assert_eq!(cache.get(tenant, terminal), Some(live));

    let expired = payload(20, -1);
    cache.set(tenant, terminal, Some(expired));
    assert_eq!(cache.get(tenant, terminal), None);

    cache.set(tenant, terminal, None);
    assert_eq!(cache.get(tenant, terminal), None);
}

#[test]
fn share_fragment_decodes_to_the_same_payload() {
    let p = payload(0, 15);
    let fragment = encode_share_fragment(&p);
    assert!(!fragment.contains('='), "fragment must be url-safe unpadded");
    assert_eq!(decode_share_fragment(&fragment), Some(p));
}

#[test]
fn cursor_round_trips_and_rejects_garbage() {
    let cursor = Cursor {
        created_at: Utc::now(),
        id: Uuid::new_v4(),
    };
    let encoded = cursor.encode();
    let parsed = Cursor::parse(&encoded).expect("parse");
    assert_eq!(parsed.id, cursor.id);
    assert_eq!(
        parsed.created_at.timestamp_micros(),
        cursor.created_at.timestamp_micros()
    );

    assert!(Cursor::parse("").is_none());
    assert!(Cursor::parse("not-a-cursor").is_none());
    assert!(Cursor::parse("12345").is_none());
    assert!(Cursor::parse("abc,def").is_none());
}
