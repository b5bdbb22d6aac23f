//! Event bus tests: ordering, isolation, unsubscribe, native ingress.

use std::sync::{Arc, Mutex};

use pretty_assertions::assert_eq;
use serde_json::json;

use crate::bus::event_types::{
    LlmEnabledChanged, Theme, ThemeChanged, EVENT_LLM_ENABLED_CHANGED, EVENT_THEME_CHANGED,
};
use crate::bus::{EventBus, EventKind, OpaquePayload, SurfaceEvent, TransportAdapter};
use crate::testing::RecordingBridge;

fn ready_bus() -> EventBus {
    let bus = EventBus::new(TransportAdapter::detached());
    bus.initialize();
    bus
}

fn theme(theme: Theme) -> SurfaceEvent {
    SurfaceEvent::ThemeChanged(ThemeChanged { theme })
}

fn recorder(bus: &EventBus, name: &str) -> Arc<Mutex<Vec<SurfaceEvent>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    bus.on(name, move |event| sink.lock().unwrap().push(event.clone()));
    seen
}

#[test]
fn listeners_run_in_registration_order_and_survive_a_panic() {
    let bus = ready_bus();
    let order = Arc::new(Mutex::new(Vec::new()));

    let a = order.clone();
    bus.on(EventKind::ThemeChanged, move |_| a.lock().unwrap().push("A"));
    let b = order.clone();
    bus.on(EventKind::ThemeChanged, move |_| {
        b.lock().unwrap().push("B");
        panic!("listener B failed");
    });
    let c = order.clone();
    bus.on(EventKind::ThemeChanged, move |_| c.lock().unwrap().push("C"));

    assert_eq!(bus.emit(&theme(Theme::Dark)), 3);
    assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);

    // The bus stays usable after a listener failure.
    assert_eq!(bus.emit(&theme(Theme::Light)), 3);
    assert_eq!(order.lock().unwrap().len(), 6);
}

#[test]
fn unsubscribe_stops_delivery_and_is_idempotent() {
    let bus = ready_bus();
    let count = Arc::new(Mutex::new(0));
    let counter = count.clone();
    let subscription = bus.on(EVENT_THEME_CHANGED, move |_| *counter.lock().unwrap() += 1);

    bus.emit(&theme(Theme::Dark));
    assert!(subscription.unsubscribe());
    assert!(!subscription.unsubscribe());
    bus.emit(&theme(Theme::Dark));

    assert_eq!(*count.lock().unwrap(), 1);
    assert!(bus.active_listeners().is_empty());
}

#[test]
fn off_removes_only_the_named_listener() {
    let bus = ready_bus();
    let first = bus.on(EVENT_THEME_CHANGED, |_| {});
    let _second = bus.on(EVENT_THEME_CHANGED, |_| {});

    assert!(bus.off(EVENT_THEME_CHANGED, first.id()));
    assert!(!bus.off(EVENT_THEME_CHANGED, first.id()));
    assert_eq!(bus.active_listeners().get(EVENT_THEME_CHANGED), Some(&1));
}

#[test]
fn once_fires_a_single_time_even_when_reentered() {
    let bus = Arc::new(ready_bus());
    let calls = Arc::new(Mutex::new(0));

    let counter = calls.clone();
    let inner_bus = bus.clone();
    bus.once(EVENT_THEME_CHANGED, move |_| {
        *counter.lock().unwrap() += 1;
        inner_bus.emit(&theme(Theme::Orange));
    });

    bus.emit(&theme(Theme::Dark));
    bus.emit(&theme(Theme::Dark));

    assert_eq!(*calls.lock().unwrap(), 1);
    assert!(bus.active_listeners().is_empty());
}

#[test]
fn emit_without_listeners_is_a_no_op() {
    let bus = ready_bus();
    let event = SurfaceEvent::opaque("custom:unknown", OpaquePayload::Json(json!({})));
    assert_eq!(bus.emit(&event), 0);
}

#[test]
fn listeners_can_subscribe_while_dispatching() {
    let bus = Arc::new(ready_bus());
    let inner_bus = bus.clone();
    bus.on(EVENT_THEME_CHANGED, move |_| {
        inner_bus.on(EVENT_THEME_CHANGED, |_| {});
    });

    assert_eq!(bus.emit(&theme(Theme::Dark)), 1);
    assert_eq!(bus.active_listeners().get(EVENT_THEME_CHANGED), Some(&2));
}

#[test]
fn native_json_round_trips_to_typed_event() {
    let bus = ready_bus();
    let seen = recorder(&bus, EVENT_THEME_CHANGED);

    let sent = theme(Theme::Dark);
    bus.handle_native_event(EVENT_THEME_CHANGED, &sent.payload_json().unwrap());

    assert_eq!(*seen.lock().unwrap(), vec![sent]);
}

#[test]
fn native_double_escaped_payload_is_recovered() {
    let bus = ready_bus();
    let seen = recorder(&bus, EVENT_THEME_CHANGED);

    bus.handle_native_event(EVENT_THEME_CHANGED, r#"{\"theme\":\"dark\"}"#);
    bus.handle_native_event(EVENT_THEME_CHANGED, r#""{\\\"theme\\\":\\\"dark\\\"}""#);

    assert_eq!(
        *seen.lock().unwrap(),
        vec![theme(Theme::Dark), theme(Theme::Dark)]
    );
}

#[test]
fn native_garbage_is_still_delivered() {
    let bus = ready_bus();
    let seen = recorder(&bus, EVENT_THEME_CHANGED);

    bus.handle_native_event(EVENT_THEME_CHANGED, "not json {{{");

    assert_eq!(
        *seen.lock().unwrap(),
        vec![SurfaceEvent::opaque(
            EVENT_THEME_CHANGED,
            OpaquePayload::Raw("not json {{{".to_string())
        )]
    );
}

#[test]
fn native_events_before_initialize_are_replayed() {
    let bus = EventBus::new(TransportAdapter::detached());
    let seen = recorder(&bus, EVENT_LLM_ENABLED_CHANGED);

    bus.handle_native_event(EVENT_LLM_ENABLED_CHANGED, r#"{"llmId":"a","enabled":true}"#);
    assert!(seen.lock().unwrap().is_empty());

    assert!(bus.initialize());
    assert!(!bus.initialize());
    assert_eq!(
        *seen.lock().unwrap(),
        vec![SurfaceEvent::LlmEnabledChanged(LlmEnabledChanged {
            llm_id: "a".to_string(),
            enabled: true,
        })]
    );
}

#[test]
fn pending_queue_drops_oldest_when_full() {
    let bus = EventBus::with_options(
        TransportAdapter::detached(),
        crate::bus::DecodeLadder::standard(),
        2,
    );
    let seen = recorder(&bus, "custom:tick");

    for i in 0..3 {
        bus.handle_native_event("custom:tick", &format!("{{\"n\":{i}}}"));
    }
    bus.initialize();

    let payloads: Vec<_> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|event| match event {
            SurfaceEvent::Opaque {
                payload: OpaquePayload::Json(value),
                ..
            } => value["n"].as_i64().unwrap(),
            other => panic!("unexpected event {other:?}"),
        })
        .collect();
    assert_eq!(payloads, vec![1, 2]);
}

#[test]
fn reset_clears_listeners_and_readiness() {
    let bus = ready_bus();
    bus.on(EVENT_THEME_CHANGED, |_| {});
    bus.reset();

    assert!(!bus.is_initialized());
    assert!(bus.active_listeners().is_empty());
}

#[tokio::test]
async fn trigger_ships_payload_through_the_bridge() {
    let bridge = Arc::new(RecordingBridge::default());
    let bus = EventBus::new(TransportAdapter::new(bridge.clone()));

    bus.trigger_to_other_webview(&SurfaceEvent::LlmEnabledChanged(LlmEnabledChanged {
        llm_id: "gpt".to_string(),
        enabled: false,
    }))
    .await;

    assert_eq!(
        bridge.sent(),
        vec![(
            EVENT_LLM_ENABLED_CHANGED.to_string(),
            r#"{"llmId":"gpt","enabled":false}"#.to_string()
        )]
    );
}

#[tokio::test]
async fn trigger_without_bridge_does_not_fail() {
    let bus = ready_bus();
    bus.trigger_to_other_webview(&theme(Theme::Dark)).await;
}
