//! Inspection request correlation: replies, timeouts and saturation.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use gateway_core::config::InspectConfig;
use gateway_core::http::HttpRequestData;
use gateway_core::inspect::{
    ChannelInspectManager, InspectError, InspectEvent, InspectRequest, InspectResponsePacket,
    InspectState,
};
use serde_json::json;

mod common;

use common::ScriptedInspectManager;

fn request_data() -> HttpRequestData {
    let mut headers = http::HeaderMap::new();
    headers.insert("x-api-key", http::HeaderValue::from_static("abc"));
    HttpRequestData::new(http::Method::GET, "/stream/updates", headers)
}

#[tokio::test]
async fn saturated_manager_fails_unavailable() {
    let manager = ScriptedInspectManager::new(false);
    let mut req = InspectRequest::new(manager.clone(), &InspectConfig::default());

    req.start(request_data());

    assert_eq!(req.next_event().await, Some(InspectEvent::Error(InspectError::Unavailable)));
    assert!(req.next_event().await.is_none());

    assert_eq!(manager.write_count(), 0);
    assert!(!req.timer_armed());
    assert_eq!(req.state(), InspectState::Failed(InspectError::Unavailable));
    assert_eq!(req.error_condition(), Some(InspectError::Unavailable));
}

#[tokio::test]
async fn reply_completes_request() {
    let (manager, mut outbound) = ChannelInspectManager::new(&InspectConfig::default());
    let manager = Arc::new(manager);
    let mut req = InspectRequest::new(manager.clone(), &InspectConfig::default());

    req.start(request_data());
    assert!(req.try_next_event().is_none());

    let sent = outbound.try_recv().unwrap();
    assert_eq!(sent.id, req.id());
    assert_eq!(sent.method, http::Method::GET);
    assert_eq!(sent.path, "/stream/updates");
    assert_eq!(sent.headers["x-api-key"], "abc");
    assert_eq!(manager.pending(), 1);

    assert!(manager.dispatch(InspectResponsePacket {
        id: sent.id,
        no_proxy: false,
        sharing_key: Bytes::from_static(b"shared"),
        user_data: json!({"tier": 2}),
    }));

    match req.next_event().await {
        Some(InspectEvent::Finished(data)) => {
            assert!(data.allow_proxying);
            assert_eq!(&data.sharing_key[..], b"shared");
            assert_eq!(data.user_data, json!({"tier": 2}));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(req.next_event().await.is_none());

    assert_eq!(req.state(), InspectState::Completed);
    assert!(!req.timer_armed());
    assert_eq!(manager.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn no_reply_times_out_once() {
    let (manager, mut outbound) = ChannelInspectManager::new(&InspectConfig::default());
    let manager = Arc::new(manager);
    let mut req = InspectRequest::new(manager.clone(), &InspectConfig::default());

    req.start(request_data());

    let started = tokio::time::Instant::now();
    assert_eq!(req.next_event().await, Some(InspectEvent::Error(InspectError::Timeout)));
    assert!(started.elapsed() >= Duration::from_secs(8));
    assert!(req.next_event().await.is_none());

    // the late reply has nowhere to go
    let sent = outbound.try_recv().unwrap();
    assert!(!manager.dispatch(InspectResponsePacket {
        id: sent.id,
        no_proxy: false,
        sharing_key: Bytes::new(),
        user_data: serde_json::Value::Null,
    }));
    assert_eq!(manager.pending(), 0);
    assert_eq!(req.error_condition(), Some(InspectError::Timeout));
}

#[tokio::test(start_paused = true)]
async fn reply_and_deadline_together_reply_wins() {
    let manager = ScriptedInspectManager::new(true);
    let mut req = InspectRequest::with_timeout(manager.clone(), Duration::from_secs(8));

    req.start(request_data());
    assert!(req.try_next_event().is_none());

    let reply_sender = manager.written.lock().unwrap()[0].1.clone();
    assert!(reply_sender.send(InspectResponsePacket {
        id: req.id(),
        no_proxy: true,
        sharing_key: Bytes::new(),
        user_data: serde_json::Value::Null,
    }));
    tokio::time::advance(Duration::from_secs(9)).await;

    match req.next_event().await {
        Some(InspectEvent::Finished(data)) => assert!(!data.allow_proxying),
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(req.next_event().await.is_none());
    assert_eq!(manager.unlinks.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn direct_reply_after_timeout_is_ignored() {
    let manager = ScriptedInspectManager::new(true);
    let mut req = InspectRequest::with_timeout(manager.clone(), Duration::from_secs(2));
    req.start(request_data());

    assert_eq!(req.next_event().await, Some(InspectEvent::Error(InspectError::Timeout)));

    let id = req.id();
    req.handle(InspectResponsePacket {
        id,
        no_proxy: false,
        sharing_key: Bytes::new(),
        user_data: serde_json::Value::Null,
    });

    assert!(req.next_event().await.is_none());
    assert_eq!(req.state(), InspectState::Failed(InspectError::Timeout));
    assert_eq!(manager.unlinks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn round_trip_with_inspection_service_task() {
    let config = InspectConfig::default();
    let (manager, mut outbound) = ChannelInspectManager::new(&config);
    let manager = Arc::new(manager);

    let service_manager = manager.clone();
    tokio::spawn(async move {
        while let Some(packet) = outbound.recv().await {
            let no_proxy = packet.path.starts_with("/private");
            service_manager.dispatch(InspectResponsePacket {
                id: packet.id,
                no_proxy,
                sharing_key: Bytes::from(packet.path.clone()),
                user_data: json!({"method": packet.method.as_str()}),
            });
        }
    });

    let mut public = InspectRequest::new(manager.clone(), &config);
    let mut private = InspectRequest::new(manager.clone(), &config);
    assert_ne!(public.id(), private.id());

    public.start(HttpRequestData::new(http::Method::GET, "/public", http::HeaderMap::new()));
    private.start(HttpRequestData::new(http::Method::POST, "/private/x", http::HeaderMap::new()));

    let (a, b) = tokio::join!(public.next_event(), private.next_event());

    match (a, b) {
        (Some(InspectEvent::Finished(a)), Some(InspectEvent::Finished(b))) => {
            assert!(a.allow_proxying);
            assert_eq!(&a.sharing_key[..], b"/public");
            assert!(!b.allow_proxying);
            assert_eq!(b.user_data["method"], "POST");
        }
        other => panic!("unexpected events: {other:?}"),
    }
    assert_eq!(manager.pending(), 0);
}
