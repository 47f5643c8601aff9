use std::time::Duration;

use tilt_core::{ErrorKind, PeerId};
use tilt_transport::{MediaOptions, PeerManager, SignalingState, TransportConfig};

use crate::integration::{init_tracing, test_config};
use crate::utils::{EventLog, dead_link, silent_link};

#[tokio::test]
async fn test_relay_gone_before_roster() {
    init_tracing();

    let (manager, events) = PeerManager::new(PeerId::from("web-a"), test_config());
    let mut events = EventLog::new(events);

    let err = manager
        .connect_with_link(dead_link(), MediaOptions::NONE)
        .await
        .expect_err("connect over a dead link must fail");

    assert_eq!(err.kind, ErrorKind::SignalingUnavailable);
    assert!(events.wait_for_signaling(SignalingState::Failed).await);
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_relay_silent_until_timeout() {
    init_tracing();

    let config = TransportConfig {
        handshake_timeout: 300,
        ..test_config()
    };
    let (manager, events) = PeerManager::new(PeerId::from("web-a"), config);
    let mut events = EventLog::new(events);
    let (link, _relay_end) = silent_link();

    let err = manager
        .connect_with_link(link, MediaOptions::NONE)
        .await
        .expect_err("connect to a silent relay must time out");

    assert_eq!(err.kind, ErrorKind::SignalingUnavailable);
    assert!(events.wait_for_signaling(SignalingState::Failed).await);
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_disconnect_aborts_pending_connect() {
    init_tracing();

    let (manager, _events) = PeerManager::new(PeerId::from("web-a"), test_config());
    let (link, _relay_end) = silent_link();

    let pending = tokio::spawn({
        let manager = manager.clone();
        async move { manager.connect_with_link(link, MediaOptions::NONE).await }
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    manager.disconnect().await;

    let result = pending.await.expect("connect task panicked");
    assert_eq!(result.unwrap_err().kind, ErrorKind::Cancelled);
    assert!(!manager.is_connected());
}

#[tokio::test]
async fn test_unreachable_relay_url() {
    init_tracing();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let (manager, events) = PeerManager::new(PeerId::from("web-a"), test_config());
    let mut events = EventLog::new(events);

    let err = manager
        .connect(&format!("ws://{addr}/ws"), MediaOptions::NONE)
        .await
        .expect_err("nothing listens on this port");

    assert_eq!(err.kind, ErrorKind::SignalingUnavailable);
    assert!(events.wait_for_signaling(SignalingState::Failed).await);
}
