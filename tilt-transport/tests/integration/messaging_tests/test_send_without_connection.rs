use tilt_core::PeerId;
use tilt_transport::{PeerManager, SignalingState};

use crate::integration::{init_tracing, join_peer, test_config};
use crate::utils::{EventLog, MockRelay};

#[tokio::test]
async fn test_send_before_connect_is_a_noop() {
    init_tracing();

    let (manager, events) = PeerManager::new(PeerId::from("web-a"), test_config());
    let mut events = EventLog::new(events);

    manager.send("hello", None);
    manager.send("hello", Some(&PeerId::from("web-b")));
    manager.initiate_offers_to_all_peers();
    manager.disconnect().await;
    manager.disconnect().await;

    events.drain();
    assert!(events.seen.is_empty());
    assert!(!manager.is_connected());
    assert!(manager.open_channels().is_empty());
}

#[tokio::test]
async fn test_broadcast_with_no_channels_and_repeated_disconnect() {
    init_tracing();

    let relay = MockRelay::new();
    let (a, mut a_events) = join_peer(&relay, "web-a").await;

    a.send(r#"{"type":"calibrated"}"#, None);
    assert!(a.open_channels().is_empty());

    a.disconnect().await;
    a.disconnect().await;
    a.send("late", None);

    assert!(a_events.wait_for_signaling(SignalingState::Closed).await);
    a_events.drain();
    assert_eq!(a_events.signaling_states(), vec![
        SignalingState::Connecting,
        SignalingState::Open,
        SignalingState::Closed
    ]);
}
