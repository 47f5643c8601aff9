use tilt_core::PeerId;
use tilt_transport::{SignalingState, TransportEvent};

use crate::integration::{init_tracing, join_peer};
use crate::utils::{CONNECTION_TIMEOUT_MS, MockRelay, eventually};

#[tokio::test]
async fn test_peer_leaves_without_disturbing_others() {
    init_tracing();

    let relay = MockRelay::new();
    let (a, mut a_events) = join_peer(&relay, "web-a").await;
    let (b, mut b_events) = join_peer(&relay, "web-b").await;
    let (c, mut c_events) = join_peer(&relay, "web-c").await;

    let a_id = PeerId::from("web-a");
    let b_id = PeerId::from("web-b");
    let c_id = PeerId::from("web-c");

    assert!(a_events.wait_for_channel_open(&b_id).await);
    assert!(a_events.wait_for_channel_open(&c_id).await);
    assert!(b_events.wait_for_channel_open(&c_id).await);
    assert!(c_events.wait_for_channel_open(&a_id).await);

    c.disconnect().await;

    assert!(c_events.wait_for_signaling(SignalingState::Closed).await);
    assert!(c_events.seen.contains(&TransportEvent::RosterChanged(Vec::new())));
    assert!(c.roster().is_empty());
    assert!(!c.is_connected());

    assert!(a_events.wait_for_channel_closed(&c_id).await);
    assert!(eventually(CONNECTION_TIMEOUT_MS, || a.roster() == vec![b_id.clone()]).await);
    assert!(eventually(CONNECTION_TIMEOUT_MS, || b.roster() == vec![a_id.clone()]).await);
    assert_eq!(a.open_channels(), vec![b_id.clone()]);

    a.send("still here", Some(&b_id));
    let frames = b_events.collect_messages(1).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload, "still here");

    a.disconnect().await;
    b.disconnect().await;
}
