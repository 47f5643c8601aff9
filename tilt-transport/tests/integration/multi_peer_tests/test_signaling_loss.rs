use tilt_core::PeerId;
use tilt_transport::SignalingState;

use crate::integration::{init_tracing, join_peer};
use crate::utils::MockRelay;

#[tokio::test]
async fn test_established_peers_survive_signaling_loss() {
    init_tracing();

    let relay = MockRelay::new();
    let (a, mut a_events) = join_peer(&relay, "web-a").await;
    let (b, mut b_events) = join_peer(&relay, "web-b").await;

    let a_id = PeerId::from("web-a");
    let b_id = PeerId::from("web-b");
    assert!(a_events.wait_for_channel_open(&b_id).await);
    assert!(b_events.wait_for_channel_open(&a_id).await);

    relay.sever(&a_id);

    assert!(a_events.wait_for_signaling(SignalingState::Closed).await);
    assert!(a.is_connected());
    assert_eq!(a.open_channels(), vec![b_id.clone()]);

    a.send("after relay loss", Some(&b_id));
    let frames = b_events.collect_messages(1).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload, "after relay loss");

    a.disconnect().await;
    b.disconnect().await;
}
