use tilt_core::PeerId;

use crate::integration::{init_tracing, join_peer};
use crate::utils::MockRelay;

#[tokio::test]
async fn test_broadcast_reaches_every_open_channel() {
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
    assert!(b_events.wait_for_channel_open(&a_id).await);
    assert!(b_events.wait_for_channel_open(&c_id).await);
    assert!(c_events.wait_for_channel_open(&a_id).await);
    assert!(c_events.wait_for_channel_open(&b_id).await);
    assert_eq!(a.open_channels().len(), 2);

    a.send(r#"{"type":"start_game","levelName":"forest"}"#, None);

    for events in [&mut b_events, &mut c_events] {
        let frames = events.collect_messages(1).await;
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].peer_id, a_id);
        assert!(frames[0].payload.contains("forest"));
    }

    // A targeted send only reaches its target.
    b.send("for c only", Some(&c_id));
    let frames = c_events.collect_messages(2).await;
    assert_eq!(frames[1].payload, "for c only");
    a_events.drain();
    assert!(a_events.collect_messages(1).await.is_empty());

    a.disconnect().await;
    b.disconnect().await;
    c.disconnect().await;
}
