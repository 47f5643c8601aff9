use tilt_core::{PeerId, SignalMessage};
use tilt_transport::{SignalingState, TransportEvent};

use crate::integration::{init_tracing, join_peer};
use crate::utils::{MESSAGE_TIMEOUT_MS, MockRelay};

#[tokio::test]
async fn test_one_failed_peer_leaves_the_others_alone() {
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
    assert!(c_events.wait_for_channel_open(&a_id).await);

    // An offer from c that no connection can accept.
    relay.deliver(SignalMessage::Offer {
        from: c_id.clone(),
        to: a_id.clone(),
        sdp: "not a session description".to_owned(),
    });

    let failed = a_events
        .wait_for(MESSAGE_TIMEOUT_MS, |e| {
            matches!(e, TransportEvent::PeerFailed { peer_id, .. } if *peer_id == c_id)
        })
        .await;
    assert!(failed.is_some(), "a should report c as failed");

    assert_eq!(a.open_channels(), vec![b_id.clone()]);
    assert!(a.roster().contains(&c_id));
    assert!(!a_events.seen.iter().any(|e| matches!(
        e,
        TransportEvent::PeerFailed { peer_id, .. } if *peer_id == b_id
    )));
    assert!(
        a_events
            .signaling_states()
            .iter()
            .all(|s| !matches!(s, SignalingState::Closed | SignalingState::Failed))
    );

    a.send("still here", Some(&b_id));
    let frames = b_events.collect_messages(1).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].peer_id, a_id);
    assert_eq!(frames[0].payload, "still here");

    a.disconnect().await;
    b.disconnect().await;
    c.disconnect().await;
}
