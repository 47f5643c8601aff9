use std::time::Duration;

use tilt_core::PeerId;
use tilt_transport::{PeerTier, TransportEvent};

use crate::integration::{init_tracing, join_peer};
use crate::utils::{CONNECTION_TIMEOUT_MS, EventLog, MockRelay, eventually};

fn channel_opens(events: &EventLog, peer_id: &PeerId) -> usize {
    events
        .seen
        .iter()
        .filter(|e| matches!(e, TransportEvent::DataChannelOpen(id) if id == peer_id))
        .count()
}

fn failures(events: &EventLog) -> usize {
    events
        .seen
        .iter()
        .filter(|e| matches!(e, TransportEvent::PeerFailed { .. }))
        .count()
}

#[tokio::test]
async fn test_crossing_offers_settle_on_one_connection() {
    init_tracing();

    let relay = MockRelay::new();
    relay.hold();
    let (a, mut a_events) = join_peer(&relay, "web-a").await;
    let (b, mut b_events) = join_peer(&relay, "web-b").await;

    let a_id = PeerId::from("web-a");
    let b_id = PeerId::from("web-b");

    // a offers because its id sorts first; b is pushed into offering too.
    assert!(eventually(CONNECTION_TIMEOUT_MS, || relay.held_offers().len() == 1).await);
    b.initiate_offers_to_all_peers();
    assert!(eventually(CONNECTION_TIMEOUT_MS, || relay.held_offers().len() == 2).await);
    let mut offers = relay.held_offers();
    offers.sort();
    assert_eq!(
        offers,
        vec![(a_id.clone(), b_id.clone()), (b_id.clone(), a_id.clone())]
    );

    relay.release();

    assert!(a_events.wait_for_channel_open(&b_id).await);
    assert!(b_events.wait_for_channel_open(&a_id).await);

    tokio::time::sleep(Duration::from_millis(500)).await;
    a_events.drain();
    b_events.drain();

    assert_eq!(a.open_channels(), vec![b_id.clone()]);
    assert_eq!(b.open_channels(), vec![a_id.clone()]);
    assert_eq!(a.tier(&b_id), Some(PeerTier::ChannelOpen));
    assert_eq!(channel_opens(&a_events, &b_id), 1);
    assert_eq!(channel_opens(&b_events, &a_id), 1);
    assert_eq!(failures(&a_events), 0);
    assert_eq!(failures(&b_events), 0);

    a.send("after the collision", Some(&b_id));
    let frames = b_events.collect_messages(1).await;
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].payload, "after the collision");

    a.disconnect().await;
    b.disconnect().await;
}

#[tokio::test]
async fn test_initiate_offers_skips_connected_peers() {
    init_tracing();

    let relay = MockRelay::new();
    let (a, mut a_events) = join_peer(&relay, "web-a").await;
    let (b, mut b_events) = join_peer(&relay, "web-b").await;

    let a_id = PeerId::from("web-a");
    let b_id = PeerId::from("web-b");

    assert!(a_events.wait_for_channel_open(&b_id).await);
    assert!(b_events.wait_for_channel_open(&a_id).await);

    relay.hold();
    a.initiate_offers_to_all_peers();
    b.initiate_offers_to_all_peers();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(relay.held_offers().is_empty());
    relay.release();

    a_events.drain();
    assert_eq!(channel_opens(&a_events, &b_id), 1);
    assert!(
        !a_events
            .seen
            .iter()
            .any(|e| matches!(e, TransportEvent::DataChannelClosed(_)))
    );
    assert_eq!(a.open_channels(), vec![b_id]);

    a.disconnect().await;
    b.disconnect().await;
}
