use std::time::Duration;

use tilt_sensor::RawOrientation;
use tilt_session::{PadDirection, SessionConfig};

use crate::integration::{settle, start_session, start_with_sensor};

#[tokio::test(start_paused = true)]
async fn test_manual_pad_silences_gyro_until_release() {
    let s = start_with_sensor(SessionConfig::default()).await;
    s.connect(&["web-host"]);
    tokio::time::sleep(Duration::from_millis(1100)).await;

    s.feeder
        .as_ref()
        .unwrap()
        .push(RawOrientation::new(-15.0, 0.0));
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!s.sink.of_kind("move").is_empty());

    s.handle.press(PadDirection::Up).unwrap();
    settle().await;
    let pressed_at = s.sink.len();

    // Release off the 50ms gyro grid so the two never race on one instant.
    tokio::time::sleep(Duration::from_millis(325)).await;
    s.handle.release(PadDirection::Up).unwrap();
    settle().await;

    let frames = s.sink.frames();
    let since_press = &frames[pressed_at..];
    let stop_at = since_press
        .iter()
        .position(|f| f.kind() == "manualMove" && f.vector() == (0.0, 0.0))
        .expect("release must send a stop frame");
    assert_eq!(stop_at, 3, "one manualMove per 100ms while held");
    assert!(
        since_press[..stop_at]
            .iter()
            .all(|f| f.kind() == "manualMove" && f.vector() == (0.0, 1.0))
    );
    let released_at = pressed_at + stop_at + 1;

    tokio::time::sleep(Duration::from_millis(200)).await;
    let after: Vec<_> = s.sink.frames().split_off(released_at);
    assert!(!after.is_empty());
    assert!(after.iter().all(|f| f.kind() == "move"));
}

#[tokio::test(start_paused = true)]
async fn test_opposite_directions_cancel_out() {
    let s = start_session(None, SessionConfig::default()).await;
    s.connect(&["web-host"]);
    settle().await;

    s.handle.press(PadDirection::Left).unwrap();
    s.handle.press(PadDirection::Right).unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;
    assert!(s.sink.frames().is_empty());

    s.handle.release(PadDirection::Left).unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;
    let frames = s.sink.of_kind("manualMove");
    assert!(!frames.is_empty());
    assert!(frames.iter().all(|f| f.vector() == (1.0, 0.0)));

    s.handle.release(PadDirection::Right).unwrap();
    settle().await;
    let stops: Vec<_> = s
        .sink
        .of_kind("manualMove")
        .into_iter()
        .filter(|f| f.vector() == (0.0, 0.0))
        .collect();
    assert_eq!(stops.len(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(s.sink.of_kind("manualMove").last().unwrap().vector(), (0.0, 0.0));
}
