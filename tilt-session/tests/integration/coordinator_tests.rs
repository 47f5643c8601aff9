use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use tilt_core::{ErrorKind, PeerId};
use tilt_sensor::{ChannelSource, RawOrientation};
use tilt_session::{
    Coordinator, GameScene, MemoryIdentityStore, PlayerInfo, SessionConfig, SessionError,
};
use tilt_transport::TransportEvent;

use crate::integration::{LOCAL_ID, init_tracing, settle, start_session, start_with_sensor};
use crate::utils::RecordingSink;

#[tokio::test(start_paused = true)]
async fn test_identify_goes_to_each_new_channel_only() {
    let mut s = start_session(None, SessionConfig::default()).await;
    s.handle.confirm_identity("Amy", "red").await.unwrap();

    s.connect(&["web-p2"]);
    settle().await;

    let identifies = s.sink.of_kind("identify");
    assert_eq!(identifies.len(), 1);
    assert_eq!(identifies[0].target, Some(PeerId::from("web-p2")));
    assert_eq!(identifies[0].json()["nickname"], "Amy");
    assert_eq!(identifies[0].json()["characterName"], "red");

    s.frame(
        "web-p2",
        r#"{"type":"identify","nickname":"Bo","characterName":"blue"}"#,
    );
    let state = s
        .wait_for_state(|st| !st.other_players.is_empty())
        .await;
    assert_eq!(
        state.other_players,
        vec![PlayerInfo {
            id: PeerId::from("web-p2"),
            name: "Bo".into(),
            avatar: "blue".into(),
        }]
    );
    assert_eq!(state.local_player.id, PeerId::from(LOCAL_ID));
    assert_eq!(state.local_player.name.as_deref(), Some("Amy"));
}

#[tokio::test(start_paused = true)]
async fn test_scene_flow_and_final_results() {
    let mut s = start_session(None, SessionConfig::default()).await;
    s.connect(&["web-host"]);

    s.frame("web-host", r#"{"type":"navigate_to_game"}"#);
    s.wait_for_state(|st| st.game_scene == GameScene::Tutorial)
        .await;

    s.frame("web-host", r#"{"type":"navigate_to_playing"}"#);
    s.wait_for_state(|st| st.game_scene == GameScene::Playing)
        .await;

    s.frame(
        "web-host",
        r#"{"type":"terminate","finalPlayerDatas":[{"name":"A","point":10,"rank":1,"color":"red","skin":"fox"}]}"#,
    );
    let state = s
        .wait_for_state(|st| st.game_scene == GameScene::Awards)
        .await;
    assert_eq!(state.final_results.len(), 1);
    assert_eq!(state.final_results[0].name, "A");
}

#[tokio::test(start_paused = true)]
async fn test_start_game_is_host_only() {
    let mut s = start_session(None, SessionConfig::default()).await;
    s.connect(&["web-host"]);
    s.handle.confirm_identity("Amy", "red").await.unwrap();

    assert_eq!(
        s.handle.start_game("forest").await.unwrap_err(),
        SessionError::NotHost
    );
    assert!(s.sink.of_kind("start_game").is_empty());

    s.frame("web-host", &format!(r#"{{"type":"host_update","hostId":"{LOCAL_ID}"}}"#));
    s.wait_for_state(|st| st.is_host).await;

    s.handle.start_game("forest").await.unwrap();
    let starts = s.sink.of_kind("start_game");
    assert_eq!(starts.len(), 1);
    assert_eq!(starts[0].target, None);
    assert_eq!(starts[0].json()["levelName"], "forest");
}

#[tokio::test(start_paused = true)]
async fn test_sensorless_client_answers_tutorial() {
    let mut s = start_session(None, SessionConfig::default()).await;
    s.connect(&["web-host"]);

    s.frame(
        "web-host",
        r#"{"type":"tutorial_instruction","step":"backward","message":"Lean back"}"#,
    );
    settle().await;

    let frames = s.sink.frames();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].kind(), "move");
    assert_eq!(frames[0].vector(), (0.0, -1.0));
    assert_eq!(frames[1].kind(), "tutorial_step_complete");
    assert_eq!(frames[1].json()["step"], "backward");
    assert!(
        frames
            .iter()
            .all(|f| f.target == Some(PeerId::from("web-host")))
    );
    assert_eq!(s.handle.state().tutorial, None);
}

#[tokio::test(start_paused = true)]
async fn test_calibration_is_announced() {
    let s = start_with_sensor(SessionConfig::default()).await;
    s.connect(&["web-host"]);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let announced = s.sink.of_kind("calibrated");
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].target, Some(PeerId::from("web-host")));
}

#[tokio::test(start_paused = true)]
async fn test_calibration_reaches_peers_that_connect_later() {
    let s = start_with_sensor(SessionConfig::default()).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(s.sink.of_kind("calibrated").is_empty(), "nobody to tell yet");

    s.connect(&["web-host"]);
    settle().await;
    let announced = s.sink.of_kind("calibrated");
    assert_eq!(announced.len(), 1);
    assert_eq!(announced[0].target, Some(PeerId::from("web-host")));

    s.event(TransportEvent::RosterChanged(vec![
        PeerId::from("web-host"),
        PeerId::from("web-p3"),
    ]));
    s.event(TransportEvent::DataChannelOpen(PeerId::from("web-p3")));
    settle().await;
    let targets: Vec<_> = s
        .sink
        .of_kind("calibrated")
        .into_iter()
        .map(|f| f.target)
        .collect();
    assert_eq!(
        targets,
        vec![Some(PeerId::from("web-host")), Some(PeerId::from("web-p3"))]
    );
}

#[tokio::test(start_paused = true)]
async fn test_gyro_moves_are_rate_limited() {
    let s = start_with_sensor(SessionConfig::default()).await;
    s.connect(&["web-host"]);
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(s.sink.of_kind("move").is_empty(), "no tilt yet");

    let feeder = s.feeder.as_ref().unwrap();
    assert!(feeder.push(RawOrientation::new(-15.0, 0.0)));
    settle().await;

    tokio::time::sleep(Duration::from_millis(1000)).await;

    let moves = s.sink.of_kind("move");
    assert!(
        (18..=21).contains(&moves.len()),
        "expected ~20 moves in one second, got {}",
        moves.len()
    );
    assert!(moves.iter().all(|m| m.vector() == (0.0, 0.5)));
}

#[tokio::test(start_paused = true)]
async fn test_gyro_is_quiet_without_channels_or_tilt() {
    let s = start_with_sensor(SessionConfig::default()).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let feeder = s.feeder.as_ref().unwrap();
    feeder.push(RawOrientation::new(-15.0, 0.0));
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(s.sink.of_kind("move").is_empty(), "no open channel");

    feeder.push(RawOrientation::new(0.0, 1.0));
    settle().await;
    s.connect(&["web-host"]);
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(s.sink.of_kind("move").is_empty(), "tilt inside the dead zone");
}

#[tokio::test(start_paused = true)]
async fn test_required_sensor_missing_is_a_fault() {
    let config = SessionConfig {
        require_sensor: true,
        ..SessionConfig::default()
    };
    let (source, _feeder) = ChannelSource::new();
    let s = start_session(Some(source.unsupported()), config).await;

    let fault = s.handle.state().fault.clone().expect("fault expected");
    assert_eq!(fault.kind, ErrorKind::Unsupported);
}

#[tokio::test]
async fn test_start_refuses_a_transport_with_another_id() {
    init_tracing();
    let identity = MemoryIdentityStore::with_id(PeerId::from(LOCAL_ID));

    let (_transport, transport_rx) = mpsc::unbounded_channel();
    let sink = RecordingSink::announcing("web-someone-else");
    let err = Coordinator::start(
        SessionConfig::default(),
        &identity,
        Arc::new(sink.clone()),
        transport_rx,
        None,
    )
    .await
    .err()
    .expect("mismatched ids must not start");
    match err {
        SessionError::Identity(detail) => {
            assert!(detail.contains("web-someone-else"));
            assert!(detail.contains(LOCAL_ID));
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let (_transport, transport_rx) = mpsc::unbounded_channel();
    let handle = Coordinator::start(
        SessionConfig::default(),
        &identity,
        Arc::new(RecordingSink::announcing(LOCAL_ID)),
        transport_rx,
        None,
    )
    .await
    .expect("matching ids start");
    assert_eq!(handle.state().local_player.id, PeerId::from(LOCAL_ID));
    handle.teardown().await;
}

#[tokio::test(start_paused = true)]
async fn test_teardown_releases_everything() {
    let s = start_with_sensor(SessionConfig::default()).await;
    s.connect(&["web-host"]);
    settle().await;

    s.handle.teardown().await;
    s.handle.teardown().await;

    settle().await;
    assert!(s.sink.is_closed());
    assert!(!s.feeder.as_ref().unwrap().is_listening());

    let state = s.handle.state();
    assert!(!state.connected);
    assert!(state.other_players.is_empty());

    assert_eq!(
        s.handle.confirm_identity("Amy", "red").await.unwrap_err(),
        SessionError::Closed
    );
    assert!(s.handle.press(tilt_session::PadDirection::Up).is_err());
}
