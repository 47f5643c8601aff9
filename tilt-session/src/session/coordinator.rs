use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval, interval_at};
use tracing::{debug, info, warn};

use tilt_core::{OutboundMessage, PeerId, Vector2};
use tilt_sensor::{SensorEvent, SensorManager};
use tilt_transport::TransportEvent;

use crate::identity::IdentityStore;
use crate::session::input::{InputGate, PadDirection};
use crate::session::outbound_sink::OutboundSink;
use crate::session::session::{Outgoing, Session};
use crate::session::session_config::SessionConfig;
use crate::session::session_error::SessionError;
use crate::session::session_state::SessionState;

/// A sensor pipeline together with its event stream.
pub struct SensorFeed {
    pub manager: SensorManager,
    pub events: mpsc::UnboundedReceiver<SensorEvent>,
}

enum SessionCommand {
    ConfirmIdentity {
        nickname: String,
        avatar: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    StartGame {
        level_name: String,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },
    Press(PadDirection),
    Release(PadDirection),
    Teardown {
        done: oneshot::Sender<()>,
    },
}

/// Handle used by the presentation layer. Cheap to clone.
#[derive(Clone)]
pub struct SessionHandle {
    local_id: PeerId,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state_rx: watch::Receiver<Arc<SessionState>>,
}

impl SessionHandle {
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub async fn confirm_identity(
        &self,
        nickname: impl Into<String>,
        avatar: impl Into<String>,
    ) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            SessionCommand::ConfirmIdentity {
                nickname: nickname.into(),
                avatar: avatar.into(),
                reply,
            },
            rx,
        )
        .await
    }

    /// Broadcast `start_game`. Host only.
    pub async fn start_game(&self, level_name: impl Into<String>) -> Result<(), SessionError> {
        let (reply, rx) = oneshot::channel();
        self.request(
            SessionCommand::StartGame {
                level_name: level_name.into(),
                reply,
            },
            rx,
        )
        .await
    }

    pub fn press(&self, direction: PadDirection) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::Press(direction))
            .map_err(|_| SessionError::Closed)
    }

    pub fn release(&self, direction: PadDirection) -> Result<(), SessionError> {
        self.commands
            .send(SessionCommand::Release(direction))
            .map_err(|_| SessionError::Closed)
    }

    /// Stop the session, release the sensor and close the transport.
    /// Returns once everything is down. Calling it again is harmless.
    pub async fn teardown(&self) {
        let (done, rx) = oneshot::channel();
        if self.commands.send(SessionCommand::Teardown { done }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Latest published snapshot.
    pub fn state(&self) -> Arc<SessionState> {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<SessionState>> {
        self.state_rx.clone()
    }

    async fn request(
        &self,
        cmd: SessionCommand,
        rx: oneshot::Receiver<Result<(), SessionError>>,
    ) -> Result<(), SessionError> {
        self.commands.send(cmd).map_err(|_| SessionError::Closed)?;
        rx.await.unwrap_or(Err(SessionError::Closed))
    }
}

/// The session actor. Owns the [`Session`] state machine and both periodic
/// input senders, and is the only writer of the outbound sink.
pub struct Coordinator {
    session: Session,
    config: SessionConfig,
    sink: Arc<dyn OutboundSink>,
    sensor: Option<SensorManager>,
    sensor_rx: Option<mpsc::UnboundedReceiver<SensorEvent>>,
    transport_rx: Option<mpsc::UnboundedReceiver<TransportEvent>>,
    command_rx: mpsc::UnboundedReceiver<SessionCommand>,
    state_tx: watch::Sender<Arc<SessionState>>,
    gate: InputGate,
    latest_tilt: Vector2,
    gyro_tick: Interval,
    manual_tick: Option<Interval>,
}

impl Coordinator {
    /// Read the local identity, bring up the sensor if there is one and
    /// spawn the session actor.
    pub async fn start(
        config: SessionConfig,
        identity: &dyn IdentityStore,
        sink: Arc<dyn OutboundSink>,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        sensor: Option<SensorFeed>,
    ) -> Result<SessionHandle, SessionError> {
        let local_id = identity.peer_id().await?;
        if let Some(announced) = sink.local_id()
            && announced != local_id
        {
            return Err(SessionError::Identity(format!(
                "transport announces {announced} but the identity store holds {local_id}"
            )));
        }

        let (sensor, sensor_rx, sensor_result) = match sensor {
            Some(feed) => {
                let result = feed.manager.init().await;
                (Some(feed.manager), Some(feed.events), Some(result))
            }
            None => (None, None, None),
        };
        let sensor_supported = matches!(sensor_result, Some(Ok(())));

        let mut session = Session::new(local_id.clone(), sensor_supported);
        match sensor_result {
            Some(Ok(())) => {}
            Some(Err(e)) if config.require_sensor => session.set_fault(e),
            Some(Err(e)) => warn!("Continuing without motion sensor: {}", e),
            None if config.require_sensor => session.set_fault(
                tilt_core::MotionError::unsupported("no motion sensor attached"),
            ),
            None => info!("No motion sensor; tutorial steps will be answered automatically"),
        }

        let (state_tx, state_rx) = watch::channel(Arc::new(session.state().clone()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let mut gyro_tick = interval(config.gyro_period());
        gyro_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let coordinator = Coordinator {
            session,
            config,
            sink,
            sensor,
            sensor_rx,
            transport_rx: Some(transport_events),
            command_rx,
            state_tx,
            gate: InputGate::new(),
            latest_tilt: Vector2::ZERO,
            gyro_tick,
            manual_tick: None,
        };
        tokio::spawn(coordinator.run());

        Ok(SessionHandle {
            local_id,
            commands: command_tx,
            state_rx,
        })
    }

    async fn run(mut self) {
        info!("Session started for {}", self.session.local_id());

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SessionCommand::Teardown { done }) => {
                            self.shutdown().await;
                            let _ = done.send(());
                            break;
                        }
                        Some(c) => self.handle_command(c),
                        None => {
                            self.shutdown().await;
                            break;
                        }
                    }
                }

                evt = recv_or_pending(&mut self.transport_rx) => {
                    match evt {
                        Some(e) => {
                            let out = self.session.on_transport(&e);
                            self.dispatch(out);
                        }
                        None => {
                            debug!("Transport event stream ended");
                            self.transport_rx = None;
                        }
                    }
                }

                evt = recv_or_pending(&mut self.sensor_rx) => {
                    match evt {
                        Some(e) => self.handle_sensor_event(e),
                        None => self.sensor_rx = None,
                    }
                }

                _ = self.gyro_tick.tick() => self.send_gyro(),

                _ = tick_or_pending(&mut self.manual_tick) => self.send_manual(),
            }

            self.publish();
        }

        info!("Session finished for {}", self.session.local_id());
    }

    fn handle_command(&mut self, cmd: SessionCommand) {
        match cmd {
            SessionCommand::ConfirmIdentity {
                nickname,
                avatar,
                reply,
            } => {
                let result = self
                    .session
                    .confirm_identity(nickname, avatar)
                    .map(|out| self.dispatch(out));
                let _ = reply.send(result);
            }

            SessionCommand::StartGame { level_name, reply } => {
                let result = self
                    .session
                    .start_game(level_name)
                    .map(|out| self.dispatch(vec![out]));
                let _ = reply.send(result);
            }

            SessionCommand::Press(direction) => {
                if self.gate.press(direction) {
                    let period = self.config.manual_period();
                    let mut tick = interval_at(Instant::now() + period, period);
                    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    self.manual_tick = Some(tick);
                }
            }

            SessionCommand::Release(direction) => {
                if let Some(stop) = self.gate.release(direction) {
                    self.manual_tick = None;
                    self.dispatch(vec![Outgoing::broadcast(stop)]);
                }
            }

            SessionCommand::Teardown { .. } => {}
        }
    }

    fn handle_sensor_event(&mut self, event: SensorEvent) {
        match event {
            SensorEvent::CoordinateChange(vector) => self.latest_tilt = vector,
            SensorEvent::DirectionChange(direction) => debug!("Tilt direction {}", direction),
            SensorEvent::CalibrationComplete => {
                let out = self.session.on_calibrated();
                self.dispatch(out);
            }
            SensorEvent::Error(e) => {
                warn!("Sensor error: {}", e);
                if self.config.require_sensor {
                    self.session.set_fault(e);
                }
            }
        }
    }

    fn send_gyro(&mut self) {
        if !self.gate.gyro_allowed() || self.latest_tilt.is_zero() {
            return;
        }
        if !self.session.has_open_channels() {
            return;
        }
        let calibrated = self
            .sensor
            .as_ref()
            .is_some_and(|s| s.status().is_calibrated);
        if !calibrated {
            return;
        }
        self.dispatch(vec![Outgoing::broadcast(OutboundMessage::Move {
            vector: self.latest_tilt,
        })]);
    }

    fn send_manual(&mut self) {
        if let Some(frame) = self.gate.manual_frame() {
            self.dispatch(vec![Outgoing::broadcast(frame)]);
        }
    }

    fn dispatch(&self, out: Vec<Outgoing>) {
        for Outgoing { message, target } in out {
            self.sink.send(message.encode(), target.as_ref());
        }
    }

    fn publish(&self) {
        let current = self.session.state();
        self.state_tx.send_if_modified(|published| {
            if **published == *current {
                return false;
            }
            *published = Arc::new(current.clone());
            true
        });
    }

    async fn shutdown(&mut self) {
        self.manual_tick = None;
        if let Some(sensor) = self.sensor.take() {
            sensor.destroy();
        }
        self.sink.close().await;
        self.session.on_transport(&TransportEvent::RosterChanged(Vec::new()));
        self.session
            .on_transport(&TransportEvent::Signaling(tilt_transport::SignalingState::Closed));
        self.publish();
    }
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::UnboundedReceiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn tick_or_pending(tick: &mut Option<Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
