use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::signaling::SignalingLink;
use crate::transport::peer_loop::{PeerCommand, PeerLoop};
use crate::transport::roster::{PeerTier, RosterTable};
use crate::transport::transport_config::{MediaOptions, TransportConfig};
use crate::transport::transport_event::{SignalingState, TransportEvent};
use tilt_core::{MotionError, PeerId};

struct ActiveLoop {
    epoch: u64,
    commands: mpsc::UnboundedSender<PeerCommand>,
}

struct ManagerInner {
    local_id: PeerId,
    config: TransportConfig,
    events: mpsc::UnboundedSender<TransportEvent>,
    roster: RosterTable,
    active: Mutex<Option<ActiveLoop>>,
    /// Bumped by every connect and disconnect. A connect that finds the epoch
    /// moved on while it was waiting has been aborted.
    epoch: AtomicU64,
}

/// Handle to the peer mesh of one local peer.
///
/// Cheap to clone. All connection state lives in a background task; the
/// handle only forwards commands and reads roster snapshots.
#[derive(Clone)]
pub struct PeerManager {
    inner: Arc<ManagerInner>,
}

impl PeerManager {
    pub fn new(
        local_id: PeerId,
        config: TransportConfig,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let manager = Self {
            inner: Arc::new(ManagerInner {
                local_id,
                config,
                events,
                roster: RosterTable::new(),
                active: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        };
        (manager, events_rx)
    }

    pub fn local_id(&self) -> &PeerId {
        &self.inner.local_id
    }

    pub fn config(&self) -> &TransportConfig {
        &self.inner.config
    }

    /// Open a WebSocket to the relay at `url` and join its mesh.
    ///
    /// Resolves once the relay has delivered its first roster. Any previous
    /// session is torn down first.
    pub async fn connect(&self, url: &str, media: MediaOptions) -> Result<(), MotionError> {
        let epoch = self.begin_attempt().await;
        let window = self.inner.config.handshake_window();

        let link = match timeout(window, SignalingLink::connect(url)).await {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                self.emit(TransportEvent::Signaling(SignalingState::Failed));
                return Err(MotionError::signaling_unavailable(format!("{e:#}")));
            }
            Err(_) => {
                self.emit(TransportEvent::Signaling(SignalingState::Failed));
                return Err(MotionError::signaling_unavailable(format!(
                    "relay at {url} did not open within {window:?}"
                )));
            }
        };

        if self.current_epoch() != epoch {
            return Err(MotionError::cancelled("disconnect() called during connect"));
        }
        self.run_link(epoch, link, media).await
    }

    /// Join a mesh over an already established signaling link.
    pub async fn connect_with_link(
        &self,
        link: SignalingLink,
        media: MediaOptions,
    ) -> Result<(), MotionError> {
        let epoch = self.begin_attempt().await;
        self.run_link(epoch, link, media).await
    }

    /// Tear down every connection, channel and the signaling link. Safe to
    /// call repeatedly and while a `connect` is still in flight.
    pub async fn disconnect(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let Some(active) = self.active().take() else {
            return;
        };

        let (done_tx, done_rx) = oneshot::channel();
        let shutdown = PeerCommand::Shutdown {
            reason: SignalingState::Closed,
            done: done_tx,
        };
        if active.commands.send(shutdown).is_ok() {
            let _ = done_rx.await;
        }
        info!("Transport for {} disconnected", self.inner.local_id);
    }

    /// Write a serialized frame to one peer, or to every open channel when
    /// `target` is `None`. A no-op with a warning while disconnected.
    pub fn send(&self, payload: impl Into<String>, target: Option<&PeerId>) {
        self.command(PeerCommand::Send {
            payload: payload.into(),
            target: target.cloned(),
        });
    }

    /// Offer to every known peer that has no connection yet.
    pub fn initiate_offers_to_all_peers(&self) {
        self.command(PeerCommand::InitiateOffers);
    }

    pub fn is_connected(&self) -> bool {
        self.active().is_some()
    }

    /// Peers currently announced by the relay.
    pub fn roster(&self) -> Vec<PeerId> {
        self.inner.roster.roster()
    }

    pub fn tier(&self, peer_id: &PeerId) -> Option<PeerTier> {
        self.inner.roster.tier(peer_id)
    }

    /// Peers whose connection reached the connected state.
    pub fn connected_peers(&self) -> Vec<PeerId> {
        self.inner.roster.connected_peers()
    }

    /// Peers with an open data channel, in channel-open order.
    pub fn open_channels(&self) -> Vec<PeerId> {
        self.inner.roster.open_channels()
    }

    fn emit(&self, event: TransportEvent) {
        let _ = self.inner.events.send(event);
    }

    fn active(&self) -> MutexGuard<'_, Option<ActiveLoop>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn current_epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn command(&self, cmd: PeerCommand) {
        let guard = self.active();
        let Some(active) = guard.as_ref() else {
            warn!("Transport is not connected; dropping command");
            return;
        };
        if active.commands.send(cmd).is_err() {
            warn!("Transport loop has stopped; dropping command");
        }
    }

    async fn begin_attempt(&self) -> u64 {
        self.disconnect().await;
        self.emit(TransportEvent::Signaling(SignalingState::Connecting));
        self.current_epoch()
    }

    async fn run_link(
        &self,
        epoch: u64,
        link: SignalingLink,
        media: MediaOptions,
    ) -> Result<(), MotionError> {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        {
            let mut active = self.active();
            if self.current_epoch() != epoch {
                return Err(MotionError::cancelled("disconnect() called during connect"));
            }
            *active = Some(ActiveLoop {
                epoch,
                commands: command_tx,
            });
        }

        let peer_loop = PeerLoop::new(
            self.inner.local_id.clone(),
            &self.inner.config,
            media,
            link,
            self.inner.roster.clone(),
            ready_tx,
            command_rx,
            self.inner.events.clone(),
        );
        tokio::spawn(peer_loop.run());

        let window = self.inner.config.handshake_window();
        match timeout(window, ready_rx).await {
            Ok(Ok(Ok(()))) if self.current_epoch() == epoch => Ok(()),
            Ok(Ok(Ok(()))) | Ok(Err(_)) => {
                Err(MotionError::cancelled("disconnect() called during connect"))
            }
            Ok(Ok(Err(e))) => {
                self.release(epoch);
                Err(e)
            }
            Err(_) => {
                self.abort(epoch, SignalingState::Failed).await;
                Err(MotionError::signaling_unavailable(format!(
                    "relay sent no roster within {window:?}"
                )))
            }
        }
    }

    /// Forget the loop of `epoch` if it is still the active one.
    fn release(&self, epoch: u64) -> Option<ActiveLoop> {
        let mut active = self.active();
        match active.as_ref() {
            Some(current) if current.epoch == epoch => active.take(),
            _ => None,
        }
    }

    async fn abort(&self, epoch: u64, reason: SignalingState) {
        let Some(active) = self.release(epoch) else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if active
            .commands
            .send(PeerCommand::Shutdown {
                reason,
                done: done_tx,
            })
            .is_ok()
        {
            let _ = done_rx.await;
        }
    }
}
