use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use tilt_core::SignalMessage;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

/// Bidirectional text pipe to the signaling relay.
///
/// The relay only ever sees handshake envelopes and roster notices. The link
/// is closed once `recv` returns `None`.
pub struct SignalingLink {
    outbound: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl SignalingLink {
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        inbound: mpsc::UnboundedReceiver<String>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Two links wired back to back. What one sends, the other receives.
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        (Self::new(a_tx, b_rx), Self::new(b_tx, a_rx))
    }

    /// Open a WebSocket to the relay and pump text frames through the link.
    pub async fn connect(url: &str) -> Result<Self> {
        let (ws, _) = connect_async(url)
            .await
            .with_context(|| format!("Failed to reach signaling relay at {url}"))?;
        info!("Signaling socket open: {}", url);

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut send_task = tokio::spawn(async move {
                while let Some(text) = out_rx.recv().await {
                    if ws_tx.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                let _ = ws_tx.close().await;
            });

            let mut recv_task = tokio::spawn(async move {
                while let Some(frame) = ws_rx.next().await {
                    match frame {
                        Ok(Message::Text(text)) => {
                            if in_tx.send(text.to_string()).is_err() {
                                break;
                            }
                        }
                        Ok(Message::Close(_)) => break,
                        Ok(_) => {}
                        Err(e) => {
                            warn!("Signaling socket error: {}", e);
                            break;
                        }
                    }
                }
            });

            tokio::select! {
                _ = &mut send_task => recv_task.abort(),
                _ = &mut recv_task => send_task.abort(),
            }
            debug!("Signaling socket pump finished");
        });

        Ok(Self::new(out_tx, in_rx))
    }

    /// Queue an envelope for the relay. Returns false once the link is closed.
    pub fn send(&self, msg: &SignalMessage) -> bool {
        match serde_json::to_string(msg) {
            Ok(json) => self.outbound.send(json).is_ok(),
            Err(e) => {
                error!("Failed to serialize signal message: {}", e);
                false
            }
        }
    }

    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        self.outbound.send(text.into()).is_ok()
    }

    pub async fn recv(&mut self) -> Option<String> {
        self.inbound.recv().await
    }
}
