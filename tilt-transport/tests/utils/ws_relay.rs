use std::net::SocketAddr;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};

use super::mock_relay::MockRelay;

/// Serve `relay` over WebSocket on an ephemeral localhost port.
/// Returns the `ws://` URL clients should connect to.
pub async fn spawn_ws_relay(relay: MockRelay) -> anyhow::Result<String> {
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .with_state(relay);

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(format!("ws://{addr}/ws"))
}

async fn ws_handler(ws: WebSocketUpgrade, State(relay): State<MockRelay>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| bridge(socket, relay))
}

async fn bridge(socket: WebSocket, relay: MockRelay) {
    let (mut sender, mut receiver) = socket.split();
    let mut link = relay.link();

    loop {
        tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    link.send_raw(text.as_str());
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            outgoing = link.recv() => match outgoing {
                Some(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
        }
    }
}
