use super::AppState;
use crate::error::BridgeError;
use crate::fanout::{ClientConnection, FrameMode};
use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// GET {ws_path} - WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if !state.registry.has_capacity() {
        warn!(
            max_clients = state.registry.max_clients(),
            "Client limit reached, refusing upgrade"
        );
        return (StatusCode::SERVICE_UNAVAILABLE, "Client limit reached").into_response();
    }

    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    ws.on_upgrade(move |socket| handle_socket(socket, peer, state))
}

/// Drive one WebSocket: forward queued payloads out, answer pings, and
/// leave the registry when either side closes.
async fn handle_socket(mut socket: WebSocket, peer: Option<SocketAddr>, state: Arc<AppState>) {
    let mut connection = match state.registry.on_connect(peer) {
        Ok(connection) => connection,
        Err(e) => {
            warn!(peer = ?peer, error = %e, "Refusing WebSocket client");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: close_code::AGAIN,
                    reason: "client limit reached".into(),
                })))
                .await;
            return;
        }
    };

    let frame_mode = state.config.fanout.frame_mode;
    let send_timeout = state.config.fanout.send_timeout();

    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => {
                        info!(client_id = %connection.id(), "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = socket.send(Message::Pong(data)).await {
                            error!(client_id = %connection.id(), error = %e, "Failed to send pong");
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Pure forward relay: client text/binary frames are ignored
                    }
                    Some(Err(e)) => {
                        warn!(client_id = %connection.id(), error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            outgoing = connection.recv() => {
                match outgoing {
                    Some(payload) => {
                        let frame = encode_frame(frame_mode, payload);
                        if let Err(e) = send_with_timeout(&mut socket, &connection, frame, send_timeout).await {
                            warn!(error = %e, "Dropping client");
                            break;
                        }
                    }
                    None => {
                        // Pruned by the registry
                        info!(client_id = %connection.id(), "Client pruned, closing socket");
                        let _ = timeout(send_timeout, socket.send(Message::Close(None))).await;
                        break;
                    }
                }
            }
        }
    }

    connection.begin_close();
    state.registry.on_close(connection.id());
}

async fn send_with_timeout(
    socket: &mut WebSocket,
    connection: &ClientConnection,
    frame: Message,
    send_timeout: Duration,
) -> Result<(), BridgeError> {
    match timeout(send_timeout, socket.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(BridgeError::ClientWrite {
            id: connection.id(),
            reason: e.to_string(),
        }),
        Err(_) => Err(BridgeError::ClientWrite {
            id: connection.id(),
            reason: format!("write timed out after {:?}", send_timeout),
        }),
    }
}

/// Map payload bytes to a single WebSocket frame
pub(crate) fn encode_frame(mode: FrameMode, payload: Bytes) -> Message {
    match mode {
        FrameMode::Binary => Message::Binary(payload.to_vec()),
        FrameMode::Text => Message::Text(String::from_utf8_lossy(&payload).into_owned()),
        FrameMode::Auto => match String::from_utf8(payload.to_vec()) {
            Ok(text) => Message::Text(text),
            Err(e) => Message::Binary(e.into_bytes()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_mode_sends_text_for_utf8() {
        match encode_frame(FrameMode::Auto, Bytes::from("42.5")) {
            Message::Text(text) => assert_eq!(text, "42.5"),
            other => panic!("expected text frame, got {:?}", other),
        }
    }

    #[test]
    fn test_auto_mode_falls_back_to_binary() {
        match encode_frame(FrameMode::Auto, Bytes::from_static(&[0xff, 0x00, 0x7f])) {
            Message::Binary(data) => assert_eq!(data, vec![0xff, 0x00, 0x7f]),
            other => panic!("expected binary frame, got {:?}", other),
        }
    }

    #[test]
    fn test_forced_modes() {
        assert!(matches!(
            encode_frame(FrameMode::Binary, Bytes::from("42.5")),
            Message::Binary(data) if data == b"42.5"
        ));
        assert!(matches!(
            encode_frame(FrameMode::Text, Bytes::from_static(&[b'a', 0xff])),
            Message::Text(text) if text == "a\u{fffd}"
        ));
    }
}
