//! WebSocket endpoint for observers

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use crate::broadcast::hub::{BroadcastHub, ControlCommand};
use crate::broadcast::protocol::ClientMessage;
use crate::core::error::Result;

/// Bind the listener. Split from `serve` so callers learn the bound
/// address before the accept loop starts.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "observer endpoint listening");
    Ok(listener)
}

/// Accept observers until the listener fails
pub async fn serve(listener: TcpListener, hub: BroadcastHub) -> Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let hub = hub.clone();
        tokio::spawn(async move {
            handle_connection(stream, addr, hub).await;
        });
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, hub: BroadcastHub) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!(%addr, error = %e, "websocket handshake failed");
            return;
        }
    };
    let (mut write, mut read) = ws_stream.split();
    let mut observer = hub.subscribe();
    let control = hub.control();
    info!(%addr, observers = hub.observer_count(), "observer connected");

    if let Some(init) = observer.initial_frame() {
        if let Err(e) = write.send(Message::Text(init.to_string())).await {
            warn!(%addr, error = %e, "failed to send world:init");
            return;
        }
    }

    loop {
        tokio::select! {
            frame = observer.next_frame() => {
                let Some(frame) = frame else { break };
                if let Err(e) = write.send(Message::Text(frame.to_string())).await {
                    warn!(%addr, error = %e, "send failed, dropping observer");
                    break;
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(cmd) = parse_command(&text, addr) {
                            if control.send(cmd).await.is_err() {
                                // Loop has shut down
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        if write.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(%addr, error = %e, "read failed");
                        break;
                    }
                }
            }
        }
    }

    drop(observer);
    info!(%addr, observers = hub.observer_count(), "observer disconnected");
}

fn parse_command(text: &str, addr: SocketAddr) -> Option<ControlCommand> {
    match ClientMessage::parse(text) {
        Ok(ClientMessage::SetSpeed { speed }) => Some(ControlCommand::SetSpeed(speed)),
        Ok(ClientMessage::Reset) => Some(ControlCommand::Reset),
        Err(e) => {
            debug!(%addr, error = %e, "ignoring malformed client message");
            None
        }
    }
}
