// Display-side relay client
// Connects to /ws/game, reconnects after a fixed delay and re-announces the
// last scene so phones that joined meanwhile get the right layout.

use crate::error::{RelayError, Result};
use crate::network::protocol::{DisplayInbound, DisplayOutbound, SessionId};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info};

/// Commands the game loop sends to the display task
#[derive(Debug)]
pub enum DisplayCommand {
    Send(DisplayInbound),
    Disconnect,
}

/// Events the display task sends to the game loop
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEvent {
    Connected,
    /// Link dropped; a reconnect is already scheduled
    Disconnected,
    Message(DisplayOutbound),
}

/// Handle for the game loop to talk to the relay as a display
pub struct DisplayClient {
    tx: mpsc::UnboundedSender<DisplayCommand>,
    rx: mpsc::UnboundedReceiver<DisplayEvent>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl DisplayClient {
    /// Start connecting to `url` (e.g. `ws://host:3000/ws/game`).
    /// Must be called inside a tokio runtime.
    pub fn connect(url: impl Into<String>, reconnect_delay: Duration) -> Self {
        let (tx, commands) = mpsc::unbounded_channel();
        let (events, rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let task = tokio::spawn(run_display(
            url.into(),
            reconnect_delay,
            commands,
            events,
            connected.clone(),
        ));

        Self {
            tx,
            rx,
            connected,
            task,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// Fails with `RelayStopped` once the display task has ended
    fn send(&self, msg: DisplayInbound) -> Result<()> {
        self.tx
            .send(DisplayCommand::Send(msg))
            .map_err(|_| RelayError::RelayStopped)
    }

    /// Announce the current screen; remembered and re-sent after reconnects
    pub fn broadcast_scene(&self, scene: impl Into<String>) -> Result<()> {
        self.send(DisplayInbound::Scene {
            scene: scene.into(),
        })
    }

    pub fn broadcast_state(&self, state: Value) -> Result<()> {
        self.send(DisplayInbound::BroadcastState { state })
    }

    pub fn send_player_message(&self, target_id: SessionId, message: Value) -> Result<()> {
        self.send(DisplayInbound::PlayerMessage { target_id, message })
    }

    /// Try to receive events (non-blocking)
    pub fn try_recv_event(&mut self) -> Option<DisplayEvent> {
        self.rx.try_recv().ok()
    }

    pub async fn recv_event(&mut self) -> Option<DisplayEvent> {
        self.rx.recv().await
    }

    pub fn disconnect(&self) {
        let _ = self.tx.send(DisplayCommand::Disconnect);
    }
}

impl Drop for DisplayClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

enum LinkEnd {
    Dropped,
    Stop,
}

async fn run_display(
    url: String,
    reconnect_delay: Duration,
    mut commands: mpsc::UnboundedReceiver<DisplayCommand>,
    events: mpsc::UnboundedSender<DisplayEvent>,
    connected: Arc<AtomicBool>,
) {
    let mut last_scene: Option<String> = None;

    loop {
        match super::open_socket(&url).await {
            Ok(ws) => {
                info!("🖥  Display connected to {}", url);
                connected.store(true, Ordering::Relaxed);
                let _ = events.send(DisplayEvent::Connected);

                let (mut sink, mut stream) = ws.split();
                let mut end = LinkEnd::Dropped;

                if let Some(scene) = &last_scene {
                    let announce = DisplayInbound::Scene {
                        scene: scene.clone(),
                    };
                    if let Ok(json) = serde_json::to_string(&announce) {
                        let _ = sink.send(Message::Text(json)).await;
                    }
                }

                loop {
                    tokio::select! {
                        msg = stream.next() => match msg {
                            Some(Ok(Message::Text(text))) => match DisplayOutbound::parse(&text) {
                                Some(msg) => {
                                    let _ = events.send(DisplayEvent::Message(msg));
                                }
                                None => debug!("malformed relay message dropped"),
                            },
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                        command = commands.recv() => match command {
                            Some(DisplayCommand::Send(msg)) => {
                                if let DisplayInbound::Scene { scene } = &msg {
                                    last_scene = Some(scene.clone());
                                }
                                let Ok(json) = serde_json::to_string(&msg) else {
                                    continue;
                                };
                                if sink.send(Message::Text(json)).await.is_err() {
                                    break;
                                }
                            }
                            Some(DisplayCommand::Disconnect) | None => {
                                let _ = sink.close().await;
                                end = LinkEnd::Stop;
                                break;
                            }
                        }
                    }
                }

                connected.store(false, Ordering::Relaxed);
                let _ = events.send(DisplayEvent::Disconnected);
                if let LinkEnd::Stop = end {
                    return;
                }
                info!("Display link lost, retrying in {:?}", reconnect_delay);
            }
            Err(e) => debug!("Display connect to {} failed: {}", url, e),
        }

        // Keep absorbing commands while waiting so the latest scene survives
        let wait = tokio::time::sleep(reconnect_delay);
        tokio::pin!(wait);
        loop {
            tokio::select! {
                _ = &mut wait => break,
                command = commands.recv() => match command {
                    Some(DisplayCommand::Send(DisplayInbound::Scene { scene })) => {
                        last_scene = Some(scene);
                    }
                    Some(DisplayCommand::Send(_)) => {}
                    Some(DisplayCommand::Disconnect) | None => return,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_send_after_disconnect_is_relay_stopped() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("ws://{}/ws/game", listener.local_addr().unwrap());
        drop(listener);

        let client = DisplayClient::connect(url, Duration::from_secs(10));
        assert!(client.broadcast_scene("arena").is_ok());

        client.disconnect();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!client.is_connected());
        assert!(matches!(
            client.broadcast_scene("menu"),
            Err(RelayError::RelayStopped)
        ));
        assert!(matches!(
            client.send_player_message(SessionId(0), serde_json::json!({"type": "x"})),
            Err(RelayError::RelayStopped)
        ));
    }
}
