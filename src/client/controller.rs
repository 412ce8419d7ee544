// Controller-side relay client
// What a phone does, minus the touch UI: learn its id, follow the scene,
// stream its input at a fixed rate and reconnect after a drop.

use super::scene::SceneLayout;
use crate::network::protocol::{ControllerOutbound, InputFrame, SessionId};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, trace};

/// Status indicator shown to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Connected,
    /// Link dropped, retrying after the fixed delay
    Reconnecting,
    /// Stopped for good (closed by us, or reconnect disabled)
    Closed,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Reconnecting => write!(f, "Reconnecting..."),
            ConnectionStatus::Closed => write!(f, "Disconnected"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    Status(ConnectionStatus),
    Assigned(SessionId),
    Scene { scene: String, layout: SceneLayout },
    BroadcastState(Value),
    PlayerMessage(Value),
}

#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// `None` disables reconnecting (bots, tests)
    pub reconnect_delay: Option<Duration>,
    pub send_rate_hz: u32,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            reconnect_delay: Some(Duration::from_millis(2000)),
            send_rate_hz: 60,
        }
    }
}

/// Latest known session state
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub status: ConnectionStatus,
    pub id: Option<SessionId>,
    pub scene: Option<String>,
}

struct Shared {
    state: Mutex<ControllerState>,
    frames_sent: AtomicU64,
    events: mpsc::UnboundedSender<ControllerEvent>,
}

impl Shared {
    fn update(&self, apply: impl FnOnce(&mut ControllerState)) {
        if let Ok(mut state) = self.state.lock() {
            apply(&mut state);
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        let mut changed = false;
        self.update(|state| {
            changed = state.status != status;
            state.status = status;
        });
        if changed {
            let _ = self.events.send(ControllerEvent::Status(status));
        }
    }

    fn emit(&self, event: ControllerEvent) {
        let _ = self.events.send(event);
    }
}

pub struct ControllerClient {
    frame: watch::Sender<InputFrame>,
    close: mpsc::UnboundedSender<()>,
    events: mpsc::UnboundedReceiver<ControllerEvent>,
    shared: Arc<Shared>,
    task: JoinHandle<()>,
}

impl ControllerClient {
    /// Start connecting to `url` (e.g. `ws://host:3000/ws/controller`).
    /// Must be called inside a tokio runtime.
    pub fn connect(url: impl Into<String>, options: ControllerOptions) -> Self {
        let (frame, frame_rx) = watch::channel(InputFrame::neutral());
        let (close, close_rx) = mpsc::unbounded_channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            state: Mutex::new(ControllerState {
                status: ConnectionStatus::Connecting,
                id: None,
                scene: None,
            }),
            frames_sent: AtomicU64::new(0),
            events: events_tx,
        });

        let task = tokio::spawn(run_controller(
            url.into(),
            options,
            frame_rx,
            close_rx,
            shared.clone(),
        ));

        Self {
            frame,
            close,
            events,
            shared,
            task,
        }
    }

    /// Replace the frame streamed on the next send tick
    pub fn set_frame(&self, frame: InputFrame) {
        self.frame.send_replace(frame.clamped());
    }

    pub fn state(&self) -> Option<ControllerState> {
        self.shared.state.lock().ok().map(|state| state.clone())
    }

    pub fn id(&self) -> Option<SessionId> {
        self.state().and_then(|state| state.id)
    }

    pub fn frames_sent(&self) -> u64 {
        self.shared.frames_sent.load(Ordering::Relaxed)
    }

    pub fn try_recv_event(&mut self) -> Option<ControllerEvent> {
        self.events.try_recv().ok()
    }

    pub async fn recv_event(&mut self) -> Option<ControllerEvent> {
        self.events.recv().await
    }

    pub fn close(&self) {
        let _ = self.close.send(());
    }
}

impl Drop for ControllerClient {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn handle_relay_message(shared: &Shared, msg: ControllerOutbound) {
    match msg {
        ControllerOutbound::Id { id } => {
            shared.update(|state| state.id = Some(id));
            shared.emit(ControllerEvent::Assigned(id));
        }
        ControllerOutbound::Scene { scene } => {
            let layout = SceneLayout::for_scene(&scene);
            shared.update(|state| state.scene = Some(scene.clone()));
            shared.emit(ControllerEvent::Scene { scene, layout });
        }
        ControllerOutbound::BroadcastState { state } => {
            shared.emit(ControllerEvent::BroadcastState(state));
        }
        ControllerOutbound::PlayerMessage { message } => {
            shared.emit(ControllerEvent::PlayerMessage(message));
        }
        // No data channel here: the relay times out and we stay on WebSocket
        ControllerOutbound::RtcOffer { .. } | ControllerOutbound::RtcCandidate { .. } => {
            trace!("ignoring WebRTC signaling");
        }
    }
}

async fn run_controller(
    url: String,
    options: ControllerOptions,
    frame: watch::Receiver<InputFrame>,
    mut close: mpsc::UnboundedReceiver<()>,
    shared: Arc<Shared>,
) {
    let period = Duration::from_secs_f64(1.0 / f64::from(options.send_rate_hz.max(1)));

    loop {
        match super::open_socket(&url).await {
            Ok(ws) => {
                shared.set_status(ConnectionStatus::Connected);
                let (mut sink, mut stream) = ws.split();
                let mut ticker = tokio::time::interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                let mut stopped = false;

                loop {
                    tokio::select! {
                        msg = stream.next() => match msg {
                            Some(Ok(Message::Text(text))) => match ControllerOutbound::parse(&text) {
                                Some(msg) => handle_relay_message(&shared, msg),
                                None => debug!("malformed relay message dropped"),
                            },
                            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                            Some(Ok(_)) => {}
                        },
                        _ = ticker.tick() => {
                            let current = *frame.borrow();
                            let Ok(json) = serde_json::to_string(&current) else {
                                continue;
                            };
                            if sink.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                            shared.frames_sent.fetch_add(1, Ordering::Relaxed);
                        }
                        _ = close.recv() => {
                            let _ = sink.close().await;
                            stopped = true;
                            break;
                        }
                    }
                }

                // The id belonged to that connection only
                shared.update(|state| state.id = None);
                if stopped {
                    shared.set_status(ConnectionStatus::Closed);
                    return;
                }
            }
            Err(e) => debug!("Controller connect to {} failed: {}", url, e),
        }

        let Some(delay) = options.reconnect_delay else {
            shared.set_status(ConnectionStatus::Closed);
            return;
        };

        shared.set_status(ConnectionStatus::Reconnecting);
        info!("Controller link lost, retrying in {:?}", delay);
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = close.recv() => {
                shared.set_status(ConnectionStatus::Closed);
                return;
            }
        }
        shared.set_status(ConnectionStatus::Connecting);
    }
}
