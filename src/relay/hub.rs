// Relay actor
// Owns the registry, the current scene and every open link. All mutation
// happens on one task, one event at a time, so no locks are needed.

use super::peer::{PeerCommand, PeerEvent, PeerHandle, PeerSpawner};
use super::registry::SessionRegistry;
use super::signaling::{SignalState, Signaling};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::network::protocol::{
    ControllerInbound, ControllerOutbound, DisplayInbound, DisplayOutbound, SessionId,
    SignalMessage,
};
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

pub type DisplayId = u64;

/// Identifies one controller connection.
///
/// `conn` is unique for the lifetime of the relay, so events from a
/// connection that has since closed can never be mistaken for a newer
/// session that reused the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerTicket {
    pub id: SessionId,
    pub conn: u64,
}

/// Everything the relay actor reacts to
#[derive(Debug)]
pub enum RelayEvent {
    ControllerOpened {
        outbox: mpsc::Sender<String>,
        reply: oneshot::Sender<ControllerTicket>,
    },
    ControllerMessage {
        ticket: ControllerTicket,
        msg: ControllerInbound,
    },
    ControllerClosed {
        ticket: ControllerTicket,
    },
    DisplayOpened {
        outbox: mpsc::Sender<String>,
        reply: oneshot::Sender<DisplayId>,
    },
    DisplayMessage(DisplayInbound),
    DisplayClosed {
        display: DisplayId,
    },
    HostAttached {
        sink: mpsc::Sender<DisplayOutbound>,
    },
    Peer {
        ticket: ControllerTicket,
        event: PeerEvent,
    },
    Stats {
        reply: oneshot::Sender<RelayStats>,
    },
    Shutdown,
}

/// Point-in-time counters, mostly for monitoring and tests
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub sessions: usize,
    pub displays: usize,
    pub host_attached: bool,
    pub rtc_connected: usize,
    pub scene: Option<String>,
    pub broadcasts: u64,
}

struct ControllerLink {
    conn: u64,
    outbox: mpsc::Sender<String>,
    signaling: Signaling,
    peer: Option<PeerHandle>,
}

impl ControllerLink {
    fn send(&self, msg: &ControllerOutbound) -> bool {
        match encode(msg) {
            Some(text) => self.outbox.try_send(text).is_ok(),
            None => false,
        }
    }
}

/// The link for `ticket`, unless that connection already closed
fn live_link(
    controllers: &mut HashMap<SessionId, ControllerLink>,
    ticket: ControllerTicket,
) -> Option<&mut ControllerLink> {
    controllers
        .get_mut(&ticket.id)
        .filter(|link| link.conn == ticket.conn)
}

fn encode<T: Serialize>(msg: &T) -> Option<String> {
    match serde_json::to_string(msg) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!("Failed to encode message: {}", e);
            None
        }
    }
}

pub struct Relay {
    config: RelayConfig,
    rtc_timeout: Duration,
    registry: SessionRegistry,
    scene: Option<String>,
    controllers: HashMap<SessionId, ControllerLink>,
    displays: HashMap<DisplayId, mpsc::Sender<String>>,
    host: Option<mpsc::Sender<DisplayOutbound>>,
    peers: Option<Box<dyn PeerSpawner>>,
    events: mpsc::UnboundedSender<RelayEvent>,
    next_conn: u64,
    next_display: DisplayId,
    broadcasts: u64,
}

impl Relay {
    /// `peers: None` disables WebRTC; every session stays on WebSocket
    pub fn new(
        config: RelayConfig,
        rtc_timeout: Duration,
        peers: Option<Box<dyn PeerSpawner>>,
        events: mpsc::UnboundedSender<RelayEvent>,
    ) -> Self {
        Self {
            config,
            rtc_timeout,
            registry: SessionRegistry::new(),
            scene: None,
            controllers: HashMap::new(),
            displays: HashMap::new(),
            host: None,
            peers,
            events,
            next_conn: 0,
            next_display: 0,
            broadcasts: 0,
        }
    }

    /// Drive the actor until `Shutdown` (or every sender is gone)
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<RelayEvent>) {
        let mut ticker = tokio::time::interval(self.config.broadcast_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "🎮 Relay running ({} Hz broadcast, WebRTC {})",
            self.config.broadcast_hz,
            if self.peers.is_some() { "on" } else { "off" }
        );

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(RelayEvent::Shutdown) | None => break,
                    Some(event) => self.handle(event, Instant::now()),
                },
                _ = ticker.tick() => {
                    self.tick(Instant::now());
                }
            }
        }

        self.shutdown();
    }

    pub fn handle(&mut self, event: RelayEvent, now: Instant) {
        match event {
            RelayEvent::ControllerOpened { outbox, reply } => {
                let ticket = self.controller_opened(outbox, now);
                if reply.send(ticket).is_err() {
                    // Socket task vanished before it learned its id
                    self.controller_closed(ticket);
                }
            }
            RelayEvent::ControllerMessage { ticket, msg } => self.controller_message(ticket, msg),
            RelayEvent::ControllerClosed { ticket } => self.controller_closed(ticket),
            RelayEvent::DisplayOpened { outbox, reply } => {
                let display = self.display_opened(outbox);
                if reply.send(display).is_err() {
                    self.display_closed(display);
                }
            }
            RelayEvent::DisplayMessage(msg) => self.display_message(msg),
            RelayEvent::DisplayClosed { display } => self.display_closed(display),
            RelayEvent::HostAttached { sink } => self.host_attached(sink),
            RelayEvent::Peer { ticket, event } => self.peer_event(ticket, event, now),
            RelayEvent::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
            RelayEvent::Shutdown => self.shutdown(),
        }
    }

    /// New phone: assign id, catch it up, tell the displays, start WebRTC
    pub fn controller_opened(&mut self, outbox: mpsc::Sender<String>, now: Instant) -> ControllerTicket {
        let id = self.registry.allocate();
        let ticket = ControllerTicket {
            id,
            conn: self.next_conn,
        };
        self.next_conn += 1;

        let mut link = ControllerLink {
            conn: ticket.conn,
            outbox,
            signaling: Signaling::new(self.rtc_timeout),
            peer: None,
        };

        link.send(&ControllerOutbound::Id { id });
        if let Some(scene) = &self.scene {
            link.send(&ControllerOutbound::Scene {
                scene: scene.clone(),
            });
        }

        self.to_displays(&DisplayOutbound::WsConnected { id });

        if let Some(spawner) = &self.peers {
            link.signaling.start(now);
            link.peer = Some(spawner.spawn(ticket, self.events.clone()));
        }

        self.controllers.insert(id, link);
        info!("✅ Controller {} connected ({} live)", id, self.registry.len());
        ticket
    }

    pub fn controller_message(&mut self, ticket: ControllerTicket, msg: ControllerInbound) {
        let Some(link) = live_link(&mut self.controllers, ticket) else {
            trace!(id = %ticket.id, "message from closed session dropped");
            return;
        };

        match msg {
            ControllerInbound::Input(frame) => {
                self.registry.update(ticket.id, frame);
            }
            ControllerInbound::Signal(SignalMessage::RtcAnswer { sdp, .. }) => {
                if !link.signaling.answer_received() {
                    debug!(id = %ticket.id, state = %link.signaling.state(), "unexpected rtc-answer dropped");
                    return;
                }
                if let Some(peer) = &link.peer {
                    peer.send(PeerCommand::ApplyAnswer { sdp });
                }
            }
            ControllerInbound::Signal(SignalMessage::RtcCandidate { candidate, mid }) => {
                if !link.signaling.accepts_candidates() {
                    trace!(id = %ticket.id, "candidate without peer dropped");
                    return;
                }
                if let Some(peer) = &link.peer {
                    peer.send(PeerCommand::AddCandidate { candidate, mid });
                }
            }
        }
    }

    /// Tear the session down: stop the peer, free the id, notify displays
    pub fn controller_closed(&mut self, ticket: ControllerTicket) {
        if live_link(&mut self.controllers, ticket).is_none() {
            return;
        }
        if let Some(mut link) = self.controllers.remove(&ticket.id) {
            link.signaling.close();
            // Dropping the handle aborts the peer task
            link.peer.take();
        }
        self.registry.release(ticket.id);
        self.to_displays(&DisplayOutbound::WsDisconnected { id: ticket.id });
        info!("📤 Controller {} disconnected ({} live)", ticket.id, self.registry.len());
    }

    /// New display: register it and replay who is connected
    pub fn display_opened(&mut self, outbox: mpsc::Sender<String>) -> DisplayId {
        let display_id = self.next_display;
        self.next_display += 1;

        for id in self.registry.ids() {
            if let Some(text) = encode(&DisplayOutbound::WsConnected { id }) {
                let _ = outbox.try_send(text);
            }
        }

        self.displays.insert(display_id, outbox);
        info!("🖥  Display {} connected ({} controllers live)", display_id, self.registry.len());
        display_id
    }

    pub fn display_closed(&mut self, display_id: DisplayId) {
        if self.displays.remove(&display_id).is_some() {
            info!("🖥  Display {} disconnected", display_id);
        }
    }

    /// In-process display. Replaces any previous host sink.
    pub fn host_attached(&mut self, sink: mpsc::Sender<DisplayOutbound>) {
        for id in self.registry.ids() {
            let _ = sink.try_send(DisplayOutbound::WsConnected { id });
        }
        self.host = Some(sink);
        info!("🔌 Embedded host attached");
    }

    pub fn display_message(&mut self, msg: DisplayInbound) {
        match msg {
            DisplayInbound::Scene { scene } => {
                info!("🎬 Scene -> {}", scene);
                self.scene = Some(scene.clone());
                self.to_controllers(&ControllerOutbound::Scene { scene });
            }
            DisplayInbound::BroadcastState { state } => {
                self.to_controllers(&ControllerOutbound::BroadcastState { state });
            }
            DisplayInbound::PlayerMessage { target_id, message } => {
                if !self.send_to(target_id, &ControllerOutbound::PlayerMessage { message }) {
                    debug!(id = %target_id, "player_message for absent session dropped");
                }
            }
        }
    }

    /// Unicast to one controller. No queueing: false if it is gone.
    pub fn send_to(&self, id: SessionId, msg: &ControllerOutbound) -> bool {
        match self.controllers.get(&id) {
            Some(link) if !link.outbox.is_closed() => link.send(msg),
            _ => false,
        }
    }

    pub fn peer_event(&mut self, ticket: ControllerTicket, event: PeerEvent, now: Instant) {
        let Some(link) = live_link(&mut self.controllers, ticket) else {
            trace!(id = %ticket.id, "stale peer event dropped");
            return;
        };

        match event {
            PeerEvent::LocalOffer { sdp } => {
                if link.signaling.state() != SignalState::Offering {
                    return;
                }
                link.send(&ControllerOutbound::RtcOffer {
                    sdp,
                    sdp_type: "offer".to_string(),
                });
                link.signaling.offer_sent();
                debug!(id = %ticket.id, "📨 offer sent");
            }
            PeerEvent::LocalCandidate { candidate, mid } => {
                if link.signaling.accepts_candidates() {
                    link.send(&ControllerOutbound::RtcCandidate { candidate, mid });
                }
            }
            PeerEvent::ChannelOpen => {
                if link.signaling.channel_open(now) {
                    info!("📡 Controller {} switched to data channel", ticket.id);
                } else {
                    link.peer.take();
                }
            }
            PeerEvent::Input(frame) => {
                if link.signaling.is_connected() {
                    self.registry.update(ticket.id, frame);
                }
            }
            PeerEvent::Lost => {
                if link.signaling.link_lost() {
                    link.peer.take();
                    info!("📉 Controller {} data channel lost, using WebSocket", ticket.id);
                }
            }
            PeerEvent::Failed(reason) => {
                if link.signaling.link_lost() {
                    link.peer.take();
                    debug!(id = %ticket.id, %reason, "WebRTC setup failed, using WebSocket");
                }
            }
        }
    }

    /// One broadcast period: expire stalled negotiations, then push the
    /// aggregated frame. Returns whether anything was broadcast.
    pub fn tick(&mut self, now: Instant) -> bool {
        for (id, link) in self.controllers.iter_mut() {
            if link.signaling.expired(now) {
                link.peer.take();
                info!("⏱  Controller {} WebRTC timed out, staying on WebSocket", id);
            }
        }

        if self.host.as_ref().is_some_and(|host| host.is_closed()) {
            self.host = None;
            info!("🔌 Embedded host detached");
        }

        if self.displays.is_empty() && self.host.is_none() {
            return false;
        }
        if self.registry.is_empty() {
            return false;
        }

        let msg = DisplayOutbound::WsState {
            controllers: self.registry.snapshot(),
        };
        self.to_displays(&msg);
        self.broadcasts += 1;
        trace!(sessions = self.registry.len(), "broadcast");
        true
    }

    pub fn stats(&self) -> RelayStats {
        RelayStats {
            sessions: self.registry.len(),
            displays: self.displays.len(),
            host_attached: self.host.as_ref().is_some_and(|host| !host.is_closed()),
            rtc_connected: self
                .controllers
                .values()
                .filter(|link| link.signaling.is_connected())
                .count(),
            scene: self.scene.clone(),
            broadcasts: self.broadcasts,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn scene(&self) -> Option<&str> {
        self.scene.as_deref()
    }

    pub fn signal_state(&self, id: SessionId) -> Option<SignalState> {
        self.controllers.get(&id).map(|link| link.signaling.state())
    }

    /// Close everything. Dropped outboxes end the socket writer tasks.
    pub fn shutdown(&mut self) {
        let sessions = self.controllers.len();
        self.controllers.clear();
        self.displays.clear();
        self.host = None;
        self.registry = SessionRegistry::new();
        info!("🛑 Relay stopped ({} sessions closed)", sessions);
    }

    fn to_controllers(&self, msg: &ControllerOutbound) {
        let Some(text) = encode(msg) else { return };
        for link in self.controllers.values() {
            let _ = link.outbox.try_send(text.clone());
        }
    }

    /// Serialize once, fan out to every display and the host sink.
    /// A full queue drops the message for that consumer only.
    fn to_displays(&self, msg: &DisplayOutbound) {
        if !self.displays.is_empty() {
            if let Some(text) = encode(msg) {
                for (display_id, outbox) in &self.displays {
                    if outbox.try_send(text.clone()).is_err() {
                        trace!(display_id, "display queue full, frame dropped");
                    }
                }
            }
        }
        if let Some(host) = &self.host {
            let _ = host.try_send(msg.clone());
        }
    }
}

/// Cloneable front door to a running relay actor
#[derive(Debug, Clone)]
pub struct RelayHandle {
    events: mpsc::UnboundedSender<RelayEvent>,
    outbox_capacity: usize,
}

impl RelayHandle {
    pub fn new(events: mpsc::UnboundedSender<RelayEvent>, outbox_capacity: usize) -> Self {
        Self {
            events,
            outbox_capacity: outbox_capacity.max(1),
        }
    }

    pub fn send(&self, event: RelayEvent) -> Result<()> {
        self.events.send(event).map_err(|_| RelayError::RelayStopped)
    }

    /// Register a controller link; the receiver yields its outbound text frames
    pub async fn open_controller(&self) -> Result<(ControllerTicket, mpsc::Receiver<String>)> {
        let (outbox, rx) = mpsc::channel(self.outbox_capacity);
        let (reply, ticket) = oneshot::channel();
        self.send(RelayEvent::ControllerOpened { outbox, reply })?;
        let ticket = ticket.await.map_err(|_| RelayError::RelayStopped)?;
        Ok((ticket, rx))
    }

    pub fn controller_message(&self, ticket: ControllerTicket, msg: ControllerInbound) -> Result<()> {
        self.send(RelayEvent::ControllerMessage { ticket, msg })
    }

    pub fn close_controller(&self, ticket: ControllerTicket) {
        let _ = self.send(RelayEvent::ControllerClosed { ticket });
    }

    pub async fn open_display(&self) -> Result<(DisplayId, mpsc::Receiver<String>)> {
        let (outbox, rx) = mpsc::channel(self.outbox_capacity);
        let (reply, display) = oneshot::channel();
        self.send(RelayEvent::DisplayOpened { outbox, reply })?;
        let display = display.await.map_err(|_| RelayError::RelayStopped)?;
        Ok((display, rx))
    }

    pub fn display_message(&self, msg: DisplayInbound) -> Result<()> {
        self.send(RelayEvent::DisplayMessage(msg))
    }

    pub fn close_display(&self, display: DisplayId) {
        let _ = self.send(RelayEvent::DisplayClosed { display });
    }

    pub async fn stats(&self) -> Result<RelayStats> {
        let (reply, stats) = oneshot::channel();
        self.send(RelayEvent::Stats { reply })?;
        stats.await.map_err(|_| RelayError::RelayStopped)
    }

    pub fn shutdown(&self) {
        let _ = self.send(RelayEvent::Shutdown);
    }

    pub(crate) fn outbox_capacity(&self) -> usize {
        self.outbox_capacity
    }
}
