// Relay core: session registry, signaling, broadcast actor and embedded host

pub mod host;
pub mod hub;
pub mod peer;
pub mod registry;
pub mod signaling;

pub use host::HostLink;
pub use hub::{ControllerTicket, DisplayId, Relay, RelayEvent, RelayHandle, RelayStats};
pub use peer::{PeerCommand, PeerEvent, PeerHandle, PeerSpawner};
pub use registry::SessionRegistry;
pub use signaling::{SignalState, Signaling};

use crate::config::Config;
use crate::network::webrtc_runtime::Str0mSpawner;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Start the relay actor on the current tokio runtime.
/// WebRTC peers are enabled according to `config.rtc.enabled`.
pub fn spawn_relay(config: &Config) -> (RelayHandle, JoinHandle<()>) {
    let peers: Option<Box<dyn PeerSpawner>> = if config.rtc.enabled {
        Some(Box::new(Str0mSpawner::new(config.rtc.clone())))
    } else {
        None
    };
    spawn_relay_with(config, peers)
}

/// Start the relay actor with an explicit peer spawner (or none)
pub fn spawn_relay_with(
    config: &Config,
    peers: Option<Box<dyn PeerSpawner>>,
) -> (RelayHandle, JoinHandle<()>) {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let relay = Relay::new(
        config.relay.clone(),
        config.rtc.negotiation_timeout(),
        peers,
        events_tx.clone(),
    );
    let handle = RelayHandle::new(events_tx, config.relay.outbox_capacity);
    let task = tokio::spawn(relay.run(events_rx));
    (handle, task)
}
