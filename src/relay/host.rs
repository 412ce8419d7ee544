// Embedded host link
// Lets a game running in the same process act as the display without a WebSocket

use super::hub::{RelayEvent, RelayHandle};
use crate::error::{RelayError, Result};
use crate::network::protocol::{DisplayInbound, DisplayOutbound};
use tokio::sync::mpsc;

/// In-process display channel. Message shapes match `/ws/game` exactly.
#[derive(Debug)]
pub struct HostLink {
    relay: RelayHandle,
    inbound: mpsc::Receiver<DisplayOutbound>,
}

impl HostLink {
    /// Next message from the relay; `None` once the relay stops
    pub async fn recv(&mut self) -> Option<DisplayOutbound> {
        self.inbound.recv().await
    }

    /// Non-blocking variant for frame-driven game loops
    pub fn try_recv(&mut self) -> Option<DisplayOutbound> {
        self.inbound.try_recv().ok()
    }

    pub fn send(&self, msg: DisplayInbound) -> Result<()> {
        self.relay.display_message(msg)
    }
}

impl RelayHandle {
    /// Attach the embedded host sink. A second attach replaces the first.
    pub fn attach_host(&self) -> Result<HostLink> {
        let (sink, inbound) = mpsc::channel(self.outbox_capacity());
        self.send(RelayEvent::HostAttached { sink })
            .map_err(|_| RelayError::RelayStopped)?;
        Ok(HostLink {
            relay: self.clone(),
            inbound,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::network::protocol::SessionId;
    use crate::relay::spawn_relay_with;
    use std::time::Duration;

    #[tokio::test]
    async fn test_host_receives_catch_up_and_state() {
        let mut config = Config::default();
        config.rtc.enabled = false;
        let (relay, task) = spawn_relay_with(&config, None);

        let (ticket, _controller_rx) = relay.open_controller().await.unwrap();
        let mut host = relay.attach_host().unwrap();

        assert_eq!(
            host.recv().await,
            Some(DisplayOutbound::WsConnected { id: ticket.id })
        );

        let state = tokio::time::timeout(Duration::from_secs(1), host.recv())
            .await
            .unwrap();
        match state {
            Some(DisplayOutbound::WsState { controllers }) => {
                assert!(controllers.contains_key(&SessionId(0)));
            }
            other => panic!("expected ws_state, got {:?}", other),
        }

        host.send(DisplayInbound::Scene { scene: "MazeScene".into() }).unwrap();
        assert_eq!(relay.stats().await.unwrap().scene.as_deref(), Some("MazeScene"));

        relay.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropping_host_link_stops_broadcasts() {
        let mut config = Config::default();
        config.rtc.enabled = false;
        let (relay, task) = spawn_relay_with(&config, None);

        let (_ticket, _controller_rx) = relay.open_controller().await.unwrap();
        let host = relay.attach_host().unwrap();
        drop(host);

        tokio::time::sleep(Duration::from_millis(50)).await;
        let before = relay.stats().await.unwrap();
        assert!(!before.host_attached);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let after = relay.stats().await.unwrap();
        assert_eq!(after.broadcasts, before.broadcasts);

        relay.shutdown();
        task.await.unwrap();
    }
}
