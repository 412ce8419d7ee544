// Seam between the relay actor and whatever drives a controller's WebRTC peer

use super::hub::{ControllerTicket, RelayEvent};
use crate::network::protocol::InputFrame;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Instructions from the relay to a peer task
#[derive(Debug, Clone, PartialEq)]
pub enum PeerCommand {
    /// Remote description from the phone
    ApplyAnswer { sdp: String },
    /// Trickled remote ICE candidate
    AddCandidate {
        candidate: String,
        mid: Option<String>,
    },
    Close,
}

/// What a peer task reports back, wrapped in `RelayEvent::Peer`
#[derive(Debug, Clone, PartialEq)]
pub enum PeerEvent {
    LocalOffer { sdp: String },
    LocalCandidate {
        candidate: String,
        mid: Option<String>,
    },
    ChannelOpen,
    /// Frame received on the data channel
    Input(InputFrame),
    /// Channel closed or ICE disconnected
    Lost,
    /// Setup failed before a channel could open
    Failed(String),
}

/// Owning handle to a running peer. Dropping it stops the peer.
#[derive(Debug)]
pub struct PeerHandle {
    commands: mpsc::UnboundedSender<PeerCommand>,
    task: Option<JoinHandle<()>>,
}

impl PeerHandle {
    pub fn new(commands: mpsc::UnboundedSender<PeerCommand>, task: Option<JoinHandle<()>>) -> Self {
        Self { commands, task }
    }

    /// Queue a command; false if the peer already exited
    pub fn send(&self, command: PeerCommand) -> bool {
        self.commands.send(command).is_ok()
    }
}

impl Drop for PeerHandle {
    fn drop(&mut self) {
        let _ = self.commands.send(PeerCommand::Close);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Starts one peer per controller session
pub trait PeerSpawner: Send {
    fn spawn(&self, ticket: ControllerTicket, events: mpsc::UnboundedSender<RelayEvent>) -> PeerHandle;
}
