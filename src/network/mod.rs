// Networking for padrelay
// Wire protocol, the WebSocket endpoint and per-controller WebRTC peers

pub mod interfaces;
pub mod protocol;
pub mod server;
pub mod webrtc_runtime;

pub use protocol::{
    AggregatedFrame, ControllerInbound, ControllerOutbound, DisplayInbound, DisplayOutbound,
    InputFrame, SessionId, SignalMessage,
};
pub use server::{bind, build_router, serve, ServerInfo};
pub use webrtc_runtime::Str0mSpawner;
