// padrelay configuration types
// Every field has a default so a partial (or missing) config file still works

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub rtc: RtcConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub pads: PadConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    // Address the HTTP/WebSocket listener binds to
    pub bind: IpAddr,

    // Listening port, also reported by /api/server-info
    pub port: u16,

    // Directory served for any path not handled by the relay (optional)
    pub static_dir: Option<PathBuf>,

    // tracing filter used when RUST_LOG is not set
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
            static_dir: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    // Aggregated state broadcasts per second
    pub broadcast_hz: u32,

    // Queued outbound messages per socket before frames are dropped
    pub outbox_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            broadcast_hz: 120,
            outbox_capacity: 256,
        }
    }
}

impl RelayConfig {
    pub fn broadcast_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.broadcast_hz.max(1)))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RtcConfig {
    // Offer a WebRTC data channel to each controller
    pub enabled: bool,

    // Give up on a negotiation (and stay on WebSocket) after this long
    pub negotiation_timeout_ms: u64,

    // Pin the host candidate address instead of auto-detecting the LAN IP
    pub host_ip: Option<IpAddr>,

    // STUN server for a server-reflexive candidate ("" disables)
    pub stun_server: String,

    pub stun_timeout_ms: u64,
}

impl Default for RtcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            negotiation_timeout_ms: 5000,
            host_ip: None,
            stun_server: "stun.l.google.com:19302".to_string(),
            stun_timeout_ms: 1500,
        }
    }
}

impl RtcConfig {
    pub fn negotiation_timeout(&self) -> Duration {
        Duration::from_millis(self.negotiation_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    // Delay before a dropped phone controller reconnects
    pub controller_reconnect_ms: u64,

    // Delay before a dropped display reconnects
    pub display_reconnect_ms: u64,

    // Input frames per second sent by controller clients
    pub send_rate_hz: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            controller_reconnect_ms: 2000,
            display_reconnect_ms: 3000,
            send_rate_hz: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PadConfig {
    // Relay session N appears at pad slot offset + N
    pub relay_slot_offset: usize,

    // Slots reserved for locally attached pads (0..local_slots)
    pub local_slots: usize,

    // Broadcasts a pad may be missing from before it counts as disconnected
    pub missing_frames_before_disconnect: u32,

    // How long a key stays "held" after its last press event
    pub keyboard_hold_ms: u64,
}

impl Default for PadConfig {
    fn default() -> Self {
        Self {
            relay_slot_offset: 100,
            local_slots: 4,
            missing_frames_before_disconnect: 2,
            keyboard_hold_ms: 150,
        }
    }
}
