// Configuration module for padrelay
// Handles loading relay, WebRTC, client and pad settings from a TOML file

pub mod loader;
pub mod types;

pub use loader::{create_default_config, get_config_path, load_config, parse_config};
pub use types::{ClientConfig, Config, PadConfig, RelayConfig, RtcConfig, ServerConfig};
