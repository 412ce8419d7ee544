// Configuration file loading and creation

use super::types::Config;
use crate::error::RelayError;
use std::fs;
use std::path::{Path, PathBuf};

/// Get the default path to the configuration file
pub fn get_config_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("padrelay");
    path.push("config.toml");
    path
}

/// Load configuration from `path` (or the default location).
///
/// A missing file at the default location is created with defaults.
/// A missing or unparsable file at an explicit path is an error. A default
/// file that fails to parse falls back to defaults with a warning on stderr
/// (this runs before logging is configured).
pub fn load_config(path: Option<&Path>) -> Result<Config, RelayError> {
    let (config_path, explicit) = match path {
        Some(p) => (p.to_path_buf(), true),
        None => (get_config_path(), false),
    };

    if config_path.exists() {
        let contents = fs::read_to_string(&config_path)?;
        match parse_config(&contents) {
            Ok(config) => Ok(config),
            Err(e) if explicit => Err(e),
            Err(e) => {
                eprintln!("Warning: Failed to parse {}: {}", config_path.display(), e);
                eprintln!("Using default configuration");
                Ok(Config::default())
            }
        }
    } else if explicit {
        Err(RelayError::Config(format!(
            "config file not found: {}",
            config_path.display()
        )))
    } else {
        // First run: write a commented default file, but don't fail if we can't
        if let Err(e) = create_default_config(&config_path) {
            eprintln!("Warning: Could not write default config: {}", e);
        }
        Ok(Config::default())
    }
}

pub fn parse_config(contents: &str) -> Result<Config, RelayError> {
    toml::from_str(contents).map_err(|e| RelayError::Config(e.to_string()))
}

/// Create a default configuration file with helpful comments
pub fn create_default_config(path: &Path) -> Result<(), RelayError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let config = Config::default();
    let toml_string =
        toml::to_string_pretty(&config).map_err(|e| RelayError::Config(e.to_string()))?;

    let commented_toml = format!(
        "# padrelay configuration file\n\
         # Restart the relay after editing\n\
         #\n\
         # [server]  listener address, port, optional static_dir, log_level\n\
         # [relay]   broadcast_hz (aggregated frames per second)\n\
         # [rtc]     WebRTC data channel offer; set enabled = false for WebSocket only\n\
         # [client]  reconnect delays used by the bundled clients\n\
         # [pads]    virtual pad slot layout\n\n\
         {}",
        toml_string
    );

    fs::write(path, commented_toml)?;
    println!("Created default config file at: {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serialization() {
        let config = Config::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        let parsed: Config = toml::from_str(&toml_string).unwrap();

        assert_eq!(parsed.server.port, config.server.port);
        assert_eq!(parsed.relay.broadcast_hz, 120);
        assert_eq!(parsed.rtc.negotiation_timeout_ms, 5000);
        assert_eq!(parsed.client.display_reconnect_ms, 3000);
        assert_eq!(parsed.pads.relay_slot_offset, 100);
    }

    #[test]
    fn test_partial_config_with_defaults() {
        let partial_toml = r#"
            [server]
            port = 8080

            [rtc]
            enabled = false
        "#;

        let config = parse_config(partial_toml).unwrap();

        assert_eq!(config.server.port, 8080);
        assert!(!config.rtc.enabled);

        // Untouched fields keep their defaults
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.rtc.stun_server, "stun.l.google.com:19302");
        assert_eq!(config.client.controller_reconnect_ms, 2000);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        assert!(parse_config("[server]\nport = \"many\"").is_err());
    }

    #[test]
    fn test_explicit_missing_path_fails() {
        let path = std::env::temp_dir().join("padrelay-does-not-exist/config.toml");
        assert!(matches!(
            load_config(Some(&path)),
            Err(RelayError::Config(_))
        ));
    }

    #[test]
    fn test_broadcast_period() {
        let relay = crate::config::RelayConfig::default();
        let period = relay.broadcast_period();
        assert!(period.as_micros() >= 8333 && period.as_micros() <= 8334);
    }
}
