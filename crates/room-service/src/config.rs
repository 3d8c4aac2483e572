//! Room service configuration.
//!
//! Configuration is loaded from `ROOM_*` environment variables. Every value
//! has a default, so an empty environment yields a runnable service.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default HTTP/WebSocket bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";

/// Default directory for static client assets.
pub const DEFAULT_STATIC_DIR: &str = "public";

/// Default sweep interval in seconds (30 minutes).
pub const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 1800;

/// Default maximum room age in seconds (24 hours).
pub const DEFAULT_MAX_ROOM_AGE_SECONDS: u64 = 86_400;

/// Default maximum number of live rooms.
pub const DEFAULT_MAX_ROOMS: usize = 10_000;

/// Default chat history kept per room.
pub const DEFAULT_CHAT_HISTORY_CAPACITY: usize = 100;

/// Default number of chat messages included in the join snapshot.
pub const DEFAULT_SNAPSHOT_MESSAGE_COUNT: usize = 50;

/// Default maximum chat message length in characters.
pub const DEFAULT_MAX_MESSAGE_LENGTH: usize = 2000;

/// Default maximum voice payload size in bytes.
pub const DEFAULT_MAX_VOICE_PAYLOAD_BYTES: usize = 256 * 1024;

/// Per-room limits handed to every room actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomLimits {
    pub chat_history_capacity: usize,
    pub snapshot_message_count: usize,
    pub max_message_length: usize,
    pub max_voice_payload_bytes: usize,
}

impl Default for RoomLimits {
    fn default() -> Self {
        Self {
            chat_history_capacity: DEFAULT_CHAT_HISTORY_CAPACITY,
            snapshot_message_count: DEFAULT_SNAPSHOT_MESSAGE_COUNT,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
            max_voice_payload_bytes: DEFAULT_MAX_VOICE_PAYLOAD_BYTES,
        }
    }
}

/// Room service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP/WebSocket bind address (default: "0.0.0.0:3000").
    pub bind_address: String,

    /// Directory served for unmatched GET requests (default: "public").
    pub static_dir: String,

    /// Interval between registry sweeps (default: 30 minutes).
    pub sweep_interval_seconds: u64,

    /// Rooms older than this are evicted on the next sweep (default: 24 hours).
    pub max_room_age_seconds: u64,

    /// Maximum number of live rooms (default: 10000).
    pub max_rooms: usize,

    /// Limits applied inside each room.
    pub room_limits: RoomLimits,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("ROOM_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let static_dir = vars
            .get("ROOM_STATIC_DIR")
            .cloned()
            .unwrap_or_else(|| DEFAULT_STATIC_DIR.to_string());

        let sweep_interval_seconds = parse_var(
            vars,
            "ROOM_SWEEP_INTERVAL_SECONDS",
            DEFAULT_SWEEP_INTERVAL_SECONDS,
        )?;
        if sweep_interval_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "ROOM_SWEEP_INTERVAL_SECONDS must be greater than zero".to_string(),
            ));
        }

        let max_room_age_seconds =
            parse_var(vars, "ROOM_MAX_AGE_SECONDS", DEFAULT_MAX_ROOM_AGE_SECONDS)?;
        let max_rooms = parse_var(vars, "ROOM_MAX_ROOMS", DEFAULT_MAX_ROOMS)?;

        let room_limits = RoomLimits {
            chat_history_capacity: parse_var(
                vars,
                "ROOM_CHAT_HISTORY_CAPACITY",
                DEFAULT_CHAT_HISTORY_CAPACITY,
            )?,
            snapshot_message_count: parse_var(
                vars,
                "ROOM_SNAPSHOT_MESSAGE_COUNT",
                DEFAULT_SNAPSHOT_MESSAGE_COUNT,
            )?,
            max_message_length: parse_var(
                vars,
                "ROOM_MAX_MESSAGE_LENGTH",
                DEFAULT_MAX_MESSAGE_LENGTH,
            )?,
            max_voice_payload_bytes: parse_var(
                vars,
                "ROOM_MAX_VOICE_PAYLOAD_BYTES",
                DEFAULT_MAX_VOICE_PAYLOAD_BYTES,
            )?,
        };

        if room_limits.chat_history_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "ROOM_CHAT_HISTORY_CAPACITY must be greater than zero".to_string(),
            ));
        }

        Ok(Config {
            bind_address,
            static_dir,
            sweep_interval_seconds,
            max_room_age_seconds,
            max_rooms,
            room_limits,
        })
    }

    /// Sweep interval as a `Duration`.
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    /// Maximum room age as a `Duration`.
    #[must_use]
    pub fn max_room_age(&self) -> Duration {
        Duration::from_secs(self.max_room_age_seconds)
    }
}

/// Parse an optional numeric variable. Present-but-unparseable is an error.
fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(format!("{key}={raw}"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_vars(&HashMap::new()).unwrap();

        assert_eq!(config.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(config.static_dir, DEFAULT_STATIC_DIR);
        assert_eq!(config.sweep_interval(), Duration::from_secs(1800));
        assert_eq!(config.max_room_age(), Duration::from_secs(86_400));
        assert_eq!(config.max_rooms, DEFAULT_MAX_ROOMS);
        assert_eq!(config.room_limits, RoomLimits::default());
        assert_eq!(config.room_limits.chat_history_capacity, 100);
        assert_eq!(config.room_limits.snapshot_message_count, 50);
    }

    #[test]
    fn test_config_custom_values() {
        let vars = HashMap::from([
            ("ROOM_BIND_ADDRESS".to_string(), "127.0.0.1:9000".to_string()),
            ("ROOM_SWEEP_INTERVAL_SECONDS".to_string(), "60".to_string()),
            ("ROOM_MAX_AGE_SECONDS".to_string(), "3600".to_string()),
            ("ROOM_MAX_ROOMS".to_string(), "5".to_string()),
            ("ROOM_SNAPSHOT_MESSAGE_COUNT".to_string(), "10".to_string()),
        ]);

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.sweep_interval_seconds, 60);
        assert_eq!(config.max_room_age_seconds, 3600);
        assert_eq!(config.max_rooms, 5);
        assert_eq!(config.room_limits.snapshot_message_count, 10);
    }

    #[test]
    fn test_config_invalid_number() {
        let vars = HashMap::from([("ROOM_MAX_ROOMS".to_string(), "lots".to_string())]);
        let result = Config::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue(msg)) if msg.contains("ROOM_MAX_ROOMS")));
    }

    #[test]
    fn test_config_zero_sweep_interval_rejected() {
        let vars = HashMap::from([("ROOM_SWEEP_INTERVAL_SECONDS".to_string(), "0".to_string())]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
