//! # Configuration Management
//!
//! Centralized configuration for the MYP4DB sender and receiver.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`

use crate::core::entry::{Entry, StackRecord};
use crate::core::frame::{ETHERNET_MTU, IPV4_HEADER_LEN, UDP_HEADER_LEN};
use crate::core::relation::HeaderLayout;
use crate::core::show::DumpFormat;
use crate::error::{ProtocolError, Result};
use crate::protocol::binding::IP_PROTO_MYP4DB;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Interface name fragment used when none is configured
pub const DEFAULT_INTERFACE: &str = "eth0";

/// Number of tuples generated per relation
pub const DEFAULT_ENTRIES: usize = 10;

/// Entity ids are drawn from `0..DEFAULT_ENTITY_ID_SPACE`
pub const DEFAULT_ENTITY_ID_SPACE: u32 = 1000;

/// Sample UDP ports carried after the entry stack
pub const DEFAULT_UDP_SRC_PORT: u16 = 1234;
pub const DEFAULT_UDP_DST_PORT: u16 = 4321;

/// Largest capture buffer a receiver allocates
pub const MAX_FRAME_SIZE: usize = 65_535;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct P4dbConfig {
    #[serde(default)]
    pub sender: SenderConfig,

    #[serde(default)]
    pub receiver: ReceiverConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl P4dbConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `MYP4DB_*` environment overrides on top of `self`
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(iface) = std::env::var("MYP4DB_INTERFACE") {
            self.sender.interface = iface.clone();
            self.receiver.interface = iface;
        }

        if let Ok(entries) = std::env::var("MYP4DB_ENTRIES") {
            self.sender.entries = entries.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("MYP4DB_ENTRIES: {e}"))
            })?;
        }

        if let Ok(layout) = std::env::var("MYP4DB_LAYOUT") {
            let layout = layout.parse::<HeaderLayout>()?;
            self.sender.layout = layout;
            self.receiver.layout = layout;
        }

        if let Ok(protocols) = std::env::var("MYP4DB_CAPTURE_PROTOCOLS") {
            self.receiver.protocols = protocols
                .split(',')
                .map(|p| p.trim().parse::<u8>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| {
                    ProtocolError::ConfigError(format!("MYP4DB_CAPTURE_PROTOCOLS: {e}"))
                })?;
        }

        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.sender.validate());
        errors.extend(self.receiver.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Sender-side configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SenderConfig {
    /// Substring matched against interface names
    pub interface: String,

    /// Relation header revision to emit
    pub layout: HeaderLayout,

    /// Tuples per relation
    pub entries: usize,

    /// Entity ids are sampled from `0..entity_id_space`
    pub entity_id_space: u32,

    /// Attributes are drawn from `0..=attr_max`
    pub attr_max: i32,

    pub udp_src_port: u16,
    pub udp_dst_port: u16,

    /// Pause after each transmitted frame
    #[serde(with = "duration_serde")]
    pub inter_packet_delay: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            interface: String::from(DEFAULT_INTERFACE),
            layout: HeaderLayout::default(),
            entries: DEFAULT_ENTRIES,
            entity_id_space: DEFAULT_ENTITY_ID_SPACE,
            attr_max: 1000,
            udp_src_port: DEFAULT_UDP_SRC_PORT,
            udp_dst_port: DEFAULT_UDP_DST_PORT,
            inter_packet_delay: Duration::from_secs(1),
        }
    }
}

impl SenderConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.interface.is_empty() {
            errors.push("Sender interface cannot be empty".to_string());
        }

        if self.entries == 0 {
            errors.push("Entries per relation must be greater than 0".to_string());
        } else if self.entries > self.entity_id_space as usize {
            errors.push(format!(
                "Entries per relation ({}) exceed entity id space ({})",
                self.entries, self.entity_id_space
            ));
        }

        if self.attr_max < 0 {
            errors.push(format!("attr_max must not be negative: {}", self.attr_max));
        }

        // IPv4 + relation + UDP header must fit the MTU; the message is checked per frame
        let stack = self.layout.wire_len() + self.entries.saturating_mul(Entry::WIRE_LEN);
        if stack > ETHERNET_MTU - IPV4_HEADER_LEN - UDP_HEADER_LEN {
            errors.push(format!(
                "Relation of {} entries ({stack} bytes) does not fit a {ETHERNET_MTU}-byte MTU",
                self.entries
            ));
        }

        if self.inter_packet_delay.as_secs() > 60 {
            errors.push("Inter-packet delay too long (maximum: 60s)".to_string());
        }

        errors
    }
}

/// Receiver-side configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Interface to capture on
    pub interface: String,

    /// Relation header revision expected on captured frames
    pub layout: HeaderLayout,

    /// IPv4 protocol numbers to keep
    pub protocols: Vec<u8>,

    /// Capture buffer size in bytes
    pub snaplen: usize,

    /// How captured frames are printed
    pub output: DumpFormat,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            interface: String::from(DEFAULT_INTERFACE),
            layout: HeaderLayout::default(),
            protocols: vec![IP_PROTO_MYP4DB],
            snaplen: 2048,
            output: DumpFormat::Show,
        }
    }
}

impl ReceiverConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.interface.is_empty() {
            errors.push("Receiver interface cannot be empty".to_string());
        }

        if self.protocols.is_empty() {
            errors.push("Capture protocol set cannot be empty".to_string());
        }

        if self.snaplen < 64 {
            errors.push(format!("Snaplen too small: {} (minimum: 64)", self.snaplen));
        } else if self.snaplen > MAX_FRAME_SIZE {
            errors.push(format!(
                "Snaplen too large: {} (maximum: {MAX_FRAME_SIZE})",
                self.snaplen
            ));
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("myp4db"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        level.as_str().to_ascii_lowercase().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
