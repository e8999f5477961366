//! Configuration module for the echo harness.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values. The client and
//! server binaries share the common flags; defaults differ per role (the
//! client targets loopback, the server binds all interfaces).

use clap::{Args, Parser};
use serde::Deserialize;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::path::PathBuf;

/// Default port shared by client and server.
pub const DEFAULT_PORT: u16 = 43211;

/// Payload size preset, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizePreset {
    Small,
    Medium,
    Large,
}

impl SizePreset {
    /// Payload length in bytes for this preset.
    pub fn bytes(self) -> usize {
        match self {
            SizePreset::Small => 4096,
            SizePreset::Medium => 32 * 1024,
            SizePreset::Large => 1024 * 1024,
        }
    }
}

impl std::fmt::Display for SizePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SizePreset::Small => write!(f, "small"),
            SizePreset::Medium => write!(f, "medium"),
            SizePreset::Large => write!(f, "large"),
        }
    }
}

/// Parse the `-c` selector: numeric 1/2/3, preset names also accepted.
fn parse_preset(s: &str) -> Result<SizePreset, String> {
    match s {
        "1" | "small" => Ok(SizePreset::Small),
        "2" | "medium" => Ok(SizePreset::Medium),
        "3" | "large" => Ok(SizePreset::Large),
        _ => Err(format!(
            "invalid size preset '{s}' (use 1=small/4KB, 2=medium/32KB, 3=large/1MB)"
        )),
    }
}

/// Which side of the connection the process plays.
///
/// Only affects default values: the client connects to loopback unless told
/// otherwise, the server listens on all interfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Client,
    Server,
}

impl Role {
    fn default_address(self) -> Ipv4Addr {
        match self {
            Role::Client => Ipv4Addr::LOCALHOST,
            Role::Server => Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Flags shared by both binaries.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// IPv4 address (client: server to connect to, server: address to bind)
    #[arg(short, long)]
    pub address: Option<Ipv4Addr>,

    /// TCP port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Payload size preset: 1=small/4KB, 2=medium/32KB, 3=large/1MB
    #[arg(short = 'c', long = "config", value_name = "PRESET", value_parser = parse_preset)]
    pub size: Option<SizePreset>,

    /// Path to TOML configuration file
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Command-line arguments for the client binary.
#[derive(Parser, Debug)]
#[command(name = "echo-client")]
#[command(version = "0.1.0")]
#[command(about = "Send a generated payload to the echo server and verify the echo", long_about = None)]
pub struct ClientArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Wait for a keypress before connecting (time to attach a capture tool)
    #[arg(short, long)]
    pub wait: bool,
}

/// Command-line arguments for the server binary.
#[derive(Parser, Debug)]
#[command(name = "echo-server")]
#[command(version = "0.1.0")]
#[command(about = "Receive one payload, echo it back verbatim, and exit", long_about = None)]
pub struct ServerArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub test: TestConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network-related configuration
#[derive(Debug, Deserialize)]
pub struct NetworkConfig {
    /// IPv4 address; defaults per role when absent
    pub address: Option<Ipv4Addr>,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: default_port(),
        }
    }
}

/// Test-related configuration
#[derive(Debug, Deserialize)]
pub struct TestConfig {
    /// Payload size preset (small, medium, large)
    #[serde(default = "default_size")]
    pub size: SizePreset,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            size: default_size(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_size() -> SizePreset {
    SizePreset::Small
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration, immutable for the whole run.
#[derive(Debug, Clone)]
pub struct Config {
    pub address: Ipv4Addr,
    pub port: u16,
    pub size: SizePreset,
    pub log_level: String,
}

impl Config {
    /// Resolve configuration from CLI args, optional TOML file, and role
    /// defaults. CLI arguments take precedence over TOML file values.
    pub fn resolve(common: &CommonArgs, role: Role) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = common.file {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Config {
            address: common
                .address
                .or(toml_config.network.address)
                .unwrap_or_else(|| role.default_address()),
            port: common.port.unwrap_or(toml_config.network.port),
            size: common.size.unwrap_or(toml_config.test.size),
            log_level: if common.log_level != "info" {
                common.log_level.clone()
            } else {
                toml_config.logging.level
            },
        })
    }

    /// Full socket address for connect/bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::V4(SocketAddrV4::new(self.address, self.port))
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
