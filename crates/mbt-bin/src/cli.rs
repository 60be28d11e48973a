// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `serve`: Serve a profile on a local Modbus TCP server (default)
//! - `download`: Read every register of a remote device
//! - `poll`: Cycle the profile through a remote device in the background
//! - `proxy`: Mirror a remote device on a local server
//! - `read` / `write`: Access a single remote register
//! - `profiles` / `ports`: List available resources
//! - `validate`: Validate configuration and profile
//! - `version`: Show version information

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use mbt_config::{ClientConfig, CommKind, Parity as ConfigParity, ServerConfig};
use mbt_core::RegisterClass;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// MBTester - Modbus test harness
///
/// Serves register profiles, polls and downloads remote devices, and proxies
/// a live device through a local server.
#[derive(Parser, Debug)]
#[command(
    name = "mbtester",
    author = "Sylvex <contact@sylvex.io>",
    version = mbt_core::VERSION,
    about = "Modbus test harness: server, client, poller and proxy",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path (default: mbtester.yaml if present)
    #[arg(short, long, env = "MBTESTER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Register profile name or path
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "MBTESTER_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact)
    #[arg(long, env = "MBTESTER_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Enable quiet mode (minimal output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands for the MBTester CLI.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Serve the profile on a local Modbus TCP server
    ///
    /// This is the default command when no subcommand is specified.
    Serve(ServeArgs),

    /// Read every register of the profile from a remote device
    ///
    /// Prints the values as JSON, or writes them to a file.
    Download(DownloadArgs),

    /// Poll a remote device on a schedule
    ///
    /// Runs until interrupted or until the requested number of cycles
    /// completed.
    Poll(PollArgs),

    /// Mirror a remote device on a local server
    ///
    /// Every access to the local server is forwarded to the remote device.
    Proxy(ProxyArgs),

    /// Read one register from a remote device
    Read(ReadArgs),

    /// Write one register on a remote device
    Write(WriteArgs),

    /// List profiles on the search path
    Profiles,

    /// List serial ports
    Ports,

    /// Validate the configuration and profile
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

impl Commands {
    /// Server overrides carried by this command.
    pub fn server_args(&self) -> Option<&ServerArgs> {
        match self {
            Commands::Serve(args) => Some(&args.server),
            Commands::Proxy(args) => Some(&args.server),
            _ => None,
        }
    }

    /// Client overrides carried by this command.
    pub fn client_args(&self) -> Option<&ClientArgs> {
        match self {
            Commands::Download(args) => Some(&args.client),
            Commands::Poll(args) => Some(&args.client),
            Commands::Proxy(args) => Some(&args.client),
            Commands::Read(args) => Some(&args.client),
            Commands::Write(args) => Some(&args.client),
            _ => None,
        }
    }
}

// =============================================================================
// Shared Arguments
// =============================================================================

/// Local server endpoint overrides.
#[derive(Args, Debug, Default, Clone)]
pub struct ServerArgs {
    /// Interface the local server binds
    #[arg(id = "listen_host", long = "listen-host")]
    pub host: Option<String>,

    /// Port the local server binds
    #[arg(id = "listen_port", long = "listen-port")]
    pub port: Option<u16>,

    /// Device id the local server answers for
    #[arg(id = "listen_id", long = "listen-id")]
    pub device_id: Option<u8>,
}

impl ServerArgs {
    /// Applies the overrides to `config`.
    pub fn apply(&self, config: &mut ServerConfig) {
        if let Some(host) = &self.host {
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(device_id) = self.device_id {
            config.device_id = device_id;
        }
    }
}

/// Remote device endpoint overrides.
#[derive(Args, Debug, Default, Clone)]
pub struct ClientArgs {
    /// Remote host; selects TCP
    #[arg(short = 'H', long, conflicts_with = "serial")]
    pub host: Option<String>,

    /// Remote TCP port
    #[arg(short = 'P', long)]
    pub port: Option<u16>,

    /// Serial port; selects RTU
    #[arg(short, long)]
    pub serial: Option<String>,

    /// Serial baud rate
    #[arg(short, long)]
    pub baud_rate: Option<u32>,

    /// Serial parity
    #[arg(short = 'x', long)]
    pub parity: Option<Parity>,

    /// Remote device id
    #[arg(short, long)]
    pub device_id: Option<u8>,

    /// Added to every profile address on the wire
    #[arg(short, long, allow_hyphen_values = true)]
    pub offset: Option<i32>,

    /// Request timeout (e.g. 500ms, 2s)
    #[arg(short, long, value_parser = humantime::parse_duration)]
    pub timeout: Option<Duration>,
}

impl ClientArgs {
    /// Applies the overrides to `config`.
    pub fn apply(&self, config: &mut ClientConfig) {
        if let Some(host) = &self.host {
            config.comm = CommKind::Tcp;
            config.host = host.clone();
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(serial) = &self.serial {
            config.comm = CommKind::Serial;
            config.serial.port = serial.clone();
        }
        if let Some(baud_rate) = self.baud_rate {
            config.serial.baud_rate = baud_rate;
        }
        if let Some(parity) = self.parity {
            config.serial.parity = parity.into();
        }
        if let Some(device_id) = self.device_id {
            config.device_id = device_id;
        }
        if let Some(offset) = self.offset {
            config.offset = offset;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        }
    }
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `serve` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub server: ServerArgs,
}

/// Arguments for the `download` command.
#[derive(Args, Debug, Default, Clone)]
pub struct DownloadArgs {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub client: ClientArgs,

    /// Output file path (default: stdout)
    #[arg(short = 'O', long)]
    pub output: Option<PathBuf>,
}

/// Arguments for the `poll` command.
#[derive(Args, Debug, Default, Clone)]
pub struct PollArgs {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub client: ClientArgs,

    /// Cycle interval: a duration such as `5s`, `0` for continuous, or `off`
    #[arg(short, long, value_parser = parse_interval)]
    pub interval: Option<PollInterval>,

    /// Stop after this many completed cycles
    #[arg(short = 'n', long)]
    pub cycles: Option<u64>,

    /// Save the polled profile to this file on exit
    #[arg(long)]
    pub save: Option<PathBuf>,
}

/// Arguments for the `proxy` command.
#[derive(Args, Debug, Default, Clone)]
pub struct ProxyArgs {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub client: ClientArgs,

    #[command(flatten)]
    #[allow(missing_docs)]
    pub server: ServerArgs,
}

/// Arguments for the `read` command.
#[derive(Args, Debug, Clone)]
pub struct ReadArgs {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub client: ClientArgs,

    /// Register class: di, co, hr or ir
    pub class: RegisterClass,

    /// Profile address
    pub address: u16,
}

/// Arguments for the `write` command.
#[derive(Args, Debug, Clone)]
pub struct WriteArgs {
    #[command(flatten)]
    #[allow(missing_docs)]
    pub client: ClientArgs,

    /// Register class: co or hr
    pub class: RegisterClass,

    /// Profile address
    pub address: u16,

    /// Value, cast to the register's datatype
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Show parsed configuration after validation
    #[arg(long)]
    pub show_config: bool,

    /// Output format for validation results
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Strict mode: treat warnings as errors
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Enums
// =============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for structured logging
    Json,
    /// Compact format for minimal output
    Compact,
}

impl From<LogFormat> for mbt_config::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => mbt_config::LogFormat::Text,
            LogFormat::Json => mbt_config::LogFormat::Json,
            LogFormat::Compact => mbt_config::LogFormat::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// JSON format for programmatic parsing
    Json,
}

/// Serial parity as typed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Parity {
    /// No parity
    #[value(alias = "n")]
    None,
    /// Odd parity
    #[value(alias = "o")]
    Odd,
    /// Even parity
    #[value(alias = "e")]
    Even,
}

impl From<Parity> for ConfigParity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => ConfigParity::None,
            Parity::Odd => ConfigParity::Odd,
            Parity::Even => ConfigParity::Even,
        }
    }
}

/// A polling interval; `None` disables scheduled cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollInterval(pub Option<Duration>);

/// Parses `off`/`none`, `0`, or a human-readable duration.
pub fn parse_interval(text: &str) -> Result<PollInterval, String> {
    match text.trim().to_lowercase().as_str() {
        "off" | "none" => Ok(PollInterval(None)),
        "0" => Ok(PollInterval(Some(Duration::ZERO))),
        other => humantime::parse_duration(other)
            .map(|d| PollInterval(Some(d)))
            .map_err(|e| format!("invalid interval '{text}': {e}")),
    }
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parse CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the effective command, defaulting to `Serve` if none specified.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Serve(ServeArgs::default()))
    }

    /// Check if verbose logging is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// The log level requested on the command line, if any.
    pub fn effective_log_level(&self) -> Option<&str> {
        if self.quiet {
            Some("warn")
        } else if self.verbose {
            Some("debug")
        } else {
            self.log_level.as_deref()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
