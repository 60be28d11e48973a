// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration loading and processing for MBTester.
//!
//! # Loading Pipeline
//!
//! 1. Resolve `${VAR}` / `${VAR:-default}` placeholders in the raw text
//! 2. Parse YAML, TOML or JSON (chosen by file extension)
//! 3. Apply `MBTESTER_*` environment overrides
//! 4. Resolve relative profile search paths against the config directory
//! 5. Validate
//!
//! # Environment Variable Override
//!
//! ```text
//! MBTESTER_PROFILE=demo.json
//! MBTESTER_SERVER_PORT=5020
//! MBTESTER_CLIENT_HOST=192.168.1.10
//! MBTESTER_CLIENT_OFFSET=0
//! MBTESTER_POLL_INTERVAL_MS=0
//! MBTESTER_LOG_LEVEL=debug
//! ```

use crate::error::{ConfigError, ConfigResult};
use crate::schema::{HarnessConfig, LogLevel};
use serde::de::DeserializeOwned;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "MBTESTER";

// =============================================================================
// ConfigLoader
// =============================================================================

/// Configuration loader for MBTester.
///
/// # Examples
///
/// ```no_run
/// use mbt_config::loader::ConfigLoader;
///
/// let loader = ConfigLoader::new();
/// let config = loader.load("mbtester.yaml").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Base directory for resolving relative paths.
    base_path: Option<PathBuf>,

    /// Environment variable prefix.
    env_prefix: String,

    /// Whether to resolve environment variables.
    resolve_env_vars: bool,
}

impl ConfigLoader {
    /// Creates a new configuration loader with default settings.
    pub fn new() -> Self {
        Self {
            base_path: None,
            env_prefix: DEFAULT_ENV_PREFIX.to_string(),
            resolve_env_vars: true,
        }
    }

    /// Sets the base path for resolving relative paths.
    pub fn with_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Sets the environment variable prefix.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Enables or disables environment variable resolution.
    pub fn with_env_vars(mut self, enabled: bool) -> Self {
        self.resolve_env_vars = enabled;
        self
    }

    /// Loads configuration from a file.
    ///
    /// The file format is determined by the file extension:
    /// - `.yaml` or `.yml` - YAML format
    /// - `.toml` - TOML format
    /// - `.json` - JSON format
    pub fn load(&self, path: impl AsRef<Path>) -> ConfigResult<HarnessConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        let base_path = self.base_path.clone().unwrap_or_else(|| {
            path.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        });

        let content = self.read_file(path)?;
        let format = ConfigFormat::from_path(path)?;
        let mut config = self.parse_content(&content, format, path)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        resolve_relative_paths(&mut config, &base_path);

        config.validate()?;

        debug!(
            profile = config.profile.as_deref().unwrap_or("-"),
            client = %config.client.endpoint(),
            server = %config.server.bind_address(),
            "Configuration loaded"
        );
        Ok(config)
    }

    /// Loads configuration from a string.
    pub fn load_from_str(&self, content: &str, format: ConfigFormat) -> ConfigResult<HarnessConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };
        let mut config = parse_str(&content, format)?;

        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Builds the default configuration with environment overrides applied.
    ///
    /// Used when no configuration file is given.
    pub fn load_defaults(&self) -> ConfigResult<HarnessConfig> {
        let mut config = HarnessConfig::default();
        if self.resolve_env_vars {
            self.apply_env_overrides(&mut config)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn read_file(&self, path: &Path) -> ConfigResult<String> {
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))
    }

    fn parse_content(
        &self,
        content: &str,
        format: ConfigFormat,
        path: &Path,
    ) -> ConfigResult<HarnessConfig> {
        let content = if self.resolve_env_vars {
            self.resolve_env_placeholders(content)
        } else {
            content.to_string()
        };

        parse_str(&content, format).map_err(|e| match e {
            ConfigError::Parse { path: None, message } => ConfigError::parse(path, message),
            other => other,
        })
    }

    /// Expands `${VAR}` and `${VAR:-default}`.
    ///
    /// An unset variable without a default stays in the text as written.
    /// An unclosed `${` is copied through.
    fn resolve_env_placeholders(&self, content: &str) -> String {
        let mut out = String::with_capacity(content.len());
        let mut rest = content;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let body_and_tail = &rest[start + 2..];
            let Some(end) = body_and_tail.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let body = &body_and_tail[..end];
            let (name, default) = match body.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (body, None),
            };
            match (env::var(name), default) {
                (Ok(value), _) => out.push_str(&value),
                (Err(_), Some(default)) => out.push_str(default),
                (Err(_), None) => {
                    warn!(variable = name, "Environment variable not set");
                    out.push_str(&rest[start..start + end + 3]);
                }
            }
            rest = &body_and_tail[end + 1..];
        }
        out.push_str(rest);
        out
    }

    /// Applies `<PREFIX>_*` environment variable overrides.
    fn apply_env_overrides(&self, config: &mut HarnessConfig) -> ConfigResult<()> {
        if let Some(value) = self.env("PROFILE") {
            config.profile = Some(value);
        }

        if let Some(value) = self.env("SERVER_HOST") {
            config.server.host = value;
        }
        if let Some(port) = self.env_parsed("SERVER_PORT")? {
            config.server.port = port;
        }
        if let Some(id) = self.env_parsed("SERVER_DEVICE_ID")? {
            config.server.device_id = id;
        }

        if let Some(value) = self.env("CLIENT_HOST") {
            config.client.host = value;
        }
        if let Some(port) = self.env_parsed("CLIENT_PORT")? {
            config.client.port = port;
        }
        if let Some(value) = self.env("CLIENT_SERIAL_PORT") {
            config.client.serial.port = value;
        }
        if let Some(id) = self.env_parsed("CLIENT_DEVICE_ID")? {
            config.client.device_id = id;
        }
        if let Some(offset) = self.env_parsed("CLIENT_OFFSET")? {
            config.client.offset = offset;
        }
        if let Some(timeout) = self.env_parsed("CLIENT_TIMEOUT_MS")? {
            config.client.timeout_ms = timeout;
        }

        if let Some(value) = self.env("POLL_INTERVAL_MS") {
            config.polling.interval_ms = match value.trim().to_lowercase().as_str() {
                "" | "none" | "null" | "off" => None,
                other => Some(other.parse().map_err(|_| {
                    ConfigError::invalid_env_var(self.var_name("POLL_INTERVAL_MS"), "expected milliseconds")
                })?),
            };
        }

        if let Some(value) = self.env("LOG_LEVEL") {
            if let Some(level) = parse_log_level(&value) {
                config.logging.level = level;
            }
        }

        Ok(())
    }

    fn var_name(&self, suffix: &str) -> String {
        format!("{}_{}", self.env_prefix, suffix)
    }

    fn env(&self, suffix: &str) -> Option<String> {
        env::var(self.var_name(suffix)).ok()
    }

    fn env_parsed<T: FromStr>(&self, suffix: &str) -> ConfigResult<Option<T>> {
        match self.env(suffix) {
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ConfigError::invalid_env_var(self.var_name(suffix), "expected a number")),
            None => Ok(None),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// ConfigFormat
// =============================================================================

/// Supported configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// YAML format.
    Yaml,
    /// TOML format.
    Toml,
    /// JSON format.
    Json,
}

impl ConfigFormat {
    /// Determines the format from a file path.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some("json") => Ok(ConfigFormat::Json),
            Some(other) => Err(ConfigError::unsupported_format(other)),
            None => Err(ConfigError::unsupported_format("(no extension)")),
        }
    }

    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
            ConfigFormat::Json => "json",
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

fn parse_str<T: DeserializeOwned>(content: &str, format: ConfigFormat) -> ConfigResult<T> {
    match format {
        ConfigFormat::Yaml => serde_yaml_parse(content),
        ConfigFormat::Toml => toml::from_str(content).map_err(ConfigError::serialization),
        ConfigFormat::Json => serde_json::from_str(content).map_err(ConfigError::serialization),
    }
}

fn resolve_relative_paths(config: &mut HarnessConfig, base_path: &Path) {
    for dir in &mut config.profile_paths {
        if dir.is_relative() {
            *dir = base_path.join(&dir);
        }
    }
}

/// Parses a log level string.
pub fn parse_log_level(value: &str) -> Option<LogLevel> {
    match value.to_lowercase().as_str() {
        "trace" => Some(LogLevel::Trace),
        "debug" => Some(LogLevel::Debug),
        "info" => Some(LogLevel::Info),
        "warn" | "warning" => Some(LogLevel::Warn),
        "error" | "critical" => Some(LogLevel::Error),
        _ => None,
    }
}

/// YAML parsing through the config crate.
fn serde_yaml_parse<T: DeserializeOwned>(content: &str) -> ConfigResult<T> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(content, config::FileFormat::Yaml))
        .build()
        .map_err(ConfigError::serialization)?;

    config
        .try_deserialize()
        .map_err(ConfigError::serialization)
}

// =============================================================================
// Convenience Functions
// =============================================================================

/// Loads configuration from a file with default settings.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<HarnessConfig> {
    ConfigLoader::new().load(path)
}

/// Loads configuration from a string with the specified format.
pub fn load_config_str(content: &str, format: ConfigFormat) -> ConfigResult<HarnessConfig> {
    ConfigLoader::new().load_from_str(content, format)
}

// =============================================================================
// Tests
// =============================================================================
