// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Harness runtime: resolved configuration plus the factories every command
//! shares.
//!
//! - Configuration loading with command line overrides
//! - Profile lookup on the search path
//! - Remote session and local server construction
//! - Graceful shutdown coordination

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use mbt_config::{
    CommKind, ConfigLoader, HarnessConfig, LogFormat, ProfileLocator,
};
use mbt_core::{Profile, SharedProfile};
use mbt_modbus::{
    AnyTransport, ClientEndpoint, ModbusRtuConfig, ModbusServerConfig, ModbusTcpConfig, Parity,
    RemoteSession, RetryTransport, SerialFrame,
};

use crate::cli::{ClientArgs, Cli, Commands, ServerArgs};
use crate::error::{BinError, BinResult};
use crate::logging::normalize_level;
use crate::shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Configuration file picked up from the working directory when no
/// `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "mbtester.yaml";

/// The remote session type every command uses.
pub type Session = RemoteSession<RetryTransport<AnyTransport>>;

// =============================================================================
// HarnessRuntime
// =============================================================================

/// Resolved configuration and shared services for one command.
#[derive(Debug)]
pub struct HarnessRuntime {
    config: Arc<HarnessConfig>,
    config_path: Option<PathBuf>,
    log_level: &'static str,
    log_format: LogFormat,
    shutdown: ShutdownCoordinator,
}

impl HarnessRuntime {
    /// Creates a runtime over an already resolved configuration.
    pub fn new(config: HarnessConfig) -> Self {
        let log_level = config.logging.level.as_str();
        let log_format = config.logging.format;
        Self {
            config: Arc::new(config),
            config_path: None,
            log_level,
            log_format,
            shutdown: ShutdownCoordinator::new(),
        }
    }

    /// The resolved configuration.
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// The configuration file, if one was loaded.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Effective log level.
    pub fn log_level(&self) -> &'static str {
        self.log_level
    }

    /// Effective log format.
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// The shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    // =========================================================================
    // Profiles
    // =========================================================================

    /// Profile search path for this configuration.
    pub fn locator(&self) -> ProfileLocator {
        ProfileLocator::standard(&self.config.profile_paths, self.config.profile.as_deref())
    }

    /// Resolves the configured profile to a file.
    pub fn profile_path(&self) -> BinResult<PathBuf> {
        let name = self
            .config
            .profile
            .as_deref()
            .ok_or_else(|| BinError::config("no profile configured (use --profile)"))?;
        Ok(self.locator().resolve(name)?)
    }

    /// Loads the configured profile.
    pub fn load_profile(&self) -> BinResult<SharedProfile> {
        let path = self.profile_path()?;
        let profile = Profile::load(&path)
            .map_err(|e| BinError::from(e).with_context(format!("loading {}", path.display())))?;
        info!(
            path = %path.display(),
            identity = %profile.identity,
            registers = profile.len(),
            "Profile loaded"
        );
        Ok(profile.into_shared())
    }

    // =========================================================================
    // Roles
    // =========================================================================

    /// Builds the remote endpoint from the client section.
    pub fn client_endpoint(&self) -> BinResult<ClientEndpoint> {
        let client = &self.config.client;
        let endpoint = match client.comm {
            CommKind::Tcp => ClientEndpoint::Tcp(
                ModbusTcpConfig::new(client.host.clone(), client.port)
                    .with_unit(client.device_id)
                    .with_timeout(client.timeout()),
            ),
            CommKind::Serial => {
                let serial = &client.serial;
                let parity = match serial.parity {
                    mbt_config::Parity::None => Parity::None,
                    mbt_config::Parity::Odd => Parity::Odd,
                    mbt_config::Parity::Even => Parity::Even,
                };
                ClientEndpoint::Rtu(ModbusRtuConfig {
                    port: serial.port.clone(),
                    baud_rate: serial.baud_rate,
                    frame: SerialFrame::new(serial.data_bits, parity, serial.stop_bits),
                    unit_id: client.device_id,
                    timeout: client.timeout(),
                })
            }
        };
        endpoint.validate()?;
        Ok(endpoint)
    }

    /// Creates an unconnected session over `profile`.
    pub fn remote_session(&self, profile: SharedProfile) -> BinResult<Session> {
        let endpoint = self.client_endpoint()?;
        debug!(endpoint = %endpoint, retries = self.config.client.retries, "Creating remote session");
        let transport = AnyTransport::with_retries(&endpoint, self.config.client.retries);
        Ok(RemoteSession::new(transport, profile).with_offset(self.config.client.offset))
    }

    /// Creates and connects a session over the configured profile.
    pub async fn connect_session(&self) -> BinResult<Session> {
        let session = self.remote_session(self.load_profile()?)?;
        session
            .connect()
            .await
            .map_err(|e| BinError::from(e).with_context(format!("connecting to {}", self.config.client.endpoint())))?;
        Ok(session)
    }

    /// Local server settings.
    pub fn server_config(&self) -> ModbusServerConfig {
        let server = &self.config.server;
        ModbusServerConfig::new(server.host.clone(), server.port, server.device_id)
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// One-line summary of the client side.
    pub fn client_report(&self) -> String {
        let client = &self.config.client;
        match client.comm {
            CommKind::Tcp => format!(
                "client: tcp {} device {} offset {} timeout {}ms",
                client.endpoint(),
                client.device_id,
                client.offset,
                client.timeout_ms
            ),
            CommKind::Serial => format!(
                "client: serial {} {} {}{}{} device {} offset {} timeout {}ms",
                client.serial.port,
                client.serial.baud_rate,
                client.serial.data_bits,
                client.serial.parity.name().chars().next().unwrap_or('N'),
                client.serial.stop_bits,
                client.device_id,
                client.offset,
                client.timeout_ms
            ),
        }
    }

    /// One-line summary of the server side.
    pub fn server_report(&self) -> String {
        format!(
            "server: tcp {} device {}",
            self.config.server.bind_address(),
            self.config.server.device_id
        )
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    /// Installs the OS signal listener and returns a future that resolves
    /// on shutdown.
    pub fn shutdown_on_signal(&self) -> ShutdownSignal {
        let coordinator = self.shutdown.clone();
        let signal = coordinator.shutdown_signal();
        tokio::spawn(async move {
            if let Err(e) = coordinator.wait_for_shutdown().await {
                tracing::error!(error = %e, "Failed to install signal handlers");
                coordinator.initiate_shutdown();
            }
        });
        signal
    }

    /// Waits for an OS signal.
    pub async fn wait_for_shutdown(&self) -> BinResult<()> {
        self.shutdown
            .wait_for_shutdown()
            .await
            .map_err(|e| BinError::init(format!("failed to install signal handlers: {e}")))
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder resolving configuration file, environment and command line into
/// a [`HarnessRuntime`].
#[derive(Debug, Default)]
pub struct RuntimeBuilder {
    config_path: Option<PathBuf>,
    config: Option<HarnessConfig>,
    profile: Option<String>,
    log_level: Option<String>,
    log_format: Option<LogFormat>,
    server: Option<ServerArgs>,
    client: Option<ClientArgs>,
}

impl RuntimeBuilder {
    /// Creates a new runtime builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects global options and the overrides carried by `command`.
    pub fn from_cli(cli: &Cli, command: &Commands) -> Self {
        Self {
            config_path: cli.config.clone(),
            config: None,
            profile: cli.profile.clone(),
            log_level: cli.effective_log_level().map(str::to_string),
            log_format: cli.log_format.map(LogFormat::from),
            server: command.server_args().cloned(),
            client: command.client_args().cloned(),
        }
    }

    /// Sets the configuration file path.
    pub fn config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sets the configuration directly.
    pub fn config(mut self, config: HarnessConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Overrides the profile.
    pub fn profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    /// Overrides the server endpoint.
    pub fn server(mut self, args: ServerArgs) -> Self {
        self.server = Some(args);
        self
    }

    /// Overrides the client endpoint.
    pub fn client(mut self, args: ClientArgs) -> Self {
        self.client = Some(args);
        self
    }

    /// Builds the runtime.
    ///
    /// Without an explicit configuration the file named by `--config` is
    /// loaded, then `mbtester.yaml` if it exists, then the defaults.
    pub fn build(self) -> BinResult<HarnessRuntime> {
        let loader = ConfigLoader::new();
        let (mut config, config_path) = match (self.config, self.config_path) {
            (Some(config), _) => (config, None),
            (None, Some(path)) => {
                let config = loader.load(&path).map_err(|e| {
                    BinError::from(e).with_context(format!("failed to load {}", path.display()))
                })?;
                (config, Some(path))
            }
            (None, None) if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                let path = PathBuf::from(DEFAULT_CONFIG_FILE);
                (loader.load(&path)?, Some(path))
            }
            (None, None) => (loader.load_defaults()?, None),
        };

        if let Some(profile) = self.profile {
            config.profile = Some(profile);
        }
        if let Some(server) = &self.server {
            server.apply(&mut config.server);
        }
        if let Some(client) = &self.client {
            client.apply(&mut config.client);
        }
        config.validate()?;

        let mut runtime = HarnessRuntime::new(config);
        runtime.config_path = config_path;
        if let Some(level) = self.log_level.as_deref() {
            runtime.log_level = normalize_level(level);
        }
        if let Some(format) = self.log_format {
            runtime.log_format = format;
        }
        Ok(runtime)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn profile_file(dir: &Path) -> PathBuf {
        let path = dir.join("pump.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"identity":"Pump","datablocks":{{"hr":{{"10":{{"dsc":"Speed","dtype":"uint16","rtype":"rw","bo":"little","wo":"little","value":3}}}}}}}}"#
        )
        .unwrap();
        path
    }

    #[test]
    fn test_builder_with_config() {
        let runtime = RuntimeBuilder::new()
            .config(HarnessConfig::default())
            .profile("pump")
            .build()
            .unwrap();
        assert_eq!(runtime.config().profile.as_deref(), Some("pump"));
        assert_eq!(runtime.log_level(), "info");
        assert!(runtime.config_path().is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cli = Cli::parse_from([
            "mbtester", "-v", "--log-format", "json", "proxy", "-H", "10.1.2.3", "--listen-port", "1502",
        ]);
        let command = cli.effective_command();
        let runtime = RuntimeBuilder::from_cli(&cli, &command)
            .config(HarnessConfig::default())
            .build()
            .unwrap();
        assert_eq!(runtime.config().client.host, "10.1.2.3");
        assert_eq!(runtime.config().server.port, 1502);
        assert_eq!(runtime.log_level(), "debug");
        assert_eq!(runtime.log_format(), LogFormat::Json);
        assert!(runtime.client_report().contains("10.1.2.3:502"));
        assert!(runtime.server_report().contains(":1502"));
    }

    #[test]
    fn test_invalid_override_rejected() {
        let result = RuntimeBuilder::new()
            .config(HarnessConfig::default())
            .server(ServerArgs {
                port: Some(0),
                ..Default::default()
            })
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_config_file() {
        let result = RuntimeBuilder::new().config_path("/nonexistent/mbtester.yaml").build();
        assert!(result.is_err());
    }

    #[test]
    fn test_load_profile_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = profile_file(dir.path());
        let runtime = RuntimeBuilder::new()
            .config(HarnessConfig::default())
            .profile(path.display().to_string())
            .build()
            .unwrap();
        let profile = runtime.load_profile().unwrap();
        assert_eq!(profile.read().identity, "Pump");
    }

    #[test]
    fn test_load_profile_requires_name() {
        let runtime = HarnessRuntime::new(HarnessConfig::default());
        assert!(matches!(runtime.load_profile(), Err(BinError::Configuration(_))));
    }

    #[test]
    fn test_endpoints() {
        let mut config = HarnessConfig::default();
        config.client.comm = CommKind::Serial;
        config.client.serial.port = "/dev/ttyUSB1".to_string();
        config.client.serial.data_bits = 7;
        config.client.serial.parity = mbt_config::Parity::Even;
        config.client.serial.stop_bits = 2;
        config.client.device_id = 9;
        let runtime = HarnessRuntime::new(config);

        match runtime.client_endpoint().unwrap() {
            ClientEndpoint::Rtu(rtu) => {
                assert_eq!(rtu.port, "/dev/ttyUSB1");
                assert_eq!(rtu.frame, SerialFrame::new(7, Parity::Even, 2));
                assert_eq!(rtu.unit_id, 9);
            }
            other => panic!("expected RTU endpoint, got {other:?}"),
        }
        assert!(runtime.client_report().contains("7E2"));

        let server = runtime.server_config();
        assert_eq!(server.port, 502);
        assert_eq!(server.device_id, 1);
    }
}
