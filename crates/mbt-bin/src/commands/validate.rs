// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use mbt_config::CommKind;
use mbt_core::Profile;

use crate::cli::{OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};
use crate::runtime::HarnessRuntime;

/// Validates the configuration and, if one is configured, the profile.
///
/// The configuration itself was validated while building the runtime; this
/// adds the profile check and the warnings.
pub fn validate(runtime: &HarnessRuntime, args: ValidateArgs) -> BinResult<()> {
    let config = runtime.config();
    let mut warnings: Vec<String> = Vec::new();

    let profile = match &config.profile {
        Some(_) => {
            let path = runtime.profile_path()?;
            let profile = Profile::load(&path).map_err(|e| {
                BinError::from(e).with_context(format!("profile {} is invalid", path.display()))
            })?;
            if profile.is_empty() {
                warnings.push(format!("Profile {} declares no registers", path.display()));
            }
            Some((path, profile))
        }
        None => {
            warnings.push("No profile configured".to_string());
            None
        }
    };

    if config.polling.interval_ms == Some(0) {
        warnings.push("Polling interval 0 polls continuously".to_string());
    }
    if config.client.comm == CommKind::Tcp
        && config.client.host == config.server.host
        && config.client.port == config.server.port
    {
        warnings.push(format!(
            "Client and server share the endpoint {}",
            config.server.bind_address()
        ));
    }

    let source = runtime
        .config_path()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults)".to_string());

    match args.format {
        OutputFormat::Text => {
            println!("✓ Configuration is valid: {}", source);
            println!();
            println!("Summary:");
            match &profile {
                Some((path, profile)) => println!(
                    "  Profile: {} ({}, {} registers)",
                    path.display(),
                    profile.identity,
                    profile.len()
                ),
                None => println!("  Profile: -"),
            }
            println!("  {}", runtime.client_report());
            println!("  {}", runtime.server_report());
            println!(
                "  polling: {}",
                config
                    .polling
                    .interval_ms
                    .map(|ms| format!("{ms}ms"))
                    .unwrap_or_else(|| "on demand".to_string())
            );

            if !warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &warnings {
                    println!("  ⚠ {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", serde_json::to_string_pretty(config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": source,
                "profile": profile.as_ref().map(|(path, profile)| serde_json::json!({
                    "path": path.display().to_string(),
                    "identity": profile.identity,
                    "registers": profile.len(),
                })),
                "warnings": warnings,
                "config": if args.show_config { Some(config) } else { None },
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    if args.strict && !warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            warnings.len()
        )));
    }

    Ok(())
}
