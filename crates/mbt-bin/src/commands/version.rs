// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("{}", mbt_core::app_title(""));
    println!("Modbus test harness: server, client, poller and proxy");
    println!();
    println!("Version Information:");
    println!("  mbt-bin:     {}", env!("CARGO_PKG_VERSION"));
    println!("  mbt-core:    {}", mbt_core::VERSION);
    println!("  mbt-config:  {}", mbt_config::VERSION);
    println!("  mbt-modbus:  {}", mbt_modbus::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
