// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! MBTester - Modbus test harness
//!
//! Main binary entry point.

use mbt_bin::cli::Cli;
use mbt_bin::error::report_error_and_exit;

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    if let Err(error) = mbt_bin::commands::execute(cli).await {
        report_error_and_exit(error);
    }
}
