// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `proxy` command.

use mbt_modbus::Proxy;
use tracing::info;

use crate::error::BinResult;
use crate::runtime::HarnessRuntime;

/// Connects to the remote device, then serves its profile locally with every
/// access forwarded.
pub async fn proxy(runtime: &HarnessRuntime) -> BinResult<()> {
    let profile = runtime.load_profile()?;
    let session = runtime.remote_session(profile)?;

    println!("{}", mbt_core::app_title("proxy"));
    println!("{}", runtime.client_report());
    println!("{}", runtime.server_report());

    let proxy = Proxy::start(session, &runtime.server_config()).await?;
    info!(address = %proxy.local_addr(), "Proxy running, press Ctrl+C to stop");

    runtime.wait_for_shutdown().await?;

    let stats = proxy.bridge().stats();
    info!(
        reads = stats.reads(),
        writes = stats.writes(),
        failures = stats.failures(),
        passthrough = stats.passthrough(),
        "Proxy statistics"
    );
    proxy.stop().await;
    Ok(())
}
