// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `serve` command.

use std::sync::Arc;

use mbt_modbus::{DeviceStore, ModbusServer, StoreAccess};
use tracing::{debug, info};

use crate::error::BinResult;
use crate::runtime::HarnessRuntime;

/// Serves the configured profile until a shutdown signal arrives.
pub async fn serve(runtime: &HarnessRuntime) -> BinResult<()> {
    let profile = runtime.load_profile()?;
    let device = Arc::new(DeviceStore::from_profile(
        runtime.config().server.device_id,
        profile,
    )?);

    for store in device.iter() {
        store.on_read(|access: &StoreAccess<'_>| {
            debug!(
                class = access.class.key(),
                address = access.address,
                count = access.count(),
                "Register read"
            );
            None
        });
        store.on_write(|access: &StoreAccess<'_>| {
            info!(
                class = access.class.key(),
                address = access.address,
                words = ?access.words,
                previous = ?access.previous,
                "Register written"
            );
            None
        });
    }

    println!("{}", mbt_core::app_title("server"));
    println!("{}", runtime.server_report());

    let mut server = ModbusServer::start(&runtime.server_config(), device).await?;
    info!(address = %server.local_addr(), "Serving profile, press Ctrl+C to stop");

    runtime.wait_for_shutdown().await?;
    server.stop();
    Ok(())
}
