// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `download` command.

use tracing::info;

use crate::cli::DownloadArgs;
use crate::error::{BinError, BinResult};
use crate::runtime::HarnessRuntime;

/// Reads every profile register from the remote device and prints the
/// result as JSON.
pub async fn download(runtime: &HarnessRuntime, args: DownloadArgs) -> BinResult<()> {
    let session = runtime.connect_session().await?;
    let download = session.download().await;
    session.close().await;

    info!(
        requests = session.stats().total_requests(),
        failed = session.stats().failed_requests(),
        average_ms = session.stats().average_response_time().as_millis() as u64,
        "Download finished"
    );

    let json = serde_json::to_string_pretty(&download)?;
    match args.output {
        Some(path) => {
            std::fs::write(&path, json)
                .map_err(|e| BinError::io(format!("failed to write {}: {e}", path.display())))?;
            println!("Saved download to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}
