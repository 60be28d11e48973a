// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `read` and `write` commands.

use mbt_core::Value;

use crate::cli::{ReadArgs, WriteArgs};
use crate::error::BinResult;
use crate::runtime::HarnessRuntime;

/// Reads one register and prints its decoded value.
pub async fn read(runtime: &HarnessRuntime, args: ReadArgs) -> BinResult<()> {
    let session = runtime.connect_session().await?;
    let result = session.read(args.class, args.address).await;
    session.close().await;

    let value = result?;
    println!("{}[{}] = {}", args.class.key(), args.address, value);
    Ok(())
}

/// Casts the argument to the register's datatype and writes it.
pub async fn write(runtime: &HarnessRuntime, args: WriteArgs) -> BinResult<()> {
    let session = runtime.connect_session().await?;
    let value = Value::Text(args.value);
    let result = session.write(args.class, args.address, &value).await;
    session.close().await;

    result?;
    println!("{}[{}] <- {}", args.class.key(), args.address, value);
    Ok(())
}
