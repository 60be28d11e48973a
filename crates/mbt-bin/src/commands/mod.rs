// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI command implementations.
//!
//! - `serve`: Serve a profile on a local server
//! - `download`: Read every register of a remote device
//! - `poll`: Run the polling engine against a remote device
//! - `proxy`: Mirror a remote device on a local server
//! - `read` / `write`: Single register access
//! - `profiles` / `ports`: List resources
//! - `validate`: Validate configuration and profile
//! - `version`: Show version information

mod access;
mod download;
mod list;
mod poll;
mod proxy;
mod serve;
mod validate;
mod version;

pub use access::{read, write};
pub use download::download;
pub use list::{ports, profiles};
pub use poll::poll;
pub use proxy::proxy;
pub use serve::serve;
pub use validate::validate;
pub use version::version;

use crate::cli::{Cli, Commands};
use crate::error::BinResult;
use crate::logging::init_logging;
use crate::runtime::RuntimeBuilder;

/// Executes the appropriate command based on CLI arguments.
pub async fn execute(cli: Cli) -> BinResult<()> {
    let command = cli.effective_command();
    if let Commands::Version = command {
        return version::version(&cli);
    }

    let runtime = RuntimeBuilder::from_cli(&cli, &command).build()?;
    init_logging(runtime.log_level(), runtime.log_format());

    match command {
        Commands::Serve(_) => serve::serve(&runtime).await,
        Commands::Download(args) => download::download(&runtime, args).await,
        Commands::Poll(args) => poll::poll(&runtime, args).await,
        Commands::Proxy(_) => proxy::proxy(&runtime).await,
        Commands::Read(args) => access::read(&runtime, args).await,
        Commands::Write(args) => access::write(&runtime, args).await,
        Commands::Profiles => list::profiles(&runtime),
        Commands::Ports => list::ports(),
        Commands::Validate(args) => validate::validate(&runtime, args),
        Commands::Version => version::version(&cli),
    }
}
