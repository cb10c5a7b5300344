// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use tracing::info;
use uatag_config::load_config;

use crate::cli::{Cli, RunArgs};
use crate::error::{BinError, BinResult};
use crate::logging::{init_logging, LogSettings};
use crate::runtime::RuntimeBuilder;
use crate::shutdown::ShutdownCoordinator;

/// Loads the configuration, installs logging and runs until a signal arrives.
pub async fn run(cli: &Cli, args: RunArgs) -> BinResult<()> {
    let config = load_config(&cli.config)
        .map_err(|e| BinError::from(e).with_context(format!("loading {}", cli.config.display())))?;

    init_logging(&LogSettings::resolve(cli, &config.logging))?;
    info!(config = %cli.config.display(), "Configuration loaded");

    let shutdown = ShutdownCoordinator::new();
    let runtime = RuntimeBuilder::new()
        .config(config)
        .cycle(args.cycle())
        .writes(args.writes)
        .shutdown(shutdown.clone())
        .build()?;

    let signals = tokio::spawn(async move { shutdown.wait_for_shutdown().await });
    let result = runtime.run().await;
    signals.abort();

    result.map(|_| ())
}
