// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uatag-bin
//!
//! Reference host for the uatag client: argument parsing, logging setup,
//! signal handling and a consumer loop that drains tag updates once per cycle.
//!
//! ## Architecture
//!
//! ```text
//!            main.rs
//!               │
//!        ┌──────▼──────┐
//!        │   cli.rs    │
//!        └──────┬──────┘
//!               │
//!   ┌───────────┼───────────┐
//!   ▼           ▼           ▼
//! commands   runtime     logging
//!               │
//!        ┌──────▼──────┐
//!        │  shutdown   │
//!        └─────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Mirror tags from the configured server
//! uatag -c /etc/uatag/line1.yaml
//!
//! # Switch the line to automatic mode once connected
//! uatag run --write Auto_Mode=true --write Manuel_Mode=false
//!
//! # Check a configuration file
//! uatag validate --format json
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod logging;
pub mod runtime;
pub mod shutdown;

pub use cli::{Cli, Commands, TagAssignment};
pub use error::{BinError, BinResult};
pub use logging::{init_logging, LogSettings};
pub use runtime::{HostRuntime, RunSummary, RuntimeBuilder};
pub use shutdown::{ShutdownCoordinator, ShutdownSignal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
