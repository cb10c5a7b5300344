// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uatag-config
//!
//! File-based configuration for the uatag OPC UA tag client.
//!
//! ## Quick Start
//!
//! ```no_run
//! use uatag_config::loader::load_config;
//!
//! let config = load_config("config/uatag.yaml").unwrap();
//! let catalog = config.catalog().unwrap();
//!
//! println!("Endpoint: {}", config.client.endpoint);
//! println!("Tags: {}", catalog.len());
//! ```
//!
//! ## Formats
//!
//! YAML (`.yaml`, `.yml`), TOML (`.toml`) and JSON (`.json`), picked from
//! the file extension.
//!
//! ## Environment Variables
//!
//! Values in files can reference the environment:
//!
//! ```yaml
//! client:
//!   endpoint: "${PLC_ENDPOINT:opc.tcp://192.168.1.2:4840}"
//! ```
//!
//! and a few values can be overridden directly:
//!
//! ```text
//! UATAG_ENDPOINT=opc.tcp://10.0.0.5:4840
//! UATAG_APPLICATION_NAME=LineClient
//! UATAG_LOG_LEVEL=debug
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{load_config, load_config_str, ConfigFormat, ConfigLoader, ConfigLoaderBuilder};
pub use schema::{AppConfig, LogFormat, LogLevel, LoggingConfig, TagEntry};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
