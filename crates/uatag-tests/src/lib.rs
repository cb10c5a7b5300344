// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # uatag Integration Tests
//!
//! Test utilities and integration suites for the uatag client.
//!
//! ## Module Structure
//!
//! - [`common`]: shared utilities
//!   - `mocks`: scriptable [`MockTransport`](common::mocks::MockTransport)
//!   - `fixtures`: catalogs, client configurations and sample files
//!   - `harness`: [`ClientHarness`](common::harness::ClientHarness), a client
//!     wired to a mock transport
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p uatag-tests
//! cargo test -p uatag-tests --test integration_reconnect
//! cargo test -p uatag-tests -- --nocapture
//! ```
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use uatag_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = ClientHarness::connected().await;
//!     harness.notify("Auto_Mode", Value::Boolean(true));
//!     harness.client.drain();
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::harness::*;
    pub use crate::common::mocks::*;
    pub use crate::common::{init_test_logging, temp_test_dir};
}
