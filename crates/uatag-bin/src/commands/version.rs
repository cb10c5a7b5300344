// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Prints version and build information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("uatag - resilient tag-oriented OPC UA client");
    println!();
    println!("Version Information:");
    println!("  uatag-bin:    {}", crate::VERSION);
    println!("  uatag-core:   {}", uatag_core::VERSION);
    println!("  uatag-config: {}", uatag_config::VERSION);
    println!();
    println!("Build Information:");
    println!("  Target:       {}", std::env::consts::ARCH);
    println!("  OS:           {}", std::env::consts::OS);
    println!();
    println!("Features:");
    println!(
        "  Transport:    {}",
        if cfg!(feature = "real-transport") { "opcua" } else { "none" }
    );
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
