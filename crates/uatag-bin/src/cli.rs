// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! CLI argument parsing and command definitions.
//!
//! - `run`: connect and mirror tags (default)
//! - `validate`: check a configuration file
//! - `version`: show version information

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use uatag_config::LogLevel;

// =============================================================================
// Main CLI Structure
// =============================================================================

/// uatag - tag-oriented OPC UA client
///
/// Mirrors PLC variables into a local tag cache and writes typed values back.
#[derive(Parser, Debug)]
#[command(
    name = "uatag",
    author = "Sylvex <contact@sylvex.io>",
    version = uatag_core::VERSION,
    about = "Resilient tag-oriented OPC UA client",
    long_about = None,
    propagate_version = true
)]
pub struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "uatag.yaml",
        env = "UATAG_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the file
    #[arg(short, long, env = "UATAG_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log format (text, json, compact); overrides the file
    #[arg(long, env = "UATAG_LOG_FORMAT", global = true)]
    pub log_format: Option<LogFormat>,

    /// Only log warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

// =============================================================================
// Subcommands
// =============================================================================

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Connect to the server and mirror tags until interrupted
    ///
    /// This is the default command when no subcommand is specified.
    Run(RunArgs),

    /// Validate the configuration file
    ///
    /// Parses and validates the file without connecting.
    Validate(ValidateArgs),

    /// Show detailed version information
    Version,
}

// =============================================================================
// Command Arguments
// =============================================================================

/// Arguments for the `run` command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Consumer cycle in milliseconds
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    pub cycle_ms: u64,

    /// Write a value once connected (repeatable), e.g. `--write Auto_Mode=true`
    #[arg(short, long = "write", value_name = "NAME=VALUE")]
    pub writes: Vec<TagAssignment>,
}

impl RunArgs {
    /// Returns the consumer cycle.
    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.cycle_ms)
    }
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            cycle_ms: 100,
            writes: Vec::new(),
        }
    }
}

/// Arguments for the `validate` command.
#[derive(Args, Debug, Clone, Default)]
pub struct ValidateArgs {
    /// Print the parsed configuration after the summary
    #[arg(short, long)]
    pub show_config: bool,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: OutputFormat,

    /// Fail when warnings are present
    #[arg(long)]
    pub strict: bool,
}

// =============================================================================
// Value Types
// =============================================================================

/// A `NAME=VALUE` write request given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagAssignment {
    /// Tag display name.
    pub name: String,
    /// Raw value text, converted using the tag's declared type.
    pub value: String,
}

impl FromStr for TagAssignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, value) = s
            .split_once('=')
            .ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(format!("missing tag name in '{s}'"));
        }
        Ok(Self {
            name: name.to_string(),
            value: value.to_string(),
        })
    }
}

impl fmt::Display for TagAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable text
    Text,
    /// JSON lines
    Json,
    /// Compact single-line text
    Compact,
}

impl From<LogFormat> for uatag_config::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Text => Self::Text,
            LogFormat::Json => Self::Json,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for programmatic use
    Json,
}

// =============================================================================
// Helper Methods
// =============================================================================

impl Cli {
    /// Parses CLI arguments from the command line.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Returns the command to run, defaulting to `run`.
    pub fn effective_command(&self) -> Commands {
        self.command
            .clone()
            .unwrap_or_else(|| Commands::Run(RunArgs::default()))
    }

    /// Resolves the log level: `-q`/`-v`, then `--log-level`, then the file.
    pub fn effective_log_level(&self, configured: LogLevel) -> String {
        if self.quiet {
            LogLevel::Warn.as_str().to_string()
        } else if self.verbose {
            LogLevel::Debug.as_str().to_string()
        } else {
            self.log_level
                .clone()
                .unwrap_or_else(|| configured.as_str().to_string())
        }
    }

    /// Resolves the log format: `--log-format`, then the file.
    pub fn effective_log_format(&self, configured: uatag_config::LogFormat) -> uatag_config::LogFormat {
        self.log_format.map(Into::into).unwrap_or(configured)
    }
}

// =============================================================================
// Tests
// =============================================================================
