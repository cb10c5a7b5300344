// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Logging and tracing initialization.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uatag_config::{LogFormat, LoggingConfig};

use crate::cli::Cli;
use crate::error::{BinError, BinResult};

// =============================================================================
// Settings
// =============================================================================

/// Effective logging settings after merging the file and the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Filter directive for the default target, e.g. `info`.
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Include targets.
    pub with_target: bool,
    /// Include thread ids.
    pub with_thread_ids: bool,
}

impl LogSettings {
    /// Merges the file settings with command line overrides.
    pub fn resolve(cli: &Cli, config: &LoggingConfig) -> Self {
        Self {
            level: cli.effective_log_level(config.level),
            format: cli.effective_log_format(config.format),
            with_target: config.with_target,
            with_thread_ids: config.with_thread_ids,
        }
    }

    /// Builds the filter. `RUST_LOG` wins when set.
    pub fn filter(&self) -> BinResult<EnvFilter> {
        if let Ok(filter) = EnvFilter::try_from_default_env() {
            return Ok(filter);
        }
        // The protocol stack is chatty at info.
        EnvFilter::try_new(format!("{},opcua=warn", self.level))
            .map_err(|e| BinError::config(format!("invalid log level '{}': {}", self.level, e)))
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        let config = LoggingConfig::default();
        Self {
            level: config.level.as_str().to_string(),
            format: config.format,
            with_target: config.with_target,
            with_thread_ids: config.with_thread_ids,
        }
    }
}

// =============================================================================
// Logging Initialization
// =============================================================================

/// Installs the global subscriber.
///
/// Fails if the level is not a valid filter or a subscriber is already set.
pub fn init_logging(settings: &LogSettings) -> BinResult<()> {
    let filter = settings.filter()?;
    let is_terminal = std::io::IsTerminal::is_terminal(&std::io::stdout());

    let result = match settings.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(settings.with_target)
                    .with_thread_ids(settings.with_thread_ids)
                    .with_ansi(is_terminal),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(settings.with_target)
                    .with_thread_ids(settings.with_thread_ids)
                    .with_current_span(true),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_thread_ids(settings.with_thread_ids)
                    .with_ansi(is_terminal),
            )
            .try_init(),
    };

    result.map_err(|e| BinError::init(format!("failed to install log subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use uatag_config::LogLevel;

    #[test]
    fn test_resolve_prefers_cli() {
        let cli = Cli::parse_from(["uatag", "-l", "debug", "--log-format", "compact"]);
        let config = LoggingConfig {
            level: LogLevel::Error,
            format: LogFormat::Json,
            with_target: false,
            with_thread_ids: true,
        };

        let settings = LogSettings::resolve(&cli, &config);
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.format, LogFormat::Compact);
        assert!(!settings.with_target);
        assert!(settings.with_thread_ids);
    }

    #[test]
    fn test_resolve_falls_back_to_file() {
        let cli = Cli::parse_from(["uatag"]);
        let config = LoggingConfig {
            level: LogLevel::Warn,
            ..LoggingConfig::default()
        };
        assert_eq!(LogSettings::resolve(&cli, &config).level, "warn");
    }

    #[test]
    fn test_default_settings() {
        let settings = LogSettings::default();
        assert_eq!(settings.level, "info");
        assert_eq!(settings.format, LogFormat::Text);
        assert!(settings.with_target);
    }
}
