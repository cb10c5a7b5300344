// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `validate` command.

use serde::Serialize;
use uatag_config::AppConfig;
use uatag_core::SecurityMode;

use crate::cli::{Cli, OutputFormat, ValidateArgs};
use crate::error::{BinError, BinResult};

/// What `validate` reports about a loaded configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationSummary {
    /// Server endpoint.
    pub endpoint: String,
    /// Application name.
    pub application_name: String,
    /// Security policy and mode.
    pub security: String,
    /// Number of declared tags.
    pub tag_count: usize,
    /// Tags declared without an address.
    pub unaddressed: Vec<String>,
    /// Extra monitored nodes.
    pub monitored_nodes: usize,
    /// Non-fatal findings.
    pub warnings: Vec<String>,
}

/// Summarizes an already validated configuration.
pub fn summarize(config: &AppConfig) -> ValidationSummary {
    let client = &config.client;
    let unaddressed: Vec<String> = config
        .unaddressed_tags()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut warnings = Vec::new();
    if config.tags.is_empty() {
        warnings.push("No tags configured".to_string());
    }
    if !unaddressed.is_empty() {
        warnings.push(format!(
            "{} tag(s) have no address and cannot be written: {}",
            unaddressed.len(),
            unaddressed.join(", ")
        ));
    }
    if client.security.auto_accept_untrusted && client.security.mode != SecurityMode::None {
        warnings.push("Untrusted server certificates are accepted automatically".to_string());
    }

    ValidationSummary {
        endpoint: client.endpoint.clone(),
        application_name: client.application_name.clone(),
        security: format!("{} / {}", client.security.policy, client.security.mode),
        tag_count: config.tags.len(),
        unaddressed,
        monitored_nodes: client.subscription.monitored_nodes.len(),
        warnings,
    }
}

/// Loads and validates the configuration file, then prints a summary.
pub fn validate(cli: &Cli, args: ValidateArgs) -> BinResult<()> {
    let config_path = &cli.config;

    let config = uatag_config::load_config(config_path).map_err(|e| {
        BinError::from(e).with_context(format!("validating {}", config_path.display()))
    })?;
    let summary = summarize(&config);

    match args.format {
        OutputFormat::Text => {
            println!("Configuration is valid: {}", config_path.display());
            println!();
            println!("Summary:");
            println!("  Endpoint:         {}", summary.endpoint);
            println!("  Application:      {}", summary.application_name);
            println!("  Security:         {}", summary.security);
            println!("  Tags:             {}", summary.tag_count);
            println!("  Unaddressed tags: {}", summary.unaddressed.len());
            for name in &summary.unaddressed {
                println!("    - {}", name);
            }
            println!("  Monitored nodes:  {}", summary.monitored_nodes);

            if !summary.warnings.is_empty() {
                println!();
                println!("Warnings:");
                for warning in &summary.warnings {
                    println!("  ! {}", warning);
                }
            }

            if args.show_config {
                println!();
                println!("Parsed configuration:");
                println!("{}", pretty(&config)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "valid": true,
                "config_path": config_path.display().to_string(),
                "summary": {
                    "endpoint": summary.endpoint,
                    "application_name": summary.application_name,
                    "security": summary.security,
                    "tag_count": summary.tag_count,
                    "unaddressed_tags": summary.unaddressed,
                    "monitored_nodes": summary.monitored_nodes,
                },
                "warnings": summary.warnings,
                "config": if args.show_config { Some(&config) } else { None },
            });
            println!("{}", pretty(&output)?);
        }
    }

    if args.strict && !summary.warnings.is_empty() {
        return Err(BinError::config(format!(
            "Strict mode: {} warning(s) found",
            summary.warnings.len()
        )));
    }

    Ok(())
}

fn pretty<T: Serialize>(value: &T) -> BinResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| BinError::runtime(format!("failed to render JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uatag_config::TagEntry;
    use uatag_core::{ClientConfig, DataType};

    #[test]
    fn test_summary_lists_unaddressed_tags() {
        let mut config = AppConfig {
            client: ClientConfig::builder()
                .endpoint("opc.tcp://192.168.1.2:4840")
                .build()
                .unwrap(),
            ..AppConfig::default()
        };
        config.tags.push(TagEntry::new(
            "Auto_Mode",
            DataType::Boolean,
            "ns=4;s=PLC_PRG.Auto_Mode",
        ));
        config.tags.push(TagEntry {
            name: "Spare".into(),
            data_type: "Int16".into(),
            address: None,
        });

        let summary = summarize(&config);
        assert_eq!(summary.tag_count, 2);
        assert_eq!(summary.unaddressed, vec!["Spare".to_string()]);
        assert!(summary.warnings.iter().any(|w| w.contains("Spare")));
    }

    #[test]
    fn test_empty_catalog_warns() {
        let summary = summarize(&AppConfig::default());
        assert_eq!(summary.tag_count, 0);
        assert!(summary.warnings.contains(&"No tags configured".to_string()));
    }
}
