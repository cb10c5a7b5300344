// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration schema.
//!
//! ```text
//! AppConfig
//! ├── client: ClientConfig      (endpoint, security, subscription, reconnect...)
//! ├── tags: Vec<TagEntry>       (ordered tag catalog)
//! └── logging: LoggingConfig
//! ```

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uatag_core::{CatalogEntry, ClientConfig, DataType, NodeAddress, TagCatalog};

use crate::error::{ConfigError, ConfigResult};

// =============================================================================
// AppConfig
// =============================================================================

/// Root configuration of a uatag host.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Client settings.
    #[serde(default)]
    pub client: ClientConfig,

    /// Tag catalog, in declaration order.
    #[serde(default)]
    pub tags: Vec<TagEntry>,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Validates the whole configuration.
    pub fn validate(&self) -> ConfigResult<()> {
        self.client.validate()?;

        let mut seen = HashSet::with_capacity(self.tags.len());
        for (i, tag) in self.tags.iter().enumerate() {
            if tag.name.trim().is_empty() {
                return Err(ConfigError::validation(
                    format!("tags[{i}].name"),
                    "tag name must not be empty",
                ));
            }
            if !seen.insert(tag.name.as_str()) {
                return Err(ConfigError::duplicate_tag(&tag.name));
            }
            tag.parsed_type()?;
            tag.parsed_address()?;
        }

        Ok(())
    }

    /// Builds the tag catalog.
    pub fn catalog(&self) -> ConfigResult<TagCatalog> {
        self.tags.iter().map(TagEntry::to_catalog_entry).collect()
    }

    /// Names of tags declared without an address.
    pub fn unaddressed_tags(&self) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|t| t.address.is_none())
            .map(|t| t.name.as_str())
            .collect()
    }
}

// =============================================================================
// TagEntry
// =============================================================================

/// One declared tag as written in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    /// Display name.
    pub name: String,

    /// Data type name (`Boolean`, `Double`, `String`...), case-insensitive.
    #[serde(default = "default_data_type")]
    pub data_type: String,

    /// Node address (`ns=4;s=...`, `i=2258`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

fn default_data_type() -> String {
    DataType::String.as_str().to_string()
}

impl TagEntry {
    /// Creates an addressed entry.
    pub fn new(name: impl Into<String>, data_type: DataType, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.as_str().to_string(),
            address: Some(address.into()),
        }
    }

    /// Parses the data type.
    pub fn parsed_type(&self) -> ConfigResult<DataType> {
        DataType::from_str(&self.data_type)
            .map_err(|e| ConfigError::validation(format!("tags.{}.data_type", self.name), e))
    }

    /// Parses the address, if any.
    pub fn parsed_address(&self) -> ConfigResult<Option<NodeAddress>> {
        self.address
            .as_deref()
            .map(|raw| {
                NodeAddress::from_str(raw)
                    .map_err(|e| ConfigError::invalid_address(&self.name, raw, e.reason))
            })
            .transpose()
    }

    fn to_catalog_entry(&self) -> ConfigResult<CatalogEntry> {
        Ok(CatalogEntry {
            name: self.name.clone(),
            data_type: self.parsed_type()?,
            address: self.parsed_address()?,
        })
    }
}

// =============================================================================
// LoggingConfig
// =============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default)]
    pub level: LogLevel,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Include targets in log lines.
    #[serde(default = "default_true")]
    pub with_target: bool,

    /// Include thread ids in log lines.
    #[serde(default)]
    pub with_thread_ids: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            with_target: true,
            with_thread_ids: false,
        }
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Returns the filter directive name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text.
    #[default]
    Text,
    /// Compact single-line text.
    Compact,
    /// JSON lines.
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, data_type: &str, address: Option<&str>) -> TagEntry {
        TagEntry {
            name: name.to_string(),
            data_type: data_type.to_string(),
            address: address.map(str::to_string),
        }
    }

    #[test]
    fn test_catalog_preserves_order() {
        let config = AppConfig {
            tags: vec![
                entry("System_State", "String", Some("ns=4;s=PLC_PRG.System_State_String")),
                entry("Auto_Mode", "boolean", Some("ns=4;s=PLC_PRG.Auto_Mode")),
                entry("Spare", "Int16", None),
            ],
            ..AppConfig::default()
        };
        config.validate().unwrap();

        let catalog = config.catalog().unwrap();
        let names: Vec<_> = catalog.entries().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["System_State", "Auto_Mode", "Spare"]);
        assert_eq!(catalog.entries()[1].data_type, DataType::Boolean);
        assert_eq!(config.unaddressed_tags(), vec!["Spare"]);
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let config = AppConfig {
            tags: vec![
                entry("Auto_Mode", "Boolean", None),
                entry("Auto_Mode", "Boolean", None),
            ],
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateTag { .. })));
    }

    #[test]
    fn test_bad_address_and_type_rejected() {
        let config = AppConfig {
            tags: vec![entry("Auto_Mode", "Boolean", Some("ns=four;s=X"))],
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidAddress { .. })));

        let config = AppConfig {
            tags: vec![entry("Auto_Mode", "Quaternion", None)],
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Validation { .. })));
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("WARNING".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("loud".parse::<LogLevel>().is_err());
    }
}
