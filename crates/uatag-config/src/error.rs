// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;
use uatag_core::ClientError;

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file content could not be parsed.
    #[error("Failed to parse config file '{path}': {message}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A value failed validation.
    #[error("Validation failed for '{field}': {message}")]
    Validation {
        /// Offending field.
        field: String,
        /// Error message.
        message: String,
    },

    /// A required field is missing.
    #[error("Missing required field: {field}")]
    MissingField {
        /// Missing field name.
        field: String,
    },

    /// The file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        /// Path to the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file does not exist.
    #[error("File not found: {path}")]
    FileNotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// The file extension is not a supported format.
    #[error("Unsupported configuration format: {format}")]
    UnsupportedFormat {
        /// The extension.
        format: String,
    },

    /// An override environment variable has an unusable value.
    #[error("Invalid environment variable value for '{name}': {message}")]
    InvalidEnvVar {
        /// Variable name.
        name: String,
        /// Error message.
        message: String,
    },

    /// A tag address is malformed.
    #[error("Invalid node address '{address}' for tag '{tag}': {message}")]
    InvalidAddress {
        /// Tag name.
        tag: String,
        /// Address text.
        address: String,
        /// Error message.
        message: String,
    },

    /// Two catalog entries share a name.
    #[error("Duplicate tag name: {name}")]
    DuplicateTag {
        /// The duplicated name.
        name: String,
    },

    /// Deserialization failed outside of a file context.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message.
        message: String,
    },
}

impl ConfigError {
    /// Creates a parse error.
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField { field: field.into() }
    }

    /// Creates an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a file not found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// Creates an unsupported format error.
    pub fn unsupported_format(format: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            format: format.into(),
        }
    }

    /// Creates an invalid environment variable error.
    pub fn invalid_env_var(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidEnvVar {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid address error.
    pub fn invalid_address(
        tag: impl Into<String>,
        address: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::InvalidAddress {
            tag: tag.into(),
            address: address.into(),
            message: message.into(),
        }
    }

    /// Creates a duplicate tag error.
    pub fn duplicate_tag(name: impl Into<String>) -> Self {
        Self::DuplicateTag { name: name.into() }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is related to file I/O.
    pub fn is_io_error(&self) -> bool {
        matches!(self, Self::Io { .. } | Self::FileNotFound { .. })
    }

    /// Returns the error type as a string for logging.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "parse",
            Self::Validation { .. } => "validation",
            Self::MissingField { .. } => "missing_field",
            Self::Io { .. } => "io",
            Self::FileNotFound { .. } => "file_not_found",
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::InvalidEnvVar { .. } => "invalid_env_var",
            Self::InvalidAddress { .. } => "invalid_address",
            Self::DuplicateTag { .. } => "duplicate_tag",
            Self::Serialization { .. } => "serialization",
        }
    }
}

impl From<ClientError> for ConfigError {
    fn from(err: ClientError) -> Self {
        Self::validation("client", err.to_string())
    }
}

/// A Result type with ConfigError.
pub type ConfigResult<T> = Result<T, ConfigError>;
