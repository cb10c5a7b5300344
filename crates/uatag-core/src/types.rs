// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data model: tags, data types, values, status codes and node addresses.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// DataType
// =============================================================================

/// Built-in scalar data types a tag can carry.
///
/// Only the catalog types ([`DataType::is_writable`]) can be written; the
/// remaining variants exist so that notifications of any scalar type can be
/// represented in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DataType {
    /// Boolean value.
    Boolean,
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    Byte,
    /// Signed 16-bit integer.
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Signed 32-bit integer.
    Int32,
    /// Unsigned 32-bit integer.
    UInt32,
    /// Signed 64-bit integer.
    Int64,
    /// Unsigned 64-bit integer.
    UInt64,
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// UTF-8 string.
    #[default]
    String,
    /// Date and time (UTC).
    DateTime,
    /// GUID.
    Guid,
    /// Opaque byte string.
    ByteString,
    /// Anything else (arrays, structures, empty values).
    Variant,
}

impl DataType {
    /// Returns the OPC UA built-in type id.
    pub const fn type_id(&self) -> u32 {
        match self {
            Self::Boolean => 1,
            Self::SByte => 2,
            Self::Byte => 3,
            Self::Int16 => 4,
            Self::UInt16 => 5,
            Self::Int32 => 6,
            Self::UInt32 => 7,
            Self::Int64 => 8,
            Self::UInt64 => 9,
            Self::Float => 10,
            Self::Double => 11,
            Self::String => 12,
            Self::DateTime => 13,
            Self::Guid => 14,
            Self::ByteString => 15,
            Self::Variant => 24,
        }
    }

    /// Returns `true` if raw text can be converted to this type for a write.
    #[inline]
    pub const fn is_writable(&self) -> bool {
        matches!(
            self,
            Self::Boolean | Self::Int16 | Self::Int32 | Self::Float | Self::Double | Self::String
        )
    }

    /// Returns `true` if this is a numeric type.
    #[inline]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::SByte
                | Self::Byte
                | Self::Int16
                | Self::UInt16
                | Self::Int32
                | Self::UInt32
                | Self::Int64
                | Self::UInt64
                | Self::Float
                | Self::Double
        )
    }

    /// Returns the canonical name.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Boolean => "Boolean",
            Self::SByte => "SByte",
            Self::Byte => "Byte",
            Self::Int16 => "Int16",
            Self::UInt16 => "UInt16",
            Self::Int32 => "Int32",
            Self::UInt32 => "UInt32",
            Self::Int64 => "Int64",
            Self::UInt64 => "UInt64",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::String => "String",
            Self::DateTime => "DateTime",
            Self::Guid => "Guid",
            Self::ByteString => "ByteString",
            Self::Variant => "Variant",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "bool" | "boolean" => Ok(Self::Boolean),
            "sbyte" | "int8" => Ok(Self::SByte),
            "byte" | "uint8" => Ok(Self::Byte),
            "int16" | "short" => Ok(Self::Int16),
            "uint16" | "ushort" => Ok(Self::UInt16),
            "int32" | "int" => Ok(Self::Int32),
            "uint32" | "uint" => Ok(Self::UInt32),
            "int64" | "long" => Ok(Self::Int64),
            "uint64" | "ulong" => Ok(Self::UInt64),
            "float" | "single" => Ok(Self::Float),
            "double" => Ok(Self::Double),
            "string" => Ok(Self::String),
            "datetime" => Ok(Self::DateTime),
            "guid" => Ok(Self::Guid),
            "bytestring" => Ok(Self::ByteString),
            "variant" => Ok(Self::Variant),
            other => Err(format!("Unknown data type: {}", other)),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A typed protocol value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Boolean value.
    Boolean(bool),
    /// Signed byte.
    SByte(i8),
    /// Unsigned byte.
    Byte(u8),
    /// 16-bit signed integer.
    Int16(i16),
    /// 16-bit unsigned integer.
    UInt16(u16),
    /// 32-bit signed integer.
    Int32(i32),
    /// 32-bit unsigned integer.
    UInt32(u32),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit unsigned integer.
    UInt64(u64),
    /// 32-bit float.
    Float(f32),
    /// 64-bit double.
    Double(f64),
    /// String value.
    String(String),
    /// Date/time value.
    DateTime(DateTime<Utc>),
    /// GUID value.
    Guid(Uuid),
    /// Byte string.
    ByteString(Vec<u8>),
    /// Empty value.
    #[default]
    Null,
}

impl Value {
    /// Returns the data type observed for this value.
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Boolean(_) => DataType::Boolean,
            Self::SByte(_) => DataType::SByte,
            Self::Byte(_) => DataType::Byte,
            Self::Int16(_) => DataType::Int16,
            Self::UInt16(_) => DataType::UInt16,
            Self::Int32(_) => DataType::Int32,
            Self::UInt32(_) => DataType::UInt32,
            Self::Int64(_) => DataType::Int64,
            Self::UInt64(_) => DataType::UInt64,
            Self::Float(_) => DataType::Float,
            Self::Double(_) => DataType::Double,
            Self::String(_) => DataType::String,
            Self::DateTime(_) => DataType::DateTime,
            Self::Guid(_) => DataType::Guid,
            Self::ByteString(_) => DataType::ByteString,
            Self::Null => DataType::Variant,
        }
    }

    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// Canonical display text, used as the cached tag value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(v) => write!(f, "{}", v),
            Self::SByte(v) => write!(f, "{}", v),
            Self::Byte(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::UInt64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
            Self::DateTime(v) => f.write_str(&v.to_rfc3339()),
            Self::Guid(v) => write!(f, "{}", v),
            Self::ByteString(v) => write!(f, "<{} bytes>", v.len()),
            Self::Null => Ok(()),
        }
    }
}

// =============================================================================
// StatusCode
// =============================================================================

/// OPC UA status code.
///
/// The two most significant bits carry the severity: `00` Good, `01`
/// Uncertain, `10`/`11` Bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

impl StatusCode {
    /// Good.
    pub const GOOD: Self = Self(0x0000_0000);
    /// Uncertain.
    pub const UNCERTAIN: Self = Self(0x4000_0000);
    /// Bad.
    pub const BAD: Self = Self(0x8000_0000);
    /// BadUnexpectedError.
    pub const BAD_UNEXPECTED_ERROR: Self = Self(0x8001_0000);
    /// BadInternalError.
    pub const BAD_INTERNAL_ERROR: Self = Self(0x8002_0000);
    /// BadCommunicationError.
    pub const BAD_COMMUNICATION_ERROR: Self = Self(0x8005_0000);
    /// BadTimeout.
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    /// BadShutdown.
    pub const BAD_SHUTDOWN: Self = Self(0x800C_0000);
    /// BadServerNotConnected.
    pub const BAD_SERVER_NOT_CONNECTED: Self = Self(0x800D_0000);
    /// BadNothingToDo.
    pub const BAD_NOTHING_TO_DO: Self = Self(0x800F_0000);
    /// BadTooManyOperations.
    pub const BAD_TOO_MANY_OPERATIONS: Self = Self(0x8010_0000);
    /// BadUserAccessDenied.
    pub const BAD_USER_ACCESS_DENIED: Self = Self(0x801F_0000);
    /// BadSessionIdInvalid.
    pub const BAD_SESSION_ID_INVALID: Self = Self(0x8025_0000);
    /// BadSessionClosed.
    pub const BAD_SESSION_CLOSED: Self = Self(0x8026_0000);
    /// BadNodeIdInvalid.
    pub const BAD_NODE_ID_INVALID: Self = Self(0x8033_0000);
    /// BadNodeIdUnknown.
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    /// BadAttributeIdInvalid.
    pub const BAD_ATTRIBUTE_ID_INVALID: Self = Self(0x8035_0000);
    /// BadIndexRangeInvalid.
    pub const BAD_INDEX_RANGE_INVALID: Self = Self(0x8036_0000);
    /// BadNotReadable.
    pub const BAD_NOT_READABLE: Self = Self(0x803A_0000);
    /// BadNotWritable.
    pub const BAD_NOT_WRITABLE: Self = Self(0x803B_0000);
    /// BadOutOfRange.
    pub const BAD_OUT_OF_RANGE: Self = Self(0x803C_0000);
    /// BadNotSupported.
    pub const BAD_NOT_SUPPORTED: Self = Self(0x803D_0000);
    /// BadWriteNotSupported.
    pub const BAD_WRITE_NOT_SUPPORTED: Self = Self(0x8073_0000);
    /// BadTypeMismatch.
    pub const BAD_TYPE_MISMATCH: Self = Self(0x8074_0000);
    /// BadSecureChannelClosed.
    pub const BAD_SECURE_CHANNEL_CLOSED: Self = Self(0x8086_0000);
    /// BadNotConnected.
    pub const BAD_NOT_CONNECTED: Self = Self(0x808A_0000);

    /// Returns the raw code.
    #[inline]
    pub const fn bits(&self) -> u32 {
        self.0
    }

    /// Returns `true` for a Good severity.
    #[inline]
    pub const fn is_good(&self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` for an Uncertain severity.
    #[inline]
    pub const fn is_uncertain(&self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Returns `true` for a Bad severity.
    #[inline]
    pub const fn is_bad(&self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Returns the symbolic name, if known.
    pub fn name(&self) -> Option<&'static str> {
        // Info bits in the low word do not change the symbolic code.
        let name = match self.0 & 0xFFFF_0000 {
            0x0000_0000 => "Good",
            0x4000_0000 => "Uncertain",
            0x8000_0000 => "Bad",
            0x8001_0000 => "BadUnexpectedError",
            0x8002_0000 => "BadInternalError",
            0x8005_0000 => "BadCommunicationError",
            0x800A_0000 => "BadTimeout",
            0x800C_0000 => "BadShutdown",
            0x800D_0000 => "BadServerNotConnected",
            0x800F_0000 => "BadNothingToDo",
            0x8010_0000 => "BadTooManyOperations",
            0x801F_0000 => "BadUserAccessDenied",
            0x8025_0000 => "BadSessionIdInvalid",
            0x8026_0000 => "BadSessionClosed",
            0x8033_0000 => "BadNodeIdInvalid",
            0x8034_0000 => "BadNodeIdUnknown",
            0x8035_0000 => "BadAttributeIdInvalid",
            0x8036_0000 => "BadIndexRangeInvalid",
            0x803A_0000 => "BadNotReadable",
            0x803B_0000 => "BadNotWritable",
            0x803C_0000 => "BadOutOfRange",
            0x803D_0000 => "BadNotSupported",
            0x8073_0000 => "BadWriteNotSupported",
            0x8074_0000 => "BadTypeMismatch",
            0x8086_0000 => "BadSecureChannelClosed",
            0x808A_0000 => "BadNotConnected",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:08X})", name, self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl From<u32> for StatusCode {
    fn from(code: u32) -> Self {
        Self(code)
    }
}

// =============================================================================
// DataValue
// =============================================================================

/// A value delivered by a notification, with its source timestamp and status.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValue {
    /// The value.
    pub value: Value,
    /// Timestamp assigned by the data source.
    pub source_timestamp: Option<DateTime<Utc>>,
    /// Quality of the value.
    pub status: StatusCode,
}

impl DataValue {
    /// Creates a Good value stamped with the current time.
    pub fn now(value: Value) -> Self {
        Self {
            value,
            source_timestamp: Some(Utc::now()),
            status: StatusCode::GOOD,
        }
    }

    /// Creates a Good value with an explicit source timestamp.
    pub fn at(value: Value, source_timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            source_timestamp: Some(source_timestamp),
            status: StatusCode::GOOD,
        }
    }
}

// =============================================================================
// NodeAddress
// =============================================================================

/// Error returned when a node address string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid node address '{address}': {reason}")]
pub struct AddressParseError {
    /// The offending address text.
    pub address: String,
    /// Reason.
    pub reason: String,
}

impl AddressParseError {
    fn new(address: &str, reason: impl Into<String>) -> Self {
        Self {
            address: address.to_string(),
            reason: reason.into(),
        }
    }
}

/// Identifier part of a node address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeIdentifier {
    /// Numeric identifier (`i=`).
    Numeric(u32),
    /// String identifier (`s=`).
    String(String),
    /// GUID identifier (`g=`).
    Guid(Uuid),
    /// Opaque identifier (`b=`), kept in its base64 text form.
    Opaque(String),
}

impl fmt::Display for NodeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(v) => write!(f, "i={}", v),
            Self::String(v) => write!(f, "s={}", v),
            Self::Guid(v) => write!(f, "g={}", v),
            Self::Opaque(v) => write!(f, "b={}", v),
        }
    }
}

/// Protocol address of a tag on the server.
///
/// Parsed from the standard text form:
/// - `ns=4;s=|var|CODESYS Control.Application.PLC_PRG.Power_system`
/// - `ns=2;i=1001`
/// - `i=2258` (namespace 0)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    /// Namespace index.
    pub namespace: u16,
    /// Identifier within the namespace.
    pub identifier: NodeIdentifier,
}

impl NodeAddress {
    /// Creates a string-identified address.
    pub fn string(namespace: u16, id: impl Into<String>) -> Self {
        Self {
            namespace,
            identifier: NodeIdentifier::String(id.into()),
        }
    }

    /// Creates a numeric address.
    pub fn numeric(namespace: u16, id: u32) -> Self {
        Self {
            namespace,
            identifier: NodeIdentifier::Numeric(id),
        }
    }
}

impl FromStr for NodeAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        let (namespace, identifier_part) = match s.strip_prefix("ns=") {
            Some(rest) => {
                let (ns, id) = rest
                    .split_once(';')
                    .ok_or_else(|| AddressParseError::new(s, "missing identifier after namespace"))?;
                let ns: u16 = ns
                    .parse()
                    .map_err(|_| AddressParseError::new(s, "invalid namespace index"))?;
                (ns, id)
            }
            None => (0, s),
        };

        let identifier = if let Some(id) = identifier_part.strip_prefix("i=") {
            let value = id
                .parse()
                .map_err(|_| AddressParseError::new(s, "invalid numeric identifier"))?;
            NodeIdentifier::Numeric(value)
        } else if let Some(id) = identifier_part.strip_prefix("s=") {
            if id.is_empty() {
                return Err(AddressParseError::new(s, "empty string identifier"));
            }
            NodeIdentifier::String(id.to_string())
        } else if let Some(id) = identifier_part.strip_prefix("g=") {
            let uuid = Uuid::parse_str(id)
                .map_err(|e| AddressParseError::new(s, format!("invalid GUID: {}", e)))?;
            NodeIdentifier::Guid(uuid)
        } else if let Some(id) = identifier_part.strip_prefix("b=") {
            if id.is_empty() {
                return Err(AddressParseError::new(s, "empty opaque identifier"));
            }
            NodeIdentifier::Opaque(id.to_string())
        } else {
            return Err(AddressParseError::new(
                s,
                "unknown identifier type, expected i=, s=, g= or b=",
            ));
        };

        Ok(Self {
            namespace,
            identifier,
        })
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace == 0 {
            write!(f, "{}", self.identifier)
        } else {
            write!(f, "ns={};{}", self.namespace, self.identifier)
        }
    }
}

impl Serialize for NodeAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for NodeAddress {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// =============================================================================
// Tag
// =============================================================================

/// A named, typed data point mirrored from the server.
///
/// `display_name` is the registry key and never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Unique display name.
    pub display_name: String,
    /// Last applied value, as display text.
    pub value: String,
    /// Source timestamp of the last applied value (RFC 3339), or empty.
    pub source_timestamp: String,
    /// Data type of the last applied value.
    pub data_type: DataType,
}

impl Tag {
    /// Creates a tag with no value yet.
    pub fn new(display_name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            display_name: display_name.into(),
            value: String::new(),
            source_timestamp: String::new(),
            data_type,
        }
    }

    /// Returns `true` once a value has been applied.
    pub fn has_value(&self) -> bool {
        !self.source_timestamp.is_empty() || !self.value.is_empty()
    }
}

/// Formats an optional source timestamp the way it is cached on a [`Tag`].
pub fn format_timestamp(timestamp: Option<DateTime<Utc>>) -> String {
    timestamp.map(|t| t.to_rfc3339()).unwrap_or_default()
}

// =============================================================================
// Tests
// =============================================================================
