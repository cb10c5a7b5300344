// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Raw text to typed value conversion for writes.
//!
//! Input is trimmed first. Numbers use Rust's locale-independent parsers
//! (`.` decimal separator, no grouping). Booleans accept only the literals
//! `true` and `false`, in any letter case.

use crate::error::{ClientError, ClientResult};
use crate::types::{DataType, Value};

/// Converts a raw value to `data_type`.
///
/// # Errors
///
/// - [`ClientError::UnsupportedType`] if the type is not writable.
/// - [`ClientError::Conversion`] if the text does not parse.
pub fn convert(raw: &str, data_type: DataType) -> ClientResult<Value> {
    let text = raw.trim();

    let parse_error = |reason: String| ClientError::conversion(text, data_type, reason);

    let value = match data_type {
        DataType::Boolean => Value::Boolean(parse_bool(text).ok_or_else(|| {
            parse_error("expected 'true' or 'false'".to_string())
        })?),
        DataType::Int16 => Value::Int16(text.parse().map_err(|e| parse_error(format!("{}", e)))?),
        DataType::Int32 => Value::Int32(text.parse().map_err(|e| parse_error(format!("{}", e)))?),
        DataType::Float => Value::Float(text.parse().map_err(|e| parse_error(format!("{}", e)))?),
        DataType::Double => Value::Double(text.parse().map_err(|e| parse_error(format!("{}", e)))?),
        DataType::String => Value::String(text.to_string()),
        other => return Err(ClientError::unsupported_type(other)),
    };

    Ok(value)
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean() {
        assert_eq!(convert("true", DataType::Boolean).unwrap(), Value::Boolean(true));
        assert_eq!(convert(" False ", DataType::Boolean).unwrap(), Value::Boolean(false));
        assert_eq!(convert("TRUE", DataType::Boolean).unwrap(), Value::Boolean(true));
        for bad in ["1", "0", "yes", "on", ""] {
            assert!(matches!(
                convert(bad, DataType::Boolean),
                Err(ClientError::Conversion { .. })
            ));
        }
    }

    #[test]
    fn test_integers() {
        assert_eq!(convert("42", DataType::Int32).unwrap(), Value::Int32(42));
        assert_eq!(convert("-7", DataType::Int16).unwrap(), Value::Int16(-7));

        let err = convert("abc", DataType::Int32).unwrap_err();
        match err {
            ClientError::Conversion { value, target, .. } => {
                assert_eq!(value, "abc");
                assert_eq!(target, DataType::Int32);
            }
            other => panic!("unexpected error: {other}"),
        }

        assert!(matches!(convert("3.14", DataType::Int16), Err(ClientError::Conversion { .. })));
        assert!(matches!(convert("40000", DataType::Int16), Err(ClientError::Conversion { .. })));
        assert!(matches!(convert("1,000", DataType::Int32), Err(ClientError::Conversion { .. })));
    }

    #[test]
    fn test_floats() {
        assert_eq!(convert("  -2.5 ", DataType::Double).unwrap(), Value::Double(-2.5));
        assert_eq!(convert("12.5", DataType::Double).unwrap(), Value::Double(12.5));
        assert_eq!(convert("0.25", DataType::Float).unwrap(), Value::Float(0.25));
        assert!(matches!(convert("2,5", DataType::Double), Err(ClientError::Conversion { .. })));
    }

    #[test]
    fn test_string_is_trimmed() {
        assert_eq!(
            convert("  Running ", DataType::String).unwrap(),
            Value::String("Running".into())
        );
    }

    #[test]
    fn test_unsupported_type() {
        for dt in [DataType::DateTime, DataType::UInt32, DataType::Guid, DataType::Variant] {
            assert!(matches!(
                convert("1", dt),
                Err(ClientError::UnsupportedType { data_type }) if data_type == dt
            ));
        }
    }
}
