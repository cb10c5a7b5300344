// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Conversion Integration Tests
//!
//! Raw text to typed value conversion as used by the write path.

use uatag_core::client::convert;
use uatag_core::{ClientError, DataType, Value};

fn conversion_failed(result: Result<Value, ClientError>) -> bool {
    matches!(result, Err(ClientError::Conversion { .. }))
}

#[test]
fn test_convert_boolean_literals() {
    assert_eq!(convert("true", DataType::Boolean).unwrap(), Value::Boolean(true));
    assert_eq!(convert("False", DataType::Boolean).unwrap(), Value::Boolean(false));
    assert!(conversion_failed(convert("1", DataType::Boolean)));
    assert!(conversion_failed(convert("yes", DataType::Boolean)));
}

#[test]
fn test_convert_integers_reject_garbage_and_fractions() {
    assert!(conversion_failed(convert("abc", DataType::Int32)));
    assert!(conversion_failed(convert("3.14", DataType::Int16)));
    assert!(conversion_failed(convert("40000", DataType::Int16)));
    assert_eq!(convert("-32768", DataType::Int16).unwrap(), Value::Int16(i16::MIN));
    assert_eq!(convert("2147483647", DataType::Int32).unwrap(), Value::Int32(i32::MAX));
}

#[test]
fn test_convert_trims_whitespace() {
    assert_eq!(convert("  -2.5 ", DataType::Double).unwrap(), Value::Double(-2.5));
    assert_eq!(convert("\t7\n", DataType::Int32).unwrap(), Value::Int32(7));
    assert_eq!(
        convert("  Ready  ", DataType::String).unwrap(),
        Value::String("Ready".into())
    );
}

#[test]
fn test_convert_is_locale_independent() {
    assert_eq!(convert("12.5", DataType::Float).unwrap(), Value::Float(12.5));
    assert!(conversion_failed(convert("12,5", DataType::Double)));
    assert!(conversion_failed(convert("1,000", DataType::Int32)));
}

#[test]
fn test_convert_error_carries_trimmed_value_and_target() {
    match convert("  abc ", DataType::Int32) {
        Err(ClientError::Conversion { value, target, .. }) => {
            assert_eq!(value, "abc");
            assert_eq!(target, DataType::Int32);
        }
        other => panic!("expected conversion error, got {other:?}"),
    }
}

#[test]
fn test_convert_unsupported_types() {
    for data_type in [DataType::DateTime, DataType::UInt32, DataType::ByteString, DataType::Variant] {
        assert!(matches!(
            convert("1", data_type),
            Err(ClientError::UnsupportedType { data_type: t }) if t == data_type
        ));
    }
}
