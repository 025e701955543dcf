// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Protocol variant values and normalization.
//!
//! OPC UA attribute payloads arrive as tagged unions carrying scalars,
//! fixed-width numeric arrays, or nested arrays. Fixed-width array
//! representations are unrepresentable in a generic serialization target, so
//! everything passing outward goes through [`Variant::normalize`], which
//! flattens typed arrays into plain ordered number sequences and recurses
//! into nested arrays element-wise.
//!
//! Normalization is total: every variant shape maps to a [`Value`], absent
//! values map to [`Value::Null`], and no input produces an error. Already
//! normalized values embed back into variants ([`Variant::from`]) and pass
//! through normalization unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Variant
// =============================================================================

/// A protocol-native tagged value as delivered by the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
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

    /// Fixed-width array of signed bytes.
    SByteArray(Vec<i8>),

    /// Fixed-width array of bytes.
    ByteArray(Vec<u8>),

    /// Fixed-width array of 16-bit signed integers.
    Int16Array(Vec<i16>),

    /// Fixed-width array of 16-bit unsigned integers.
    UInt16Array(Vec<u16>),

    /// Fixed-width array of 32-bit signed integers.
    Int32Array(Vec<i32>),

    /// Fixed-width array of 32-bit unsigned integers.
    UInt32Array(Vec<u32>),

    /// Fixed-width array of 64-bit signed integers.
    Int64Array(Vec<i64>),

    /// Fixed-width array of 64-bit unsigned integers.
    UInt64Array(Vec<u64>),

    /// Fixed-width array of 32-bit floats.
    FloatArray(Vec<f32>),

    /// Fixed-width array of 64-bit doubles.
    DoubleArray(Vec<f64>),

    /// Generic array, possibly nested and mixed.
    Array(Vec<Variant>),

    /// Absent value.
    Null,
}

impl Variant {
    /// Returns `true` if this is a null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Returns `true` if this variant is any array shape.
    pub fn is_array(&self) -> bool {
        matches!(
            self,
            Self::SByteArray(_)
                | Self::ByteArray(_)
                | Self::Int16Array(_)
                | Self::UInt16Array(_)
                | Self::Int32Array(_)
                | Self::UInt32Array(_)
                | Self::Int64Array(_)
                | Self::UInt64Array(_)
                | Self::FloatArray(_)
                | Self::DoubleArray(_)
                | Self::Array(_)
        )
    }

    /// Normalizes this variant into a plain serializable value.
    ///
    /// Typed numeric arrays become plain number lists, nested arrays are
    /// normalized element-wise, and `Null` maps to [`Value::Null`].
    pub fn normalize(self) -> Value {
        match self {
            Self::Boolean(v) => Value::Bool(v),
            Self::SByte(v) => Value::Int(v as i64),
            Self::Byte(v) => Value::UInt(v as u64),
            Self::Int16(v) => Value::Int(v as i64),
            Self::UInt16(v) => Value::UInt(v as u64),
            Self::Int32(v) => Value::Int(v as i64),
            Self::UInt32(v) => Value::UInt(v as u64),
            Self::Int64(v) => Value::Int(v),
            Self::UInt64(v) => Value::UInt(v),
            Self::Float(v) => Value::Float(v as f64),
            Self::Double(v) => Value::Float(v),
            Self::String(v) => Value::Text(v),
            Self::DateTime(v) => Value::Time(v),
            Self::SByteArray(v) => Value::List(v.into_iter().map(|x| Value::Int(x as i64)).collect()),
            Self::ByteArray(v) => Value::List(v.into_iter().map(|x| Value::UInt(x as u64)).collect()),
            Self::Int16Array(v) => Value::List(v.into_iter().map(|x| Value::Int(x as i64)).collect()),
            Self::UInt16Array(v) => Value::List(v.into_iter().map(|x| Value::UInt(x as u64)).collect()),
            Self::Int32Array(v) => Value::List(v.into_iter().map(|x| Value::Int(x as i64)).collect()),
            Self::UInt32Array(v) => Value::List(v.into_iter().map(|x| Value::UInt(x as u64)).collect()),
            Self::Int64Array(v) => Value::List(v.into_iter().map(Value::Int).collect()),
            Self::UInt64Array(v) => Value::List(v.into_iter().map(Value::UInt).collect()),
            Self::FloatArray(v) => Value::List(v.into_iter().map(|x| Value::Float(x as f64)).collect()),
            Self::DoubleArray(v) => Value::List(v.into_iter().map(Value::Float).collect()),
            Self::Array(v) => Value::List(v.into_iter().map(Variant::normalize).collect()),
            Self::Null => Value::Null,
        }
    }
}

impl Default for Variant {
    fn default() -> Self {
        Self::Null
    }
}

impl From<Value> for Variant {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(v) => Self::Boolean(v),
            Value::Int(v) => Self::Int64(v),
            Value::UInt(v) => Self::UInt64(v),
            Value::Float(v) => Self::Double(v),
            Value::Text(v) => Self::String(v),
            Value::Time(v) => Self::DateTime(v),
            Value::List(v) => Self::Array(v.into_iter().map(Variant::from).collect()),
        }
    }
}

// =============================================================================
// Value
// =============================================================================

/// A normalized plain value, free of fixed-width array representations.
///
/// Serializes untagged: scalars as JSON scalars, lists as JSON arrays,
/// timestamps as RFC 3339 strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Absent value.
    Null,

    /// Boolean.
    Bool(bool),

    /// Signed integer.
    Int(i64),

    /// Unsigned integer.
    UInt(u64),

    /// Floating point number.
    Float(f64),

    /// Timestamp.
    Time(DateTime<Utc>),

    /// Text.
    Text(String),

    /// Ordered sequence of values.
    List(Vec<Value>),
}

impl Value {
    /// Returns `true` if this is the null value.
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Attempts to view this value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::UInt(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Attempts to view this value as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Attempts to view this value as a list.
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_normalization() {
        assert_eq!(Variant::Boolean(true).normalize(), Value::Bool(true));
        assert_eq!(Variant::Int16(-7).normalize(), Value::Int(-7));
        assert_eq!(Variant::UInt32(42).normalize(), Value::UInt(42));
        assert_eq!(Variant::Double(2.5).normalize(), Value::Float(2.5));
        assert_eq!(
            Variant::String("abc".to_string()).normalize(),
            Value::Text("abc".to_string())
        );
        assert_eq!(Variant::Null.normalize(), Value::Null);
    }

    #[test]
    fn test_typed_array_becomes_plain_list() {
        let normalized = Variant::FloatArray(vec![10.5, -3.2]).normalize();
        let expected = Value::List(vec![
            Value::Float(10.5f32 as f64),
            Value::Float(-3.2f32 as f64),
        ]);
        assert_eq!(normalized, expected);

        let normalized = Variant::UInt16Array(vec![1, 2, 3]).normalize();
        assert_eq!(
            normalized,
            Value::List(vec![Value::UInt(1), Value::UInt(2), Value::UInt(3)])
        );
    }

    #[test]
    fn test_nested_array_normalized_element_wise() {
        let nested = Variant::Array(vec![
            Variant::Int32Array(vec![1, 2]),
            Variant::Array(vec![Variant::Double(0.5), Variant::Null]),
            Variant::String("x".to_string()),
        ]);

        let normalized = nested.normalize();
        assert_eq!(
            normalized,
            Value::List(vec![
                Value::List(vec![Value::Int(1), Value::Int(2)]),
                Value::List(vec![Value::Float(0.5), Value::Null]),
                Value::Text("x".to_string()),
            ])
        );
    }

    #[test]
    fn test_normalization_idempotent() {
        let inputs = vec![
            Variant::Null,
            Variant::Boolean(false),
            Variant::Int64(i64::MIN),
            Variant::UInt64(u64::MAX),
            Variant::Double(1.25),
            Variant::String("text".to_string()),
            Variant::DoubleArray(vec![1.0, 2.0, 3.0]),
            Variant::Array(vec![
                Variant::Int16Array(vec![-1, 0, 1]),
                Variant::Boolean(true),
            ]),
        ];

        for input in inputs {
            let once = input.normalize();
            let twice = Variant::from(once.clone()).normalize();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_value_serializes_plain() {
        let value = Value::List(vec![Value::Float(10.5), Value::Float(-3.2)]);
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "[10.5,-3.2]");

        assert_eq!(serde_json::to_string(&Value::Null).unwrap(), "null");
        assert_eq!(serde_json::to_string(&Value::Bool(true)).unwrap(), "true");
        assert_eq!(
            serde_json::to_string(&Value::Text("hi".to_string())).unwrap(),
            "\"hi\""
        );
    }

    #[test]
    fn test_byte_array_does_not_leak_binary_shape() {
        let normalized = Variant::ByteArray(vec![0x01, 0xFF]).normalize();
        let json = serde_json::to_string(&normalized).unwrap();
        assert_eq!(json, "[1,255]");
    }

    #[test]
    fn test_value_accessors() {
        assert!(Value::Null.is_null());
        assert_eq!(Value::Int(-3).as_f64(), Some(-3.0));
        assert_eq!(Value::Text("a".to_string()).as_str(), Some("a"));
        assert!(Value::Bool(true).as_list().is_none());
    }
}
