// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 treecodec developers

//! Storage kinds: the value-tree shape a serialized value is expected to have.

use serde_json::Value;
use std::fmt;

/// The eight shapes a value-tree node can take.
///
/// Numbers are split by representation: a JSON number that fits in `u64`
/// is classified as [`UnsignedInteger`](Self::UnsignedInteger), else as
/// [`SignedInteger`](Self::SignedInteger) if it fits in `i64`, else as
/// [`Float`](Self::Float).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageKind {
    Null,
    Boolean,
    SignedInteger,
    UnsignedInteger,
    Float,
    String,
    Array,
    Object,
}

impl StorageKind {
    /// Classify an existing node.
    pub fn of(node: &Value) -> StorageKind {
        match node {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(number) => {
                if number.is_u64() {
                    Self::UnsignedInteger
                } else if number.is_i64() {
                    Self::SignedInteger
                } else {
                    Self::Float
                }
            }
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Kind-matching rule for validation.
    ///
    /// Permissive in one direction only: an integer-stored node is accepted
    /// where a float was expected, and an unsigned-stored node is accepted
    /// where a signed integer was expected. No other substitutions.
    pub fn accepts(self, actual: StorageKind) -> bool {
        self == actual
            || (self == Self::Float
                && (actual == Self::SignedInteger || actual == Self::UnsignedInteger))
            || (self == Self::SignedInteger && actual == Self::UnsignedInteger)
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::SignedInteger => "signed integer",
            Self::UnsignedInteger => "unsigned integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        write!(f, "{}", name)
    }
}

/// Check that `node` is an object holding exactly the expected keys, each
/// with a matching storage kind. Extra keys fail, missing keys fail.
pub fn validate_object(node: &Value, expected: &[(&str, StorageKind)]) -> bool {
    let object = match node.as_object() {
        Some(object) => object,
        None => return false,
    };
    if object.len() != expected.len() {
        return false;
    }
    for (key, kind) in expected {
        match object.get(*key) {
            Some(value) if kind.accepts(StorageKind::of(value)) => {}
            _ => return false,
        }
    }
    true
}

/// Check that `node` is an array holding only elements of the given kind.
///
/// For `dimensions > 1` every element must itself be an array, all arrays
/// at one nesting level must have the same length, and the leaf dimension
/// is checked against `element`. `dimensions == 0` never validates.
pub fn validate_array(node: &Value, element: StorageKind, dimensions: u32) -> bool {
    let items = match node.as_array() {
        Some(items) => items,
        None => return false,
    };
    match dimensions {
        0 => false,
        1 => items.iter().all(|item| element.accepts(StorageKind::of(item))),
        _ => {
            let expected_len = items
                .first()
                .and_then(|sub| sub.as_array())
                .map_or(0, Vec::len);
            items.iter().all(|sub| {
                sub.as_array().map_or(false, |entries| entries.len() == expected_len)
                    && validate_array(sub, element, dimensions - 1)
            })
        }
    }
}
