// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 treecodec developers

//! Error type shared by all codec operations.

use crate::kind::StorageKind;
use std::fmt;

/// Errors reported by deserialization and by polymorphic dispatch.
///
/// Validation never produces these: `validate` always returns a plain
/// `bool` and logs its diagnostics. Registration mistakes (duplicate keys,
/// missing constructors) are programming errors and panic at registry
/// build time instead.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    /// Node stored with a kind the target type does not accept.
    KindMismatch {
        expected: StorageKind,
        found: StorageKind,
    },
    /// Numeric node that does not fit the target primitive.
    NumberOutOfRange { target: &'static str, value: String },
    /// Enum discriminant with no matching variant.
    UnknownEnumValue { type_name: &'static str, value: i64 },
    /// Object node missing a required key.
    MissingKey { type_name: &'static str, key: String },
    /// Node rejected by the type's validator; deserialization refused.
    Validation { type_name: &'static str },
    /// Polymorphic node without the reserved `"__typename"` key.
    MissingTypeTag { base: &'static str },
    /// Polymorphic node whose `"__typename"` value is not a string.
    TagNotString { base: &'static str },
    /// Type tag (or runtime type) with no registered child entry.
    UnregisteredTag { base: &'static str, tag: String },
    /// Registered entry found but the instance is not of that type.
    ///
    /// Indicates a `type_name` that disagrees with the resolver at
    /// registration time, a misconfiguration rather than bad data.
    DowncastMismatch { base: &'static str, tag: String },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::KindMismatch { expected, found } => {
                write!(f, "Storage kind mismatch: expected {}, found {}", expected, found)
            }
            Self::NumberOutOfRange { target, value } => {
                write!(f, "Number out of range for {}: {}", target, value)
            }
            Self::UnknownEnumValue { type_name, value } => {
                write!(f, "No variant of {} has value {}", type_name, value)
            }
            Self::MissingKey { type_name, key } => {
                write!(f, "Missing key in serialized {}: {}", type_name, key)
            }
            Self::Validation { type_name } => {
                write!(f, "Node failed validation for type {}", type_name)
            }
            Self::MissingTypeTag { base } => {
                write!(f, "Missing \"__typename\" in polymorphic node for base {}", base)
            }
            Self::TagNotString { base } => {
                write!(f, "Non-string \"__typename\" in polymorphic node for base {}", base)
            }
            Self::UnregisteredTag { base, tag } => {
                write!(f, "No child type registered under base {} for tag {}", base, tag)
            }
            Self::DowncastMismatch { base, tag } => {
                write!(f, "Instance of base {} is not the registered type {}", base, tag)
            }
        }
    }
}

impl std::error::Error for CodecError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_carries_context() {
        let err = CodecError::KindMismatch {
            expected: StorageKind::Float,
            found: StorageKind::String,
        };
        assert_eq!(err.to_string(), "Storage kind mismatch: expected float, found string");

        let err = CodecError::UnregisteredTag {
            base: "Creature",
            tag: "Basilisk".to_owned(),
        };
        assert!(err.to_string().contains("Creature"));
        assert!(err.to_string().contains("Basilisk"));
    }
}
