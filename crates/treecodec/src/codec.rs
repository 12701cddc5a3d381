// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 treecodec developers

//! The dispatch layer: one trait, one impl per serialization strategy.
//!
//! [`TreeCodec`] is what a value must implement to cross the value-tree
//! boundary. Primitives, enums (via [`enum_codec!`](crate::enum_codec)),
//! pairs, sequence and map containers, and owned-reference wrappers are
//! covered here; registration-based types get their impl from
//! [`tree_codec!`](crate::tree_codec) and polymorphic bases from
//! [`Poly`](crate::poly::Poly). A type with no impl cannot be serialized,
//! and the compiler says so.

use crate::error::CodecError;
use crate::kind::{self, StorageKind};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

/// Fixed keys for the pair encoding. Maps serialize as arrays of these
/// two-key objects, never as objects keyed by the map key itself, so that
/// non-string and non-ordered key types work unchanged.
pub const PAIR_FIRST: &str = "1";
pub const PAIR_SECOND: &str = "2";

/// Conversion to and from a value-tree node.
///
/// `deserialize` is only contractually safe on nodes that `validate`
/// accepts; on anything else it returns a typed error rather than
/// producing a half-built value.
pub trait TreeCodec: Sized {
    /// The storage kind a correctly serialized value of this type has.
    fn storage_kind() -> StorageKind;

    /// Produce a value-tree node for this value.
    fn serialize(&self) -> Result<Value, CodecError>;

    /// Check a node without constructing anything. Never panics, never
    /// allocates an instance; returns `false` on the first problem found.
    fn validate(node: &Value) -> bool;

    /// Rebuild a value from a node.
    fn deserialize(node: &Value) -> Result<Self, CodecError>;
}

// ---------------------------------------------------------------------------
// Primitives
// ---------------------------------------------------------------------------

impl TreeCodec for bool {
    fn storage_kind() -> StorageKind {
        StorageKind::Boolean
    }

    fn serialize(&self) -> Result<Value, CodecError> {
        Ok(Value::Bool(*self))
    }

    fn validate(node: &Value) -> bool {
        Self::storage_kind().accepts(StorageKind::of(node))
    }

    fn deserialize(node: &Value) -> Result<Self, CodecError> {
        node.as_bool().ok_or(CodecError::KindMismatch {
            expected: StorageKind::Boolean,
            found: StorageKind::of(node),
        })
    }
}

impl TreeCodec for String {
    fn storage_kind() -> StorageKind {
        StorageKind::String
    }

    fn serialize(&self) -> Result<Value, CodecError> {
        Ok(Value::String(self.clone()))
    }

    fn validate(node: &Value) -> bool {
        Self::storage_kind().accepts(StorageKind::of(node))
    }

    fn deserialize(node: &Value) -> Result<Self, CodecError> {
        node.as_str().map(str::to_owned).ok_or(CodecError::KindMismatch {
            expected: StorageKind::String,
            found: StorageKind::of(node),
        })
    }
}

macro_rules! impl_unsigned_codec {
    ($($ty:ty),+) => {
        $(
            impl TreeCodec for $ty {
                fn storage_kind() -> StorageKind {
                    StorageKind::UnsignedInteger
                }

                fn serialize(&self) -> Result<Value, CodecError> {
                    Ok(Value::from(*self))
                }

                fn validate(node: &Value) -> bool {
                    Self::storage_kind().accepts(StorageKind::of(node))
                }

                fn deserialize(node: &Value) -> Result<Self, CodecError> {
                    let raw = node.as_u64().ok_or(CodecError::KindMismatch {
                        expected: StorageKind::UnsignedInteger,
                        found: StorageKind::of(node),
                    })?;
                    <$ty>::try_from(raw).map_err(|_| CodecError::NumberOutOfRange {
                        target: stringify!($ty),
                        value: raw.to_string(),
                    })
                }
            }
        )+
    };
}

macro_rules! impl_signed_codec {
    ($($ty:ty),+) => {
        $(
            impl TreeCodec for $ty {
                fn storage_kind() -> StorageKind {
                    StorageKind::SignedInteger
                }

                fn serialize(&self) -> Result<Value, CodecError> {
                    Ok(Value::from(*self))
                }

                fn validate(node: &Value) -> bool {
                    Self::storage_kind().accepts(StorageKind::of(node))
                }

                fn deserialize(node: &Value) -> Result<Self, CodecError> {
                    if let Some(raw) = node.as_i64() {
                        return <$ty>::try_from(raw).map_err(|_| CodecError::NumberOutOfRange {
                            target: stringify!($ty),
                            value: raw.to_string(),
                        });
                    }
                    // A u64 above i64::MAX still satisfies the widening
                    // rule, but no signed primitive can hold it.
                    if let Some(raw) = node.as_u64() {
                        return Err(CodecError::NumberOutOfRange {
                            target: stringify!($ty),
                            value: raw.to_string(),
                        });
                    }
                    Err(CodecError::KindMismatch {
                        expected: StorageKind::SignedInteger,
                        found: StorageKind::of(node),
                    })
                }
            }
        )+
    };
}

macro_rules! impl_float_codec {
    ($($ty:ty),+) => {
        $(
            impl TreeCodec for $ty {
                fn storage_kind() -> StorageKind {
                    StorageKind::Float
                }

                fn serialize(&self) -> Result<Value, CodecError> {
                    // The tree has no representation for non-finite
                    // numbers; Value::from would store them as null.
                    if !self.is_finite() {
                        return Err(CodecError::NumberOutOfRange {
                            target: stringify!($ty),
                            value: self.to_string(),
                        });
                    }
                    Ok(Value::from(*self))
                }

                fn validate(node: &Value) -> bool {
                    Self::storage_kind().accepts(StorageKind::of(node))
                }

                fn deserialize(node: &Value) -> Result<Self, CodecError> {
                    // Integer-stored nodes widen losslessly into floats.
                    node.as_f64().map(|raw| raw as $ty).ok_or(CodecError::KindMismatch {
                        expected: StorageKind::Float,
                        found: StorageKind::of(node),
                    })
                }
            }
        )+
    };
}

impl_unsigned_codec!(u8, u16, u32, u64, usize);
impl_signed_codec!(i8, i16, i32, i64, isize);
impl_float_codec!(f32, f64);

// ---------------------------------------------------------------------------
// Enumerations
// ---------------------------------------------------------------------------

/// Implement [`TreeCodec`] for a unit-variant enum, serialized as its
/// underlying numeric representation.
///
/// The enum must be `Copy` and carry an explicit `#[repr]`-compatible
/// discriminant per variant. Validation checks the storage kind only, so
/// any number of the right kind validates; deserialization of a value
/// with no matching variant is a typed error.
///
/// ```
/// use treecodec::{enum_codec, TreeCodec};
///
/// #[derive(Debug, Clone, Copy, PartialEq)]
/// enum Phase {
///     Solid = 0,
///     Liquid = 1,
///     Gas = 2,
/// }
///
/// enum_codec!(Phase as u32 { Solid, Liquid, Gas });
///
/// let node = Phase::Liquid.serialize()?;
/// assert_eq!(Phase::deserialize(&node)?, Phase::Liquid);
/// # Ok::<(), treecodec::CodecError>(())
/// ```
#[macro_export]
macro_rules! enum_codec {
    ($ty:ty as $repr:ty { $($variant:ident),+ $(,)? }) => {
        impl $crate::TreeCodec for $ty {
            fn storage_kind() -> $crate::StorageKind {
                <$repr as $crate::TreeCodec>::storage_kind()
            }

            fn serialize(&self) -> Result<$crate::Value, $crate::CodecError> {
                <$repr as $crate::TreeCodec>::serialize(&(*self as $repr))
            }

            fn validate(node: &$crate::Value) -> bool {
                <$repr as $crate::TreeCodec>::validate(node)
            }

            fn deserialize(node: &$crate::Value) -> Result<Self, $crate::CodecError> {
                let raw = <$repr as $crate::TreeCodec>::deserialize(node)?;
                $(
                    if raw == <$ty>::$variant as $repr {
                        return Ok(<$ty>::$variant);
                    }
                )+
                Err($crate::CodecError::UnknownEnumValue {
                    type_name: $crate::type_name::short::<$ty>(),
                    value: raw as i64,
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Pair encoding, shared with the map containers
// ---------------------------------------------------------------------------

pub(crate) fn serialize_entry<A, B>(first: &A, second: &B) -> Result<Value, CodecError>
where
    A: TreeCodec,
    B: TreeCodec,
{
    let mut object = Map::new();
    object.insert(PAIR_FIRST.to_owned(), first.serialize()?);
    object.insert(PAIR_SECOND.to_owned(), second.serialize()?);
    Ok(Value::Object(object))
}

pub(crate) fn validate_entry<A, B>(node: &Value) -> bool
where
    A: TreeCodec,
    B: TreeCodec,
{
    kind::validate_object(
        node,
        &[
            (PAIR_FIRST, A::storage_kind()),
            (PAIR_SECOND, B::storage_kind()),
        ],
    ) && node.get(PAIR_FIRST).map_or(false, A::validate)
        && node.get(PAIR_SECOND).map_or(false, B::validate)
}

pub(crate) fn deserialize_entry<A, B>(node: &Value) -> Result<(A, B), CodecError>
where
    A: TreeCodec,
    B: TreeCodec,
{
    let object = node.as_object().ok_or(CodecError::KindMismatch {
        expected: StorageKind::Object,
        found: StorageKind::of(node),
    })?;
    let first = object.get(PAIR_FIRST).ok_or_else(|| CodecError::MissingKey {
        type_name: "pair",
        key: PAIR_FIRST.to_owned(),
    })?;
    let second = object.get(PAIR_SECOND).ok_or_else(|| CodecError::MissingKey {
        type_name: "pair",
        key: PAIR_SECOND.to_owned(),
    })?;
    Ok((A::deserialize(first)?, B::deserialize(second)?))
}

impl<A: TreeCodec, B: TreeCodec> TreeCodec for (A, B) {
    fn storage_kind() -> StorageKind {
        StorageKind::Object
    }

    fn serialize(&self) -> Result<Value, CodecError> {
        serialize_entry(&self.0, &self.1)
    }

    fn validate(node: &Value) -> bool {
        validate_entry::<A, B>(node)
    }

    fn deserialize(node: &Value) -> Result<Self, CodecError> {
        deserialize_entry(node)
    }
}

// ---------------------------------------------------------------------------
// Sequence containers
// ---------------------------------------------------------------------------

fn serialize_items<'a, T, I>(items: I) -> Result<Value, CodecError>
where
    T: TreeCodec + 'a,
    I: Iterator<Item = &'a T>,
{
    let serialized: Result<Vec<Value>, CodecError> = items.map(TreeCodec::serialize).collect();
    Ok(Value::Array(serialized?))
}

fn validate_items<T: TreeCodec>(node: &Value) -> bool {
    match node.as_array() {
        Some(items) => items
            .iter()
            .all(|item| T::storage_kind().accepts(StorageKind::of(item)) && T::validate(item)),
        None => false,
    }
}

fn array_of(node: &Value) -> Result<&[Value], CodecError> {
    node.as_array().map(Vec::as_slice).ok_or(CodecError::KindMismatch {
        expected: StorageKind::Array,
        found: StorageKind::of(node),
    })
}

impl<T: TreeCodec> TreeCodec for Vec<T> {
    fn storage_kind() -> StorageKind {
        StorageKind::Array
    }

    fn serialize(&self) -> Result<Value, CodecError> {
        serialize_items(self.iter())
    }

    fn validate(node: &Value) -> bool {
        validate_items::<T>(node)
    }

    fn deserialize(node: &Value) -> Result<Self, CodecError> {
        array_of(node)?.iter().map(T::deserialize).collect()
    }
}

impl<T: TreeCodec + Ord> TreeCodec for BTreeSet<T> {
    fn storage_kind() -> StorageKind {
        StorageKind::Array
    }

    fn serialize(&self) -> Result<Value, CodecError> {
        serialize_items(self.iter())
    }

    fn validate(node: &Value) -> bool {
        validate_items::<T>(node)
    }

    fn deserialize(node: &Value) -> Result<Self, CodecError> {
        array_of(node)?.iter().map(T::deserialize).collect()
    }
}

impl<T: TreeCodec + Eq + Hash> TreeCodec for HashSet<T> {
    fn storage_kind() -> StorageKind {
        StorageKind::Array
    }

    fn serialize(&self) -> Result<Value, CodecError> {
        serialize_items(self.iter())
    }

    fn validate(node: &Value) -> bool {
        validate_items::<T>(node)
    }

    fn deserialize(node: &Value) -> Result<Self, CodecError> {
        array_of(node)?.iter().map(T::deserialize).collect()
    }
}

// ---------------------------------------------------------------------------
// Key-value containers
// ---------------------------------------------------------------------------

fn serialize_map<'a, K, V, I>(entries: I) -> Result<Value, CodecError>
where
    K: TreeCodec + 'a,
    V: TreeCodec + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    let serialized: Result<Vec<Value>, CodecError> =
        entries.map(|(key, value)| serialize_entry(key, value)).collect();
    Ok(Value::Array(serialized?))
}

fn validate_map<K: TreeCodec, V: TreeCodec>(node: &Value) -> bool {
    match node.as_array() {
        Some(items) => items.iter().all(validate_entry::<K, V>),
        None => false,
    }
}

impl<K: TreeCodec + Ord, V: TreeCodec> TreeCodec for BTreeMap<K, V> {
    fn storage_kind() -> StorageKind {
        StorageKind::Array
    }

    fn serialize(&self) -> Result<Value, CodecError> {
        serialize_map(self.iter())
    }

    fn validate(node: &Value) -> bool {
        validate_map::<K, V>(node)
    }

    fn deserialize(node: &Value) -> Result<Self, CodecError> {
        array_of(node)?.iter().map(deserialize_entry).collect()
    }
}

impl<K: TreeCodec + Eq + Hash, V: TreeCodec> TreeCodec for HashMap<K, V> {
    fn storage_kind() -> StorageKind {
        StorageKind::Array
    }

    fn serialize(&self) -> Result<Value, CodecError> {
        serialize_map(self.iter())
    }

    fn validate(node: &Value) -> bool {
        validate_map::<K, V>(node)
    }

    fn deserialize(node: &Value) -> Result<Self, CodecError> {
        array_of(node)?.iter().map(deserialize_entry).collect()
    }
}

// ---------------------------------------------------------------------------
// Owned-reference wrappers
// ---------------------------------------------------------------------------

macro_rules! impl_wrapper_codec {
    ($($wrapper:ident),+) => {
        $(
            impl<T: TreeCodec> TreeCodec for $wrapper<T> {
                fn storage_kind() -> StorageKind {
                    T::storage_kind()
                }

                fn serialize(&self) -> Result<Value, CodecError> {
                    (**self).serialize()
                }

                fn validate(node: &Value) -> bool {
                    T::validate(node)
                }

                /// Always allocates fresh; never aliases an existing value.
                fn deserialize(node: &Value) -> Result<Self, CodecError> {
                    Ok($wrapper::new(T::deserialize(node)?))
                }
            }
        )+
    };
}

impl_wrapper_codec!(Box, Rc, Arc);
