// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 treecodec developers

//! Polymorphic serialization over trait objects.
//!
//! A value held as `&dyn Base` serializes as its concrete type's object
//! node plus a reserved [`TYPENAME_KEY`] entry naming that type.
//! Deserialization reads the tag, looks the name up in the base's child
//! registry, and rebuilds the concrete value behind a fresh `Box<dyn
//! Base>`. Wiring a hierarchy up takes three steps:
//!
//! 1. Each child implements [`Reflect`] and derives its identity with
//!    [`type_tag!`].
//! 2. The base trait requires `TypeTag` and calls [`polymorphic_base!`].
//! 3. Each child is announced once with [`register`].
//!
//! [`Poly`] then carries an owned `Box<dyn Base>` through the generic
//! [`TreeCodec`] dispatch, so trait objects nest inside registered types
//! and containers like any other field.

use crate::codec::TreeCodec;
use crate::error::CodecError;
use crate::kind::StorageKind;
use crate::registry::Reflect;
use crate::type_name;
use parking_lot::RwLock;
use serde_json::Value;
use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::OnceLock;

/// Reserved object key carrying the concrete type's name. No registered
/// field may use it.
pub const TYPENAME_KEY: &str = "__typename";

/// Runtime identity for concrete types that participate in a hierarchy.
/// Implement with [`type_tag!`]; the reported name must match the name
/// the child registry is keyed under, which both sides derive from
/// [`type_name::short`].
pub trait TypeTag {
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

/// Implement [`TypeTag`] for a concrete type.
#[macro_export]
macro_rules! type_tag {
    ($ty:ty) => {
        impl $crate::TypeTag for $ty {
            fn type_name(&self) -> &'static str {
                $crate::type_name::short::<$ty>()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }
        }
    };
}

/// What the polymorphic machinery needs from a base trait object.
/// Implemented for `dyn Base` by [`polymorphic_base!`]; never implement
/// it by hand.
pub trait PolymorphicBase: 'static {
    fn poly_type_name(&self) -> &'static str;
    fn poly_as_any(&self) -> &dyn Any;
}

/// Make a base trait usable with the polymorphic operations. The trait
/// must have [`TypeTag`] as a supertrait:
///
/// ```ignore
/// trait Shape: treecodec::TypeTag {
///     fn area(&self) -> f64;
/// }
/// treecodec::polymorphic_base!(Shape);
/// ```
#[macro_export]
macro_rules! polymorphic_base {
    ($base:path) => {
        impl $crate::PolymorphicBase for dyn $base {
            fn poly_type_name(&self) -> &'static str {
                $crate::TypeTag::type_name(self)
            }

            fn poly_as_any(&self) -> &dyn ::std::any::Any {
                $crate::TypeTag::as_any(self)
            }
        }
    };
}

type ChildSerializer<B> = Box<dyn Fn(&B) -> Result<Value, CodecError> + Send + Sync>;
type ChildValidator = Box<dyn Fn(&Value) -> bool + Send + Sync>;
type ChildDeserializer<B> = Box<dyn Fn(&Value) -> Result<Box<B>, CodecError> + Send + Sync>;

struct ChildEntry<B: ?Sized> {
    serializer: ChildSerializer<B>,
    validator: ChildValidator,
    deserializer: ChildDeserializer<B>,
}

/// Child registry for one base trait: concrete type name to codec
/// closures. Iteration order is name order, which only shows up in logs.
pub struct PolymorphicCodec<B: PolymorphicBase + ?Sized> {
    base_name: &'static str,
    children: BTreeMap<&'static str, ChildEntry<B>>,
}

impl<B: PolymorphicBase + ?Sized> PolymorphicCodec<B> {
    fn new() -> Self {
        Self {
            base_name: type_name::short::<B>(),
            children: BTreeMap::new(),
        }
    }

    /// Register a concrete child. `upcast` boxes the child into the base
    /// trait object; at every use site it is the plain coercion
    /// `|child| child`. Re-registering a name replaces the previous
    /// entry, so repeated wiring in tests is harmless.
    pub fn register<C>(&mut self, upcast: fn(Box<C>) -> Box<B>)
    where
        C: Reflect + TreeCodec + TypeTag,
    {
        let name = type_name::short::<C>();
        let base_name = self.base_name;
        self.children.insert(
            name,
            ChildEntry {
                serializer: Box::new(move |instance| {
                    let concrete = instance.poly_as_any().downcast_ref::<C>().ok_or_else(|| {
                        CodecError::DowncastMismatch {
                            base: base_name,
                            tag: name.to_owned(),
                        }
                    })?;
                    let mut node = concrete.serialize()?;
                    match node.as_object_mut() {
                        Some(object) => {
                            object.insert(TYPENAME_KEY.to_owned(), Value::String(name.to_owned()));
                        }
                        None => {
                            return Err(CodecError::KindMismatch {
                                expected: StorageKind::Object,
                                found: StorageKind::of(&node),
                            })
                        }
                    }
                    Ok(node)
                }),
                validator: Box::new(|node| C::validate(&strip_tag(node))),
                deserializer: Box::new(move |node| {
                    let child = C::deserialize(&strip_tag(node))?;
                    Ok(upcast(Box::new(child)))
                }),
            },
        );
    }

    /// Serialize through the instance's reported type name.
    pub fn serialize(&self, instance: &B) -> Result<Value, CodecError> {
        let tag = instance.poly_type_name();
        let entry = self
            .children
            .get(tag)
            .ok_or_else(|| CodecError::UnregisteredTag {
                base: self.base_name,
                tag: tag.to_owned(),
            })?;
        (entry.serializer)(instance)
    }

    /// Check the tag protocol, then the named child's own validation
    /// against the node with the tag removed.
    pub fn validate(&self, node: &Value) -> bool {
        if self.children.is_empty() {
            log::warn!("No children registered for base {}", self.base_name);
        }
        let object = match node.as_object() {
            Some(object) => object,
            None => {
                log::warn!(
                    "Expected an object node for base {}, got {}",
                    self.base_name,
                    StorageKind::of(node)
                );
                return false;
            }
        };
        let tag = match object.get(TYPENAME_KEY) {
            Some(Value::String(tag)) => tag,
            Some(other) => {
                log::warn!(
                    "Type tag for base {} is not a string: {}",
                    self.base_name,
                    other
                );
                return false;
            }
            None => {
                log::warn!(
                    "Missing {} tag in object for base {}",
                    TYPENAME_KEY,
                    self.base_name
                );
                return false;
            }
        };
        match self.children.get(tag.as_str()) {
            Some(entry) => (entry.validator)(node),
            None => {
                log::warn!(
                    "Unknown child type {} for base {}",
                    tag,
                    self.base_name
                );
                false
            }
        }
    }

    /// Rebuild the concrete child named by the tag behind a fresh box.
    pub fn deserialize(&self, node: &Value) -> Result<Box<B>, CodecError> {
        let object = node
            .as_object()
            .ok_or(CodecError::KindMismatch {
                expected: StorageKind::Object,
                found: StorageKind::of(node),
            })?;
        let tag = match object.get(TYPENAME_KEY) {
            Some(Value::String(tag)) => tag,
            Some(_) => {
                return Err(CodecError::TagNotString {
                    base: self.base_name,
                })
            }
            None => {
                return Err(CodecError::MissingTypeTag {
                    base: self.base_name,
                })
            }
        };
        let entry = self
            .children
            .get(tag.as_str())
            .ok_or_else(|| CodecError::UnregisteredTag {
                base: self.base_name,
                tag: tag.clone(),
            })?;
        (entry.deserializer)(node)
    }
}

/// The node as the child sees it: everything except the tag entry.
fn strip_tag(node: &Value) -> Value {
    match node.as_object() {
        Some(object) => {
            let mut child = object.clone();
            child.remove(TYPENAME_KEY);
            Value::Object(child)
        }
        None => node.clone(),
    }
}

static BASES: OnceLock<RwLock<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>> =
    OnceLock::new();

fn base_registry<B: PolymorphicBase + ?Sized>() -> &'static RwLock<PolymorphicCodec<B>> {
    let bases = BASES.get_or_init(|| RwLock::new(HashMap::new()));
    let id = TypeId::of::<PolymorphicCodec<B>>();
    if let Some(entry) = bases.read().get(&id) {
        return downcast_base(*entry);
    }
    let mut guard = bases.write();
    let entry: &'static (dyn Any + Send + Sync) = *guard
        .entry(id)
        .or_insert_with(|| Box::leak(Box::new(RwLock::new(PolymorphicCodec::<B>::new()))));
    drop(guard);
    downcast_base(entry)
}

fn downcast_base<B: PolymorphicBase + ?Sized>(
    entry: &'static (dyn Any + Send + Sync),
) -> &'static RwLock<PolymorphicCodec<B>> {
    entry
        .downcast_ref::<RwLock<PolymorphicCodec<B>>>()
        .expect("base registry entry stored under the wrong TypeId")
}

/// Announce a concrete child of base `B` to the process-wide registry.
/// Call once per child before the first polymorphic operation, typically
/// at startup:
///
/// ```ignore
/// treecodec::poly::register::<dyn Shape, Circle>(|child| child);
/// ```
pub fn register<B, C>(upcast: fn(Box<C>) -> Box<B>)
where
    B: PolymorphicBase + ?Sized,
    C: Reflect + TreeCodec + TypeTag,
{
    base_registry::<B>().write().register(upcast);
}

/// Serialize a trait object via the registry for its base.
pub fn serialize<B: PolymorphicBase + ?Sized>(instance: &B) -> Result<Value, CodecError> {
    base_registry::<B>().read().serialize(instance)
}

/// Validate a tagged node against the registry for base `B`.
pub fn validate<B: PolymorphicBase + ?Sized>(node: &Value) -> bool {
    base_registry::<B>().read().validate(node)
}

/// Deserialize a tagged node into a fresh `Box<B>`.
pub fn deserialize<B: PolymorphicBase + ?Sized>(node: &Value) -> Result<Box<B>, CodecError> {
    base_registry::<B>().read().deserialize(node)
}

/// Owned trait object with a [`TreeCodec`] passthrough, so polymorphic
/// values sit inside registered types and containers. Dereferences to
/// the base trait.
pub struct Poly<B: ?Sized>(Box<B>);

impl<B: ?Sized> Poly<B> {
    pub fn new(inner: Box<B>) -> Self {
        Self(inner)
    }

    pub fn into_inner(self) -> Box<B> {
        self.0
    }
}

impl<B: ?Sized> From<Box<B>> for Poly<B> {
    fn from(inner: Box<B>) -> Self {
        Self(inner)
    }
}

impl<B: ?Sized> Deref for Poly<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.0
    }
}

impl<B: ?Sized> DerefMut for Poly<B> {
    fn deref_mut(&mut self) -> &mut B {
        &mut self.0
    }
}

impl<B: PolymorphicBase + ?Sized> fmt::Debug for Poly<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Poly").field(&self.0.poly_type_name()).finish()
    }
}

impl<B: PolymorphicBase + ?Sized> TreeCodec for Poly<B> {
    fn storage_kind() -> StorageKind {
        StorageKind::Object
    }

    fn serialize(&self) -> Result<Value, CodecError> {
        serialize::<B>(&self.0)
    }

    fn validate(node: &Value) -> bool {
        validate::<B>(node)
    }

    fn deserialize(node: &Value) -> Result<Self, CodecError> {
        deserialize::<B>(node).map(Poly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::TypeCodecBuilder;
    use serde_json::json;

    trait Reading: TypeTag {
        fn magnitude(&self) -> f64;
    }

    crate::polymorphic_base!(Reading);

    #[derive(Debug, Default, PartialEq)]
    struct Pulse {
        ticks: i64,
    }

    impl Reading for Pulse {
        fn magnitude(&self) -> f64 {
            self.ticks as f64
        }
    }

    impl Reflect for Pulse {
        fn configure(builder: &mut TypeCodecBuilder<Self>) {
            builder.default_construction();
            builder.register_field("Ticks", |p: &Self| &p.ticks, |p, v| p.ticks = v);
        }
    }

    crate::tree_codec!(Pulse);
    crate::type_tag!(Pulse);

    #[derive(Debug, Default, PartialEq)]
    struct Level {
        value: f64,
    }

    impl Reading for Level {
        fn magnitude(&self) -> f64 {
            self.value
        }
    }

    impl Reflect for Level {
        fn configure(builder: &mut TypeCodecBuilder<Self>) {
            builder.default_construction();
            builder.register_field("Value", |l: &Self| &l.value, |l, v| l.value = v);
        }
    }

    crate::tree_codec!(Level);
    crate::type_tag!(Level);

    fn wire_readings() {
        register::<dyn Reading, Pulse>(|child| child);
        register::<dyn Reading, Level>(|child| child);
    }

    #[test]
    fn test_serialize_injects_type_tag() {
        wire_readings();
        let pulse: Box<dyn Reading> = Box::new(Pulse { ticks: 9 });
        let node = serialize::<dyn Reading>(&*pulse).expect("serialize");
        assert_eq!(node, json!({"Ticks": 9, TYPENAME_KEY: "Pulse"}));
    }

    #[test]
    fn test_deserialize_picks_concrete_type() {
        wire_readings();
        let node = json!({"Value": 2.5, TYPENAME_KEY: "Level"});
        assert!(validate::<dyn Reading>(&node));
        let rebuilt = deserialize::<dyn Reading>(&node).expect("deserialize");
        assert_eq!(rebuilt.poly_type_name(), "Level");
        assert_eq!(rebuilt.magnitude(), 2.5);
    }

    #[test]
    fn test_tag_protocol_errors() {
        wire_readings();
        assert_eq!(
            deserialize::<dyn Reading>(&json!({"Ticks": 1})).err(),
            Some(CodecError::MissingTypeTag {
                base: "dyn Reading"
            })
        );
        assert_eq!(
            deserialize::<dyn Reading>(&json!({"Ticks": 1, TYPENAME_KEY: 7})).err(),
            Some(CodecError::TagNotString {
                base: "dyn Reading"
            })
        );
        assert_eq!(
            deserialize::<dyn Reading>(&json!({"Ticks": 1, TYPENAME_KEY: "Ghost"})).err(),
            Some(CodecError::UnregisteredTag {
                base: "dyn Reading",
                tag: "Ghost".to_owned()
            })
        );
    }

    #[test]
    fn test_validate_rejects_tampered_payload() {
        wire_readings();
        assert!(!validate::<dyn Reading>(&json!({
            "Ticks": "nine",
            TYPENAME_KEY: "Pulse"
        })));
        assert!(!validate::<dyn Reading>(&json!([1, 2])));
    }

    #[test]
    fn test_poly_wrapper_round_trip() {
        wire_readings();
        let level = Poly::<dyn Reading>::new(Box::new(Level { value: -0.25 }));
        let node = level.serialize().expect("serialize");
        assert!(Poly::<dyn Reading>::validate(&node));
        let rebuilt = Poly::<dyn Reading>::deserialize(&node).expect("deserialize");
        assert_eq!(rebuilt.magnitude(), -0.25);
    }
}
