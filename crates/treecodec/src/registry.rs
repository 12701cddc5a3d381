// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 treecodec developers

//! Per-type codec registries.
//!
//! A type opts in by implementing [`Reflect`]: a single `configure`
//! function that names its fields once. From that one declaration the
//! registry derives serialization, validation, and deserialization,
//! including for types with private fields (the type hands out accessors
//! from inside `configure`, where its privates are in scope) and types
//! that cannot be default-constructed (they register a construction
//! recipe instead).
//!
//! Registries are built lazily on first use and memoized for the rest of
//! the process; a concurrent first touch builds at most one extra table
//! and discards it, so every caller observes the same `&'static` result.

use crate::codec::TreeCodec;
use crate::error::CodecError;
use crate::kind::StorageKind;
use crate::type_name;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::OnceLock;

/// Self-registration entry point.
///
/// `configure` must register every serialized field exactly once, and
/// either a construction recipe or (for `Default` types) a call to
/// [`TypeCodecBuilder::default_construction`]. Mistakes here are
/// programming errors and panic when the registry is first built.
pub trait Reflect: Sized + 'static {
    fn configure(builder: &mut TypeCodecBuilder<Self>);
}

type Writer<T> = Box<dyn Fn(&T, &mut Map<String, Value>) -> Result<(), CodecError> + Send + Sync>;
type Validator = Box<dyn Fn(&Value) -> bool + Send + Sync>;
type Parser<T> = Box<dyn Fn(&Value, &mut T) -> Result<(), CodecError> + Send + Sync>;
type Recipe<T> = Box<dyn Fn(&Map<String, Value>) -> Result<T, CodecError> + Send + Sync>;

/// One registered field: key, expected kind, and the writer / validator /
/// parser triple. Construction-only parameters carry no parser; their
/// value is consumed by the recipe instead.
struct Field<T> {
    key: String,
    kind: StorageKind,
    writer: Writer<T>,
    validator: Validator,
    parser: Option<Parser<T>>,
}

/// Typed handle for one construction parameter, returned by
/// [`TypeCodecBuilder::constructor_param`] and consumed inside the
/// registered recipe.
pub struct Param<V> {
    key: String,
    owner: &'static str,
    _value: PhantomData<fn() -> V>,
}

impl<V: TreeCodec> Param<V> {
    /// Pull this parameter's value out of a serialized object.
    pub fn extract(&self, object: &Map<String, Value>) -> Result<V, CodecError> {
        let node = object.get(&self.key).ok_or_else(|| CodecError::MissingKey {
            type_name: self.owner,
            key: self.key.clone(),
        })?;
        V::deserialize(node)
    }
}

/// Mutable view of a registry under construction, passed to
/// [`Reflect::configure`].
pub struct TypeCodecBuilder<T> {
    type_name: &'static str,
    fields: Vec<Field<T>>,
    recipe: Option<Recipe<T>>,
}

impl<T: Reflect> TypeCodecBuilder<T> {
    fn new() -> Self {
        Self {
            type_name: type_name::short::<T>(),
            fields: Vec::new(),
            recipe: None,
        }
    }

    /// Register an ordinary field.
    ///
    /// `get` extracts the field for serialization; `set` writes a
    /// deserialized value back into an existing instance, which is why the
    /// field's type must be assignable. Keys must be unique within the
    /// type; registration order is serialization order.
    pub fn register_field<V: TreeCodec + 'static>(
        &mut self,
        key: &str,
        get: fn(&T) -> &V,
        set: fn(&mut T, V),
    ) {
        let owned_key = key.to_owned();
        self.add_field(Field {
            key: owned_key.clone(),
            kind: V::storage_kind(),
            writer: Box::new(move |source, target| {
                target.insert(owned_key.clone(), get(source).serialize()?);
                Ok(())
            }),
            validator: Box::new(V::validate),
            parser: Some(Box::new(move |node, target| {
                set(target, V::deserialize(node)?);
                Ok(())
            })),
        });
    }

    /// Register a construction-only parameter.
    ///
    /// The parameter serializes and validates exactly like an ordinary
    /// field, but is consumed by the construction recipe rather than
    /// assigned afterwards, so it may back a field that is never mutable.
    /// `get` may read a private field or call a getter.
    #[must_use]
    pub fn constructor_param<V: TreeCodec + 'static>(
        &mut self,
        key: &str,
        get: fn(&T) -> V,
    ) -> Param<V> {
        let owned_key = key.to_owned();
        self.add_field(Field {
            key: owned_key.clone(),
            kind: V::storage_kind(),
            writer: Box::new(move |source, target| {
                target.insert(owned_key.clone(), get(source).serialize()?);
                Ok(())
            }),
            validator: Box::new(V::validate),
            parser: None,
        });
        Param {
            key: key.to_owned(),
            owner: self.type_name,
            _value: PhantomData,
        }
    }

    /// Register the construction recipe for a non-default-constructible
    /// type. The recipe extracts each [`Param`] by key and invokes the
    /// type's constructor positionally:
    ///
    /// ```ignore
    /// let id = builder.constructor_param("Id", |p: &Probe| p.id());
    /// builder.register_constructor(move |object| Ok(Probe::new(id.extract(object)?)));
    /// ```
    pub fn register_constructor<F>(&mut self, recipe: F)
    where
        F: Fn(&Map<String, Value>) -> Result<T, CodecError> + Send + Sync + 'static,
    {
        if self.recipe.is_some() {
            panic!(
                "Cannot register multiple constructors for type {}",
                self.type_name
            );
        }
        self.recipe = Some(Box::new(recipe));
    }

    fn add_field(&mut self, field: Field<T>) {
        if self.fields.iter().any(|existing| existing.key == field.key) {
            panic!(
                "Duplicate key registered for type {}, key: {}",
                self.type_name, field.key
            );
        }
        self.fields.push(field);
    }
}

impl<T: Reflect + Default> TypeCodecBuilder<T> {
    /// Use `T::default()` as the construction seed. The explicit spelling
    /// of "this type needs no recipe"; types that are not `Default` cannot
    /// call it and must register a constructor.
    pub fn default_construction(&mut self) {
        if self.recipe.is_some() {
            panic!(
                "Cannot register multiple constructors for type {}",
                self.type_name
            );
        }
        self.recipe = Some(Box::new(|_| Ok(T::default())));
    }
}

/// The built, immutable registry for one type: its field descriptors in
/// registration order plus the construction recipe.
pub struct TypeCodec<T> {
    type_name: &'static str,
    fields: Vec<Field<T>>,
    recipe: Recipe<T>,
}

static REGISTRIES: OnceLock<RwLock<HashMap<TypeId, &'static (dyn Any + Send + Sync)>>> =
    OnceLock::new();

impl<T: Reflect> TypeCodec<T> {
    /// The memoized registry for `T`, built on first use by running
    /// `T::configure` exactly once (a lost race builds a duplicate table
    /// and throws it away unpublished).
    pub fn get() -> &'static TypeCodec<T> {
        let registries = REGISTRIES.get_or_init(|| RwLock::new(HashMap::new()));
        let id = TypeId::of::<T>();
        if let Some(entry) = registries.read().get(&id) {
            return Self::downcast(*entry);
        }
        // Build outside the lock: configure may touch other registries.
        let built = Self::build();
        let mut guard = registries.write();
        let entry: &'static (dyn Any + Send + Sync) = *guard
            .entry(id)
            .or_insert_with(|| Box::leak(Box::new(built)));
        drop(guard);
        Self::downcast(entry)
    }

    fn downcast(entry: &'static (dyn Any + Send + Sync)) -> &'static TypeCodec<T> {
        entry
            .downcast_ref::<TypeCodec<T>>()
            .expect("registry entry stored under the wrong TypeId")
    }

    fn build() -> TypeCodec<T> {
        let mut builder = TypeCodecBuilder::new();
        T::configure(&mut builder);
        let recipe = match builder.recipe {
            Some(recipe) => recipe,
            None => panic!(
                "No constructor registered for type {}: register one, or call \
                 default_construction() if the type is Default",
                builder.type_name
            ),
        };
        TypeCodec {
            type_name: builder.type_name,
            fields: builder.fields,
            recipe,
        }
    }

    /// The resolved identity of `T`, as used in diagnostics and
    /// polymorphic tags.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Serialize to an object node, every registered field in
    /// registration order. Construction parameters are written exactly
    /// like ordinary fields.
    pub fn serialize(&self, instance: &T) -> Result<Value, CodecError> {
        let mut object = Map::new();
        for field in &self.fields {
            (field.writer)(instance, &mut object)?;
        }
        Ok(Value::Object(object))
    }

    /// Check that the node is an object whose key set is exactly the
    /// registered key set, every value matching its field's storage kind
    /// and nested validator. Failures are logged and return `false`.
    pub fn validate(&self, node: &Value) -> bool {
        let object = match node.as_object() {
            Some(object) => object,
            None => {
                log::warn!(
                    "Expected an object node for type {}, got {}",
                    self.type_name,
                    StorageKind::of(node)
                );
                return false;
            }
        };
        if object.len() != self.fields.len() {
            // Either a missing required key or an unregistered extra one;
            // the per-field pass below pins down which.
            for key in object.keys() {
                if !self.fields.iter().any(|field| field.key == *key) {
                    log::warn!("Invalid key found in object of type {}: {}", self.type_name, key);
                }
            }
        }
        if object.len() > self.fields.len() {
            return false;
        }
        for field in &self.fields {
            let value = match object.get(&field.key) {
                Some(value) => value,
                None => {
                    log::warn!(
                        "Missing key in object of type {}: {}",
                        self.type_name,
                        field.key
                    );
                    return false;
                }
            };
            let found = StorageKind::of(value);
            if !field.kind.accepts(found) {
                log::warn!(
                    "Invalid storage kind for {} key {}: expected {}, got {}",
                    self.type_name,
                    field.key,
                    field.kind,
                    found
                );
                return false;
            }
            if !(field.validator)(value) {
                log::warn!(
                    "Invalid value for {} key {}: {}",
                    self.type_name,
                    field.key,
                    value
                );
                return false;
            }
        }
        true
    }

    /// Validate, construct through the recipe, then apply every
    /// non-construction field's parser in registration order.
    pub fn deserialize(&self, node: &Value) -> Result<T, CodecError> {
        if !self.validate(node) {
            return Err(CodecError::Validation {
                type_name: self.type_name,
            });
        }
        let object = match node.as_object() {
            Some(object) => object,
            None => {
                return Err(CodecError::Validation {
                    type_name: self.type_name,
                })
            }
        };
        let mut instance = (self.recipe)(object)?;
        for field in &self.fields {
            if let Some(parser) = &field.parser {
                let value = object.get(&field.key).ok_or_else(|| CodecError::MissingKey {
                    type_name: self.type_name,
                    key: field.key.clone(),
                })?;
                parser(value, &mut instance)?;
            }
        }
        Ok(instance)
    }
}

/// Implement [`TreeCodec`] for a [`Reflect`] type by delegating to its
/// memoized registry, making it usable anywhere in the generic dispatch:
/// as a field of another registered type, inside containers, behind owned
/// wrappers.
///
/// ```
/// use treecodec::{tree_codec, Reflect, TreeCodec, TypeCodecBuilder};
///
/// #[derive(Debug, Default, PartialEq)]
/// struct Sample {
///     weight: f64,
/// }
///
/// impl Reflect for Sample {
///     fn configure(builder: &mut TypeCodecBuilder<Self>) {
///         builder.default_construction();
///         builder.register_field("Weight", |s: &Self| &s.weight, |s, v| s.weight = v);
///     }
/// }
///
/// tree_codec!(Sample);
///
/// let node = Sample { weight: 0.5 }.serialize()?;
/// assert!(Sample::validate(&node));
/// # Ok::<(), treecodec::CodecError>(())
/// ```
#[macro_export]
macro_rules! tree_codec {
    ($ty:ty) => {
        impl $crate::TreeCodec for $ty {
            fn storage_kind() -> $crate::StorageKind {
                $crate::StorageKind::Object
            }

            fn serialize(&self) -> Result<$crate::Value, $crate::CodecError> {
                $crate::TypeCodec::<$ty>::get().serialize(self)
            }

            fn validate(node: &$crate::Value) -> bool {
                $crate::TypeCodec::<$ty>::get().validate(node)
            }

            fn deserialize(node: &$crate::Value) -> Result<Self, $crate::CodecError> {
                $crate::TypeCodec::<$ty>::get().deserialize(node)
            }
        }
    };
}
