// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 treecodec developers

//! # treecodec - Reflective object <-> value-tree serialization
//!
//! A self-registration serialization framework over JSON-like value
//! trees. A type declares its serialized shape once, in code, and gains
//! three operations: serialize to a tree node, validate a node against
//! the declared shape, and deserialize a validated node back into a
//! value. The declaration lives next to the type, so private fields and
//! types without a default constructor participate fully.
//!
//! ## Quick Start
//!
//! ```rust
//! use treecodec::{tree_codec, Reflect, TreeCodec, TypeCodecBuilder};
//!
//! #[derive(Debug, Default, PartialEq)]
//! struct Telemetry {
//!     sequence: u64,
//!     samples: Vec<f64>,
//!     source: String,
//! }
//!
//! impl Reflect for Telemetry {
//!     fn configure(builder: &mut TypeCodecBuilder<Self>) {
//!         builder.default_construction();
//!         builder.register_field("Sequence", |t: &Self| &t.sequence, |t, v| t.sequence = v);
//!         builder.register_field("Samples", |t: &Self| &t.samples, |t, v| t.samples = v);
//!         builder.register_field("Source", |t: &Self| &t.source, |t, v| t.source = v);
//!     }
//! }
//!
//! tree_codec!(Telemetry);
//!
//! let original = Telemetry {
//!     sequence: 7,
//!     samples: vec![0.5, 1.5],
//!     source: "probe-a".to_owned(),
//! };
//!
//! let node = original.serialize()?;
//! assert!(Telemetry::validate(&node));
//! assert_eq!(Telemetry::deserialize(&node)?, original);
//! # Ok::<(), treecodec::CodecError>(())
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`TreeCodec`] | The serialize / validate / deserialize surface every codable type exposes |
//! | [`Reflect`] | Self-registration hook: declare fields and construction once |
//! | [`TypeCodecBuilder`] | Mutable registry view passed to [`Reflect::configure`] |
//! | [`Poly`] | Owned trait object that serializes through the `__typename` tag protocol |
//! | [`CodecError`] | Typed failures for every decode and lookup path |
//! | [`StorageKind`] | The eight node shapes, with one-way numeric widening |
//!
//! ## Modules Overview
//!
//! - [`codec`] - Generic dispatch: primitives, enums, pairs, containers, owned wrappers
//! - [`registry`] - Per-type field registries, built once and memoized
//! - [`poly`] - Polymorphic serialization over trait objects
//! - [`kind`] - Node-shape classification and structural validation helpers
//! - [`error`] - The [`CodecError`] taxonomy
//! - [`type_name`] - Short type names for diagnostics and tags

/// Generic dispatch: the [`TreeCodec`] trait and its built-in implementations.
pub mod codec;
/// Typed failures for decode and registry lookup paths.
pub mod error;
/// Node-shape classification and structural validation.
pub mod kind;
/// Polymorphic serialization over trait objects.
pub mod poly;
/// Per-type codec registries and the [`Reflect`] entry point.
pub mod registry;
/// Short type names for diagnostics and polymorphic tags.
pub mod type_name;

pub use codec::{TreeCodec, PAIR_FIRST, PAIR_SECOND};
pub use error::CodecError;
pub use kind::StorageKind;
pub use poly::{Poly, PolymorphicBase, PolymorphicCodec, TypeTag, TYPENAME_KEY};
pub use registry::{Param, Reflect, TypeCodec, TypeCodecBuilder};

// The tree node type. Re-exported so callers build and inspect nodes
// without naming serde_json directly.
pub use serde_json::{Map, Value};

#[cfg(test)]
mod tests;
