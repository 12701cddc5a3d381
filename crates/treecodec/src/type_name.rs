// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 treecodec developers

//! Type identity resolution.
//!
//! Produces a stable, human-readable, module-path-free identifier for a
//! type. Used to tag polymorphic nodes and to localize diagnostics.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::OnceLock;

static SHORT_NAMES: OnceLock<RwLock<HashMap<&'static str, &'static str>>> = OnceLock::new();

/// The unqualified name of `T`, with module paths stripped from the type
/// itself and from every generic argument.
///
/// `my_crate::geometry::Circle` becomes `Circle`, and
/// `alloc::vec::Vec<my_crate::geometry::Circle>` becomes `Vec<Circle>`.
/// Results are interned, so repeated calls are a map lookup.
pub fn short<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let cache = SHORT_NAMES.get_or_init(|| RwLock::new(HashMap::new()));
    if let Some(name) = cache.read().get(full) {
        return name;
    }
    let shortened = strip_paths(full);
    let mut guard = cache.write();
    *guard
        .entry(full)
        .or_insert_with(|| Box::leak(shortened.into_boxed_str()))
}

/// Drop every `path::` prefix, including inside generic brackets.
fn strip_paths(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment = String::new();
    for ch in full.chars() {
        match ch {
            // "::" separators arrive one ':' at a time; each one discards
            // the identifier collected so far.
            ':' => segment.clear(),
            '<' | '>' | '(' | ')' | '[' | ']' | ',' | ' ' | '&' | ';' => {
                out.push_str(&segment);
                segment.clear();
                out.push(ch);
            }
            _ => segment.push(ch),
        }
    }
    out.push_str(&segment);
    out
}
