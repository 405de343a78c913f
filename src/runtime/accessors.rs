//! Process-wide cache of attribute accessors, keyed by the concrete type of an [`Object`].
//!
//! Discovery asks the object for `name`, then for the predicate form `is_<name>`. Both hits and
//! misses are recorded, so each (type, attribute) pair is discovered at most once per process
//! modulo races. Discovery is deterministic, so concurrent writers store the same entry.

use std::any::{Any, TypeId};

use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::ast::value::{Accessor, Object, Value};

type TypeAccessors = DashMap<String, Option<Accessor>>;

static ACCESSOR_CACHE: Lazy<DashMap<TypeId, TypeAccessors>> = Lazy::new(DashMap::new);

/// Reads attribute `name` from `obj`, or `None` when the type exposes no such accessor.
pub fn read_attribute(obj: &dyn Object, name: &str) -> Option<Value> {
    let accessor = lookup(obj, name)?;
    accessor(obj)
}

/// Cached accessor for attribute `name` on the concrete type of `obj`.
pub fn lookup(obj: &dyn Object, name: &str) -> Option<Accessor> {
    let type_id = Any::type_id(obj.as_any());
    if let Some(cached) = cached(type_id, name) {
        tracing::trace!(attribute = name, found = cached.is_some(), "accessor cache hit");
        return cached;
    }

    let discovered = discover(obj, name);
    tracing::trace!(
        attribute = name,
        found = discovered.is_some(),
        "accessor cache miss"
    );
    ACCESSOR_CACHE
        .entry(type_id)
        .or_default()
        .insert(name.to_string(), discovered);
    discovered
}

/// The cache entry for type `T` and attribute `name`: `None` if never looked up, `Some(None)`
/// for a recorded miss.
pub fn cached_entry<T: Object>(name: &str) -> Option<Option<Accessor>> {
    cached(TypeId::of::<T>(), name)
}

fn cached(type_id: TypeId, name: &str) -> Option<Option<Accessor>> {
    let per_type = ACCESSOR_CACHE.get(&type_id)?;
    let entry = per_type.get(name)?;
    Some(*entry)
}

fn discover(obj: &dyn Object, name: &str) -> Option<Accessor> {
    obj.accessor(name)
        .or_else(|| obj.accessor(&format!("is_{name}")))
}
