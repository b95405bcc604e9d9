//! Exit-side processing for bulk read results.
//!
//! Storage keeps wrapped forms, so key-set, values, and entry-set replies
//! can contain wrappers. Every element is replaced by its decoded form and
//! the result is returned as a fresh defensive copy with no mutation
//! surface. Cardinality is preserved exactly.

use crate::{
    entries::{CacheEntry, StoreEntry},
    error::Error,
    object::CacheObject,
    views::{ImmutableSeq, ImmutableSet},
};
use shoal_marshal::Value;
use std::collections::HashSet;

pub(crate) fn unwrap_keys(keys: Vec<CacheObject>) -> Result<ImmutableSet<Value>, Error> {
    let mut copy = HashSet::with_capacity(keys.len());
    for key in keys {
        copy.insert(key.into_value()?);
    }

    Ok(ImmutableSet::new(copy))
}

pub(crate) fn unwrap_values(values: Vec<CacheObject>) -> Result<ImmutableSeq<Value>, Error> {
    let mut copy = Vec::with_capacity(values.len());
    for value in values {
        copy.push(value.into_value()?);
    }

    Ok(ImmutableSeq::new(copy))
}

/// Entries are rebuilt through the entry factory: decoded key and value
/// substituted, timing metadata carried over unchanged.
pub(crate) fn unwrap_entries(entries: Vec<StoreEntry>) -> Result<ImmutableSet<CacheEntry>, Error> {
    let mut copy = HashSet::with_capacity(entries.len());
    for entry in entries {
        let key = entry.key.into_value()?;
        let value = entry.value.into_value()?;
        copy.insert(CacheEntry::rebuild(key, value, entry.timing));
    }

    Ok(ImmutableSet::new(copy))
}

///
/// TESTS
///
