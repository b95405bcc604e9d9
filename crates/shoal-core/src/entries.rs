use crate::object::CacheObject;
use shoal_marshal::Value;
use std::time::Duration;

///
/// EntryTiming
///
/// Timing metadata carried by every stored entry. Instants are milliseconds
/// on the owning store's monotonic clock. The marshalling layer copies this
/// verbatim when rebuilding entries; it never interprets the fields.
///

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct EntryTiming {
    pub created_at: u64,
    pub last_used: u64,
    pub lifespan: Option<Duration>,
    pub max_idle: Option<Duration>,
}

impl EntryTiming {
    #[must_use]
    pub const fn new(now: u64, lifespan: Option<Duration>, max_idle: Option<Duration>) -> Self {
        Self {
            created_at: now,
            last_used: now,
            lifespan,
            max_idle,
        }
    }
}

///
/// StoreEntry
///
/// An entry as kept by storage. Key and value stay in whatever
/// representation the storage layer was handed, wrapped forms included.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct StoreEntry {
    pub key: CacheObject,
    pub value: CacheObject,
    pub timing: EntryTiming,
}

///
/// CacheEntry
///
/// The immutable, fully-decoded entry exposed to callers. Built through
/// [`CacheEntry::rebuild`], which substitutes decoded key and value while
/// preserving the source entry's timing metadata unchanged.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct CacheEntry {
    key: Value,
    value: Value,
    timing: EntryTiming,
}

impl CacheEntry {
    /// Entry factory: construct an exposed entry from decoded parts and the
    /// timing metadata of the entry it replaces.
    #[must_use]
    pub const fn rebuild(key: Value, value: Value, timing: EntryTiming) -> Self {
        Self { key, value, timing }
    }

    #[must_use]
    pub const fn key(&self) -> &Value {
        &self.key
    }

    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub const fn created_at(&self) -> u64 {
        self.timing.created_at
    }

    #[must_use]
    pub const fn last_used(&self) -> u64 {
        self.timing.last_used
    }

    #[must_use]
    pub const fn lifespan(&self) -> Option<Duration> {
        self.timing.lifespan
    }

    #[must_use]
    pub const fn max_idle(&self) -> Option<Duration> {
        self.timing.max_idle
    }
}

///
/// TESTS
///
