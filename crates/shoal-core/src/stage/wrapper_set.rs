use shoal_marshal::MarshalledValue;
use std::collections::{HashSet, hash_set};

///
/// MarshalledValueSet
///
/// Ephemeral set of the wrappers created during one bulk operation,
/// deduplicated by content equality. Lives only inside that operation's
/// call frame and exists solely to batch-compact after the forwarded call
/// returns.
///

#[derive(Debug, Default)]
pub(crate) struct MarshalledValueSet {
    wrappers: HashSet<MarshalledValue>,
}

impl MarshalledValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, wrapper: MarshalledValue) {
        self.wrappers.insert(wrapper);
    }

    pub fn len(&self) -> usize {
        self.wrappers.len()
    }

    pub fn iter(&self) -> hash_set::Iter<'_, MarshalledValue> {
        self.wrappers.iter()
    }
}

///
/// TESTS
///
