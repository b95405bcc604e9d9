use crate::{
    command::{Command, LockRequest},
    context::InvocationContext,
    entries::{EntryTiming, StoreEntry},
    error::Error,
    log::Topic,
    object::CacheObject,
    pipeline::{PipelineStage, Reply},
};
use parking_lot::RwLock;
use shoal_marshal::Value;
use std::{
    collections::HashMap,
    time::{Duration, Instant},
};
use thiserror::Error as ThisError;

///
/// StoreError
///

#[derive(Debug, ThisError)]
pub enum StoreError {
    /// A command with a missing required slot reached storage. Upstream
    /// validation normally rejects these before forwarding.
    #[error("malformed command reached the store: {0}")]
    MalformedCommand(&'static str),
}

///
/// MemoryStore
///
/// Terminal pipeline stage: a node-local hash map from cache object to
/// stored entry. Keys and values are kept in whatever representation they
/// arrive in. Wrapped forms stay wrapped, with their byte form
/// materialized on write the way a persistent store would keep them.
///
/// Lock bookkeeping is advisory and per-key; replication and transactional
/// ordering live in other stages.
///

pub struct MemoryStore {
    entries: RwLock<HashMap<CacheObject, StoreEntry>>,
    locks: RwLock<HashMap<CacheObject, String>>,
    epoch: Instant,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            locks: RwLock::new(HashMap::new()),
            epoch: Instant::now(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    /// Inspection helper: the stored entry for a key, representation intact.
    #[must_use]
    pub fn raw_entry(&self, key: &CacheObject) -> Option<StoreEntry> {
        self.entries.read().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn materialize(object: &CacheObject) -> Result<(), Error> {
        if let CacheObject::Marshalled(mv) = object {
            mv.encoded_bytes()?;
        }

        Ok(())
    }

    fn insert(
        &self,
        key: CacheObject,
        value: CacheObject,
        lifespan: Option<Duration>,
        max_idle: Option<Duration>,
    ) -> Result<Option<CacheObject>, Error> {
        Self::materialize(&key)?;
        Self::materialize(&value)?;

        let timing = EntryTiming::new(self.now_ms(), lifespan, max_idle);
        let entry = StoreEntry {
            key: key.clone(),
            value,
            timing,
        };

        Ok(self
            .entries
            .write()
            .insert(key, entry)
            .map(|previous| previous.value))
    }

    fn lock_keys(&self, ctx: &InvocationContext, request: &LockRequest) -> bool {
        let owner = ctx.originator().unwrap_or("local").to_string();
        let mut locks = self.locks.write();
        let mut acquired = true;

        for key in request.keys() {
            if request.is_unlock() {
                locks.remove(key);
                continue;
            }

            let held_by_other = locks.get(key).is_some_and(|holder| *holder != owner);
            if held_by_other {
                acquired = false;
            } else {
                locks.insert(key.clone(), owner.clone());
            }
        }

        crate::log!(
            Topic::Store,
            Trace,
            "lock request by {owner}: unlock={}, acquired={acquired}",
            request.is_unlock(),
        );

        acquired
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStage for MemoryStore {
    fn forward(&self, ctx: &InvocationContext, command: &mut Command) -> Result<Reply, Error> {
        match command {
            Command::PutKeyValue(put) => {
                let key = put
                    .key
                    .clone()
                    .ok_or(StoreError::MalformedCommand("put without key"))?;

                // an absent value reads the previous mapping without storing
                let Some(value) = put.value.clone() else {
                    let previous = self.raw_entry(&key).map(|entry| entry.value);
                    return Ok(Reply::Value(previous));
                };

                let previous = self.insert(key, value, put.lifespan, put.max_idle)?;
                Ok(Reply::Value(previous))
            }

            Command::PutMap(put) => {
                for (key, value) in put.map.clone().unwrap_or_default() {
                    self.insert(key, value, put.lifespan, put.max_idle)?;
                }
                Ok(Reply::None)
            }

            Command::Remove(remove) => {
                let key = remove
                    .key
                    .clone()
                    .ok_or(StoreError::MalformedCommand("remove without key"))?;

                let previous = self.entries.write().remove(&key).map(|entry| entry.value);
                Ok(Reply::Value(previous))
            }

            Command::Evict(evict) => {
                let key = evict
                    .key
                    .clone()
                    .ok_or(StoreError::MalformedCommand("evict without key"))?;

                let previous = self.entries.write().remove(&key).map(|entry| entry.value);
                Ok(Reply::Value(previous))
            }

            Command::Replace(replace) => {
                let key = replace
                    .key
                    .clone()
                    .ok_or(StoreError::MalformedCommand("replace without key"))?;

                Self::materialize(&replace.new_value)?;

                let now = self.now_ms();
                let mut entries = self.entries.write();

                match &replace.old_value {
                    // compare-and-swap: wrapper content equality makes this
                    // work even when the stored form is wrapped
                    Some(expected) => {
                        let swapped = match entries.get_mut(&key) {
                            Some(entry) if entry.value == *expected => {
                                entry.value = replace.new_value.clone();
                                entry.timing.last_used = now;
                                true
                            }
                            _ => false,
                        };
                        Ok(Reply::Value(Some(CacheObject::Plain(Value::Bool(
                            swapped,
                        )))))
                    }

                    None => match entries.get_mut(&key) {
                        Some(entry) => {
                            let previous = entry.value.clone();
                            entry.value = replace.new_value.clone();
                            entry.timing.last_used = now;
                            Ok(Reply::Value(Some(previous)))
                        }
                        None => Ok(Reply::Value(None)),
                    },
                }
            }

            Command::LockControl(request) => {
                let acquired = self.lock_keys(ctx, request);
                Ok(Reply::Value(Some(CacheObject::Plain(Value::Bool(
                    acquired,
                )))))
            }

            Command::GetKeyValue(get) => {
                let key = get
                    .key
                    .clone()
                    .ok_or(StoreError::MalformedCommand("get without key"))?;

                let now = self.now_ms();
                let mut entries = self.entries.write();
                match entries.get_mut(&key) {
                    Some(entry) => {
                        entry.timing.last_used = now;
                        Ok(Reply::Value(Some(entry.value.clone())))
                    }
                    None => Ok(Reply::Value(None)),
                }
            }

            Command::KeySet => {
                let keys = self.entries.read().keys().cloned().collect();
                Ok(Reply::Keys(keys))
            }

            Command::Values => {
                let values = self
                    .entries
                    .read()
                    .values()
                    .map(|entry| entry.value.clone())
                    .collect();
                Ok(Reply::Values(values))
            }

            Command::EntrySet => {
                let entries = self.entries.read().values().cloned().collect();
                Ok(Reply::Entries(entries))
            }
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{GetKeyValue, PutKeyValue, Remove, Replace};

    fn ctx() -> InvocationContext {
        InvocationContext::local()
    }

    fn put_command(key: &str, value: &str) -> Command {
        Command::PutKeyValue(PutKeyValue {
            key: Some(CacheObject::Plain(Value::text(key))),
            value: Some(CacheObject::Plain(Value::text(value))),
            lifespan: None,
            max_idle: None,
        })
    }

    #[test]
    fn put_then_get_round_trips() {
        let store = MemoryStore::new();

        let reply = store.forward(&ctx(), &mut put_command("k1", "v1")).unwrap();
        assert!(matches!(reply, Reply::Value(None)));

        let mut get = Command::GetKeyValue(GetKeyValue {
            key: Some(CacheObject::Plain(Value::text("k1"))),
        });
        let reply = store.forward(&ctx(), &mut get).unwrap();
        let Reply::Value(Some(CacheObject::Plain(value))) = reply else {
            panic!("expected a plain value");
        };
        assert_eq!(value, Value::text("v1"));
    }

    #[test]
    fn put_returns_the_previous_value() {
        let store = MemoryStore::new();

        store.forward(&ctx(), &mut put_command("k1", "v1")).unwrap();
        let reply = store.forward(&ctx(), &mut put_command("k1", "v2")).unwrap();

        let Reply::Value(Some(CacheObject::Plain(previous))) = reply else {
            panic!("expected the previous value");
        };
        assert_eq!(previous, Value::text("v1"));
    }

    #[test]
    fn remove_without_key_is_malformed() {
        let store = MemoryStore::new();
        let mut remove = Command::Remove(Remove { key: None });

        assert!(matches!(
            store.forward(&ctx(), &mut remove),
            Err(Error::Store(StoreError::MalformedCommand(_)))
        ));
    }

    #[test]
    fn conditional_replace_compares_values() {
        let store = MemoryStore::new();
        store.forward(&ctx(), &mut put_command("k1", "v1")).unwrap();

        let mut wrong = Command::Replace(Replace {
            key: Some(CacheObject::Plain(Value::text("k1"))),
            old_value: Some(CacheObject::Plain(Value::text("other"))),
            new_value: CacheObject::Plain(Value::text("v2")),
        });
        let Reply::Value(Some(CacheObject::Plain(Value::Bool(swapped)))) =
            store.forward(&ctx(), &mut wrong).unwrap()
        else {
            panic!("expected a boolean reply");
        };
        assert!(!swapped);

        let mut right = Command::Replace(Replace {
            key: Some(CacheObject::Plain(Value::text("k1"))),
            old_value: Some(CacheObject::Plain(Value::text("v1"))),
            new_value: CacheObject::Plain(Value::text("v2")),
        });
        let Reply::Value(Some(CacheObject::Plain(Value::Bool(swapped)))) =
            store.forward(&ctx(), &mut right).unwrap()
        else {
            panic!("expected a boolean reply");
        };
        assert!(swapped);
    }

    #[test]
    fn enumerations_cover_every_entry() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        store.forward(&ctx(), &mut put_command("k1", "v1")).unwrap();
        store.forward(&ctx(), &mut put_command("k2", "v2")).unwrap();
        assert_eq!(store.len(), 2);

        let Reply::Keys(keys) = store.forward(&ctx(), &mut Command::KeySet).unwrap() else {
            panic!("expected keys");
        };
        assert_eq!(keys.len(), 2);

        let Reply::Entries(entries) = store.forward(&ctx(), &mut Command::EntrySet).unwrap()
        else {
            panic!("expected entries");
        };
        assert_eq!(entries.len(), 2);
    }
}
