use crate::object::CacheObject;
use std::{collections::HashMap, slice, time::Duration};
use thiserror::Error as ThisError;

///
/// CommandError
///

#[derive(Debug, ThisError)]
pub enum CommandError {
    /// A key slot was absent on a command that requires one. Raised before
    /// any wrapping or forwarding takes place.
    #[error("command requires a key")]
    NullKey,

    #[error("lock request does not hold the key being replaced")]
    UnknownLockKey,

    /// A lower stage answered with a reply of the wrong shape for the
    /// command that was forwarded.
    #[error("pipeline returned a reply of an unexpected shape")]
    InvalidReply,
}

///
/// Command
///
/// The closed set of cache operations flowing through the pipeline. Each
/// variant carries exactly the key/value slots the marshalling layer may
/// rewrite; command identity and all other fields are left untouched.
///
/// A command instance is exclusively owned by the single in-flight call
/// that holds it; stages receive `&mut Command`, so a command can never be
/// aliased across concurrent calls while being rewritten.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    PutKeyValue(PutKeyValue),
    PutMap(PutMap),
    Remove(Remove),
    Evict(Evict),
    Replace(Replace),
    LockControl(LockRequest),
    GetKeyValue(GetKeyValue),
    KeySet,
    Values,
    EntrySet,
}

///
/// PutKeyValue
/// Payload for [`Command::PutKeyValue`]
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PutKeyValue {
    pub key: Option<CacheObject>,
    pub value: Option<CacheObject>,
    pub lifespan: Option<Duration>,
    pub max_idle: Option<Duration>,
}

///
/// PutMap
/// Payload for [`Command::PutMap`]
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PutMap {
    /// Caller-supplied mapping. An absent mapping is forwarded as an empty
    /// one; the source is replaced wholesale with a wrapped copy and is
    /// never edited in place.
    pub map: Option<Vec<(CacheObject, CacheObject)>>,
    pub lifespan: Option<Duration>,
    pub max_idle: Option<Duration>,
}

///
/// Remove
/// Payload for [`Command::Remove`]
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Remove {
    pub key: Option<CacheObject>,
}

///
/// Evict
/// Payload for [`Command::Evict`]
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Evict {
    pub key: Option<CacheObject>,
}

///
/// Replace
/// Payload for [`Command::Replace`]
///
/// Compare-and-swap when `old_value` is present, unconditional replacement
/// of an existing entry otherwise.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Replace {
    pub key: Option<CacheObject>,
    pub old_value: Option<CacheObject>,
    pub new_value: CacheObject,
}

///
/// GetKeyValue
/// Payload for [`Command::GetKeyValue`]
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GetKeyValue {
    pub key: Option<CacheObject>,
}

///
/// LockKeys
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LockKeys {
    Single(CacheObject),
    Multi(Vec<CacheObject>),
}

///
/// LockRequest
/// Payload for [`Command::LockControl`]
///
/// Keys are held privately so substitution always goes through the
/// identity-validating replace requests below.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LockRequest {
    keys: LockKeys,
    unlock: bool,
}

impl LockRequest {
    #[must_use]
    pub const fn single(key: CacheObject, unlock: bool) -> Self {
        Self {
            keys: LockKeys::Single(key),
            unlock,
        }
    }

    #[must_use]
    pub const fn multi(keys: Vec<CacheObject>, unlock: bool) -> Self {
        Self {
            keys: LockKeys::Multi(keys),
            unlock,
        }
    }

    #[must_use]
    pub const fn is_multi_key(&self) -> bool {
        matches!(self.keys, LockKeys::Multi(_))
    }

    #[must_use]
    pub const fn is_unlock(&self) -> bool {
        self.unlock
    }

    pub fn keys(&self) -> slice::Iter<'_, CacheObject> {
        match &self.keys {
            LockKeys::Single(key) => slice::from_ref(key).iter(),
            LockKeys::Multi(keys) => keys.iter(),
        }
    }

    /// Replace one held key, validating that the request actually holds the
    /// key being replaced.
    pub fn replace_key(
        &mut self,
        old: &CacheObject,
        new: CacheObject,
    ) -> Result<(), CommandError> {
        match &mut self.keys {
            LockKeys::Single(key) => {
                if key != old {
                    return Err(CommandError::UnknownLockKey);
                }
                *key = new;
                Ok(())
            }
            LockKeys::Multi(keys) => {
                let slot = keys
                    .iter_mut()
                    .find(|key| *key == old)
                    .ok_or(CommandError::UnknownLockKey)?;
                *slot = new;
                Ok(())
            }
        }
    }

    /// Substitute every held key that appears in the mapping; keys without a
    /// substitution are kept as they are.
    pub fn replace_keys(&mut self, mapping: &HashMap<CacheObject, CacheObject>) {
        match &mut self.keys {
            LockKeys::Single(key) => {
                if let Some(new) = mapping.get(key) {
                    *key = new.clone();
                }
            }
            LockKeys::Multi(keys) => {
                for key in keys.iter_mut() {
                    if let Some(new) = mapping.get(key) {
                        *key = new.clone();
                    }
                }
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
    use shoal_marshal::Value;

    fn obj(text: &str) -> CacheObject {
        CacheObject::Plain(Value::text(text))
    }

    #[test]
    fn replace_key_validates_identity() {
        let mut request = LockRequest::single(obj("k1"), false);

        assert!(matches!(
            request.replace_key(&obj("other"), obj("new")),
            Err(CommandError::UnknownLockKey)
        ));

        request.replace_key(&obj("k1"), obj("new")).unwrap();
        assert_eq!(request.keys().next(), Some(&obj("new")));
    }

    #[test]
    fn replace_keys_substitutes_only_mapped_keys() {
        let mut request = LockRequest::multi(vec![obj("k1"), obj("k2"), obj("k3")], false);

        let mapping = HashMap::from([(obj("k1"), obj("m1")), (obj("k3"), obj("m3"))]);
        request.replace_keys(&mapping);

        let keys: Vec<_> = request.keys().cloned().collect();
        assert_eq!(keys, vec![obj("m1"), obj("k2"), obj("m3")]);
    }

    #[test]
    fn multi_key_replace_key_rejects_unknown_keys() {
        let mut request = LockRequest::multi(vec![obj("k1")], true);
        assert!(matches!(
            request.replace_key(&obj("k9"), obj("new")),
            Err(CommandError::UnknownLockKey)
        ));
        assert!(request.is_unlock());
    }
}
