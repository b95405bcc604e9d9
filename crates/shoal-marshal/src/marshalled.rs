use crate::{
    codec::{MarshalError, Marshaller},
    value::Value,
};
use parking_lot::RwLock;
use std::{
    fmt,
    hash::{DefaultHasher, Hash, Hasher},
    sync::{Arc, OnceLock},
};

///
/// MarshalledValue
///
/// Dual-representation holder for one key or value while it is in flight
/// through the pipeline. At least one of {decoded value, encoded bytes} is
/// always present; whichever is missing is computed on demand from the
/// other.
///
/// Cloning is shallow: clones share the same underlying state, so a first
/// decode or a compaction is visible through every clone. Equality and hash
/// are defined over content only, never over which representation happens
/// to be materialized.
///

#[derive(Clone)]
pub struct MarshalledValue {
    inner: Arc<Inner>,
}

struct Inner {
    repr: RwLock<Repr>,
    hash: OnceLock<u64>,
    origin_local: bool,
    marshaller: Arc<dyn Marshaller>,
}

enum Repr {
    Decoded(Value),
    Encoded(Vec<u8>),
    Both { decoded: Value, encoded: Vec<u8> },
}

impl Repr {
    const fn decoded(&self) -> Option<&Value> {
        match self {
            Self::Decoded(value) | Self::Both { decoded: value, .. } => Some(value),
            Self::Encoded(_) => None,
        }
    }

    const fn encoded(&self) -> Option<&Vec<u8>> {
        match self {
            Self::Encoded(bytes) | Self::Both { encoded: bytes, .. } => Some(bytes),
            Self::Decoded(_) => None,
        }
    }
}

impl MarshalledValue {
    /// Wrap a plain value, deferring encoding until a byte form is needed.
    ///
    /// Fails with [`MarshalError::NotMarshallable`] if the value's shape can
    /// never be encoded. The check runs before the surrounding operation is
    /// forwarded, so failure has no side effects on pipeline state.
    pub fn wrap(
        value: Value,
        origin_local: bool,
        marshaller: Arc<dyn Marshaller>,
    ) -> Result<Self, MarshalError> {
        if !value.is_marshallable() {
            return Err(MarshalError::NotMarshallable);
        }

        Ok(Self {
            inner: Arc::new(Inner {
                repr: RwLock::new(Repr::Decoded(value)),
                hash: OnceLock::new(),
                origin_local,
                marshaller,
            }),
        })
    }

    /// Rehydrate a wrapper from its encoded form, as received from a peer or
    /// read back from storage. Decoding is deferred until [`get`](Self::get).
    #[must_use]
    pub fn from_encoded(bytes: Vec<u8>, marshaller: Arc<dyn Marshaller>) -> Self {
        Self {
            inner: Arc::new(Inner {
                repr: RwLock::new(Repr::Encoded(bytes)),
                hash: OnceLock::new(),
                origin_local: false,
                marshaller,
            }),
        }
    }

    /// The decoded value, decoding from bytes on first access.
    ///
    /// Safe under concurrent invocation on a shared wrapper: a race may
    /// decode twice (decode is pure), but callers always observe a complete,
    /// content-identical value.
    pub fn get(&self) -> Result<Value, MarshalError> {
        if let Some(value) = self.inner.repr.read().decoded() {
            return Ok(value.clone());
        }

        // invariant: no decoded form means the encoded form is present
        let bytes = self
            .inner
            .repr
            .read()
            .encoded()
            .cloned()
            .ok_or_else(|| MarshalError::Decode("wrapper holds no representation".to_string()))?;

        let value = self.inner.marshaller.try_decode(&bytes)?;

        let mut repr = self.inner.repr.write();
        if repr.decoded().is_none() {
            *repr = Repr::Both {
                decoded: value.clone(),
                encoded: bytes,
            };
        }

        Ok(value)
    }

    /// The encoded form, encoding from the decoded value on first access.
    pub fn encoded_bytes(&self) -> Result<Vec<u8>, MarshalError> {
        if let Some(bytes) = self.inner.repr.read().encoded() {
            return Ok(bytes.clone());
        }

        let value = self
            .inner
            .repr
            .read()
            .decoded()
            .cloned()
            .ok_or_else(|| MarshalError::Encode("wrapper holds no representation".to_string()))?;

        let bytes = self.inner.marshaller.try_encode(&value)?;

        let mut repr = self.inner.repr.write();
        if repr.encoded().is_none() {
            *repr = Repr::Both {
                decoded: value,
                encoded: bytes.clone(),
            };
        }

        Ok(bytes)
    }

    /// Advisory: trim one representation once the layer is done with this
    /// wrapper for the current operation.
    ///
    /// Only acts when both representations are present; never removes the
    /// last one; never fails; idempotent. With neither retain flag set the
    /// encoded form wins: it is the form a replicated node re-serves, and
    /// the decoded value is cheap to rebuild through the codec.
    pub fn compact(&self, retain_decoded: bool, retain_encoded: bool) {
        if retain_decoded && retain_encoded {
            return;
        }

        let mut repr = self.inner.repr.write();

        let Repr::Both { decoded, encoded } = &*repr else {
            return;
        };

        let next = if retain_decoded {
            Repr::Decoded(decoded.clone())
        } else {
            Repr::Encoded(encoded.clone())
        };

        *repr = next;
    }

    #[must_use]
    pub fn has_decoded(&self) -> bool {
        self.inner.repr.read().decoded().is_some()
    }

    #[must_use]
    pub fn has_encoded(&self) -> bool {
        self.inner.repr.read().encoded().is_some()
    }

    #[must_use]
    pub fn is_origin_local(&self) -> bool {
        self.inner.origin_local
    }

    fn peek_encoded(&self) -> Option<Vec<u8>> {
        self.inner.repr.read().encoded().cloned()
    }

    /// Cached content hash, independent of representation state.
    fn content_hash(&self) -> u64 {
        *self.inner.hash.get_or_init(|| {
            let mut hasher = DefaultHasher::new();
            match self.get() {
                Ok(value) => value.hash(&mut hasher),
                // corrupt byte form: hash by the raw encoding instead
                Err(_) => {
                    if let Some(bytes) = self.peek_encoded() {
                        bytes.hash(&mut hasher);
                    }
                }
            }
            hasher.finish()
        })
    }
}

impl PartialEq for MarshalledValue {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            return true;
        }

        // byte comparison when both sides hold bytes; the codec is
        // deterministic, so equal content means equal encoding
        if let (Some(a), Some(b)) = (self.peek_encoded(), other.peek_encoded()) {
            return a == b;
        }

        match (self.get(), other.get()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for MarshalledValue {}

impl Hash for MarshalledValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

impl fmt::Debug for MarshalledValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = self.inner.repr.read();
        f.debug_struct("MarshalledValue")
            .field("decoded", &repr.decoded().is_some())
            .field("encoded_len", &repr.encoded().map(Vec::len))
            .field("origin_local", &self.inner.origin_local)
            .finish()
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::CborMarshaller;
    use std::{collections::HashSet, thread};

    fn marshaller() -> Arc<dyn Marshaller> {
        Arc::new(CborMarshaller)
    }

    fn sample() -> Value {
        Value::record([
            ("name", Value::text("session")),
            ("hits", Value::Int(12)),
        ])
    }

    #[test]
    fn get_round_trips_the_wrapped_value() {
        let mv = MarshalledValue::wrap(sample(), true, marshaller()).unwrap();
        assert_eq!(mv.get().unwrap(), sample());
    }

    #[test]
    fn wrap_rejects_unmarshallable_values() {
        let err = MarshalledValue::wrap(Value::Handle(3), true, marshaller()).unwrap_err();
        assert_eq!(err, MarshalError::NotMarshallable);
    }

    #[test]
    fn rehydrated_wrapper_decodes_lazily() {
        let bytes = CborMarshaller.try_encode(&sample()).unwrap();
        let mv = MarshalledValue::from_encoded(bytes, marshaller());

        assert!(!mv.has_decoded());
        assert_eq!(mv.get().unwrap(), sample());
        assert!(mv.has_decoded());
    }

    #[test]
    fn equality_and_hash_ignore_representation_state() {
        let from_value = MarshalledValue::wrap(sample(), true, marshaller()).unwrap();
        let bytes = CborMarshaller.try_encode(&sample()).unwrap();
        let from_bytes = MarshalledValue::from_encoded(bytes, marshaller());

        assert_eq!(from_value, from_bytes);

        let mut set = HashSet::new();
        set.insert(from_value);
        set.insert(from_bytes);
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn unequal_content_compares_unequal() {
        let a = MarshalledValue::wrap(sample(), true, marshaller()).unwrap();
        let b = MarshalledValue::wrap(Value::record([("other", Value::Int(1))]), true, marshaller())
            .unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn compact_prefers_the_encoded_form_by_default() {
        let mv = MarshalledValue::wrap(sample(), true, marshaller()).unwrap();
        mv.encoded_bytes().unwrap();
        assert!(mv.has_decoded() && mv.has_encoded());

        mv.compact(false, false);
        assert!(!mv.has_decoded());
        assert!(mv.has_encoded());
    }

    #[test]
    fn compact_never_drops_the_last_representation() {
        let mv = MarshalledValue::wrap(sample(), true, marshaller()).unwrap();
        mv.compact(false, false);
        mv.compact(false, false);
        assert!(mv.has_decoded());
    }

    #[test]
    fn compact_is_idempotent_for_later_gets() {
        let mv = MarshalledValue::wrap(sample(), true, marshaller()).unwrap();
        mv.encoded_bytes().unwrap();

        for _ in 0..3 {
            mv.compact(false, false);
            assert_eq!(mv.get().unwrap(), sample());
            mv.compact(false, false);
        }
    }

    #[test]
    fn compact_can_retain_the_decoded_form() {
        let mv = MarshalledValue::wrap(sample(), true, marshaller()).unwrap();
        mv.encoded_bytes().unwrap();

        mv.compact(true, false);
        assert!(mv.has_decoded());
        assert!(!mv.has_encoded());
    }

    #[test]
    fn clones_share_state() {
        let mv = MarshalledValue::wrap(sample(), true, marshaller()).unwrap();
        let clone = mv.clone();

        mv.encoded_bytes().unwrap();
        mv.compact(false, false);

        assert!(!clone.has_decoded());
        assert!(clone.has_encoded());
    }

    #[test]
    fn concurrent_gets_are_content_identical() {
        let bytes = CborMarshaller.try_encode(&sample()).unwrap();
        let mv = MarshalledValue::from_encoded(bytes, marshaller());

        thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let mv = mv.clone();
                    scope.spawn(move || mv.get().unwrap())
                })
                .collect();

            for handle in handles {
                assert_eq!(handle.join().unwrap(), sample());
            }
        });

        assert!(mv.has_decoded());
    }
}
