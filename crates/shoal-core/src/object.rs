use shoal_marshal::{MarshalError, MarshalledValue, Value};

///
/// CacheObject
///
/// The slot type carried by commands and kept by storage: either a plain
/// domain value or a marshalled wrapper. Callers above the marshalling
/// stage never observe the `Marshalled` variant.
///

#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum CacheObject {
    Plain(Value),
    Marshalled(MarshalledValue),
}

impl CacheObject {
    #[must_use]
    pub const fn is_marshalled(&self) -> bool {
        matches!(self, Self::Marshalled(_))
    }

    /// Extract the plain value, decoding a wrapper if necessary.
    pub fn into_value(self) -> Result<Value, MarshalError> {
        match self {
            Self::Plain(value) => Ok(value),
            Self::Marshalled(mv) => mv.get(),
        }
    }
}

impl From<Value> for CacheObject {
    fn from(value: Value) -> Self {
        Self::Plain(value)
    }
}

impl From<MarshalledValue> for CacheObject {
    fn from(mv: MarshalledValue) -> Self {
        Self::Marshalled(mv)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;
    use shoal_marshal::CborMarshaller;
    use std::sync::Arc;

    #[test]
    fn plain_objects_unwrap_to_themselves() {
        let obj = CacheObject::from(Value::text("v1"));
        assert!(!obj.is_marshalled());
        assert_eq!(obj.into_value().unwrap(), Value::text("v1"));
    }

    #[test]
    fn marshalled_objects_unwrap_to_their_content() {
        let value = Value::record([("hits", Value::Int(3))]);
        let mv = MarshalledValue::wrap(value.clone(), true, Arc::new(CborMarshaller)).unwrap();

        let obj = CacheObject::from(mv);
        assert!(obj.is_marshalled());
        assert_eq!(obj.into_value().unwrap(), value);
    }
}
