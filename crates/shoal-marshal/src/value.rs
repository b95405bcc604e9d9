use serde::{Deserialize, Serialize};

///
/// Value
///
/// Plain domain value exchanged with cache callers.
///
/// This is the closed set of shapes a key or value can take before the
/// marshalling layer gets involved. Record fields keep their insertion order
/// so encoding the same value always yields the same bytes.
///

#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Value {
    Text(String),
    Bool(bool),
    Int(i64),
    Bytes(#[serde(with = "serde_bytes")] Vec<u8>),
    List(Vec<Value>),
    Record(Vec<(String, Value)>),

    /// Opaque node-local resource handle. Handles never leave the process
    /// and can never be marshalled.
    Handle(u64),
}

impl Value {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    #[must_use]
    pub fn record<N, I>(fields: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (N, Self)>,
    {
        Self::Record(
            fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        )
    }

    /// Whether this value can ever be encoded.
    ///
    /// False iff a [`Value::Handle`] occurs anywhere in the tree. Checked
    /// eagerly at wrap time so an unmarshallable value fails before it has
    /// any effect on pipeline state.
    #[must_use]
    pub fn is_marshallable(&self) -> bool {
        match self {
            Self::Handle(_) => false,
            Self::List(items) => items.iter().all(Self::is_marshallable),
            Self::Record(fields) => fields.iter().all(|(_, value)| value.is_marshallable()),
            Self::Text(_) | Self::Bool(_) | Self::Int(_) | Self::Bytes(_) => true,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalars_and_byte_forms_are_marshallable() {
        assert!(Value::text("k1").is_marshallable());
        assert!(Value::Bool(true).is_marshallable());
        assert!(Value::Int(-4).is_marshallable());
        assert!(Value::Bytes(vec![0, 1, 2]).is_marshallable());
    }

    #[test]
    fn handle_is_never_marshallable() {
        assert!(!Value::Handle(7).is_marshallable());
    }

    #[test]
    fn nested_handle_poisons_the_tree() {
        let record = Value::record([
            ("name", Value::text("session")),
            ("fd", Value::Handle(3)),
        ]);
        assert!(!record.is_marshallable());

        let list = Value::List(vec![Value::Int(1), Value::Handle(3)]);
        assert!(!list.is_marshallable());
    }

    #[test]
    fn record_without_handles_is_marshallable() {
        let record = Value::record([
            ("name", Value::text("session")),
            ("hits", Value::Int(12)),
        ]);
        assert!(record.is_marshallable());
    }
}
