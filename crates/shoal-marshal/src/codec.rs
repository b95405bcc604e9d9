//!
//! serde_cbor-powered codec shared by every marshalling site, ensuring the
//! same deterministic byte form on both sides of the pipeline. Provides a
//! thin trait seam with shared error handling for CBOR round-trips.
//!

use crate::value::Value;
use serde_cbor::{from_slice, to_vec};
use thiserror::Error as ThisError;

///
/// MarshalError
///
/// Error variants wrapping encode or decode failures so callers can bubble
/// them up uniformly.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum MarshalError {
    /// The value contains a shape that can never be encoded.
    #[error("value is not marshallable")]
    NotMarshallable,

    #[error("encode error: {0}")]
    Encode(String),

    #[error("decode error: {0}")]
    Decode(String),
}

///
/// Marshaller
///
/// Shared encode/decode capability. Wrappers hold a reference to one of
/// these rather than owning it; the capability outlives every wrapper
/// created through it.
///

pub trait Marshaller: Send + Sync {
    fn try_encode(&self, value: &Value) -> Result<Vec<u8>, MarshalError>;
    fn try_decode(&self, bytes: &[u8]) -> Result<Value, MarshalError>;
}

///
/// CborMarshaller
///

#[derive(Clone, Copy, Debug, Default)]
pub struct CborMarshaller;

impl Marshaller for CborMarshaller {
    fn try_encode(&self, value: &Value) -> Result<Vec<u8>, MarshalError> {
        if !value.is_marshallable() {
            return Err(MarshalError::NotMarshallable);
        }

        to_vec(value).map_err(|err| MarshalError::Encode(err.to_string()))
    }

    fn try_decode(&self, bytes: &[u8]) -> Result<Value, MarshalError> {
        from_slice(bytes).map_err(|err| MarshalError::Decode(err.to_string()))
    }
}

///
/// TESTS
///
