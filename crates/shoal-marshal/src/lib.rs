//! Marshalling substrate for the shoal cache.
//!
//! Owns the plain [`Value`] domain model, the shared [`Marshaller`] codec
//! capability, the [`MarshalledValue`] dual-representation holder, and the
//! type-exclusion policy that decides which values bypass wrapping.

pub mod codec;
pub mod exclude;
pub mod marshalled;
pub mod value;

pub use codec::{CborMarshaller, MarshalError, Marshaller};
pub use exclude::is_type_excluded;
pub use marshalled::MarshalledValue;
pub use value::Value;
