//! Pipeline stages owned by this crate.

pub mod marshalling;

mod unwrap;
mod wrapper_set;

pub use marshalling::{MarshallingStage, Response};
