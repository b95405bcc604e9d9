//! Node-local marshalling layer for a replicated key-value cache.
//!
//! Every cache operation is intercepted on its way down the pipeline:
//! eligible keys and values are replaced with lazily-marshalled,
//! dual-representation wrappers, the rewritten command is forwarded toward
//! replication/storage, the wrappers are compacted, and plain values are
//! restored on the way back out. Callers never observe wrapper objects.

pub mod cache;
pub mod command;
pub mod config;
pub mod context;
pub mod entries;
pub mod error;
pub mod log;
pub mod object;
pub mod pipeline;
pub mod stage;
pub mod store;
pub mod views;

pub use cache::Cache;
pub use config::CacheConfig;
pub use context::InvocationContext;
pub use error::Error;
pub use stage::{MarshallingStage, Response};

// the marshalling substrate, re-exported for embedders
pub use shoal_marshal::{CborMarshaller, MarshalError, MarshalledValue, Marshaller, Value};
