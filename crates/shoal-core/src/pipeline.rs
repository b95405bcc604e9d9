use crate::{
    command::Command, context::InvocationContext, entries::StoreEntry, error::Error,
    object::CacheObject,
};

///
/// Reply
///
/// Raw result returned by lower pipeline stages. Key/value slots may still
/// be in wrapped form here; the marshalling stage restores plain values
/// before anything reaches a caller.
///

#[derive(Clone, Debug)]
pub enum Reply {
    None,
    Value(Option<CacheObject>),
    Keys(Vec<CacheObject>),
    Values(Vec<CacheObject>),
    Entries(Vec<StoreEntry>),
}

///
/// PipelineStage
///
/// Forwarding contract between pipeline stages. A stage may rewrite the
/// command's key/value slots before passing it on; whatever failure the
/// next stage reports propagates unchanged.
///

pub trait PipelineStage: Send + Sync {
    fn forward(&self, ctx: &InvocationContext, command: &mut Command) -> Result<Reply, Error>;
}
