use crate::{
    command::{Command, CommandError, LockRequest},
    config::CompactionConfig,
    context::InvocationContext,
    entries::CacheEntry,
    error::Error,
    log::Topic,
    object::CacheObject,
    pipeline::{PipelineStage, Reply},
    stage::{unwrap, wrapper_set::MarshalledValueSet},
    views::{ImmutableSeq, ImmutableSet},
};
use shoal_marshal::{MarshalledValue, Marshaller, Value, is_type_excluded};
use std::{collections::HashMap, sync::Arc};

///
/// Response
///
/// What the marshalling stage returns upward: plain values and defensive
/// read-only views only. Wrapper objects never appear here.
///

#[derive(Clone, Debug)]
pub enum Response {
    None,
    Value(Option<Value>),
    Keys(ImmutableSet<Value>),
    Values(ImmutableSeq<Value>),
    Entries(ImmutableSet<CacheEntry>),
}

///
/// WrapPlan
///
/// Exit-side obligations recorded while wrapping a command's slots.
///

enum WrapPlan {
    /// Read collections: nothing wrapped on entry.
    None,

    /// Single-slot commands: each wrapper compacted once on exit.
    Single(Vec<MarshalledValue>),

    /// Get: the key wrapper, compacted before and after forwarding.
    Get(Option<MarshalledValue>),

    /// Bulk put: the per-call wrapper set, batch-compacted on exit.
    Bulk(MarshalledValueSet),

    /// Lock control: substituted keys carry no exit obligations.
    Lock,
}

///
/// MarshallingStage
///
/// Intercepts every cache operation, replaces eligible raw keys/values with
/// marshalled wrappers, forwards the rewritten command to the next pipeline
/// stage, compacts the wrappers it created, and restores plain values on
/// the way back out.
///
/// Runs synchronously on the calling thread and takes no cache-wide locks;
/// ordering between concurrent operations is entirely the next stages'
/// business.
///

pub struct MarshallingStage {
    next: Arc<dyn PipelineStage>,
    marshaller: Arc<dyn Marshaller>,
    compaction: CompactionConfig,
}

impl MarshallingStage {
    pub fn new(
        next: Arc<dyn PipelineStage>,
        marshaller: Arc<dyn Marshaller>,
        compaction: CompactionConfig,
    ) -> Self {
        Self {
            next,
            marshaller,
            compaction,
        }
    }

    /// Run one operation through wrap → forward → compact → unwrap.
    ///
    /// A validation or wrap failure aborts before anything is forwarded. A
    /// failure from the forwarded call propagates unchanged; the wrappers
    /// created for that call are abandoned without compaction.
    pub fn invoke(
        &self,
        ctx: &InvocationContext,
        command: &mut Command,
    ) -> Result<Response, Error> {
        let plan = self.wrap_command(ctx, command)?;

        let reply = self.next.forward(ctx, command)?;

        self.compact_plan(&plan);
        Self::process_reply(reply)
    }

    fn wrap_command(
        &self,
        ctx: &InvocationContext,
        command: &mut Command,
    ) -> Result<WrapPlan, Error> {
        match command {
            Command::PutKeyValue(put) => {
                let mut wrappers = Vec::with_capacity(2);

                let key = put.key.as_mut().ok_or(CommandError::NullKey)?;
                if let Some(mv) = self.wrap_slot(ctx, key)? {
                    wrappers.push(mv);
                }

                // an absent value is tolerated and forwarded as-is
                if let Some(value) = put.value.as_mut()
                    && let Some(mv) = self.wrap_slot(ctx, value)?
                {
                    wrappers.push(mv);
                }

                Ok(WrapPlan::Single(wrappers))
            }

            Command::PutMap(put) => {
                let mut set = MarshalledValueSet::new();
                let source = put.map.take().unwrap_or_default();

                crate::log!(
                    Topic::Marshalling,
                    Trace,
                    "wrapping {} map entries into a fresh copy",
                    source.len(),
                );

                let mut copy = Vec::with_capacity(source.len());
                for (key, value) in source {
                    let key = self.wrap_object(ctx, key, &mut set)?;
                    let value = self.wrap_object(ctx, value, &mut set)?;
                    copy.push((key, value));
                }
                put.map = Some(copy);

                Ok(WrapPlan::Bulk(set))
            }

            Command::Remove(remove) => {
                let key = remove.key.as_mut().ok_or(CommandError::NullKey)?;
                Ok(WrapPlan::Single(self.wrap_slot(ctx, key)?.into_iter().collect()))
            }

            Command::Evict(evict) => {
                let key = evict.key.as_mut().ok_or(CommandError::NullKey)?;
                Ok(WrapPlan::Single(self.wrap_slot(ctx, key)?.into_iter().collect()))
            }

            Command::Replace(replace) => {
                let mut wrappers = Vec::with_capacity(3);

                let key = replace.key.as_mut().ok_or(CommandError::NullKey)?;
                if let Some(mv) = self.wrap_slot(ctx, key)? {
                    wrappers.push(mv);
                }

                if let Some(mv) = self.wrap_slot(ctx, &mut replace.new_value)? {
                    wrappers.push(mv);
                }

                // an absent old value is never wrapped
                if let Some(old_value) = replace.old_value.as_mut()
                    && let Some(mv) = self.wrap_slot(ctx, old_value)?
                {
                    wrappers.push(mv);
                }

                Ok(WrapPlan::Single(wrappers))
            }

            Command::LockControl(request) => {
                self.wrap_lock_keys(ctx, request)?;
                Ok(WrapPlan::Lock)
            }

            Command::GetKeyValue(get) => {
                let key = get.key.as_mut().ok_or(CommandError::NullKey)?;
                let wrapper = self.wrap_slot(ctx, key)?;

                // trimmed immediately: lookups only need one representation
                if let Some(mv) = &wrapper {
                    self.compact(mv);
                }

                Ok(WrapPlan::Get(wrapper))
            }

            Command::KeySet | Command::Values | Command::EntrySet => Ok(WrapPlan::None),
        }
    }

    /// Wrap one command slot in place, returning the wrapper if one was
    /// created. Excluded types and already-wrapped slots pass through.
    fn wrap_slot(
        &self,
        ctx: &InvocationContext,
        slot: &mut CacheObject,
    ) -> Result<Option<MarshalledValue>, Error> {
        let CacheObject::Plain(value) = &*slot else {
            return Ok(None);
        };

        if is_type_excluded(value) {
            return Ok(None);
        }

        let mv = MarshalledValue::wrap(
            value.clone(),
            ctx.is_origin_local(),
            Arc::clone(&self.marshaller),
        )?;

        crate::log!(
            Topic::Marshalling,
            Trace,
            "wrapped a slot (origin_local={})",
            mv.is_origin_local(),
        );

        *slot = CacheObject::Marshalled(mv.clone());
        Ok(Some(mv))
    }

    /// Map-copy variant of [`wrap_slot`](Self::wrap_slot): owns its input,
    /// records created wrappers in the per-call set.
    fn wrap_object(
        &self,
        ctx: &InvocationContext,
        object: CacheObject,
        set: &mut MarshalledValueSet,
    ) -> Result<CacheObject, Error> {
        match object {
            CacheObject::Plain(value) if !is_type_excluded(&value) => {
                let mv = MarshalledValue::wrap(
                    value,
                    ctx.is_origin_local(),
                    Arc::clone(&self.marshaller),
                )?;
                set.insert(mv.clone());
                Ok(CacheObject::Marshalled(mv))
            }
            other => Ok(other),
        }
    }

    fn wrap_lock_keys(
        &self,
        ctx: &InvocationContext,
        request: &mut LockRequest,
    ) -> Result<(), Error> {
        if request.is_multi_key() {
            let mut mapping = HashMap::new();
            for key in request.keys() {
                if let CacheObject::Plain(value) = key
                    && !is_type_excluded(value)
                {
                    let mv = MarshalledValue::wrap(
                        value.clone(),
                        ctx.is_origin_local(),
                        Arc::clone(&self.marshaller),
                    )?;
                    mapping.insert(key.clone(), CacheObject::Marshalled(mv));
                }
            }

            if !mapping.is_empty() {
                request.replace_keys(&mapping);
            }

            return Ok(());
        }

        let Some(key) = request.keys().next().cloned() else {
            return Ok(());
        };

        if let CacheObject::Plain(value) = &key
            && !is_type_excluded(value)
        {
            let mv = MarshalledValue::wrap(
                value.clone(),
                ctx.is_origin_local(),
                Arc::clone(&self.marshaller),
            )?;
            request.replace_key(&key, CacheObject::Marshalled(mv))?;
        }

        Ok(())
    }

    fn compact_plan(&self, plan: &WrapPlan) {
        match plan {
            WrapPlan::None | WrapPlan::Lock | WrapPlan::Get(None) => {}

            WrapPlan::Single(wrappers) => {
                for mv in wrappers {
                    self.compact(mv);
                }
            }

            WrapPlan::Get(Some(mv)) => self.compact(mv),

            WrapPlan::Bulk(set) => {
                crate::log!(
                    Topic::Compaction,
                    Trace,
                    "compacting {} wrappers created for this call",
                    set.len(),
                );
                for mv in set.iter() {
                    self.compact(mv);
                }
            }
        }
    }

    fn compact(&self, mv: &MarshalledValue) {
        mv.compact(self.compaction.retain_decoded, self.compaction.retain_encoded);
    }

    fn process_reply(reply: Reply) -> Result<Response, Error> {
        match reply {
            Reply::None => Ok(Response::None),
            Reply::Value(None) => Ok(Response::Value(None)),

            Reply::Value(Some(object)) => {
                if object.is_marshalled() {
                    crate::log!(
                        Topic::Marshalling,
                        Trace,
                        "reply is a marshalled value; extracting the instance",
                    );
                }
                Ok(Response::Value(Some(object.into_value()?)))
            }

            Reply::Keys(keys) => Ok(Response::Keys(unwrap::unwrap_keys(keys)?)),
            Reply::Values(values) => Ok(Response::Values(unwrap::unwrap_values(values)?)),
            Reply::Entries(entries) => Ok(Response::Entries(unwrap::unwrap_entries(entries)?)),
        }
    }
}

///
/// TESTS
///
