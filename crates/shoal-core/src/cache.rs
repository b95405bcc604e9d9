use crate::{
    command::{
        Command, CommandError, Evict, GetKeyValue, LockRequest, PutKeyValue, PutMap, Remove,
        Replace,
    },
    config::CacheConfig,
    context::InvocationContext,
    entries::CacheEntry,
    error::Error,
    pipeline::PipelineStage,
    stage::{MarshallingStage, Response},
    store::MemoryStore,
    views::{ImmutableSeq, ImmutableSet},
};
use shoal_marshal::{CborMarshaller, Value};
use std::{sync::Arc, time::Duration};

///
/// Cache
///
/// The operation surface exposed to callers. Inputs and outputs are always
/// plain domain values; the marshalling stage's internal representation
/// changes are invisible except for their memory characteristics.
///

pub struct Cache {
    stage: MarshallingStage,
}

impl Cache {
    /// A cache backed by a fresh in-memory store.
    #[must_use]
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_next(config, Arc::new(MemoryStore::new()))
    }

    /// A cache configured from a TOML document, backed by a fresh in-memory
    /// store.
    pub fn from_toml(document: &str) -> Result<Self, Error> {
        let config = CacheConfig::from_toml(document)?;
        Ok(Self::new(&config))
    }

    /// A cache whose operations are forwarded into the given pipeline.
    pub fn with_next(config: &CacheConfig, next: Arc<dyn PipelineStage>) -> Self {
        config.apply();

        Self {
            stage: MarshallingStage::new(next, Arc::new(CborMarshaller), config.compaction),
        }
    }

    pub fn put(
        &self,
        ctx: &InvocationContext,
        key: Value,
        value: Value,
    ) -> Result<Option<Value>, Error> {
        self.put_with(ctx, key, value, None, None)
    }

    pub fn put_with(
        &self,
        ctx: &InvocationContext,
        key: Value,
        value: Value,
        lifespan: Option<Duration>,
        max_idle: Option<Duration>,
    ) -> Result<Option<Value>, Error> {
        let mut command = Command::PutKeyValue(PutKeyValue {
            key: Some(key.into()),
            value: Some(value.into()),
            lifespan,
            max_idle,
        });

        self.expect_value(ctx, &mut command)
    }

    /// Store every pair of the mapping. The caller's slice is copied, never
    /// touched.
    pub fn put_all(&self, ctx: &InvocationContext, pairs: &[(Value, Value)]) -> Result<(), Error> {
        let map = pairs
            .iter()
            .map(|(key, value)| (key.clone().into(), value.clone().into()))
            .collect();

        let mut command = Command::PutMap(PutMap {
            map: Some(map),
            lifespan: None,
            max_idle: None,
        });

        match self.stage.invoke(ctx, &mut command)? {
            Response::None => Ok(()),
            _ => Err(CommandError::InvalidReply.into()),
        }
    }

    pub fn get(&self, ctx: &InvocationContext, key: Value) -> Result<Option<Value>, Error> {
        let mut command = Command::GetKeyValue(GetKeyValue {
            key: Some(key.into()),
        });

        self.expect_value(ctx, &mut command)
    }

    pub fn remove(&self, ctx: &InvocationContext, key: Value) -> Result<Option<Value>, Error> {
        let mut command = Command::Remove(Remove {
            key: Some(key.into()),
        });

        self.expect_value(ctx, &mut command)
    }

    pub fn evict(&self, ctx: &InvocationContext, key: Value) -> Result<Option<Value>, Error> {
        let mut command = Command::Evict(Evict {
            key: Some(key.into()),
        });

        self.expect_value(ctx, &mut command)
    }

    /// Unconditionally replace an existing mapping, returning the previous
    /// value. Missing keys are left unmapped.
    pub fn replace(
        &self,
        ctx: &InvocationContext,
        key: Value,
        value: Value,
    ) -> Result<Option<Value>, Error> {
        let mut command = Command::Replace(Replace {
            key: Some(key.into()),
            old_value: None,
            new_value: value.into(),
        });

        self.expect_value(ctx, &mut command)
    }

    /// Compare-and-swap: replace only if the current value equals
    /// `expected`.
    pub fn replace_if(
        &self,
        ctx: &InvocationContext,
        key: Value,
        expected: Value,
        value: Value,
    ) -> Result<bool, Error> {
        let mut command = Command::Replace(Replace {
            key: Some(key.into()),
            old_value: Some(expected.into()),
            new_value: value.into(),
        });

        match self.stage.invoke(ctx, &mut command)? {
            Response::Value(Some(Value::Bool(swapped))) => Ok(swapped),
            Response::Value(None) => Ok(false),
            _ => Err(CommandError::InvalidReply.into()),
        }
    }

    pub fn lock(&self, ctx: &InvocationContext, keys: &[Value]) -> Result<bool, Error> {
        self.lock_control(ctx, keys, false)
    }

    pub fn unlock(&self, ctx: &InvocationContext, keys: &[Value]) -> Result<bool, Error> {
        self.lock_control(ctx, keys, true)
    }

    pub fn key_set(&self, ctx: &InvocationContext) -> Result<ImmutableSet<Value>, Error> {
        match self.stage.invoke(ctx, &mut Command::KeySet)? {
            Response::Keys(keys) => Ok(keys),
            _ => Err(CommandError::InvalidReply.into()),
        }
    }

    pub fn values(&self, ctx: &InvocationContext) -> Result<ImmutableSeq<Value>, Error> {
        match self.stage.invoke(ctx, &mut Command::Values)? {
            Response::Values(values) => Ok(values),
            _ => Err(CommandError::InvalidReply.into()),
        }
    }

    pub fn entry_set(&self, ctx: &InvocationContext) -> Result<ImmutableSet<CacheEntry>, Error> {
        match self.stage.invoke(ctx, &mut Command::EntrySet)? {
            Response::Entries(entries) => Ok(entries),
            _ => Err(CommandError::InvalidReply.into()),
        }
    }

    fn lock_control(
        &self,
        ctx: &InvocationContext,
        keys: &[Value],
        unlock: bool,
    ) -> Result<bool, Error> {
        let request = match keys {
            [single] => LockRequest::single(single.clone().into(), unlock),
            many => LockRequest::multi(many.iter().cloned().map(Into::into).collect(), unlock),
        };

        let mut command = Command::LockControl(request);

        match self.stage.invoke(ctx, &mut command)? {
            Response::Value(Some(Value::Bool(acquired))) => Ok(acquired),
            _ => Err(CommandError::InvalidReply.into()),
        }
    }

    fn expect_value(
        &self,
        ctx: &InvocationContext,
        command: &mut Command,
    ) -> Result<Option<Value>, Error> {
        match self.stage.invoke(ctx, command)? {
            Response::Value(previous) => Ok(previous),
            Response::None => Ok(None),
            _ => Err(CommandError::InvalidReply.into()),
        }
    }
}
