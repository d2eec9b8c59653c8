//! Query engine: create, find, collection find, update and multi-field update.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use rorm_store::{HashRecord, HashStore, Pipeline, Reply, StoreError, SCAN_START};
use tracing::{debug, info, trace};

use crate::association;
use crate::codec::{Encoded, FieldValue};
use crate::config::OrmConfig;
use crate::context::Context;
use crate::error::{OrmError, OrmResult};
use crate::key::{belongs_to, derive_key};
use crate::mapper::{self, stage_encoded, unmarshal, MarshalOptions};
use crate::model::{Model, Record};
use crate::persist::PersistHandle;
use crate::schema::{FieldDescriptor, RecordSchema};
use crate::updates::FieldUpdates;

/// How a single-record lookup was satisfied.
#[derive(Debug)]
pub enum FindOutcome {
    /// The record was read from the store.
    Stored,
    /// The store had no data; the record was computed by its auto-load
    /// capability and is being written in the background.
    Loaded(PersistHandle),
}

impl FindOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, FindOutcome::Loaded(_))
    }

    pub fn into_persist(self) -> Option<PersistHandle> {
        match self {
            FindOutcome::Loaded(handle) => Some(handle),
            FindOutcome::Stored => None,
        }
    }
}

/// Query configuration plus the operations that run under it.
///
/// Built from [`Orm::query`](crate::Orm::query) and configured with the
/// builder methods; a query is cheap to clone and may be reused.
#[derive(Clone)]
pub struct Query {
    store: Arc<dyn HashStore>,
    pattern: Option<String>,
    association: bool,
    select: Vec<String>,
    expire: Option<Duration>,
    auto_load: bool,
    scan_count: usize,
    max_depth: usize,
}

impl Query {
    pub(crate) fn new(store: Arc<dyn HashStore>, config: &OrmConfig) -> Self {
        Self {
            store,
            pattern: None,
            association: false,
            select: Vec::new(),
            expire: config.default_expire(),
            auto_load: false,
            scan_count: config.scan_count.max(1),
            max_depth: config.max_association_depth,
        }
    }

    // ---- Configuration ----

    /// Glob pattern over keys for collection lookups.
    pub fn where_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Match every key of record type `R`.
    pub fn where_type<R: Record>(self) -> Self {
        self.where_pattern(R::record_schema().key_pattern())
    }

    /// Cascade writes and reads to nested records.
    pub fn association(mut self, enabled: bool) -> Self {
        self.association = enabled;
        self
    }

    /// Restrict single-record reads to the named fields. Repeated calls add
    /// to the list.
    pub fn select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Expiry applied to every record written by [`create`](Self::create).
    pub fn expire(mut self, ttl: Duration) -> Self {
        self.expire = Some(ttl);
        self
    }

    /// Fall back to the record's auto-load capability when no data is stored.
    pub fn auto_load(mut self, enabled: bool) -> Self {
        self.auto_load = enabled;
        self
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn selected(&self) -> &[String] {
        &self.select
    }

    fn marshal_options(&self) -> MarshalOptions {
        MarshalOptions {
            association: self.association,
            ttl: self.expire,
        }
    }

    // ---- Writes ----

    /// Write every stored field of `model` in one pipeline.
    ///
    /// With association enabled, nested records are written under their own
    /// keys in the same pipeline. The pipeline is not atomic across keys.
    pub async fn create(&self, ctx: &Context, model: &dyn Model) -> OrmResult<()> {
        let mut pipe = Pipeline::new();
        let key = mapper::marshal_into(&mut pipe, model, self.marshal_options())?;
        self.execute(ctx, &pipe).await?;
        debug!(key = %key, commands = pipe.len(), "record created");
        Ok(())
    }

    /// Write one field of an existing record.
    ///
    /// The field name is checked against the record type before any store
    /// call; fields tagged `-` are not writable. The record must already
    /// exist. A `None` value removes the stored field.
    pub async fn update<V: FieldValue>(
        &self,
        ctx: &Context,
        model: &dyn Model,
        field: &str,
        value: V,
    ) -> OrmResult<()> {
        let key = derive_key(model)?;
        let descriptor = writable_field(model.schema(), field)?;

        let encoded = value.encode().map_err(|e| OrmError::codec(field, e))?;
        let mut pipe = Pipeline::new();
        self.stage_update(&mut pipe, &key, descriptor, encoded, value.as_model())?;

        self.require_exists(ctx, &key).await?;
        self.write_staged(ctx, &key, &pipe).await
    }

    /// Write several fields of an existing record in one pipeline.
    ///
    /// Every name is checked before any store call; one unknown or
    /// non-writable name stages nothing.
    pub async fn updates(
        &self,
        ctx: &Context,
        model: &dyn Model,
        updates: &FieldUpdates,
    ) -> OrmResult<()> {
        let key = derive_key(model)?;
        let schema = model.schema();
        let mut pipe = Pipeline::new();
        for (name, value) in updates.iter() {
            let descriptor = writable_field(schema, name)?;
            let encoded = value
                .encode_value()
                .map_err(|e| OrmError::codec(name, e))?;
            self.stage_update(&mut pipe, &key, descriptor, encoded, value.nested())?;
        }

        self.require_exists(ctx, &key).await?;
        self.write_staged(ctx, &key, &pipe).await
    }

    fn stage_update(
        &self,
        pipe: &mut Pipeline,
        key: &str,
        descriptor: &FieldDescriptor,
        encoded: Encoded,
        nested: Option<&dyn Model>,
    ) -> OrmResult<()> {
        match encoded {
            Encoded::Null => {
                pipe.hdel(key, descriptor.name);
                Ok(())
            }
            encoded => stage_encoded(pipe, key, descriptor, encoded, nested, self.marshal_options()),
        }
    }

    async fn write_staged(&self, ctx: &Context, key: &str, pipe: &Pipeline) -> OrmResult<()> {
        if pipe.is_empty() {
            debug!(key, "update staged no writes");
            return Ok(());
        }
        self.execute(ctx, pipe).await?;
        debug!(key, fields = pipe.write_count(), "record updated");
        Ok(())
    }

    // ---- Reads ----

    /// Whether the store holds data for `model`'s key.
    pub async fn exists(&self, ctx: &Context, model: &dyn Model) -> OrmResult<bool> {
        let key = derive_key(model)?;
        ctx.run(self.store.exists(&key)).await
    }

    /// Load the record addressed by `model`'s primary fields into `model`.
    ///
    /// Fails with [`OrmError::DataNotFound`] when nothing is stored and
    /// auto-load is disabled or unavailable for the type.
    pub async fn find(&self, ctx: &Context, model: &mut dyn Model) -> OrmResult<FindOutcome> {
        check_select(model.schema(), &self.select)?;
        let key = derive_key(model)?;

        let hash = self.fetch(ctx, &key).await?;
        let outcome = if hash.is_empty() {
            FindOutcome::Loaded(self.load_missing(ctx, model, key).await?)
        } else {
            unmarshal(&hash, model)?;
            trace!(key = %key, fields = hash.len(), "record loaded");
            FindOutcome::Stored
        };

        if self.association {
            association::resolve(self.store.as_ref(), ctx, model, self.max_depth).await?;
        }
        Ok(outcome)
    }

    async fn fetch(&self, ctx: &Context, key: &str) -> OrmResult<HashRecord> {
        if self.select.is_empty() {
            return ctx.run(self.store.hget_all(key)).await;
        }
        let mut hash = HashRecord::with_capacity(self.select.len());
        for field in &self.select {
            if let Some(value) = ctx.run(self.store.hget(key, field)).await? {
                hash.insert(field.clone(), value);
            }
        }
        Ok(hash)
    }

    async fn load_missing(
        &self,
        ctx: &Context,
        model: &mut dyn Model,
        key: String,
    ) -> OrmResult<PersistHandle> {
        if !self.auto_load {
            return Err(OrmError::DataNotFound(key));
        }
        match model.auto_load() {
            None => return Err(OrmError::DataNotFound(key)),
            Some(Err(e)) => return Err(OrmError::Load(e.to_string())),
            Some(Ok(())) => {}
        }

        let mut pipe = Pipeline::new();
        let key = mapper::marshal_into(&mut pipe, model, self.marshal_options())?;
        info!(key = %key, "record computed by auto-load; persisting in background");
        Ok(PersistHandle::spawn(
            Arc::clone(&self.store),
            ctx.clone(),
            key,
            pipe,
        ))
    }

    /// Load every record of type `M` whose key matches the query pattern.
    pub async fn find_all<M: Record>(&self, ctx: &Context) -> OrmResult<Vec<M>> {
        let mut records = Vec::new();
        self.find_all_into(ctx, &mut records).await?;
        Ok(records)
    }

    /// Append every record of type `M` whose key matches the query pattern to
    /// `out`, in scan order, and return how many were appended.
    ///
    /// Matching keys of other record types are ignored, as are keys whose
    /// data vanished between the scan and the fetch. All hashes are read in
    /// one pipeline. The selection list does not apply here.
    pub async fn find_all_into<M: Record>(
        &self,
        ctx: &Context,
        out: &mut Vec<M>,
    ) -> OrmResult<usize> {
        let pattern = self
            .pattern
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(OrmError::EmptyPattern)?;
        let schema = M::record_schema();

        let scanned = self.scan_keys(ctx, pattern).await?;
        let total = scanned.len();
        let keys: Vec<String> = scanned
            .into_iter()
            .filter(|key| belongs_to(key, schema.type_name()))
            .collect();
        if keys.len() < total {
            debug!(
                pattern,
                ignored = total - keys.len(),
                type_name = schema.type_name(),
                "keys of other types ignored"
            );
        }
        if keys.is_empty() {
            return Ok(0);
        }

        let mut pipe = Pipeline::new();
        for key in &keys {
            pipe.hget_all(key.as_str());
        }
        let replies = self.execute(ctx, &pipe).await?;

        let mut appended = 0;
        for (key, reply) in keys.iter().zip(replies) {
            let hash = reply.into_hash()?;
            if hash.is_empty() {
                trace!(key = %key, "key vanished before fetch");
                continue;
            }
            let mut record = M::default();
            unmarshal(&hash, &mut record)?;
            if self.association {
                association::resolve(self.store.as_ref(), ctx, &mut record, self.max_depth)
                    .await?;
            }
            out.push(record);
            appended += 1;
        }
        debug!(pattern, appended, "collection loaded");
        Ok(appended)
    }

    /// Every distinct key matching `pattern`, in the order the scan returned them.
    async fn scan_keys(&self, ctx: &Context, pattern: &str) -> OrmResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor = SCAN_START;
        loop {
            let page = ctx
                .run(self.store.scan(cursor, pattern, self.scan_count))
                .await?;
            for key in page.keys {
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }
            if page.cursor == SCAN_START {
                break;
            }
            cursor = page.cursor;
        }
        trace!(pattern, found = keys.len(), "scan complete");
        Ok(keys)
    }

    async fn require_exists(&self, ctx: &Context, key: &str) -> OrmResult<()> {
        if ctx.run(self.store.exists(key)).await? {
            Ok(())
        } else {
            Err(OrmError::PrimaryKeyNotFound(key.to_string()))
        }
    }

    async fn execute(&self, ctx: &Context, pipe: &Pipeline) -> OrmResult<Vec<Reply>> {
        let replies = ctx.run(self.store.execute(pipe)).await?;
        if replies.len() != pipe.len() {
            return Err(StoreError::ReplyCount {
                expected: pipe.len(),
                actual: replies.len(),
            }
            .into());
        }
        Ok(replies)
    }
}

/// The descriptor of `name` if the field may be written by an update.
fn writable_field<'s>(schema: &'s RecordSchema, name: &str) -> OrmResult<&'s FieldDescriptor> {
    schema
        .field(name)
        .filter(|field| !field.directives.skip)
        .ok_or_else(|| OrmError::FieldNotExist(name.to_string()))
}

fn check_select(schema: &RecordSchema, select: &[String]) -> OrmResult<()> {
    match select.iter().find(|name| schema.field(name).is_none()) {
        Some(unknown) => Err(OrmError::FieldNotExist(unknown.clone())),
        None => Ok(()),
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("pattern", &self.pattern)
            .field("association", &self.association)
            .field("select", &self.select)
            .field("expire", &self.expire)
            .field("auto_load", &self.auto_load)
            .field("scan_count", &self.scan_count)
            .field("max_depth", &self.max_depth)
            .finish()
    }
}
