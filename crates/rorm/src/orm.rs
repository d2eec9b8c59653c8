use std::fmt;
use std::sync::Arc;

use rorm_store::HashStore;

use crate::config::OrmConfig;
use crate::context::Context;
use crate::error::OrmResult;
use crate::key::derive_key;
use crate::model::Model;
use crate::query::Query;

/// Entry point: a shared store handle plus engine configuration.
///
/// Cloning is cheap; clones share the store.
#[derive(Clone)]
pub struct Orm {
    store: Arc<dyn HashStore>,
    config: OrmConfig,
}

impl Orm {
    pub fn new(store: Arc<dyn HashStore>) -> Self {
        Self::with_config(store, OrmConfig::default())
    }

    pub fn with_config(store: Arc<dyn HashStore>, config: OrmConfig) -> Self {
        Self { store, config }
    }

    /// A fresh query with default options.
    pub fn query(&self) -> Query {
        Query::new(Arc::clone(&self.store), &self.config)
    }

    pub fn config(&self) -> &OrmConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn HashStore> {
        &self.store
    }

    /// A context carrying the configured operation timeout.
    pub fn context(&self) -> Context {
        Context::from_config(&self.config)
    }

    /// The identity key of `model`.
    pub fn key_of(&self, model: &dyn Model) -> OrmResult<String> {
        derive_key(model)
    }
}

impl fmt::Debug for Orm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orm").field("config", &self.config).finish()
    }
}
