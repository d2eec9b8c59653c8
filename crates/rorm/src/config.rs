use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{OrmError, OrmResult};

/// Tunables of the query engine.
///
/// Loaded from TOML; every key is optional:
///
/// ```toml
/// scan_count = 10
/// max_association_depth = 8
/// default_expire_secs = 3600
/// operation_timeout_ms = 5000
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrmConfig {
    /// Keys visited per scan call during collection queries.
    pub scan_count: usize,
    /// Deepest nesting association loading follows before reporting a cycle.
    pub max_association_depth: usize,
    /// Expiry applied to writes that do not set one.
    pub default_expire_secs: Option<u64>,
    /// Deadline of contexts built with [`Context::from_config`](crate::Context::from_config).
    pub operation_timeout_ms: Option<u64>,
}

impl Default for OrmConfig {
    fn default() -> Self {
        Self {
            scan_count: 10,
            max_association_depth: 8,
            default_expire_secs: None,
            operation_timeout_ms: None,
        }
    }
}

impl OrmConfig {
    pub fn from_toml_str(text: &str) -> OrmResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| OrmError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OrmError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> OrmResult<String> {
        toml::to_string_pretty(self).map_err(|e| OrmError::Config(e.to_string()))
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.scan_count == 0 {
            return Err(OrmError::Config("scan_count must be positive".into()));
        }
        if self.max_association_depth == 0 {
            return Err(OrmError::Config(
                "max_association_depth must be positive".into(),
            ));
        }
        if self.default_expire_secs == Some(0) {
            return Err(OrmError::Config(
                "default_expire_secs must be positive when set".into(),
            ));
        }
        if self.operation_timeout_ms == Some(0) {
            return Err(OrmError::Config(
                "operation_timeout_ms must be positive when set".into(),
            ));
        }
        Ok(())
    }

    pub fn default_expire(&self) -> Option<Duration> {
        self.default_expire_secs.map(Duration::from_secs)
    }

    pub fn operation_timeout(&self) -> Option<Duration> {
        self.operation_timeout_ms.map(Duration::from_millis)
    }
}
