//! Runtime configuration, layered from an optional file and the
//! environment (`BREZZA_*`, `__` as section separator).

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::cache::CacheConfig;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    /// Template for suggested post names. `%Y %m %d %H %M %S` expand to the
    /// zero-padded current UTC time, `$USER` to the requesting user.
    pub default_postname: String,
    /// Number of posts per listing page when the caller does not say.
    pub num_items_front: u32,
    pub cache: CacheConfig,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            default_postname: String::new(),
            num_items_front: 20,
            cache: CacheConfig::default(),
        }
    }
}

impl BlogConfig {
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path));
        }
        builder
            .add_source(Environment::with_prefix("BREZZA").separator("__"))
            .build()?
            .try_deserialize()
    }
}
