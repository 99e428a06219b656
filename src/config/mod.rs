//! Proxy configuration
//!
//! Configuration is applied in three layers, later layers winning:
//! 1. Built-in defaults
//! 2. An optional TOML file
//! 3. Explicit overrides (JSON object, e.g. from CLI flags)

mod layer;

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub use layer::{ConfigError, ConfigLayer};

/// Behavior switches for one proxy session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxyConfig {
    /// Reject inbound calls whose declared parameter count disagrees with
    /// the parameters actually present (default: true)
    pub strict_param_count: bool,

    /// Fetch and send init on the first exchange even if the peer never
    /// asked for it (default: true)
    pub eager_init: bool,

    /// Upper bound on queued calls written per exchange (default: unbounded)
    pub max_calls_per_exchange: Option<usize>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            strict_param_count: true,
            eager_init: true,
            max_calls_per_exchange: None,
        }
    }
}

impl ProxyConfig {
    /// Apply the TOML file at `path` (if given) and `overrides` on top of
    /// the defaults.
    ///
    /// A missing file is an error; pass `None` to skip the file layer.
    pub fn load(path: Option<&Path>, overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(path) = path {
            config.apply(ConfigLayer::from_toml_file(path)?);
            debug!(path = %path.display(), "loaded config file");
        }

        if let Some(overrides) = overrides {
            config.apply(ConfigLayer::from_json(overrides)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Overwrite every field the layer sets.
    pub fn apply(&mut self, layer: ConfigLayer) {
        if let Some(strict) = layer.strict_param_count {
            self.strict_param_count = strict;
        }
        if let Some(eager) = layer.eager_init {
            self.eager_init = eager;
        }
        if let Some(limit) = layer.max_calls_per_exchange {
            self.max_calls_per_exchange = limit;
        }
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_calls_per_exchange == Some(0) {
            return Err(ConfigError::Invalid(
                "max_calls_per_exchange must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
