//! Runtime Configuration
//!
//! A [`RuntimeConfig`] is fixed when a runtime is created. It can be built in
//! code or loaded from JSON; missing fields fall back to the defaults.
//!
//! ```rust
//! use refract_core::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_json(r#"{ "max_depth": 64 }"#).unwrap();
//! assert_eq!(config.max_depth, 64);
//! assert!(config.strict_writes);
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default bound on nested evaluations.
pub const DEFAULT_MAX_DEPTH: usize = 512;

/// Settings for one [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Maximum number of computations that may be evaluating at once, nested
    /// inside each other. Reads past this depth fail with
    /// [`ReactiveError::DepthExceeded`](crate::ReactiveError::DepthExceeded).
    pub max_depth: usize,

    /// Panic when a cell is written while a computed value is evaluating.
    /// When false the write is logged at `warn` level and performed.
    pub strict_writes: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            strict_writes: true,
        }
    }
}

impl RuntimeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn strict_writes(mut self, strict: bool) -> Self {
        self.strict_writes = strict;
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth == 0 {
            return Err(ConfigError::ZeroDepth);
        }
        Ok(())
    }
}
