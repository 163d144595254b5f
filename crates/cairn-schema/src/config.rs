use serde::{Deserialize, Serialize};

use crate::error::{SchemaError, SchemaResult};

/// Configuration for file and directory readers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Maximum number of nested `bytesRef` hops followed while reading a
    /// file. Deeper part graphs fail with `RecursionLimit`.
    pub max_bytes_depth: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self { max_bytes_depth: 32 }
    }
}

impl ReaderConfig {
    /// Parse and validate a TOML document, e.g. `max_bytes_depth = 8`.
    /// Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> SchemaResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| SchemaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Override the nesting limit.
    pub fn with_max_bytes_depth(mut self, depth: usize) -> Self {
        self.max_bytes_depth = depth;
        self
    }

    pub fn validate(&self) -> SchemaResult<()> {
        if self.max_bytes_depth == 0 {
            return Err(SchemaError::Config("max_bytes_depth must be at least 1".into()));
        }
        Ok(())
    }
}
