//! Tree manager configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{NestError, NestResult};

/// Configuration for one tree manager.
///
/// # Example
///
/// ```rust
/// use nestset_common::config::TreeConfig;
///
/// let config = TreeConfig::default();
/// assert_eq!(config.lock_timeout_ms, 30_000);
/// assert!(!config.verify_after_mutation);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Label attached to log records.
    #[serde(default = "default_name")]
    pub name: String,

    /// How long an operation waits for its tree locks.
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,

    /// Run the consistency verifier over the forest after every mutation.
    #[serde(default)]
    pub verify_after_mutation: bool,
}

fn default_name() -> String {
    "tree".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    30_000
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            lock_timeout_ms: default_lock_timeout_ms(),
            verify_after_mutation: false,
        }
    }
}

impl TreeConfig {
    /// Creates a new default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a configuration for tests: verification on, short lock wait.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            name: "test".to_string(),
            lock_timeout_ms: 1_000,
            verify_after_mutation: true,
        }
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> NestResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| NestError::InvalidConfig {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> NestResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Saves configuration to a file.
    pub fn save(&self, path: &Path) -> NestResult<()> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Converts configuration to TOML string.
    pub fn to_toml(&self) -> NestResult<String> {
        toml::to_string_pretty(self).map_err(|e| NestError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Validates the configuration.
    pub fn validate(&self) -> NestResult<()> {
        if self.name.trim().is_empty() {
            return Err(NestError::InvalidConfig {
                message: "name must not be empty".to_string(),
            });
        }
        if self.lock_timeout_ms == 0 {
            return Err(NestError::InvalidConfig {
                message: "lock_timeout_ms must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Lock wait as a duration.
    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Creates a builder for configuration.
    #[must_use]
    pub fn builder() -> TreeConfigBuilder {
        TreeConfigBuilder::new()
    }
}

/// Builder for tree configuration.
#[derive(Debug, Default)]
pub struct TreeConfigBuilder {
    config: TreeConfig,
}

impl TreeConfigBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the log label.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the lock wait in milliseconds.
    #[must_use]
    pub fn lock_timeout_ms(mut self, ms: u64) -> Self {
        self.config.lock_timeout_ms = ms;
        self
    }

    /// Enables post-mutation verification.
    #[must_use]
    pub fn verify_after_mutation(mut self, enabled: bool) -> Self {
        self.config.verify_after_mutation = enabled;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TreeConfig {
        self.config
    }
}
