//! # Engine Configuration
//!
//! Explicit configuration passed to constructors. Loaded once at startup
//! from TOML; there is no global instance. [`EngineConfig::default`] is the
//! process-wide default an application may fall back to at its top level.
//!
//! ```toml
//! [registry]
//! first_handle = 1
//! affinity = "error"
//! expected_objects = 4096
//!
//! [fence]
//! spin_iterations = 64
//! poll_interval_us = 100
//! default_timeout_ms = 1000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// What happens when a render-thread-only call is made from another thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffinityPolicy {
    /// Log the violation and return `PreconditionViolation` to the caller.
    #[default]
    Error,
    /// Treat the violation as fatal and panic.
    Panic,
}

/// Configuration for the [`ResourceRegistry`](crate::lifecycle::ResourceRegistry).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// First handle issued to a registered object. Handle `0` is reserved for
    /// "unregistered", so this must be at least 1.
    pub first_handle: u32,
    /// Thread-affinity violation policy.
    pub affinity: AffinityPolicy,
    /// Capacity hint for the tracked-object table.
    pub expected_objects: usize,
}

impl RegistryConfig {
    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `first_handle` is the reserved
    /// null handle.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.first_handle == 0 {
            return Err(ConfigError::Invalid(
                "registry.first_handle must be >= 1 (0 means unregistered)".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            first_handle: 1,
            affinity: AffinityPolicy::Error,
            expected_objects: 1024,
        }
    }
}

/// Configuration for bounded fence waits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FenceConfig {
    /// Number of back-to-back checks before the waiter starts yielding.
    pub spin_iterations: u32,
    /// Sleep between polls once spinning is over (microseconds).
    pub poll_interval_us: u64,
    /// Timeout used by [`FenceWait::from_config`](crate::sync::FenceWait::from_config)
    /// (milliseconds).
    pub default_timeout_ms: u64,
}

impl FenceConfig {
    /// Poll interval as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_micros(self.poll_interval_us)
    }

    /// Default timeout as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for FenceConfig {
    fn default() -> Self {
        Self {
            spin_iterations: 64,
            poll_interval_us: 100,
            default_timeout_ms: 1000,
        }
    }
}

/// Top-level configuration for the lifecycle core.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Registry settings.
    pub registry: RegistryConfig,
    /// Fence wait settings.
    pub fence: FenceConfig,
}

impl EngineConfig {
    /// Parses and validates a configuration from TOML text.
    ///
    /// Missing tables and keys fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML and
    /// [`ConfigError::Invalid`] when a value is out of range.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise the
    /// same errors as [`EngineConfig::from_toml_str`].
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.registry.validate()?;
        if self.fence.default_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "fence.default_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.registry.first_handle, 1);
        assert_eq!(config.registry.affinity, AffinityPolicy::Error);
        assert_eq!(config.fence.poll_interval(), Duration::from_micros(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = EngineConfig::from_toml_str(
            r#"
            [registry]
            affinity = "panic"

            [fence]
            spin_iterations = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.registry.affinity, AffinityPolicy::Panic);
        assert_eq!(config.registry.first_handle, 1);
        assert_eq!(config.fence.spin_iterations, 8);
        assert_eq!(config.fence.default_timeout_ms, 1000);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(EngineConfig::from_toml_str("").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_rejects_zero_first_handle() {
        let err = EngineConfig::from_toml_str("[registry]\nfirst_handle = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_registry_config_rejects_null_handle() {
        let config = RegistryConfig {
            first_handle: 0,
            ..RegistryConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        assert!(RegistryConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_unknown_policy() {
        let err = EngineConfig::from_toml_str("[registry]\naffinity = \"ignore\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("ember_config_does_not_exist.toml");
        let err = EngineConfig::from_toml_file(path).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
