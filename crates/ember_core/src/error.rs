//! # Lifecycle Error Types
//!
//! All errors that can occur while allocating ids, registering resources or
//! driving them through their lifecycle.

use thiserror::Error;

/// Errors surfaced by the allocator, the registry and lifecycle objects.
///
/// Every misuse is reported synchronously. Double frees and double
/// unregisters are errors, not tolerated no-ops.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// A required argument was empty, out of range, or already consumed
    /// (empty callback, double free, double unregister).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The call is not allowed in the current context (wrong thread,
    /// released object).
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// The id or object is not currently tracked.
    #[error("not found: {0}")]
    NotFound(String),

    /// Every id in the `u32` space has been handed out.
    #[error("id space exhausted: {outstanding} ids outstanding")]
    IdSpaceExhausted {
        /// Number of ids allocated when the request failed.
        outstanding: usize,
    },
}

impl LifecycleError {
    /// Returns true for [`LifecycleError::InvalidArgument`].
    #[must_use]
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns true for [`LifecycleError::PreconditionViolation`].
    #[must_use]
    pub const fn is_precondition_violation(&self) -> bool {
        matches!(self, Self::PreconditionViolation(_))
    }

    /// Returns true for [`LifecycleError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Errors raised while loading an [`EngineConfig`](crate::config::EngineConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML or does not match the schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is outside its allowed range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = LifecycleError::InvalidArgument("id 7 is not allocated".into());
        assert_eq!(err.to_string(), "invalid argument: id 7 is not allocated");

        let err = LifecycleError::IdSpaceExhausted { outstanding: 3 };
        assert_eq!(err.to_string(), "id space exhausted: 3 ids outstanding");
    }

    #[test]
    fn test_error_kind_predicates() {
        assert!(LifecycleError::NotFound(String::new()).is_not_found());
        assert!(LifecycleError::PreconditionViolation(String::new()).is_precondition_violation());
        assert!(!LifecycleError::NotFound(String::new()).is_invalid_argument());
    }
}
