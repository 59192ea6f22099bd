//! Error types for reactive evaluation and configuration.

use std::sync::Arc;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = ReactiveError> = std::result::Result<T, E>;

/// Errors surfaced when reading a computed value.
///
/// A computed node that fails with any of these stays dirty and keeps no
/// cached value, so the next read evaluates from scratch.
#[derive(Error, Debug, Clone)]
pub enum ReactiveError {
    /// A computation read its own output, directly or through a chain.
    ///
    /// `path` lists the nodes from the first occurrence of the repeated node
    /// to the read that closed the loop.
    #[error("cyclic dependency detected: {}", .path.join(" -> "))]
    CyclicDependency { path: Vec<String> },

    /// Nested evaluations went deeper than the runtime allows.
    #[error("evaluation depth limit of {limit} exceeded")]
    DepthExceeded { limit: usize },

    /// The computation itself failed.
    #[error("computation failed: {0}")]
    Compute(Arc<anyhow::Error>),
}

impl ReactiveError {
    /// Wrap any error raised by user code inside a computation.
    pub fn compute<E>(err: E) -> Self
    where
        E: Into<anyhow::Error>,
    {
        Self::Compute(Arc::new(err.into()))
    }

    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CyclicDependency { .. })
    }

    /// Attempts to downcast a computation failure to a specific type.
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
    {
        match self {
            Self::Compute(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ReactiveError {
    fn from(err: anyhow::Error) -> Self {
        Self::Compute(Arc::new(err))
    }
}

/// Errors from building or loading a [`RuntimeConfig`](crate::RuntimeConfig).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to parse runtime configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("max_depth must be at least 1")]
    ZeroDepth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error, PartialEq)]
    #[error("empty todo text")]
    struct EmptyText;

    #[test]
    fn cycle_message_joins_path() {
        let err = ReactiveError::CyclicDependency {
            path: vec!["a(#1)".into(), "b(#2)".into(), "a(#1)".into()],
        };
        assert!(err.is_cycle());
        assert_eq!(
            err.to_string(),
            "cyclic dependency detected: a(#1) -> b(#2) -> a(#1)"
        );
    }

    #[test]
    fn compute_errors_keep_their_source() {
        let err = ReactiveError::compute(EmptyText);
        assert!(!err.is_cycle());
        assert_eq!(err.to_string(), "computation failed: empty todo text");
        assert_eq!(err.downcast_ref::<EmptyText>(), Some(&EmptyText));
    }

    #[test]
    fn anyhow_errors_convert_with_question_mark() {
        fn fails() -> Result<i32> {
            Err(anyhow::anyhow!("boom"))?
        }

        let err = fails().unwrap_err();
        assert!(matches!(err, ReactiveError::Compute(_)));
        assert_eq!(err.to_string(), "computation failed: boom");
    }
}
