//! Error types for interception and dispatch

use crate::operation::OperationKey;
use std::fmt;
use thiserror::Error;

/// Which hook slot raised an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Before,
    Replace,
    After,
}

impl fmt::Display for HookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HookKind::Before => "before",
            HookKind::Replace => "replace",
            HookKind::After => "after",
        };
        f.write_str(name)
    }
}

/// Errors raised by the dispatch table and by interceptors
#[derive(Debug, Error)]
pub enum InterceptError {
    /// `install()` on an interceptor that is already installed
    #[error("Interceptor for {key} is already installed")]
    AlreadyInstalled { key: OperationKey },

    /// The operation is not defined on the target type
    #[error("Operation {key} not found")]
    TargetNotFound { key: OperationKey },

    /// A different interceptor already owns this operation
    #[error("Operation {key} is already intercepted by another interceptor")]
    TargetAlreadyIntercepted { key: OperationKey },

    /// `define` on an operation that already has an implementation
    #[error("Operation {key} is already defined")]
    DuplicateOperation { key: OperationKey },

    /// A before/replace/after hook returned an error
    #[error("{hook} hook for {key} failed: {source}")]
    HookExecution {
        key: OperationKey,
        hook: HookKind,
        #[source]
        source: anyhow::Error,
    },

    /// The original (or replaced) implementation failed; the inner error is
    /// exactly what the implementation returned
    #[error(transparent)]
    Operation(anyhow::Error),
}

impl InterceptError {
    /// Recover the error type carried through an implementation boundary.
    ///
    /// Implementations return `anyhow::Result`, so hook failures travel as
    /// boxed `InterceptError`s and everything else is an operation failure.
    pub(crate) fn from_operation(err: anyhow::Error) -> Self {
        match err.downcast::<InterceptError>() {
            Ok(intercept) => intercept,
            Err(other) => InterceptError::Operation(other),
        }
    }

    pub fn is_hook_failure(&self) -> bool {
        matches!(self, InterceptError::HookExecution { .. })
    }
}

pub type Result<T> = std::result::Result<T, InterceptError>;
