//! Error types for the ArgoCD operator
//!
//! Errors fall into a small number of classes that the controller treats
//! differently: transient store failures are requeued, dependency-not-ready
//! is a soft wait, cancellation aborts the pass, and invariant violations
//! indicate a bug.

use thiserror::Error;

/// Main error type for ArgoCD reconciliation
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Kubernetes API error (network, server, or unexpected status)
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Optimistic-concurrency conflict: the object changed since it was read
    #[error("conflict writing {kind} {name}: object was modified concurrently")]
    Conflict {
        /// Kind of the object being written
        kind: String,
        /// Name of the object being written
        name: String,
    },

    /// A dependent object owned by another actor does not exist yet
    #[error("dependency not ready: {kind} {name}: {message}")]
    DependencyNotReady {
        /// Kind of the missing dependency
        kind: String,
        /// Name of the missing dependency
        name: String,
        /// What is missing
        message: String,
    },

    /// The reconciliation was cancelled by shutdown or its deadline
    #[error("reconciliation cancelled: {reason}")]
    Cancelled {
        /// Why the pass was aborted
        reason: String,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of what failed
        message: String,
        /// The resource kind being serialized (if known)
        kind: Option<String>,
    },

    /// A programming invariant was violated
    #[error("invariant violated: {message}")]
    Invariant {
        /// Description of the violated invariant
        message: String,
    },

    /// The ArgoCD resource has no namespace
    #[error("ArgoCD resource has no namespace")]
    MissingNamespace,
}

impl Error {
    /// Create a conflict error for the given object
    pub fn conflict(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Conflict {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a dependency-not-ready error
    pub fn dependency_not_ready(
        kind: impl Into<String>,
        name: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::DependencyNotReady {
            kind: kind.into(),
            name: name.into(),
            message: msg.into(),
        }
    }

    /// Create a cancellation error
    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled {
            reason: reason.into(),
        }
    }

    /// Create a serialization error with the given message
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: None,
        }
    }

    /// Create a serialization error with resource kind context
    pub fn serialization_for_kind(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Serialization {
            message: msg.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create an invariant violation error
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::Invariant {
            message: msg.into(),
        }
    }

    /// Map a kube error from a write, turning HTTP 409 into [`Error::Conflict`]
    pub fn from_write(kind: &str, name: &str, source: kube::Error) -> Self {
        match source {
            kube::Error::Api(ref ae) if ae.code == 409 => Self::conflict(kind, name),
            other => Self::Kube { source: other },
        }
    }

    /// Check if the control loop should retry this error on a later pass
    ///
    /// Serialization and invariant errors need a code or spec fix; everything
    /// else is expected to heal on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { .. } => true,
            Error::Conflict { .. } => true,
            Error::DependencyNotReady { .. } => true,
            Error::Cancelled { .. } => true,
            Error::Serialization { .. } => false,
            Error::Invariant { .. } => false,
            Error::MissingNamespace => false,
        }
    }

    /// Check if this is the soft "dependency not ready" condition
    pub fn is_dependency_not_ready(&self) -> bool {
        matches!(self, Error::DependencyNotReady { .. })
    }

    /// Check if this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }

    /// Check if this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }
}
