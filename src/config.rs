//! Operator configuration
//!
//! Process-level switches are read once in `main` and threaded through the
//! controller context, so reconciliation logic never consults the environment.

use std::time::Duration;

/// Default deadline for a single reconciliation pass
pub const DEFAULT_RECONCILE_TIMEOUT: Duration = Duration::from_secs(60);
/// Default requeue interval after a converged pass (drift detection)
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(300);
/// Default requeue interval while waiting on a dependency
pub const DEFAULT_DEPENDENCY_RETRY: Duration = Duration::from_secs(10);
/// Default requeue interval after an optimistic-concurrency conflict
pub const DEFAULT_CONFLICT_RETRY: Duration = Duration::from_secs(1);
/// Default requeue interval after any other error
pub const DEFAULT_ERROR_RETRY: Duration = Duration::from_secs(30);

/// Configuration for the ArgoCD controller
#[derive(Clone, Debug, PartialEq)]
pub struct OperatorConfig {
    /// Suppress Dex entirely; `dex.config` is never emitted
    pub disable_dex: bool,
    /// Deadline applied to every reconciliation pass
    pub reconcile_timeout: Duration,
    /// Requeue interval after a converged pass
    pub resync_interval: Duration,
    /// Requeue interval while a dependency is not ready
    pub dependency_retry_interval: Duration,
    /// Requeue interval after a write conflict
    pub conflict_retry_interval: Duration,
    /// Requeue interval after other errors
    pub error_retry_interval: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            disable_dex: false,
            reconcile_timeout: DEFAULT_RECONCILE_TIMEOUT,
            resync_interval: DEFAULT_RESYNC_INTERVAL,
            dependency_retry_interval: DEFAULT_DEPENDENCY_RETRY,
            conflict_retry_interval: DEFAULT_CONFLICT_RETRY,
            error_retry_interval: DEFAULT_ERROR_RETRY,
        }
    }
}

impl OperatorConfig {
    /// Set the Dex disable switch and return self for chaining
    pub fn disable_dex(mut self, disable: bool) -> Self {
        self.disable_dex = disable;
        self
    }

    /// Set the reconcile deadline and return self for chaining
    pub fn reconcile_timeout(mut self, timeout: Duration) -> Self {
        self.reconcile_timeout = timeout;
        self
    }
}
