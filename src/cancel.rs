//! Cancellation scope for a single reconciliation pass
//!
//! Every store call made during a pass is raced against operator shutdown and
//! the pass deadline. Whichever fires first aborts the call with
//! [`Error::Cancelled`]; nothing is retried here.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::Error;

/// Shutdown signal plus deadline for one reconciliation
#[derive(Clone, Debug)]
pub struct ReconcileScope {
    token: CancellationToken,
    deadline: Instant,
}

impl ReconcileScope {
    /// Create a scope that ends at shutdown of `parent` or after `timeout`
    pub fn new(parent: &CancellationToken, timeout: Duration) -> Self {
        Self {
            token: parent.child_token(),
            deadline: Instant::now() + timeout,
        }
    }

    /// Run a store call, aborting it on cancellation or deadline
    pub async fn run<T, F>(&self, fut: F) -> Result<T, Error>
    where
        F: Future<Output = Result<T, Error>>,
    {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => Err(Error::cancelled("operator shutting down")),
            _ = tokio::time::sleep_until(self.deadline) => {
                Err(Error::cancelled("deadline exceeded"))
            }
            result = fut => result,
        }
    }
}
