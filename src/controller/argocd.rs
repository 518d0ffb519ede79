//! ArgoCD reconciliation controller
//!
//! Each pass converges the configuration objects, the seed-once registries and
//! the server route of one ArgoCD instance. Objects are handled one at a time in
//! a fixed order; a failure on one object is recorded and the pass moves on, so
//! partial progress is kept and the rest is retried on the next pass.

use std::sync::Arc;

use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::cancel::ReconcileScope;
use crate::certs::{reconcile_registry, registry_seeds};
use crate::config::OperatorConfig;
use crate::config_map::{
    desired_argocd_cm, desired_rbac_cm, ARGOCD_CM_SCHEMA, ARGOCD_RBAC_CM_SCHEMA,
};
use crate::crd::{ArgoCD, ArgoCDPhase, ArgoCDStatus};
use crate::merge::{apply_config_map, ApplyOutcome};
use crate::route::{apply_route, resolve_termination, server_route_name};
use crate::sso::{resolve_dex_config, select_sso};
use crate::store::{KubeObjectStore, ObjectStore};
use crate::{Error, ARGOCD_CM, ARGOCD_RBAC_CM};

/// Controller context shared by every reconciliation
pub struct Context {
    /// Cluster store access (trait object for testability)
    pub store: Arc<dyn ObjectStore>,
    /// Operator-wide configuration
    pub config: OperatorConfig,
    /// Cancelled when the operator shuts down
    pub shutdown: CancellationToken,
}

impl Context {
    /// Create a context backed by a real Kubernetes client
    pub fn new(client: Client, config: OperatorConfig, shutdown: CancellationToken) -> Self {
        Self::with_store(Arc::new(KubeObjectStore::new(client)), config, shutdown)
    }

    /// Create a context over any store implementation
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        config: OperatorConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            config,
            shutdown,
        }
    }

    /// Start the scope of a new reconciliation pass
    pub fn scope(&self) -> ReconcileScope {
        ReconcileScope::new(&self.shutdown, self.config.reconcile_timeout)
    }
}

/// Result of converging one managed object
#[derive(Debug)]
pub struct ObjectReport {
    /// Object name
    pub object: String,
    /// What happened to it
    pub result: Result<ApplyOutcome, Error>,
}

/// Results of one reconciliation pass, in processing order
#[derive(Debug, Default)]
pub struct PassReport {
    /// Per-object results
    pub objects: Vec<ObjectReport>,
}

impl PassReport {
    fn record(&mut self, object: impl Into<String>, result: Result<ApplyOutcome, Error>) {
        let object = object.into();
        match &result {
            Ok(outcome) => debug!(object = %object, %outcome, "object reconciled"),
            Err(e) if e.is_dependency_not_ready() => {
                info!(object = %object, error = %e, "waiting on dependency")
            }
            Err(e) => warn!(object = %object, error = %e, "object failed to reconcile"),
        }
        self.objects.push(ObjectReport { object, result });
    }

    /// Returns true if the pass was cut short by cancellation
    pub fn cancelled(&self) -> bool {
        self.objects
            .iter()
            .any(|r| matches!(&r.result, Err(e) if e.is_cancelled()))
    }

    fn errors(&self) -> impl Iterator<Item = &Error> {
        self.objects.iter().filter_map(|r| r.result.as_ref().err())
    }

    /// First error that is not a missing dependency
    pub fn first_failure(&self) -> Option<&Error> {
        self.errors().find(|e| !e.is_dependency_not_ready())
    }

    /// First missing dependency
    pub fn first_pending(&self) -> Option<&Error> {
        self.errors().find(|e| e.is_dependency_not_ready())
    }

    /// Take the first error that is not a missing dependency
    pub fn into_failure(self) -> Option<Error> {
        self.objects.into_iter().find_map(|r| match r.result {
            Err(e) if !e.is_dependency_not_ready() => Some(e),
            _ => None,
        })
    }

    /// Phase and message this pass should leave on the resource
    pub fn status(&self) -> ArgoCDStatus {
        if let Some(e) = self.first_failure() {
            ArgoCDStatus::with_phase(ArgoCDPhase::Failed).message(e.to_string())
        } else if let Some(e) = self.first_pending() {
            ArgoCDStatus::with_phase(ArgoCDPhase::Pending).message(e.to_string())
        } else {
            ArgoCDStatus::with_phase(ArgoCDPhase::Available)
        }
    }
}

/// Converge every managed object of `argocd`
///
/// Stops early only when the scope is cancelled.
pub async fn reconcile_objects(
    argocd: &ArgoCD,
    ctx: &Context,
    scope: &ReconcileScope,
) -> PassReport {
    let store = ctx.store.as_ref();
    let mut report = PassReport::default();

    // argocd-cm is skipped while the SSO fragment cannot be resolved, so a
    // missing token never strips dex.config from the live object.
    let selection = select_sso(&argocd.spec, &ctx.config);
    let argocd_cm = async {
        let dex = resolve_dex_config(&selection, argocd, store, scope).await?;
        let desired = desired_argocd_cm(argocd, dex.as_deref())?;
        apply_config_map(store, scope, &desired, &ARGOCD_CM_SCHEMA)
            .await
            .map(|a| a.outcome)
    };
    report.record(ARGOCD_CM, argocd_cm.await);
    if report.cancelled() {
        return report;
    }

    match desired_rbac_cm(argocd) {
        Ok(desired) => {
            let result = apply_config_map(store, scope, &desired, &ARGOCD_RBAC_CM_SCHEMA)
                .await
                .map(|a| a.outcome);
            report.record(desired.name, result);
        }
        Err(e) => report.record(ARGOCD_RBAC_CM, Err(e)),
    }
    if report.cancelled() {
        return report;
    }

    match registry_seeds(argocd) {
        Ok(seeds) => {
            for seed in seeds {
                let result = reconcile_registry(store, scope, &seed)
                    .await
                    .map(|a| a.outcome);
                report.record(seed.name, result);
                if report.cancelled() {
                    return report;
                }
            }
        }
        Err(e) => report.record("registries", Err(e)),
    }

    let server = &argocd.spec.server;
    match resolve_termination(server.route.enabled, server.insecure) {
        Some(termination) => {
            let result = apply_route(store, scope, argocd, termination)
                .await
                .map(|a| a.outcome);
            report.record(server_route_name(&argocd.name_any()), result);
        }
        None => debug!("route disabled"),
    }

    report
}

/// Reconcile an ArgoCD instance
///
/// Returns `Ok` with a requeue when every object converged or only a
/// dependency is missing; returns the first failure otherwise so
/// [`error_policy`] can pick the retry interval.
#[instrument(
    skip(argocd, ctx),
    fields(argocd = %argocd.name_any(), namespace = ?argocd.namespace())
)]
pub async fn reconcile(argocd: Arc<ArgoCD>, ctx: Arc<Context>) -> Result<Action, Error> {
    info!("reconciling ArgoCD");
    let scope = ctx.scope();

    let report = reconcile_objects(&argocd, &ctx, &scope).await;
    if report.cancelled() {
        return Err(Error::cancelled("reconciliation aborted before all objects converged"));
    }

    update_status(&argocd, &ctx, &scope, report.status()).await;

    let pending = report.first_pending().is_some();
    if let Some(e) = report.into_failure() {
        return Err(e);
    }
    if pending {
        return Ok(Action::requeue(ctx.config.dependency_retry_interval));
    }

    info!("ArgoCD converged");
    Ok(Action::requeue(ctx.config.resync_interval))
}

/// Patch the status subresource unless phase, message and generation are unchanged
///
/// Failures are logged; they never fail the pass.
async fn update_status(
    argocd: &ArgoCD,
    ctx: &Context,
    scope: &ReconcileScope,
    status: ArgoCDStatus,
) {
    let mut status = status.observed_generation(argocd.metadata.generation);
    if let Some(current) = &argocd.status {
        if current.same_state(&status) {
            debug!("status unchanged, skipping update");
            return;
        }
    }

    let Some(namespace) = argocd.namespace() else {
        warn!("ArgoCD has no namespace, cannot patch status");
        return;
    };

    status.last_reconciled = Some(chrono::Utc::now().to_rfc3339());

    let phase = status.phase.clone();
    match scope
        .run(
            ctx.store
                .patch_argocd_status(&namespace, &argocd.name_any(), &status),
        )
        .await
    {
        Ok(()) => info!(%phase, "status updated"),
        Err(e) => warn!(error = %e, "failed to update status"),
    }
}

/// Pick the requeue interval for a failed reconciliation
pub fn error_policy(argocd: Arc<ArgoCD>, error: &Error, ctx: Arc<Context>) -> Action {
    if !error.is_retryable() {
        error!(
            argocd = %argocd.name_any(),
            ?error,
            "reconciliation failed permanently, waiting for a change"
        );
        return Action::await_change();
    }

    let config = &ctx.config;
    let delay = if error.is_conflict() {
        config.conflict_retry_interval
    } else if error.is_dependency_not_ready() {
        config.dependency_retry_interval
    } else {
        config.error_retry_interval
    };

    if error.is_conflict() || error.is_cancelled() {
        warn!(argocd = %argocd.name_any(), error = %error, ?delay, "reconciliation interrupted");
    } else {
        error!(argocd = %argocd.name_any(), ?error, ?delay, "reconciliation failed");
    }

    Action::requeue(delay)
}
