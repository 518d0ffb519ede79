//! ArgoCD Operator - converges ArgoCD resources into Argo CD configuration

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use futures::StreamExt;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::runtime::controller::Config as ControllerConfig;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use argocd_operator::config::{OperatorConfig, DEFAULT_RECONCILE_TIMEOUT};
use argocd_operator::controller::{error_policy, reconcile, Context};
use argocd_operator::crd::ArgoCD;

/// Watch timeout; must stay below the API server's request timeout
const WATCH_TIMEOUT_SECS: u32 = 25;

/// ArgoCD operator - reconciles ArgoCD custom resources
#[derive(Parser, Debug)]
#[command(name = "argocd-operator", version, about, long_about = None)]
struct Cli {
    /// Print the ArgoCD CRD manifest and exit
    #[arg(long)]
    crd: bool,

    /// Never configure Dex, whatever the ArgoCD spec says
    #[arg(long, env = "DISABLE_DEX")]
    disable_dex: bool,

    /// Only watch this namespace (all namespaces when unset)
    #[arg(long, env = "WATCH_NAMESPACE")]
    watch_namespace: Option<String>,

    /// Deadline for a single reconciliation pass, in seconds
    #[arg(
        long,
        env = "RECONCILE_TIMEOUT_SECS",
        default_value_t = DEFAULT_RECONCILE_TIMEOUT.as_secs()
    )]
    reconcile_timeout_secs: u64,

    /// Maximum number of ArgoCD resources reconciled at once
    #[arg(long, env = "CONTROLLER_CONCURRENCY", default_value_t = 4)]
    concurrency: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if cli.crd {
        let crd = serde_yaml::to_string(&ArgoCD::crd())
            .map_err(|e| anyhow::anyhow!("Failed to serialize CRD: {}", e))?;
        println!("{crd}");
        return Ok(());
    }

    run_controller(cli).await
}

/// Run the ArgoCD controller until a shutdown signal arrives
async fn run_controller(cli: Cli) -> anyhow::Result<()> {
    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("failed to create kube client: {}", e))?;

    let config = OperatorConfig::default()
        .disable_dex(cli.disable_dex)
        .reconcile_timeout(Duration::from_secs(cli.reconcile_timeout_secs));

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let ctx = Arc::new(Context::new(client.clone(), config, shutdown));

    let (argocds, config_maps): (Api<ArgoCD>, Api<ConfigMap>) = match &cli.watch_namespace {
        Some(ns) => (
            Api::namespaced(client.clone(), ns),
            Api::namespaced(client.clone(), ns),
        ),
        None => (Api::all(client.clone()), Api::all(client)),
    };

    info!(
        namespace = cli.watch_namespace.as_deref().unwrap_or("*"),
        disable_dex = cli.disable_dex,
        concurrency = cli.concurrency,
        "starting ArgoCD controller"
    );

    Controller::new(
        argocds,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .owns(
        config_maps,
        WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS),
    )
    .with_config(ControllerConfig::default().concurrency(cli.concurrency))
    .shutdown_on_signal()
    .run(reconcile, error_policy, ctx)
    .for_each(log_reconcile_result("ArgoCD"))
    .await;

    info!("ArgoCD controller stopped");
    Ok(())
}

/// Cancel in-flight reconciliations on SIGINT or SIGTERM
async fn cancel_on_signal(shutdown: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "cannot listen for SIGTERM");
                let _ = ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }

    info!("shutdown signal received, cancelling reconciliations");
    shutdown.cancel();
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
