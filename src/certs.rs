//! Seed-once registries
//!
//! The TLS certificate, GPG key and SSH known-hosts registries are seeded from
//! the spec when first created. After that the live object belongs to whoever
//! edits it: reconciliation never adds, changes or removes a key, and later
//! spec edits to the seed fields have no effect.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use kube::ResourceExt;
use tracing::{debug, info};

use crate::cancel::ReconcileScope;
use crate::crd::ArgoCD;
use crate::merge::{Applied, ApplyOutcome, DesiredConfigMap};
use crate::meta::{owner_reference, standard_labels};
use crate::store::ObjectStore;
use crate::{Error, ARGOCD_GPG_KEYS_CM, ARGOCD_SSH_KNOWN_HOSTS_CM, ARGOCD_TLS_CERTS_CM};

/// Data key of the SSH known-hosts registry
pub const SSH_KNOWN_HOSTS_KEY: &str = "ssh_known_hosts";

/// What a pass does with a seed-once registry
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryPlan {
    /// Registry is absent; create it from the seed
    Seed(ConfigMap),
    /// Registry exists; its contents are left alone
    Keep(ConfigMap),
}

/// Plan a seed-once registry
///
/// Only an absent registry is ever written.
pub fn plan_registry(seed: &DesiredConfigMap, live: Option<ConfigMap>) -> RegistryPlan {
    match live {
        None => RegistryPlan::Seed(seed.to_config_map()),
        Some(live) => RegistryPlan::Keep(live),
    }
}

/// Create the registry from its seed if it does not exist yet
pub async fn reconcile_registry(
    store: &dyn ObjectStore,
    scope: &ReconcileScope,
    seed: &DesiredConfigMap,
) -> Result<Applied<ConfigMap>, Error> {
    let live = scope
        .run(store.get_config_map(&seed.namespace, &seed.name))
        .await?;

    match plan_registry(seed, live) {
        RegistryPlan::Seed(cm) => {
            let object = scope
                .run(store.create_config_map(&seed.namespace, &cm))
                .await?;
            info!(registry = %seed.name, entries = seed.data.len(), "seeded registry");
            Ok(Applied {
                outcome: ApplyOutcome::Created,
                object,
            })
        }
        RegistryPlan::Keep(object) => {
            debug!(registry = %seed.name, "registry exists, leaving contents alone");
            Ok(Applied {
                outcome: ApplyOutcome::Unchanged,
                object,
            })
        }
    }
}

fn seed(
    argocd: &ArgoCD,
    name: &str,
    data: BTreeMap<String, String>,
) -> Result<DesiredConfigMap, Error> {
    Ok(DesiredConfigMap {
        name: name.to_string(),
        namespace: argocd.namespace().ok_or(Error::MissingNamespace)?,
        labels: standard_labels(name),
        owner: owner_reference(argocd),
        data,
    })
}

/// TLS certificate registry seeded from `tls.initialCerts`
pub fn tls_certs_seed(argocd: &ArgoCD) -> Result<DesiredConfigMap, Error> {
    seed(
        argocd,
        ARGOCD_TLS_CERTS_CM,
        argocd.spec.tls.initial_certs.clone(),
    )
}

/// GPG key registry, seeded empty
pub fn gpg_keys_seed(argocd: &ArgoCD) -> Result<DesiredConfigMap, Error> {
    seed(argocd, ARGOCD_GPG_KEYS_CM, BTreeMap::new())
}

/// SSH known-hosts registry seeded from `initialSSHKnownHosts`
pub fn ssh_known_hosts_seed(argocd: &ArgoCD) -> Result<DesiredConfigMap, Error> {
    let keys = &argocd.spec.initial_ssh_known_hosts.keys;
    let data = if keys.is_empty() {
        BTreeMap::new()
    } else {
        BTreeMap::from([(SSH_KNOWN_HOSTS_KEY.to_string(), keys.clone())])
    };
    seed(argocd, ARGOCD_SSH_KNOWN_HOSTS_CM, data)
}

/// Every seed-once registry of `argocd`, in reconcile order
pub fn registry_seeds(argocd: &ArgoCD) -> Result<Vec<DesiredConfigMap>, Error> {
    Ok(vec![
        tls_certs_seed(argocd)?,
        gpg_keys_seed(argocd)?,
        ssh_known_hosts_seed(argocd)?,
    ])
}
