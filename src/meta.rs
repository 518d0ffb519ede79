//! Metadata shared by every object the operator creates

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};

use crate::crd::ArgoCD;
use crate::{LABEL_MANAGED_BY, LABEL_NAME, LABEL_PART_OF, MANAGED_BY_VALUE, PART_OF_VALUE};

/// Standard labels for a managed object named `name`
pub fn standard_labels(name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (LABEL_NAME.to_string(), name.to_string()),
        (LABEL_PART_OF.to_string(), PART_OF_VALUE.to_string()),
        (LABEL_MANAGED_BY.to_string(), MANAGED_BY_VALUE.to_string()),
    ])
}

/// Controller owner reference pointing at `argocd`
///
/// `None` until the API server has assigned a UID.
pub fn owner_reference(argocd: &ArgoCD) -> Option<OwnerReference> {
    let uid = argocd.uid()?;
    Some(OwnerReference {
        api_version: ArgoCD::api_version(&()).to_string(),
        kind: ArgoCD::kind(&()).to_string(),
        name: argocd.name_any(),
        uid,
        controller: Some(true),
        block_owner_deletion: Some(true),
    })
}
