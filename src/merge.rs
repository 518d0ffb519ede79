//! Merge & apply engine for schema-owned configuration objects
//!
//! The engine is authoritative for a fixed set of keys declared by a
//! [`KeySchema`]. On every pass:
//! - an absent object is created with exactly the desired data,
//! - a present object gets every desired key written over it, every owned key
//!   the spec no longer emits removed, and every foreign key left untouched,
//! - nothing is written when the merged result equals the live data.
//!
//! The engine keeps no state between calls and never retries; a stale write
//! comes back as [`Error::Conflict`] for the control loop to requeue.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use tracing::{debug, info};

use crate::cancel::ReconcileScope;
use crate::store::ObjectStore;
use crate::Error;

/// The set of keys an engine is authoritative for
///
/// A key is owned if it is listed exactly or starts with one of the prefixes.
#[derive(Clone, Copy, Debug)]
pub struct KeySchema {
    keys: &'static [&'static str],
    prefixes: &'static [&'static str],
}

impl KeySchema {
    /// Declare a schema from exact keys and key prefixes
    pub const fn new(keys: &'static [&'static str], prefixes: &'static [&'static str]) -> Self {
        Self { keys, prefixes }
    }

    /// Returns true if this schema claims `key`
    pub fn owns(&self, key: &str) -> bool {
        self.keys.contains(&key) || self.prefixes.iter().any(|p| key.starts_with(p))
    }
}

/// Desired state of a managed ConfigMap
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DesiredConfigMap {
    /// Object name
    pub name: String,
    /// Object namespace
    pub namespace: String,
    /// Labels set at creation
    pub labels: BTreeMap<String, String>,
    /// Owner reference set at creation
    pub owner: Option<OwnerReference>,
    /// Desired data
    pub data: BTreeMap<String, String>,
}

impl DesiredConfigMap {
    /// Build the object to create when nothing exists yet
    pub fn to_config_map(&self) -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(self.namespace.clone()),
                labels: (!self.labels.is_empty()).then(|| self.labels.clone()),
                owner_references: self.owner.clone().map(|o| vec![o]),
                ..Default::default()
            },
            data: Some(self.data.clone()),
            ..Default::default()
        }
    }
}

/// What an apply call did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The object did not exist and was created
    Created,
    /// The object existed and was rewritten
    Updated,
    /// The object already matched; no write was issued
    Unchanged,
}

impl std::fmt::Display for ApplyOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Updated => write!(f, "updated"),
            Self::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Result of applying a desired object
#[derive(Clone, Debug, PartialEq)]
pub struct Applied<T> {
    /// What happened
    pub outcome: ApplyOutcome,
    /// The object as it now exists in the store
    pub object: T,
}

/// Planned write for one ConfigMap
#[derive(Clone, Debug, PartialEq)]
pub enum Plan {
    /// Create this object
    Create(ConfigMap),
    /// Replace the live object with this one
    Update(ConfigMap),
    /// The live object already matches
    Unchanged(ConfigMap),
}

/// Merge desired data over live data under `schema`
///
/// Owned keys follow `desired` exactly; unowned keys keep their live values.
pub fn merge_owned(
    live: &BTreeMap<String, String>,
    desired: &BTreeMap<String, String>,
    schema: &KeySchema,
) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = live
        .iter()
        .filter(|(k, _)| !schema.owns(k))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    merged.extend(desired.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Compute the write needed to converge `live` onto `desired`
///
/// Fails with [`Error::Invariant`] if `desired` carries a key its schema does
/// not claim; such a key could never be removed again.
pub fn plan(
    desired: &DesiredConfigMap,
    live: Option<ConfigMap>,
    schema: &KeySchema,
) -> Result<Plan, Error> {
    if let Some(stray) = desired.data.keys().find(|k| !schema.owns(k)) {
        return Err(Error::invariant(format!(
            "{} emits key {stray:?} outside its schema",
            desired.name
        )));
    }

    let Some(mut live) = live else {
        return Ok(Plan::Create(desired.to_config_map()));
    };

    let current = live.data.clone().unwrap_or_default();
    let merged = merge_owned(&current, &desired.data, schema);
    if merged == current {
        return Ok(Plan::Unchanged(live));
    }

    live.data = Some(merged);
    Ok(Plan::Update(live))
}

/// Converge one schema-owned ConfigMap
pub async fn apply_config_map(
    store: &dyn ObjectStore,
    scope: &ReconcileScope,
    desired: &DesiredConfigMap,
    schema: &KeySchema,
) -> Result<Applied<ConfigMap>, Error> {
    let namespace = desired.namespace.as_str();
    let live = scope
        .run(store.get_config_map(namespace, &desired.name))
        .await?;

    match plan(desired, live, schema)? {
        Plan::Create(cm) => {
            let object = scope.run(store.create_config_map(namespace, &cm)).await?;
            info!(configmap = %desired.name, keys = desired.data.len(), "created ConfigMap");
            Ok(Applied {
                outcome: ApplyOutcome::Created,
                object,
            })
        }
        Plan::Update(cm) => {
            let object = scope.run(store.replace_config_map(namespace, &cm)).await?;
            info!(configmap = %desired.name, "updated ConfigMap");
            Ok(Applied {
                outcome: ApplyOutcome::Updated,
                object,
            })
        }
        Plan::Unchanged(object) => {
            debug!(configmap = %desired.name, "ConfigMap up to date");
            Ok(Applied {
                outcome: ApplyOutcome::Unchanged,
                object,
            })
        }
    }
}
