//! Argo CD server route
//!
//! The TLS termination and the backend port are a single unit: a route is
//! either `passthrough` to `https` or `edge` to `http`, and both fields are
//! always written in the same update.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::DynamicObject;
use kube::ResourceExt;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::cancel::ReconcileScope;
use crate::crd::route::{
    Route, RouteMetadata, RoutePort, RouteSpec, RouteTargetReference, TlsConfig, ROUTE_KIND,
};
use crate::crd::ArgoCD;
use crate::merge::{Applied, ApplyOutcome};
use crate::meta::{owner_reference, standard_labels};
use crate::store::ObjectStore;
use crate::Error;

/// Termination policy, plain-HTTP policy and backend port of a route
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RouteTermination {
    termination: &'static str,
    insecure_edge_policy: &'static str,
    target_port: &'static str,
}

impl RouteTermination {
    /// TLS passes through to the server's own HTTPS port
    pub const PASSTHROUGH: Self = Self {
        termination: "passthrough",
        insecure_edge_policy: "Redirect",
        target_port: "https",
    };

    /// TLS terminates at the router and traffic reaches the server over HTTP
    pub const EDGE: Self = Self {
        termination: "edge",
        insecure_edge_policy: "Redirect",
        target_port: "http",
    };

    /// Termination for a server that does or does not serve TLS itself
    pub fn for_server(insecure: bool) -> Self {
        if insecure {
            Self::EDGE
        } else {
            Self::PASSTHROUGH
        }
    }

    /// Termination type
    pub fn termination(&self) -> &'static str {
        self.termination
    }

    /// Policy for plain HTTP requests
    pub fn insecure_edge_policy(&self) -> &'static str {
        self.insecure_edge_policy
    }

    /// Named backend port
    pub fn target_port(&self) -> &'static str {
        self.target_port
    }

    /// Read the termination back from a route's `spec`
    ///
    /// `None` if the termination and port do not form a known pair.
    pub fn from_route_spec(spec: &Value) -> Option<Self> {
        let termination = spec.pointer("/tls/termination")?.as_str()?;
        let policy = spec.pointer("/tls/insecureEdgeTerminationPolicy")?.as_str()?;
        let port = spec.pointer("/port/targetPort")?.as_str()?;
        [Self::PASSTHROUGH, Self::EDGE].into_iter().find(|t| {
            t.termination == termination
                && t.insecure_edge_policy == policy
                && t.target_port == port
        })
    }

    fn tls_value(&self) -> Value {
        json!({
            "termination": self.termination,
            "insecureEdgeTerminationPolicy": self.insecure_edge_policy,
        })
    }

    fn port_value(&self) -> Value {
        json!({ "targetPort": self.target_port })
    }
}

/// Resolve the route termination, `None` when no route is wanted
pub fn resolve_termination(route_enabled: bool, insecure: bool) -> Option<RouteTermination> {
    route_enabled.then(|| RouteTermination::for_server(insecure))
}

/// Name of the server route and of the service it targets
pub fn server_route_name(argocd_name: &str) -> String {
    format!("{argocd_name}-server")
}

/// Route fields laid over the live route on every pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteOverlay {
    /// Labels merged into the route metadata
    pub labels: BTreeMap<String, String>,
    /// Annotations merged into the route metadata
    pub annotations: BTreeMap<String, String>,
    /// Hostname forced onto the route; left to the router when unset
    pub host: Option<String>,
}

fn desired_overlay(argocd: &ArgoCD, name: &str) -> RouteOverlay {
    let server = &argocd.spec.server;
    let mut labels = standard_labels(name);
    labels.extend(server.route.labels.clone());
    RouteOverlay {
        labels,
        annotations: server.route.annotations.clone(),
        host: server.host.clone().filter(|h| !h.is_empty()),
    }
}

/// Build the route to create when none exists
pub fn desired_route(argocd: &ArgoCD, termination: RouteTermination) -> Result<Route, Error> {
    let namespace = argocd.namespace().ok_or(Error::MissingNamespace)?;
    let name = server_route_name(&argocd.name_any());
    let overlay = desired_overlay(argocd, &name);

    Ok(Route::new(
        RouteMetadata {
            name: name.clone(),
            namespace,
            labels: overlay.labels,
            annotations: overlay.annotations,
            owner_references: owner_reference(argocd).into_iter().collect(),
        },
        RouteSpec {
            host: overlay.host,
            to: RouteTargetReference {
                kind: "Service".to_string(),
                name,
                weight: 100,
            },
            port: RoutePort {
                target_port: IntOrString::String(termination.target_port().to_string()),
            },
            tls: TlsConfig {
                termination: termination.termination().to_string(),
                insecure_edge_termination_policy: termination.insecure_edge_policy().to_string(),
            },
            wildcard_policy: "None".to_string(),
        },
    ))
}

/// Merge the desired termination and metadata onto a live route
///
/// Returns `None` when the live route already matches. Fields this operator
/// does not manage are carried over untouched; `spec.host` is only managed
/// while the overlay names a host.
pub fn merge_route(
    live: &DynamicObject,
    termination: RouteTermination,
    overlay: &RouteOverlay,
) -> Result<Option<DynamicObject>, Error> {
    let mut updated = live.clone();

    updated
        .metadata
        .labels
        .get_or_insert_with(BTreeMap::new)
        .extend(overlay.labels.clone());
    if !overlay.annotations.is_empty() {
        updated
            .metadata
            .annotations
            .get_or_insert_with(BTreeMap::new)
            .extend(overlay.annotations.clone());
    }

    if !updated.data.is_object() {
        updated.data = Value::Object(Map::new());
    }
    let spec = updated
        .data
        .as_object_mut()
        .ok_or_else(|| Error::serialization_for_kind(ROUTE_KIND, "route is not an object"))?
        .entry("spec")
        .or_insert_with(|| Value::Object(Map::new()));
    let spec = spec
        .as_object_mut()
        .ok_or_else(|| Error::serialization_for_kind(ROUTE_KIND, "spec is not an object"))?;
    spec.insert("tls".to_string(), termination.tls_value());
    spec.insert("port".to_string(), termination.port_value());
    if let Some(host) = &overlay.host {
        spec.insert("host".to_string(), Value::String(host.clone()));
    }

    if RouteTermination::from_route_spec(&updated.data["spec"]) != Some(termination) {
        return Err(Error::invariant(format!(
            "route termination {} would not pair with port {}",
            termination.termination(),
            termination.target_port()
        )));
    }

    let unchanged = updated.metadata.labels == live.metadata.labels
        && updated.metadata.annotations == live.metadata.annotations
        && updated.data == live.data;
    Ok((!unchanged).then_some(updated))
}

/// Converge the server route for `argocd`
pub async fn apply_route(
    store: &dyn ObjectStore,
    scope: &ReconcileScope,
    argocd: &ArgoCD,
    termination: RouteTermination,
) -> Result<Applied<DynamicObject>, Error> {
    let namespace = argocd.namespace().ok_or(Error::MissingNamespace)?;
    let name = server_route_name(&argocd.name_any());

    let Some(live) = scope.run(store.get_route(&namespace, &name)).await? else {
        let route = desired_route(argocd, termination)?.into_dynamic()?;
        let object = scope.run(store.create_route(&namespace, &route)).await?;
        info!(route = %name, termination = termination.termination(), "created Route");
        return Ok(Applied {
            outcome: ApplyOutcome::Created,
            object,
        });
    };

    let overlay = desired_overlay(argocd, &name);
    match merge_route(&live, termination, &overlay)? {
        Some(route) => {
            let object = scope.run(store.replace_route(&namespace, &route)).await?;
            info!(route = %name, termination = termination.termination(), "updated Route");
            Ok(Applied {
                outcome: ApplyOutcome::Updated,
                object,
            })
        }
        None => {
            debug!(route = %name, "Route up to date");
            Ok(Applied {
                outcome: ApplyOutcome::Unchanged,
                object: live,
            })
        }
    }
}
