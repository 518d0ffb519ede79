//! OpenShift Route types
//!
//! Typed structs for `route.openshift.io/v1` Routes. Live routes are read and
//! written as `DynamicObject` so fields this operator does not model survive a
//! round trip; these types are only used to build new routes.

use std::collections::BTreeMap;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::{DynamicObject, GroupVersionKind};
use kube::discovery::ApiResource;
use serde::{Deserialize, Serialize};

use crate::Error;

/// API group of the Route kind
pub const ROUTE_GROUP: &str = "route.openshift.io";
/// API version of the Route kind
pub const ROUTE_VERSION: &str = "v1";
/// Kind name
pub const ROUTE_KIND: &str = "Route";

/// Build the `ApiResource` used for dynamic Route access
pub fn route_api_resource() -> ApiResource {
    ApiResource::from_gvk(&GroupVersionKind::gvk(
        ROUTE_GROUP,
        ROUTE_VERSION,
        ROUTE_KIND,
    ))
}

/// OpenShift Route resource
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    /// API version
    pub api_version: String,
    /// Resource kind
    pub kind: String,
    /// Resource metadata
    pub metadata: RouteMetadata,
    /// Route specification
    pub spec: RouteSpec,
}

impl Route {
    /// Create a new Route
    pub fn new(metadata: RouteMetadata, spec: RouteSpec) -> Self {
        Self {
            api_version: format!("{ROUTE_GROUP}/{ROUTE_VERSION}"),
            kind: ROUTE_KIND.to_string(),
            metadata,
            spec,
        }
    }

    /// Convert into a `DynamicObject` for the dynamic API
    pub fn into_dynamic(self) -> Result<DynamicObject, Error> {
        let value = serde_json::to_value(&self)
            .map_err(|e| Error::serialization_for_kind(ROUTE_KIND, e.to_string()))?;
        serde_json::from_value(value)
            .map_err(|e| Error::serialization_for_kind(ROUTE_KIND, e.to_string()))
    }
}

/// Route metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteMetadata {
    /// Resource name
    pub name: String,
    /// Resource namespace
    pub namespace: String,
    /// Labels
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Owner references
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

/// Route specification
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteSpec {
    /// Public hostname; assigned by the router when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Backend service
    pub to: RouteTargetReference,
    /// Backend port
    pub port: RoutePort,
    /// TLS settings
    pub tls: TlsConfig,
    /// Wildcard policy
    pub wildcard_policy: String,
}

/// Reference to the backend of a route
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct RouteTargetReference {
    /// Referenced kind, always `Service`
    pub kind: String,
    /// Service name
    pub name: String,
    /// Relative weight
    pub weight: i32,
}

/// Port on the backend service
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoutePort {
    /// Named target port
    pub target_port: IntOrString,
}

/// Route TLS settings
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsConfig {
    /// Termination type
    pub termination: String,
    /// Policy for plain HTTP requests
    pub insecure_edge_termination_policy: String,
}
