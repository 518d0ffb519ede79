//! ArgoCD operator - converges ArgoCD custom resources into Argo CD configuration
//!
//! Each ArgoCD resource is reconciled into the configuration objects, the
//! seed-once certificate and key registries, and the server route that the
//! Argo CD components read. Reconciliation shares the cluster store with other
//! writers, so every managed object has an explicit ownership contract.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definitions (ArgoCD) and the OpenShift Route kind
//! - [`controller`] - Kubernetes controller reconciliation logic
//! - [`config_map`] - Desired state of `argocd-cm` and `argocd-rbac-cm`
//! - [`sso`] - SSO provider precedence and Dex connector generation
//! - [`route`] - Route TLS termination and route convergence
//! - [`merge`] - Merge & apply engine for schema-owned objects
//! - [`certs`] - Seed-once registries
//! - [`store`] - Cluster store access
//! - [`cancel`] - Per-pass cancellation and deadlines
//! - [`config`] - Operator configuration
//! - [`error`] - Error types for the operator

#![deny(missing_docs)]

pub mod cancel;
pub mod certs;
pub mod config;
pub mod config_map;
pub mod controller;
pub mod crd;
pub mod error;
pub mod merge;
pub mod meta;
pub mod route;
pub mod sso;
pub mod store;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "argocd-operator";

/// Main Argo CD configuration object
pub const ARGOCD_CM: &str = "argocd-cm";
/// RBAC configuration object
pub const ARGOCD_RBAC_CM: &str = "argocd-rbac-cm";
/// TLS certificate registry
pub const ARGOCD_TLS_CERTS_CM: &str = "argocd-tls-certs-cm";
/// GPG key registry
pub const ARGOCD_GPG_KEYS_CM: &str = "argocd-gpg-keys-cm";
/// SSH known-hosts registry
pub const ARGOCD_SSH_KNOWN_HOSTS_CM: &str = "argocd-ssh-known-hosts-cm";

/// Label carrying the object name
pub const LABEL_NAME: &str = "app.kubernetes.io/name";
/// Label carrying the application the object belongs to
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
/// Label carrying the managing controller
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";
/// Value of [`LABEL_PART_OF`]
pub const PART_OF_VALUE: &str = "argocd";
/// Value of [`LABEL_MANAGED_BY`]
pub const MANAGED_BY_VALUE: &str = "argocd-operator";
