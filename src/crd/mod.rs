//! Custom Resource Definitions for the ArgoCD operator
//!
//! The ArgoCD CRD is owned by this operator; the OpenShift Route types describe
//! a foreign kind the operator writes.

mod argocd;
pub mod route;
mod types;

pub use argocd::{ArgoCD, ArgoCDSpec, ArgoCDStatus};
pub use types::{
    ArgoCDPhase, ArgoCDRouteSpec, ArgoCDServerSpec, ArgoCDTlsSpec, Banner, DexSpec, KeycloakSpec,
    KustomizeVersionSpec, RbacSpec, ResourceTrackingMethod, SshHostsSpec, SsoProviderType,
    SsoSpec,
};
