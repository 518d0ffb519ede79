//! Controller implementations for the ArgoCD CRD
//!
//! Controllers follow the Kubernetes controller pattern with observe-diff-act loops.

mod argocd;

pub use argocd::{
    error_policy, reconcile, reconcile_objects, Context, ObjectReport, PassReport,
};
