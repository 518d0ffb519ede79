//! ArgoCD Custom Resource Definition
//!
//! The ArgoCD CRD declares one Argo CD instance. The operator converges it into
//! the configuration maps, certificate registries and server route that the
//! Argo CD components read.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{
    ArgoCDPhase, ArgoCDServerSpec, ArgoCDTlsSpec, Banner, DexSpec, KustomizeVersionSpec,
    RbacSpec, ResourceTrackingMethod, SshHostsSpec, SsoSpec,
};

/// Specification for an ArgoCD instance
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "argoproj.io",
    version = "v1alpha1",
    kind = "ArgoCD",
    plural = "argocds",
    shortname = "argocd",
    status = "ArgoCDStatus",
    namespaced,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSpec {
    /// Label key used to associate resources with applications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_instance_label_key: Option<String>,

    /// UI banner
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<Banner>,

    /// Config management plugin definitions (passed through verbatim)
    #[serde(default)]
    pub config_management_plugins: String,

    /// Dex SSO options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dex: Option<DexSpec>,

    /// Alternate SSO provider; takes precedence over Dex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sso: Option<SsoSpec>,

    /// Disable the built-in admin user
    #[serde(default)]
    pub disable_admin: bool,

    /// Anonymize users in Google Analytics
    #[serde(default)]
    pub ga_anonymize_users: bool,

    /// Google Analytics tracking ID
    #[serde(default, rename = "gaTrackingID")]
    pub ga_tracking_id: String,

    /// Help chat text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help_chat_text: Option<String>,

    /// Help chat URL
    #[serde(default, rename = "helpChatURL", skip_serializing_if = "Option::is_none")]
    pub help_chat_url: Option<String>,

    /// Extra kustomize build options
    #[serde(default)]
    pub kustomize_build_options: String,

    /// Additional kustomize binaries
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kustomize_versions: Vec<KustomizeVersionSpec>,

    /// OIDC configuration (passed through verbatim)
    #[serde(default)]
    pub oidc_config: String,

    /// RBAC policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rbac: Option<RbacSpec>,

    /// Repository definitions (passed through verbatim)
    #[serde(default)]
    pub repositories: String,

    /// Repository credential templates (passed through verbatim)
    #[serde(default)]
    pub repository_credentials: String,

    /// Resource health and action customizations (passed through verbatim)
    #[serde(default)]
    pub resource_customizations: String,

    /// Resource inclusions (passed through verbatim)
    #[serde(default)]
    pub resource_inclusions: String,

    /// Resource exclusions (passed through verbatim)
    #[serde(default)]
    pub resource_exclusions: String,

    /// Resource tracking method: `label`, `annotation` or `annotation+label`
    #[serde(default)]
    pub resource_tracking_method: String,

    /// Server options
    #[serde(default)]
    pub server: ArgoCDServerSpec,

    /// Enable the status badge
    #[serde(default)]
    pub status_badge_enabled: bool,

    /// TLS options
    #[serde(default)]
    pub tls: ArgoCDTlsSpec,

    /// SSH known hosts seeded at creation
    #[serde(default, rename = "initialSSHKnownHosts")]
    pub initial_ssh_known_hosts: SshHostsSpec,

    /// Enable anonymous access
    #[serde(default)]
    pub users_anonymous_enabled: bool,
}

impl ArgoCDSpec {
    /// Effective resource tracking method after coercion
    pub fn tracking_method(&self) -> ResourceTrackingMethod {
        ResourceTrackingMethod::parse_or_default(&self.resource_tracking_method)
    }
}

/// Status for an ArgoCD instance
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDStatus {
    /// Current phase
    #[serde(default)]
    pub phase: ArgoCDPhase,

    /// Human-readable message about current state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation observed by the last reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// RFC 3339 timestamp of the last reconciliation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_reconciled: Option<String>,
}

impl ArgoCDStatus {
    /// Create a new status with the given phase
    pub fn with_phase(phase: ArgoCDPhase) -> Self {
        Self {
            phase,
            ..Default::default()
        }
    }

    /// Set the message and return self for chaining
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Set the observed generation and return self for chaining
    pub fn observed_generation(mut self, generation: Option<i64>) -> Self {
        self.observed_generation = generation;
        self
    }

    /// Returns true if phase, message and observed generation already match `other`
    pub fn same_state(&self, other: &ArgoCDStatus) -> bool {
        self.phase == other.phase
            && self.message == other.message
            && self.observed_generation == other.observed_generation
    }
}
