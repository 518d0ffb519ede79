//! Supporting types for the ArgoCD CRD

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How Argo CD tracks the resources it manages
///
/// The CRD carries this as a free string; unknown values are coerced to
/// [`ResourceTrackingMethod::Label`] rather than rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResourceTrackingMethod {
    /// Track with the application instance label
    #[default]
    Label,
    /// Track with an annotation
    Annotation,
    /// Track with both an annotation and the label
    AnnotationAndLabel,
}

impl ResourceTrackingMethod {
    /// Parse a tracking method, falling back to `label` for anything unrecognized
    pub fn parse_or_default(raw: &str) -> Self {
        match raw {
            "label" => Self::Label,
            "annotation" => Self::Annotation,
            "annotation+label" => Self::AnnotationAndLabel,
            _ => Self::default(),
        }
    }

    /// Wire value written to the configuration object
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Label => "label",
            Self::Annotation => "annotation",
            Self::AnnotationAndLabel => "annotation+label",
        }
    }
}

impl std::fmt::Display for ResourceTrackingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// UI banner shown on every Argo CD page
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Banner {
    /// Banner text
    #[serde(default)]
    pub content: String,
    /// Link opened when the banner is clicked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A kustomize binary made available to the repo server
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct KustomizeVersionSpec {
    /// Version label, e.g. `v4.1.0`
    pub version: String,
    /// Path to the binary
    pub path: String,
}

/// Dex SSO options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DexSpec {
    /// Raw dex configuration, used verbatim unless OpenShift OAuth is enabled
    #[serde(default)]
    pub config: String,
    /// Generate an OpenShift OAuth connector
    #[serde(default, rename = "openShiftOAuth")]
    pub open_shift_oauth: bool,
    /// Groups the OpenShift connector restricts logins to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
}

/// Alternate SSO provider kinds
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum SsoProviderType {
    /// Keycloak
    #[default]
    Keycloak,
}

/// Keycloak options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakSpec {
    /// Keycloak container image override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Keycloak version override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Root CA used to verify the Keycloak endpoint
    #[serde(default, rename = "rootCA", skip_serializing_if = "Option::is_none")]
    pub root_ca: Option<String>,
    /// Verify the Keycloak TLS certificate
    #[serde(default, rename = "verifyTLS", skip_serializing_if = "Option::is_none")]
    pub verify_tls: Option<bool>,
}

/// Alternate (non-Dex) SSO provider configuration
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SsoSpec {
    /// Which provider to run
    pub provider: SsoProviderType,
    /// Keycloak-specific options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keycloak: Option<KeycloakSpec>,
}

/// RBAC policy options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RbacSpec {
    /// CSV policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    /// Role granted to authenticated users without a matching policy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_policy: Option<String>,
    /// OIDC scopes examined for group membership
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
}

/// Route exposure for the Argo CD server
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDRouteSpec {
    /// Create and manage a route
    #[serde(default)]
    pub enabled: bool,
    /// Labels merged onto the route
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Annotations merged onto the route
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// Argo CD server options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDServerSpec {
    /// External hostname for the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    /// Serve plain HTTP and terminate TLS at the route edge
    #[serde(default)]
    pub insecure: bool,
    /// Route exposure
    #[serde(default)]
    pub route: ArgoCDRouteSpec,
}

/// TLS options
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDTlsSpec {
    /// Hostname to PEM certificates seeded into the certificate registry at creation
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub initial_certs: BTreeMap<String, String>,
}

/// SSH known hosts seeded at creation
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SshHostsSpec {
    /// known_hosts formatted entries
    #[serde(default)]
    pub keys: String,
}

/// ArgoCD lifecycle phase
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[non_exhaustive]
pub enum ArgoCDPhase {
    /// Waiting on a dependency or first reconciliation
    #[default]
    Pending,
    /// Every managed object converged
    Available,
    /// The last reconciliation failed
    Failed,
}

impl std::fmt::Display for ArgoCDPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Available => write!(f, "Available"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}
