//! SSO provider selection
//!
//! Exactly one provider is active for an instance. [`select_sso`] applies the
//! precedence rules to the spec and operator config; [`resolve_dex_config`]
//! turns the selection into the `dex.config` value, looking up the Dex
//! service account token when an OpenShift connector is needed.

use kube::ResourceExt;
use serde::Serialize;
use tracing::debug;

use crate::cancel::ReconcileScope;
use crate::config::OperatorConfig;
use crate::config_map::server_url;
use crate::crd::{ArgoCD, ArgoCDSpec, SsoProviderType};
use crate::store::ObjectStore;
use crate::Error;

/// Issuer used by the OpenShift OAuth connector
pub const OPENSHIFT_ISSUER: &str = "https://kubernetes.default.svc";
/// Secret data key holding the service account token
pub const TOKEN_KEY: &str = "token";

/// The single active SSO configuration for an instance
#[derive(Clone, Debug, PartialEq)]
pub enum SsoSelection {
    /// Dex is switched off for the whole operator
    DexSuppressed,
    /// An alternate provider owns SSO; Dex is not configured
    Alternate(SsoProviderType),
    /// Dex with a generated OpenShift OAuth connector
    DexOpenShift {
        /// Groups allowed to log in
        groups: Vec<String>,
    },
    /// Dex with the configuration given in the spec (possibly empty)
    Dex(String),
}

/// Pick the active SSO provider
///
/// The operator-wide switch beats everything, an alternate provider beats Dex,
/// and the OpenShift connector beats a literal Dex config.
pub fn select_sso(spec: &ArgoCDSpec, config: &OperatorConfig) -> SsoSelection {
    if config.disable_dex {
        return SsoSelection::DexSuppressed;
    }
    if let Some(sso) = &spec.sso {
        return SsoSelection::Alternate(sso.provider.clone());
    }
    match &spec.dex {
        Some(dex) if dex.open_shift_oauth => SsoSelection::DexOpenShift {
            groups: dex.groups.clone(),
        },
        Some(dex) => SsoSelection::Dex(dex.config.clone()),
        None => SsoSelection::Dex(String::new()),
    }
}

/// Name of the Dex server service account for an instance
pub fn dex_service_account_name(argocd_name: &str) -> String {
    format!("{argocd_name}-argocd-dex-server")
}

/// OAuth client ID Dex uses against the OpenShift API
pub fn dex_client_id(namespace: &str, argocd_name: &str) -> String {
    format!(
        "system:serviceaccount:{namespace}:{}",
        dex_service_account_name(argocd_name)
    )
}

#[derive(Debug, Serialize)]
struct DexConfig {
    connectors: Vec<Connector>,
}

#[derive(Debug, Serialize)]
struct Connector {
    #[serde(rename = "type")]
    kind: &'static str,
    id: &'static str,
    name: &'static str,
    config: ConnectorConfig,
}

#[derive(Debug, Serialize)]
struct ConnectorConfig {
    issuer: &'static str,
    #[serde(rename = "clientID")]
    client_id: String,
    #[serde(rename = "clientSecret")]
    client_secret: String,
    #[serde(rename = "redirectURI")]
    redirect_uri: String,
    #[serde(rename = "insecureCA")]
    insecure_ca: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    groups: Vec<String>,
}

/// Render the OpenShift connector configuration as YAML
pub fn openshift_dex_config(
    client_id: String,
    client_secret: String,
    server_url: &str,
    groups: &[String],
) -> Result<String, Error> {
    let config = DexConfig {
        connectors: vec![Connector {
            kind: "openshift",
            id: "openshift",
            name: "OpenShift",
            config: ConnectorConfig {
                issuer: OPENSHIFT_ISSUER,
                client_id,
                client_secret,
                redirect_uri: format!("{server_url}/api/dex/callback"),
                insecure_ca: true,
                groups: groups.to_vec(),
            },
        }],
    };
    serde_yaml::to_string(&config).map_err(|e| Error::serialization(e.to_string()))
}

/// Look up the Dex service account token
///
/// A missing service account, token reference or secret is reported as
/// dependency-not-ready. A secret without a `token` datum yields an empty token.
async fn dex_token(
    store: &dyn ObjectStore,
    scope: &ReconcileScope,
    namespace: &str,
    sa_name: &str,
) -> Result<String, Error> {
    let sa = scope
        .run(store.get_service_account(namespace, sa_name))
        .await?
        .ok_or_else(|| {
            Error::dependency_not_ready("ServiceAccount", sa_name, "service account not found")
        })?;

    let secret_name = sa
        .secrets
        .unwrap_or_default()
        .into_iter()
        .filter_map(|r| r.name)
        .find(|n| n.contains(TOKEN_KEY))
        .ok_or_else(|| {
            Error::dependency_not_ready(
                "ServiceAccount",
                sa_name,
                "no token secret bound to service account",
            )
        })?;

    let secret = scope
        .run(store.get_secret(namespace, &secret_name))
        .await?
        .ok_or_else(|| {
            Error::dependency_not_ready("Secret", &secret_name, "token secret not found")
        })?;

    // A secret without the datum yet still yields a connector with an empty secret
    let Some(token) = secret.data.unwrap_or_default().remove(TOKEN_KEY) else {
        debug!(secret = %secret_name, "dex token not populated, using empty client secret");
        return Ok(String::new());
    };

    String::from_utf8(token.0)
        .map_err(|e| Error::serialization_for_kind("Secret", format!("token is not UTF-8: {e}")))
}

/// Resolve the `dex.config` value for `selection`
///
/// Returns `None` when Dex must not be configured.
pub async fn resolve_dex_config(
    selection: &SsoSelection,
    argocd: &ArgoCD,
    store: &dyn ObjectStore,
    scope: &ReconcileScope,
) -> Result<Option<String>, Error> {
    match selection {
        SsoSelection::DexSuppressed | SsoSelection::Alternate(_) => {
            debug!(selection = ?selection, "dex not configured");
            Ok(None)
        }
        SsoSelection::Dex(config) => Ok(Some(config.clone())),
        SsoSelection::DexOpenShift { groups } => {
            let name = argocd.name_any();
            let namespace = argocd.namespace().ok_or(Error::MissingNamespace)?;
            let sa_name = dex_service_account_name(&name);

            let token = dex_token(store, scope, &namespace, &sa_name).await?;
            let config = openshift_dex_config(
                dex_client_id(&namespace, &name),
                token,
                &server_url(&argocd.spec, &name),
                groups,
            )?;
            Ok(Some(config))
        }
    }
}
