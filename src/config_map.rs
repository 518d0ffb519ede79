//! Desired state for the Argo CD configuration objects
//!
//! Both builders are pure: the same spec always yields the same map, and the
//! key schemas below are the complete set of keys the merge engine may remove.

use std::collections::BTreeMap;

use kube::ResourceExt;

use crate::crd::{ArgoCD, ArgoCDSpec};
use crate::merge::{DesiredConfigMap, KeySchema};
use crate::meta::{owner_reference, standard_labels};
use crate::{Error, ARGOCD_CM, ARGOCD_RBAC_CM};

/// Label key used to associate resources with applications
pub const KEY_APPLICATION_INSTANCE_LABEL: &str = "application.instanceLabelKey";
/// Resource tracking method
pub const KEY_RESOURCE_TRACKING_METHOD: &str = "application.resourceTrackingMethod";
/// Built-in admin user switch
pub const KEY_ADMIN_ENABLED: &str = "admin.enabled";
/// Config management plugins
pub const KEY_CONFIG_MANAGEMENT_PLUGINS: &str = "configManagementPlugins";
/// Dex configuration
pub const KEY_DEX_CONFIG: &str = "dex.config";
/// Google Analytics anonymization
pub const KEY_GA_ANONYMIZE_USERS: &str = "ga.anonymizeusers";
/// Google Analytics tracking ID
pub const KEY_GA_TRACKING_ID: &str = "ga.trackingid";
/// Help chat text
pub const KEY_HELP_CHAT_TEXT: &str = "help.chatText";
/// Help chat URL
pub const KEY_HELP_CHAT_URL: &str = "help.chatUrl";
/// Kustomize build options
pub const KEY_KUSTOMIZE_BUILD_OPTIONS: &str = "kustomize.buildOptions";
/// Prefix of per-version kustomize binary keys
pub const KEY_KUSTOMIZE_VERSION_PREFIX: &str = "kustomize.version.";
/// OIDC configuration
pub const KEY_OIDC_CONFIG: &str = "oidc.config";
/// Repository definitions
pub const KEY_REPOSITORIES: &str = "repositories";
/// Repository credential templates
pub const KEY_REPOSITORY_CREDENTIALS: &str = "repository.credentials";
/// Resource customizations
pub const KEY_RESOURCE_CUSTOMIZATIONS: &str = "resource.customizations";
/// Resource inclusions
pub const KEY_RESOURCE_INCLUSIONS: &str = "resource.inclusions";
/// Resource exclusions
pub const KEY_RESOURCE_EXCLUSIONS: &str = "resource.exclusions";
/// Status badge switch
pub const KEY_STATUS_BADGE_ENABLED: &str = "statusbadge.enabled";
/// UI banner text
pub const KEY_BANNER_CONTENT: &str = "ui.bannercontent";
/// UI banner link
pub const KEY_BANNER_URL: &str = "ui.bannerurl";
/// External server URL
pub const KEY_URL: &str = "url";
/// Anonymous access switch
pub const KEY_USERS_ANONYMOUS_ENABLED: &str = "users.anonymous.enabled";

/// RBAC policy CSV
pub const KEY_RBAC_POLICY_CSV: &str = "policy.csv";
/// RBAC default role
pub const KEY_RBAC_POLICY_DEFAULT: &str = "policy.default";
/// RBAC scopes
pub const KEY_RBAC_SCOPES: &str = "scopes";

/// Default application instance label key
pub const DEFAULT_APPLICATION_INSTANCE_LABEL_KEY: &str = "mycompany.com/appname";
/// Default help chat text
pub const DEFAULT_HELP_CHAT_TEXT: &str = "Chat now!";
/// Default help chat URL
pub const DEFAULT_HELP_CHAT_URL: &str = "https://mycorp.slack.com/argo-cd";
/// Default RBAC scopes
pub const DEFAULT_RBAC_SCOPES: &str = "[groups]";

/// Keys the operator is authoritative for in `argocd-cm`
pub const ARGOCD_CM_SCHEMA: KeySchema = KeySchema::new(
    &[
        KEY_APPLICATION_INSTANCE_LABEL,
        KEY_RESOURCE_TRACKING_METHOD,
        KEY_ADMIN_ENABLED,
        KEY_CONFIG_MANAGEMENT_PLUGINS,
        KEY_DEX_CONFIG,
        KEY_GA_ANONYMIZE_USERS,
        KEY_GA_TRACKING_ID,
        KEY_HELP_CHAT_TEXT,
        KEY_HELP_CHAT_URL,
        KEY_KUSTOMIZE_BUILD_OPTIONS,
        KEY_OIDC_CONFIG,
        KEY_REPOSITORIES,
        KEY_REPOSITORY_CREDENTIALS,
        KEY_RESOURCE_CUSTOMIZATIONS,
        KEY_RESOURCE_INCLUSIONS,
        KEY_RESOURCE_EXCLUSIONS,
        KEY_STATUS_BADGE_ENABLED,
        KEY_BANNER_CONTENT,
        KEY_BANNER_URL,
        KEY_URL,
        KEY_USERS_ANONYMOUS_ENABLED,
    ],
    &[KEY_KUSTOMIZE_VERSION_PREFIX],
);

/// Keys the operator is authoritative for in `argocd-rbac-cm`
pub const ARGOCD_RBAC_CM_SCHEMA: KeySchema = KeySchema::new(
    &[KEY_RBAC_POLICY_CSV, KEY_RBAC_POLICY_DEFAULT, KEY_RBAC_SCOPES],
    &[],
);

/// Hostname the Argo CD server is reached at
pub fn server_host(spec: &ArgoCDSpec, name: &str) -> String {
    match spec.server.host.as_deref() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => format!("{name}-server"),
    }
}

/// External URL of the Argo CD server
pub fn server_url(spec: &ArgoCDSpec, name: &str) -> String {
    format!("https://{}", server_host(spec, name))
}

fn or_default(value: Option<&str>, default: &str) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => default.to_string(),
    }
}

/// Build the `argocd-cm` data for an instance named `name`
///
/// `dex_config` is the resolved SSO fragment; `None` omits `dex.config`.
pub fn argocd_cm_data(
    spec: &ArgoCDSpec,
    name: &str,
    dex_config: Option<&str>,
) -> BTreeMap<String, String> {
    let mut data = BTreeMap::new();
    let mut put = |key: &str, value: String| {
        data.insert(key.to_string(), value);
    };

    put(
        KEY_APPLICATION_INSTANCE_LABEL,
        or_default(
            spec.application_instance_label_key.as_deref(),
            DEFAULT_APPLICATION_INSTANCE_LABEL_KEY,
        ),
    );
    put(
        KEY_RESOURCE_TRACKING_METHOD,
        spec.tracking_method().to_string(),
    );
    put(KEY_ADMIN_ENABLED, (!spec.disable_admin).to_string());
    put(
        KEY_CONFIG_MANAGEMENT_PLUGINS,
        spec.config_management_plugins.clone(),
    );
    put(KEY_GA_ANONYMIZE_USERS, spec.ga_anonymize_users.to_string());
    put(KEY_GA_TRACKING_ID, spec.ga_tracking_id.clone());
    put(
        KEY_HELP_CHAT_TEXT,
        or_default(spec.help_chat_text.as_deref(), DEFAULT_HELP_CHAT_TEXT),
    );
    put(
        KEY_HELP_CHAT_URL,
        or_default(spec.help_chat_url.as_deref(), DEFAULT_HELP_CHAT_URL),
    );
    put(
        KEY_KUSTOMIZE_BUILD_OPTIONS,
        spec.kustomize_build_options.clone(),
    );
    put(KEY_OIDC_CONFIG, spec.oidc_config.clone());
    put(KEY_REPOSITORIES, spec.repositories.clone());
    put(
        KEY_REPOSITORY_CREDENTIALS,
        spec.repository_credentials.clone(),
    );
    put(KEY_RESOURCE_INCLUSIONS, spec.resource_inclusions.clone());
    put(KEY_RESOURCE_EXCLUSIONS, spec.resource_exclusions.clone());
    put(KEY_STATUS_BADGE_ENABLED, spec.status_badge_enabled.to_string());
    put(KEY_URL, server_url(spec, name));
    put(
        KEY_USERS_ANONYMOUS_ENABLED,
        spec.users_anonymous_enabled.to_string(),
    );

    if let Some(dex) = dex_config {
        put(KEY_DEX_CONFIG, dex.to_string());
    }

    if !spec.resource_customizations.is_empty() {
        put(
            KEY_RESOURCE_CUSTOMIZATIONS,
            spec.resource_customizations.clone(),
        );
    }

    // A banner url without content is ignored.
    if let Some(banner) = spec.banner.as_ref().filter(|b| !b.content.is_empty()) {
        put(KEY_BANNER_CONTENT, banner.content.clone());
        if let Some(url) = banner.url.as_deref().filter(|u| !u.is_empty()) {
            put(KEY_BANNER_URL, url.to_string());
        }
    }

    // Later entries overwrite earlier ones with the same version.
    for kv in &spec.kustomize_versions {
        put(
            &format!("{KEY_KUSTOMIZE_VERSION_PREFIX}{}", kv.version),
            kv.path.clone(),
        );
    }

    data
}

/// Build the `argocd-rbac-cm` data
pub fn rbac_cm_data(spec: &ArgoCDSpec) -> BTreeMap<String, String> {
    let rbac = spec.rbac.clone().unwrap_or_default();
    BTreeMap::from([
        (
            KEY_RBAC_POLICY_CSV.to_string(),
            rbac.policy.unwrap_or_default(),
        ),
        (
            KEY_RBAC_POLICY_DEFAULT.to_string(),
            rbac.default_policy.unwrap_or_default(),
        ),
        (
            KEY_RBAC_SCOPES.to_string(),
            or_default(rbac.scopes.as_deref(), DEFAULT_RBAC_SCOPES),
        ),
    ])
}

fn desired(
    argocd: &ArgoCD,
    name: &str,
    data: BTreeMap<String, String>,
) -> Result<DesiredConfigMap, Error> {
    let namespace = argocd.namespace().ok_or(Error::MissingNamespace)?;
    Ok(DesiredConfigMap {
        name: name.to_string(),
        namespace,
        labels: standard_labels(name),
        owner: owner_reference(argocd),
        data,
    })
}

/// Desired `argocd-cm` for `argocd`
pub fn desired_argocd_cm(
    argocd: &ArgoCD,
    dex_config: Option<&str>,
) -> Result<DesiredConfigMap, Error> {
    let data = argocd_cm_data(&argocd.spec, &argocd.name_any(), dex_config);
    desired(argocd, ARGOCD_CM, data)
}

/// Desired `argocd-rbac-cm` for `argocd`
pub fn desired_rbac_cm(argocd: &ArgoCD) -> Result<DesiredConfigMap, Error> {
    desired(argocd, ARGOCD_RBAC_CM, rbac_cm_data(&argocd.spec))
}
