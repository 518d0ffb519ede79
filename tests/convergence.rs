//! End-to-end convergence tests
//!
//! Drives full reconciliations against an in-memory store that enforces
//! resourceVersion checks the way the API server does, and checks the
//! properties operators rely on across repeated passes.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use argocd_operator::config::OperatorConfig;
use argocd_operator::controller::{reconcile, Context};
use argocd_operator::crd::{
    ArgoCD, ArgoCDSpec, ArgoCDStatus, Banner, DexSpec, KustomizeVersionSpec, SsoSpec,
};
use argocd_operator::store::ObjectStore;
use argocd_operator::Error;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, ObjectReference, Secret, ServiceAccount};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::DynamicObject;
use tokio_util::sync::CancellationToken;

const NAMESPACE: &str = "argocd";
const PEM: &str = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";

// =============================================================================
// In-memory store
// =============================================================================

#[derive(Default)]
struct State {
    config_maps: BTreeMap<String, ConfigMap>,
    routes: BTreeMap<String, DynamicObject>,
    service_accounts: BTreeMap<String, ServiceAccount>,
    secrets: BTreeMap<String, Secret>,
    statuses: Vec<ArgoCDStatus>,
    version: u64,
    writes: usize,
}

impl State {
    fn next_version(&mut self) -> String {
        self.version += 1;
        self.version.to_string()
    }
}

#[derive(Clone, Default)]
struct MemoryStore {
    state: Arc<Mutex<State>>,
}

fn not_found(name: &str) -> Error {
    kube::Error::Api(kube::core::ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{name} not found"),
        reason: "NotFound".to_string(),
        code: 404,
    })
    .into()
}

impl MemoryStore {
    fn config_map(&self, name: &str) -> ConfigMap {
        self.state.lock().unwrap().config_maps[name].clone()
    }

    fn data(&self, name: &str) -> BTreeMap<String, String> {
        self.config_map(name).data.unwrap_or_default()
    }

    fn route(&self, name: &str) -> DynamicObject {
        self.state.lock().unwrap().routes[name].clone()
    }

    fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    fn last_status(&self) -> Option<ArgoCDStatus> {
        self.state.lock().unwrap().statuses.last().cloned()
    }

    /// Simulate another actor editing a ConfigMap key
    fn external_edit(&self, name: &str, key: &str, value: &str) {
        let mut state = self.state.lock().unwrap();
        let version = state.next_version();
        let cm = state.config_maps.get_mut(name).unwrap();
        cm.data
            .get_or_insert_with(BTreeMap::new)
            .insert(key.to_string(), value.to_string());
        cm.metadata.resource_version = Some(version);
    }

    fn add_dex_token(&self, token: &str) {
        let mut state = self.state.lock().unwrap();
        state.service_accounts.insert(
            "argocd-argocd-dex-server".to_string(),
            ServiceAccount {
                secrets: Some(vec![ObjectReference {
                    name: Some("argocd-argocd-dex-server-token-abcde".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            },
        );
        state.secrets.insert(
            "argocd-argocd-dex-server-token-abcde".to_string(),
            Secret {
                data: Some(BTreeMap::from([(
                    "token".to_string(),
                    ByteString(token.as_bytes().to_vec()),
                )])),
                ..Default::default()
            },
        );
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_config_map(&self, _ns: &str, name: &str) -> Result<Option<ConfigMap>, Error> {
        Ok(self.state.lock().unwrap().config_maps.get(name).cloned())
    }

    async fn create_config_map(&self, _ns: &str, cm: &ConfigMap) -> Result<ConfigMap, Error> {
        let mut state = self.state.lock().unwrap();
        let name = cm.metadata.name.clone().unwrap_or_default();
        if state.config_maps.contains_key(&name) {
            return Err(Error::conflict("ConfigMap", name));
        }
        let mut stored = cm.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.config_maps.insert(name, stored.clone());
        state.writes += 1;
        Ok(stored)
    }

    async fn replace_config_map(&self, _ns: &str, cm: &ConfigMap) -> Result<ConfigMap, Error> {
        let mut state = self.state.lock().unwrap();
        let name = cm.metadata.name.clone().unwrap_or_default();
        let live_version = state
            .config_maps
            .get(&name)
            .ok_or_else(|| not_found(&name))?
            .metadata
            .resource_version
            .clone();
        if live_version != cm.metadata.resource_version {
            return Err(Error::conflict("ConfigMap", name));
        }
        let mut stored = cm.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.config_maps.insert(name, stored.clone());
        state.writes += 1;
        Ok(stored)
    }

    async fn get_route(&self, _ns: &str, name: &str) -> Result<Option<DynamicObject>, Error> {
        Ok(self.state.lock().unwrap().routes.get(name).cloned())
    }

    async fn create_route(
        &self,
        _ns: &str,
        route: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let mut state = self.state.lock().unwrap();
        let name = route.metadata.name.clone().unwrap_or_default();
        if state.routes.contains_key(&name) {
            return Err(Error::conflict("Route", name));
        }
        let mut stored = route.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.routes.insert(name, stored.clone());
        state.writes += 1;
        Ok(stored)
    }

    async fn replace_route(
        &self,
        _ns: &str,
        route: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let mut state = self.state.lock().unwrap();
        let name = route.metadata.name.clone().unwrap_or_default();
        let live_version = state
            .routes
            .get(&name)
            .ok_or_else(|| not_found(&name))?
            .metadata
            .resource_version
            .clone();
        if live_version != route.metadata.resource_version {
            return Err(Error::conflict("Route", name));
        }
        let mut stored = route.clone();
        stored.metadata.resource_version = Some(state.next_version());
        state.routes.insert(name, stored.clone());
        state.writes += 1;
        Ok(stored)
    }

    async fn get_service_account(
        &self,
        _ns: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, Error> {
        Ok(self.state.lock().unwrap().service_accounts.get(name).cloned())
    }

    async fn get_secret(&self, _ns: &str, name: &str) -> Result<Option<Secret>, Error> {
        Ok(self.state.lock().unwrap().secrets.get(name).cloned())
    }

    async fn patch_argocd_status(
        &self,
        _ns: &str,
        _name: &str,
        status: &ArgoCDStatus,
    ) -> Result<(), Error> {
        self.state.lock().unwrap().statuses.push(status.clone());
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

struct Harness {
    store: MemoryStore,
    ctx: Arc<Context>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(OperatorConfig::default())
    }

    fn with_config(config: OperatorConfig) -> Self {
        let store = MemoryStore::default();
        let ctx = Arc::new(Context::with_store(
            Arc::new(store.clone()),
            config,
            CancellationToken::new(),
        ));
        Self { store, ctx }
    }

    async fn reconcile(&self, spec: &ArgoCDSpec) {
        reconcile(Arc::new(argocd(spec.clone())), self.ctx.clone())
            .await
            .expect("reconcile should succeed");
    }
}

fn argocd(spec: ArgoCDSpec) -> ArgoCD {
    let mut argocd = ArgoCD::new("argocd", spec);
    argocd.metadata = ObjectMeta {
        name: Some("argocd".to_string()),
        namespace: Some(NAMESPACE.to_string()),
        generation: Some(1),
        ..Default::default()
    };
    argocd
}

fn with_route(insecure: bool) -> ArgoCDSpec {
    let mut spec = ArgoCDSpec::default();
    spec.server.insecure = insecure;
    spec.server.route.enabled = true;
    spec.server.route.labels =
        BTreeMap::from([("custom-label".to_string(), "yes".to_string())]);
    spec
}

fn route_tuple(route: &DynamicObject) -> (String, String, String) {
    let spec = &route.data["spec"];
    (
        spec["tls"]["termination"].as_str().unwrap().to_string(),
        spec["tls"]["insecureEdgeTerminationPolicy"]
            .as_str()
            .unwrap()
            .to_string(),
        spec["port"]["targetPort"].as_str().unwrap().to_string(),
    )
}

// =============================================================================
// Idempotence and ownership
// =============================================================================

#[tokio::test]
async fn second_pass_over_same_spec_writes_nothing() {
    let h = Harness::new();
    let spec = ArgoCDSpec {
        kustomize_versions: vec![KustomizeVersionSpec {
            version: "v4.1.0".to_string(),
            path: "/path/to/kustomize-4.1".to_string(),
        }],
        ..with_route(false)
    };

    h.reconcile(&spec).await;
    let first = (h.store.data("argocd-cm"), h.store.route("argocd-server"));
    let writes = h.store.writes();

    h.reconcile(&spec).await;
    let second = (h.store.data("argocd-cm"), h.store.route("argocd-server"));

    assert_eq!(first, second);
    assert_eq!(h.store.writes(), writes);
}

#[tokio::test]
async fn externally_added_key_survives_reconciliation() {
    let h = Harness::new();
    let spec = ArgoCDSpec::default();

    h.reconcile(&spec).await;
    h.store.external_edit("argocd-cm", "custom.key", "v");

    let changed = ArgoCDSpec {
        disable_admin: true,
        ..Default::default()
    };
    h.reconcile(&changed).await;

    let data = h.store.data("argocd-cm");
    assert_eq!(data["custom.key"], "v");
    assert_eq!(data["admin.enabled"], "false");
}

#[tokio::test]
async fn external_edit_of_owned_key_is_reverted() {
    let h = Harness::new();
    let spec = ArgoCDSpec::default();

    h.reconcile(&spec).await;
    h.store.external_edit("argocd-cm", "admin.enabled", "false");
    h.reconcile(&spec).await;

    assert_eq!(h.store.data("argocd-cm")["admin.enabled"], "true");
}

#[tokio::test]
async fn dropped_kustomize_version_is_removed() {
    let h = Harness::new();
    let spec = ArgoCDSpec {
        kustomize_versions: vec![KustomizeVersionSpec {
            version: "v3.5.4".to_string(),
            path: "/path/to/kustomize-3.5.4".to_string(),
        }],
        ..Default::default()
    };

    h.reconcile(&spec).await;
    assert!(h.store.data("argocd-cm").contains_key("kustomize.version.v3.5.4"));

    h.reconcile(&ArgoCDSpec::default()).await;
    assert!(!h.store.data("argocd-cm").contains_key("kustomize.version.v3.5.4"));
}

#[tokio::test]
async fn fresh_instance_reports_available() {
    let h = Harness::new();
    h.reconcile(&ArgoCDSpec::default()).await;

    let status = h.store.last_status().unwrap();
    assert_eq!(status.phase.to_string(), "Available");
    assert_eq!(status.observed_generation, Some(1));
    assert!(status.last_reconciled.is_some());
}

// =============================================================================
// Certificate registry
// =============================================================================

#[tokio::test]
async fn externally_added_certificate_is_kept() {
    let h = Harness::new();
    let mut spec = ArgoCDSpec::default();
    spec.tls.initial_certs =
        BTreeMap::from([("root-ca.example.com".to_string(), PEM.to_string())]);

    h.reconcile(&spec).await;
    h.store.external_edit("argocd-tls-certs-cm", "example.com", PEM);
    h.reconcile(&spec).await;

    let data = h.store.data("argocd-tls-certs-cm");
    assert!(data.contains_key("root-ca.example.com"));
    assert!(data.contains_key("example.com"));
}

#[tokio::test]
async fn initial_certs_only_apply_at_creation() {
    let h = Harness::new();
    h.reconcile(&ArgoCDSpec::default()).await;
    assert!(h.store.data("argocd-tls-certs-cm").is_empty());

    let mut spec = ArgoCDSpec::default();
    spec.tls.initial_certs =
        BTreeMap::from([("testing.example.com".to_string(), PEM.to_string())]);
    h.reconcile(&spec).await;

    assert!(h.store.data("argocd-tls-certs-cm").is_empty());
}

// =============================================================================
// Route
// =============================================================================

#[tokio::test]
async fn route_termination_flips_and_flips_back_atomically() {
    let h = Harness::new();

    h.reconcile(&with_route(false)).await;
    let secure = h.store.route("argocd-server");
    assert_eq!(
        route_tuple(&secure),
        ("passthrough".into(), "Redirect".into(), "https".into())
    );
    assert_eq!(secure.metadata.labels.as_ref().unwrap()["custom-label"], "yes");

    h.reconcile(&with_route(true)).await;
    assert_eq!(
        route_tuple(&h.store.route("argocd-server")),
        ("edge".into(), "Redirect".into(), "http".into())
    );

    h.reconcile(&with_route(false)).await;
    let restored = h.store.route("argocd-server");
    assert_eq!(restored.data["spec"], secure.data["spec"]);
}

#[tokio::test]
async fn disabled_route_is_never_created() {
    let h = Harness::new();
    h.reconcile(&ArgoCDSpec::default()).await;
    assert!(h.store.state.lock().unwrap().routes.is_empty());
}

// =============================================================================
// Desired state details
// =============================================================================

#[tokio::test]
async fn misspelled_tracking_method_falls_back_to_label() {
    let h = Harness::new();
    let spec = ArgoCDSpec {
        resource_tracking_method: "anotaions".to_string(),
        ..Default::default()
    };
    h.reconcile(&spec).await;

    assert_eq!(
        h.store.data("argocd-cm")["application.resourceTrackingMethod"],
        "label"
    );
}

#[tokio::test]
async fn banner_keys_follow_banner_fields() {
    let h = Harness::new();

    h.reconcile(&ArgoCDSpec::default()).await;
    let data = h.store.data("argocd-cm");
    assert!(!data.contains_key("ui.bannercontent"));
    assert!(!data.contains_key("ui.bannerurl"));

    let content_only = ArgoCDSpec {
        banner: Some(Banner {
            content: "Custom Styles - Banners".to_string(),
            url: None,
        }),
        ..Default::default()
    };
    h.reconcile(&content_only).await;
    let data = h.store.data("argocd-cm");
    assert_eq!(data["ui.bannercontent"], "Custom Styles - Banners");
    assert!(!data.contains_key("ui.bannerurl"));

    let both = ArgoCDSpec {
        banner: Some(Banner {
            content: "Custom Styles - Banners".to_string(),
            url: Some("https://argo-cd.readthedocs.io/en/stable/".to_string()),
        }),
        ..Default::default()
    };
    h.reconcile(&both).await;
    let data = h.store.data("argocd-cm");
    assert!(data.contains_key("ui.bannercontent"));
    assert_eq!(
        data["ui.bannerurl"],
        "https://argo-cd.readthedocs.io/en/stable/"
    );
}

// =============================================================================
// SSO
// =============================================================================

fn openshift_dex() -> Option<DexSpec> {
    Some(DexSpec {
        open_shift_oauth: true,
        ..Default::default()
    })
}

#[tokio::test]
async fn alternate_provider_excludes_dex_config() {
    let h = Harness::new();
    let spec = ArgoCDSpec {
        dex: openshift_dex(),
        sso: Some(SsoSpec::default()),
        ..Default::default()
    };
    h.reconcile(&spec).await;

    assert!(!h.store.data("argocd-cm").contains_key("dex.config"));
}

#[tokio::test]
async fn operator_switch_excludes_dex_config() {
    let h = Harness::with_config(OperatorConfig::default().disable_dex(true));
    let spec = ArgoCDSpec {
        dex: openshift_dex(),
        ..Default::default()
    };
    h.reconcile(&spec).await;

    assert!(!h.store.data("argocd-cm").contains_key("dex.config"));
}

#[tokio::test]
async fn openshift_connector_waits_for_token_then_converges() {
    let h = Harness::new();
    let spec = ArgoCDSpec {
        dex: openshift_dex(),
        ..Default::default()
    };

    h.reconcile(&spec).await;
    assert!(!h.store.state.lock().unwrap().config_maps.contains_key("argocd-cm"));
    assert_eq!(h.store.last_status().unwrap().phase.to_string(), "Pending");

    h.store.add_dex_token("s3cr3t");
    h.reconcile(&spec).await;

    let dex = &h.store.data("argocd-cm")["dex.config"];
    assert!(dex.contains("clientSecret: s3cr3t"));
    assert!(dex.contains("system:serviceaccount:argocd:argocd-argocd-dex-server"));
    assert!(dex.contains("https://argocd-server/api/dex/callback"));
}

#[tokio::test]
async fn token_secret_without_datum_still_writes_connector() {
    let h = Harness::new();
    {
        let mut state = h.store.state.lock().unwrap();
        state.service_accounts.insert(
            "argocd-argocd-dex-server".to_string(),
            ServiceAccount {
                secrets: Some(vec![ObjectReference {
                    name: Some("token".to_string()),
                    ..Default::default()
                }]),
                ..Default::default()
            },
        );
        state.secrets.insert("token".to_string(), Secret::default());
    }

    let spec = ArgoCDSpec {
        dex: openshift_dex(),
        ..Default::default()
    };
    h.reconcile(&spec).await;

    let dex = &h.store.data("argocd-cm")["dex.config"];
    let parsed: serde_yaml::Value = serde_yaml::from_str(dex).unwrap();
    assert_eq!(
        parsed["connectors"][0]["config"]["clientID"],
        "system:serviceaccount:argocd:argocd-argocd-dex-server"
    );
    assert_eq!(h.store.last_status().unwrap().phase.to_string(), "Available");
}

#[tokio::test]
async fn configured_server_host_is_applied_to_live_route() {
    let h = Harness::new();
    h.reconcile(&with_route(false)).await;
    assert!(h.store.route("argocd-server").data["spec"].get("host").is_none());

    let mut spec = with_route(false);
    spec.server.host = Some("argocd.example.com".to_string());
    h.reconcile(&spec).await;

    let route = h.store.route("argocd-server");
    assert_eq!(route.data["spec"]["host"], "argocd.example.com");
    assert_eq!(
        route_tuple(&route),
        ("passthrough".into(), "Redirect".into(), "https".into())
    );
    assert_eq!(h.store.data("argocd-cm")["url"], "https://argocd.example.com");
}

#[tokio::test]
async fn switching_to_alternate_provider_removes_dex_config() {
    let h = Harness::new();
    let dex_spec = ArgoCDSpec {
        dex: Some(DexSpec {
            config: "connectors: []\n".to_string(),
            ..Default::default()
        }),
        ..Default::default()
    };
    h.reconcile(&dex_spec).await;
    assert_eq!(h.store.data("argocd-cm")["dex.config"], "connectors: []\n");

    let keycloak = ArgoCDSpec {
        sso: Some(SsoSpec::default()),
        ..dex_spec
    };
    h.reconcile(&keycloak).await;
    assert!(!h.store.data("argocd-cm").contains_key("dex.config"));
}
