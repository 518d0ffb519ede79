//! Cluster store access
//!
//! The [`ObjectStore`] trait is the only way reconciliation touches the cluster.
//! Writes carry the `resourceVersion` of the object they were derived from, so
//! the API server rejects stale writes; those rejections surface as
//! [`Error::Conflict`] and are never retried here.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret, ServiceAccount};
use kube::api::{Api, DynamicObject, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::crd::route::{route_api_resource, ROUTE_KIND};
use crate::crd::{ArgoCD, ArgoCDStatus};
use crate::{Error, FIELD_MANAGER};

/// Trait abstracting the cluster store operations used by reconciliation
///
/// This trait allows mocking the Kubernetes client in tests while using
/// the real client in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Get a ConfigMap, `None` if it does not exist
    async fn get_config_map(&self, namespace: &str, name: &str)
        -> Result<Option<ConfigMap>, Error>;

    /// Create a ConfigMap
    async fn create_config_map(&self, namespace: &str, cm: &ConfigMap)
        -> Result<ConfigMap, Error>;

    /// Replace a ConfigMap; fails with a conflict if its resourceVersion is stale
    async fn replace_config_map(
        &self,
        namespace: &str,
        cm: &ConfigMap,
    ) -> Result<ConfigMap, Error>;

    /// Get a Route, `None` if it does not exist
    async fn get_route(&self, namespace: &str, name: &str)
        -> Result<Option<DynamicObject>, Error>;

    /// Create a Route
    async fn create_route(
        &self,
        namespace: &str,
        route: &DynamicObject,
    ) -> Result<DynamicObject, Error>;

    /// Replace a Route; fails with a conflict if its resourceVersion is stale
    async fn replace_route(
        &self,
        namespace: &str,
        route: &DynamicObject,
    ) -> Result<DynamicObject, Error>;

    /// Get a ServiceAccount, `None` if it does not exist
    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, Error>;

    /// Get a Secret, `None` if it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Patch the status subresource of an ArgoCD
    async fn patch_argocd_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ArgoCDStatus,
    ) -> Result<(), Error>;
}

/// Real Kubernetes client implementation
pub struct KubeObjectStore {
    client: Client,
}

impl KubeObjectStore {
    /// Create a new store wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

/// Map a 404 on read to `None`
fn found<T>(result: Result<T, kube::Error>) -> Result<Option<T>, Error> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn object_name(name: Option<&String>) -> Result<&str, Error> {
    name.map(String::as_str)
        .ok_or_else(|| Error::invariant("object to write has no metadata.name"))
}

#[async_trait]
impl ObjectStore for KubeObjectStore {
    async fn get_config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigMap>, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        found(api.get(name).await)
    }

    async fn create_config_map(
        &self,
        namespace: &str,
        cm: &ConfigMap,
    ) -> Result<ConfigMap, Error> {
        let name = object_name(cm.metadata.name.as_ref())?;
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        debug!(name = %name, "creating ConfigMap");
        api.create(&PostParams::default(), cm)
            .await
            .map_err(|e| Error::from_write("ConfigMap", name, e))
    }

    async fn replace_config_map(
        &self,
        namespace: &str,
        cm: &ConfigMap,
    ) -> Result<ConfigMap, Error> {
        let name = object_name(cm.metadata.name.as_ref())?;
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), namespace);
        debug!(name = %name, "replacing ConfigMap");
        api.replace(name, &PostParams::default(), cm)
            .await
            .map_err(|e| Error::from_write("ConfigMap", name, e))
    }

    async fn get_route(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &route_api_resource());
        found(api.get(name).await)
    }

    async fn create_route(
        &self,
        namespace: &str,
        route: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let name = object_name(route.metadata.name.as_ref())?;
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &route_api_resource());
        debug!(name = %name, "creating Route");
        api.create(&PostParams::default(), route)
            .await
            .map_err(|e| Error::from_write(ROUTE_KIND, name, e))
    }

    async fn replace_route(
        &self,
        namespace: &str,
        route: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let name = object_name(route.metadata.name.as_ref())?;
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), namespace, &route_api_resource());
        debug!(name = %name, "replacing Route");
        api.replace(name, &PostParams::default(), route)
            .await
            .map_err(|e| Error::from_write(ROUTE_KIND, name, e))
    }

    async fn get_service_account(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ServiceAccount>, Error> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        found(api.get(name).await)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        found(api.get(name).await)
    }

    async fn patch_argocd_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ArgoCDStatus,
    ) -> Result<(), Error> {
        let api: Api<ArgoCD> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        Ok(())
    }
}
