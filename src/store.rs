//! Access to the cluster object store.
//!
//! The reconciler only ever needs to read a Model, check for a StatefulSet and create the three
//! child objects. Those calls are expressed as the `ObjectStore` trait so that the decision
//! procedure does not depend on a live API server.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, PostParams};
use kube::client::Client;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::timeout;

use crate::crd::Model;
use crate::error::{Error, Result};

/// The default timeout to use for API calls.
pub const API_TIMEOUT: Duration = Duration::from_secs(5);

/// The object store operations used by the reconciler.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the target Model, returning `None` if it does not exist.
    async fn get_model(&self, namespace: &str, name: &str) -> Result<Option<Model>>;

    /// Fetch the target StatefulSet, returning `None` if it does not exist.
    async fn get_statefulset(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>>;

    /// Create the given ConfigMap in the namespace named by its metadata.
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap>;

    /// Create the given StatefulSet in the namespace named by its metadata.
    async fn create_statefulset(&self, sts: &StatefulSet) -> Result<StatefulSet>;

    /// Create the given Service in the namespace named by its metadata.
    async fn create_service(&self, service: &Service) -> Result<Service>;
}

/// An `ObjectStore` backed by the K8s API.
#[derive(Clone)]
pub struct KubeStore {
    /// K8s client.
    client: Client,
}

impl KubeStore {
    /// Create a new instance.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get<K>(&self, namespace: &str, name: &str, action: &'static str) -> Result<Option<K>>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
        K::DynamicType: Default,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        timeout(API_TIMEOUT, api.get_opt(name))
            .await
            .map_err(|_| Error::Timeout(action))?
            .map_err(Error::from)
    }

    async fn create<K>(&self, obj: &K, action: &'static str) -> Result<K>
    where
        K: Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Serialize + Debug,
        K::DynamicType: Default,
    {
        let namespace = obj.meta().namespace.as_deref().ok_or(Error::MissingObjectKey("metadata.namespace"))?;
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        let params = PostParams::default();
        timeout(API_TIMEOUT, api.create(&params, obj))
            .await
            .map_err(|_| Error::Timeout(action))?
            .map_err(Error::from)
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_model(&self, namespace: &str, name: &str) -> Result<Option<Model>> {
        self.get(namespace, name, "fetching Model").await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn get_statefulset(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>> {
        self.get(namespace, name, "fetching StatefulSet").await
    }

    #[tracing::instrument(level = "debug", skip(self, config_map))]
    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap> {
        if let Some(name) = config_map.metadata.name.as_ref() {
            tracing::info!(%name, "creating ConfigMap");
        }
        self.create(config_map, "creating ConfigMap").await
    }

    #[tracing::instrument(level = "debug", skip(self, sts))]
    async fn create_statefulset(&self, sts: &StatefulSet) -> Result<StatefulSet> {
        if let Some(name) = sts.metadata.name.as_ref() {
            tracing::info!(%name, "creating StatefulSet");
        }
        self.create(sts, "creating StatefulSet").await
    }

    #[tracing::instrument(level = "debug", skip(self, service))]
    async fn create_service(&self, service: &Service) -> Result<Service> {
        if let Some(name) = service.metadata.name.as_ref() {
            tracing::info!(service = %name, "creating Service");
        }
        self.create(service, "creating Service").await
    }
}
