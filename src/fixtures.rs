use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::ErrorResponse;

use crate::crd::{Model, ModelSpec};
use crate::error::{Error, Result};
use crate::store::ObjectStore;

/// Build a Model as it would be returned from the API server.
pub fn model(name: &str, namespace: &str, replicas: i32, version: &str, columns: &str) -> Model {
    let mut model = Model::new(
        name,
        ModelSpec {
            location: format!("{}.sav", name),
            columns: columns.into(),
            version: version.into(),
            replicas,
            endpoint: "https://sgp1.digitaloceanspaces.com".into(),
            bucket: "models".into(),
            access_key: "access".into(),
            secret_key: "secret".into(),
        },
    );
    model.metadata.namespace = Some(namespace.into());
    model.metadata.uid = Some(format!("uid-{}", name));
    model
}

/// Build a StatefulSet with the given name & namespace.
pub fn statefulset(name: &str, namespace: &str) -> StatefulSet {
    StatefulSet {
        metadata: ObjectMeta {
            name: Some(name.into()),
            namespace: Some(namespace.into()),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Build an error as returned by the K8s API.
pub fn api_error(code: u16, reason: &str) -> Error {
    Error::from(kube::Error::Api(ErrorResponse {
        status: "Failure".into(),
        message: format!("test {}", reason),
        reason: reason.into(),
        code,
    }))
}

/// A create call observed by a `MemoryStore`.
#[derive(Clone, Debug, PartialEq)]
pub enum Created {
    ConfigMap(ConfigMap),
    StatefulSet(StatefulSet),
    Service(Service),
}

impl Created {
    /// The kind & name of the created object.
    pub fn key(&self) -> (&'static str, String) {
        let (kind, meta) = match self {
            Self::ConfigMap(obj) => ("ConfigMap", &obj.metadata),
            Self::StatefulSet(obj) => ("StatefulSet", &obj.metadata),
            Self::Service(obj) => ("Service", &obj.metadata),
        };
        (kind, meta.name.clone().unwrap_or_default())
    }
}

/// An in-memory object store recording every create call.
///
/// Failures may be injected per call. Creates are keyed by object kind (`"ConfigMap"`), reads by
/// `"get:"` and the kind (`"get:Model"`). An injected failure is returned for the next matching call
/// only, and a failed create stores nothing.
#[derive(Default)]
pub struct MemoryStore {
    models: Mutex<HashMap<(String, String), Model>>,
    statefulsets: Mutex<HashMap<(String, String), StatefulSet>>,
    creates: Mutex<Vec<Created>>,
    failures: Mutex<HashMap<&'static str, Error>>,
}

impl MemoryStore {
    pub fn with_model(self, model: Model) -> Self {
        let key = key_of(&model.metadata);
        self.models.lock().unwrap().insert(key, model);
        self
    }

    pub fn with_statefulset(self, sts: StatefulSet) -> Self {
        let key = key_of(&sts.metadata);
        self.statefulsets.lock().unwrap().insert(key, sts);
        self
    }

    pub fn fail_next(&self, kind: &'static str, err: Error) {
        self.failures.lock().unwrap().insert(kind, err);
    }

    pub fn creates(&self) -> Vec<Created> {
        self.creates.lock().unwrap().clone()
    }

    pub fn created_keys(&self) -> Vec<(&'static str, String)> {
        self.creates.lock().unwrap().iter().map(Created::key).collect()
    }

    pub fn clear_creates(&self) {
        self.creates.lock().unwrap().clear();
    }

    fn check_failure(&self, key: &'static str) -> Result<()> {
        match self.failures.lock().unwrap().remove(key) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn record(&self, kind: &'static str, obj: Created) -> Result<()> {
        self.check_failure(kind)?;
        self.creates.lock().unwrap().push(obj);
        Ok(())
    }
}

fn key_of(meta: &ObjectMeta) -> (String, String) {
    (meta.namespace.clone().unwrap_or_default(), meta.name.clone().unwrap_or_default())
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get_model(&self, namespace: &str, name: &str) -> Result<Option<Model>> {
        self.check_failure("get:Model")?;
        Ok(self.models.lock().unwrap().get(&(namespace.into(), name.into())).cloned())
    }

    async fn get_statefulset(&self, namespace: &str, name: &str) -> Result<Option<StatefulSet>> {
        self.check_failure("get:StatefulSet")?;
        Ok(self.statefulsets.lock().unwrap().get(&(namespace.into(), name.into())).cloned())
    }

    async fn create_config_map(&self, config_map: &ConfigMap) -> Result<ConfigMap> {
        self.record("ConfigMap", Created::ConfigMap(config_map.clone()))?;
        Ok(config_map.clone())
    }

    async fn create_statefulset(&self, sts: &StatefulSet) -> Result<StatefulSet> {
        self.record("StatefulSet", Created::StatefulSet(sts.clone()))?;
        self.statefulsets.lock().unwrap().insert(key_of(&sts.metadata), sts.clone());
        Ok(sts.clone())
    }

    async fn create_service(&self, service: &Service) -> Result<Service> {
        self.record("Service", Created::Service(service.clone()))?;
        Ok(service.clone())
    }
}
