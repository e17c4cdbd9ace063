//! Manifest synthesis for the objects backing a Model.
//!
//! Everything here is pure. The same `ModelServing` value always produces the same ConfigMap,
//! StatefulSet and Service, and building them cannot fail. Only creating them in K8s can.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapKeySelector, Container, ContainerPort, EnvVar, EnvVarSource, PersistentVolumeClaim, PersistentVolumeClaimSpec, PodSpec,
    PodTemplateSpec, ResourceRequirements, Service, ServicePort, ServiceSpec, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::{Model, RequiredMetadata};

/// The image repository of the model serving runtime. The tag comes from the Model's version.
pub const SERVING_IMAGE: &str = "plasmashadow/model_serving";
/// The pod container name of the model server.
pub const CONTAINER_NAME_SERVING: &str = "serving";
/// The port on which the model server listens, and which the Service exposes.
pub const SERVING_PORT: i32 = 4000;
/// The label used to select the pods of a Model.
pub const LABEL_SERVING: &str = "serving";
/// The storage class used for serving PVCs.
pub const PVC_STORAGE_CLASS: &str = "do-block-storage";
/// The size requested by each serving PVC.
pub const PVC_VOLUME_SIZE: &str = "5Gi";
/// The location where serving pods mount their PVC.
pub const SERVING_DATA_PATH: &str = "/data";

/// ConfigMap key holding the model artifact path.
pub const KEY_MODEL_PATH: &str = "MODEL_PATH";
/// ConfigMap key holding the feature columns.
pub const KEY_COLUMNS: &str = "COLUMNS";
/// ConfigMap key holding the object storage access key.
pub const KEY_ACCESS_KEY: &str = "access_key";
/// ConfigMap key holding the object storage secret key.
pub const KEY_SECRET_KEY: &str = "secret_key";
/// ConfigMap key holding the object storage endpoint.
pub const KEY_ENDPOINT: &str = "endpoint";
/// ConfigMap key holding the object storage bucket.
pub const KEY_BUCKET: &str = "bucket";

/// Env vars of the serving container, paired with the ConfigMap key each one reads.
const SERVING_ENV: [(&str, &str); 6] = [
    ("MODEL_PATH", KEY_MODEL_PATH),
    ("COLUMNS", KEY_COLUMNS),
    ("ACCESS_KEY", KEY_ACCESS_KEY),
    ("SECRET_KEY", KEY_SECRET_KEY),
    ("ENDPOINT", KEY_ENDPOINT),
    ("BUCKET", KEY_BUCKET),
];

/// Name of the ConfigMap backing the given Model.
pub fn config_map_name(model_name: &str) -> String {
    format!("cf-{}", model_name)
}

/// Name of the StatefulSet backing the given Model.
pub fn statefulset_name(model_name: &str) -> String {
    model_name.to_string()
}

/// Name of the Service fronting the given Model.
pub fn service_name(model_name: &str) -> String {
    format!("ms-{}", model_name)
}

/// Name of the PVC template of the given Model's StatefulSet.
pub fn pvc_template_name(model_name: &str) -> String {
    format!("pvc-{}", model_name)
}

/// The flattened description of a model serving deployment, from which all manifests are built.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelServing {
    pub name: String,
    pub namespace: String,
    pub model_path: String,
    pub columns: String,
    pub version: String,
    pub replicas: i32,
    pub access_key: String,
    pub secret_key: String,
    pub endpoint: String,
    pub bucket: String,
}

impl From<&Model> for ModelServing {
    fn from(model: &Model) -> Self {
        Self {
            name: model.name().into(),
            namespace: model.namespace().into(),
            model_path: model.spec.location.clone(),
            columns: model.spec.columns.clone(),
            version: model.spec.version.clone(),
            replicas: model.spec.replicas,
            access_key: model.spec.access_key.clone(),
            secret_key: model.spec.secret_key.clone(),
            endpoint: model.spec.endpoint.clone(),
            bucket: model.spec.bucket.clone(),
        }
    }
}

impl ModelServing {
    /// The label set identifying this Model's pods.
    ///
    /// The StatefulSet selector, the pod template labels and the Service selector are all built
    /// from this one set. If they ever diverge, the Service will select no pods.
    pub fn labels(&self) -> BTreeMap<String, String> {
        maplit::btreemap! {
            LABEL_SERVING.into() => self.name.clone(),
        }
    }

    /// The full image reference of the serving runtime.
    pub fn image(&self) -> String {
        format!("{}:{}", SERVING_IMAGE, self.version)
    }

    /// Build the ConfigMap holding this Model's runtime configuration.
    pub fn config_map(&self) -> ConfigMap {
        tracing::debug!(name = %self.name, "building configmap for model");
        ConfigMap {
            metadata: self.object_meta(config_map_name(&self.name)),
            immutable: Some(false),
            data: Some(maplit::btreemap! {
                KEY_MODEL_PATH.into() => self.model_path.clone(),
                KEY_COLUMNS.into() => self.columns.clone(),
                KEY_ACCESS_KEY.into() => self.access_key.clone(),
                KEY_SECRET_KEY.into() => self.secret_key.clone(),
                KEY_ENDPOINT.into() => self.endpoint.clone(),
                KEY_BUCKET.into() => self.bucket.clone(),
            }),
            ..Default::default()
        }
    }

    /// Build the StatefulSet running this Model's serving pods.
    pub fn statefulset(&self) -> StatefulSet {
        tracing::debug!(name = %self.name, "building statefulset for model");
        let labels = self.labels();
        let config_map = config_map_name(&self.name);
        let pvc_name = pvc_template_name(&self.name);

        // Every env var is a reference into the ConfigMap, never a literal value.
        let env = SERVING_ENV
            .iter()
            .map(|(var, key)| EnvVar {
                name: (*var).into(),
                value_from: Some(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: Some(config_map.clone()),
                        key: (*key).into(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect();

        StatefulSet {
            metadata: self.object_meta(statefulset_name(&self.name)),
            spec: Some(StatefulSetSpec {
                replicas: Some(self.replicas),
                revision_history_limit: Some(0),
                service_name: service_name(&self.name),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta { labels: Some(labels), ..Default::default() }),
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: CONTAINER_NAME_SERVING.into(),
                            image: Some(self.image()),
                            ports: Some(vec![ContainerPort {
                                name: Some(CONTAINER_NAME_SERVING.into()),
                                container_port: SERVING_PORT,
                                ..Default::default()
                            }]),
                            env: Some(env),
                            volume_mounts: Some(vec![VolumeMount {
                                name: pvc_name.clone(),
                                mount_path: SERVING_DATA_PATH.into(),
                                ..Default::default()
                            }]),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                },
                volume_claim_templates: Some(vec![PersistentVolumeClaim {
                    metadata: ObjectMeta { name: Some(pvc_name), ..Default::default() },
                    spec: Some(PersistentVolumeClaimSpec {
                        access_modes: Some(vec!["ReadWriteMany".into()]),
                        storage_class_name: Some(PVC_STORAGE_CLASS.into()),
                        resources: Some(ResourceRequirements {
                            requests: Some(maplit::btreemap! {
                                "storage".into() => Quantity(PVC_VOLUME_SIZE.into()),
                            }),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    /// Build the cluster-internal Service fronting this Model's pods.
    pub fn service(&self) -> Service {
        tracing::debug!(name = %self.name, "building service for model");
        Service {
            metadata: self.object_meta(service_name(&self.name)),
            spec: Some(ServiceSpec {
                selector: Some(self.labels()),
                ports: Some(vec![ServicePort {
                    name: Some("http-serving".into()),
                    port: SERVING_PORT,
                    target_port: Some(IntOrString::Int(SERVING_PORT)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn object_meta(&self, name: String) -> ObjectMeta {
        ObjectMeta {
            name: Some(name),
            namespace: Some(self.namespace.clone()),
            ..Default::default()
        }
    }
}
