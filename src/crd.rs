//! Model CRD.
//!
//! The code here is used to generate the actual CRD used in K8s. See `src/bin/crdgen.rs`.
//!
//! References:
//! - https://kubernetes.io/docs/tasks/extend-kubernetes/custom-resources/custom-resource-definitions/
//! - https://kubernetes.io/docs/tasks/extend-kubernetes/custom-resources/custom-resource-definitions/#additional-printer-columns

use kube::{CustomResource, Resource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CRD spec for the Model resource.
///
/// None of these values are validated by the operator. Empty strings and a replica count of `0`
/// are passed through to the generated objects as-is.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, CustomResource, JsonSchema)]
#[kube(
    group = "ml.kalkyai.com",
    version = "v1alpha1",
    kind = "Model",
    plural = "models",
    namespaced,
    derive = "PartialEq",
    derive = "Default",
    shortname = "model",
    printcolumn = r#"{"name":"Replicas","type":"integer","jsonPath":".spec.replicas"}"#,
    printcolumn = r#"{"name":"Version","type":"string","jsonPath":".spec.version"}"#,
    printcolumn = r#"{"name":"Location","type":"string","jsonPath":".spec.location"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    /// The path of the model artifact within the object storage bucket.
    #[serde(default)]
    pub location: String,
    /// Comma-separated feature column names, handed to the serving process unchanged.
    #[serde(default)]
    pub columns: String,
    /// The tag of the serving runtime image.
    #[serde(default)]
    pub version: String,
    /// The number of serving pods.
    #[serde(default)]
    pub replicas: i32,

    /// The object storage endpoint URL.
    #[serde(default)]
    pub endpoint: String,
    /// The object storage bucket holding the model artifact.
    #[serde(default)]
    pub bucket: String,
    /// The object storage access key.
    #[serde(default)]
    pub access_key: String,
    /// The object storage secret key.
    #[serde(default)]
    pub secret_key: String,
}

/// A convenience trait built around the fact that all implementors
/// must have the following attributes.
pub trait RequiredMetadata {
    /// The namespace of this object.
    fn namespace(&self) -> &str;

    /// The name of this object.
    fn name(&self) -> &str;
}

impl RequiredMetadata for Model {
    fn namespace(&self) -> &str {
        self.meta().namespace.as_deref().unwrap_or_default()
    }

    fn name(&self) -> &str {
        self.meta().name.as_deref().unwrap_or_default()
    }
}
