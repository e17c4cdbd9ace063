//! The Model reconciliation decision procedure.
//!
//! ## Overview
//! Reconciliation is create-on-first-sight. A Model whose backing StatefulSet does not exist gets
//! its ConfigMap, StatefulSet and Service created, in that order, each owned by the Model so that
//! K8s garbage collection removes them along with it. Once the StatefulSet exists, nothing more is
//! done: spec changes are not propagated and no status is written back onto the Model.
//!
//! ## Partial Failures
//! Creates already performed in a pass are never rolled back. When a later create fails, the
//! error is surfaced and the runtime retries. Objects which were created on a previous attempt
//! come back as `AlreadyExists`, which is logged and skipped, so a retried pass picks up where the
//! failed one stopped.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Resource;

use crate::crd::Model;
use crate::error::{Error, Result};
use crate::manifest::{self, ModelServing};
use crate::store::ObjectStore;

/// Metric name for reconciliations which created child objects.
pub const METRIC_MODELS_PROVISIONED: &str = "model_operator_models_provisioned";
/// Metric name for child objects created.
pub const METRIC_OBJECTS_CREATED: &str = "model_operator_objects_created";
/// Metric name for child object creates which failed.
pub const METRIC_OBJECT_CREATE_ERRORS: &str = "model_operator_object_create_errors";

/// The observed state which a reconciliation acted upon.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The Model no longer exists; nothing was done.
    ModelAbsent,
    /// The Model's StatefulSet already exists; nothing was done.
    AlreadyProvisioned,
    /// The Model's child objects were created.
    Provisioned,
}

impl ReconcileOutcome {
    /// Whether the Model should be reconciled again to observe the newly created objects.
    pub fn requeue(&self) -> bool {
        matches!(self, Self::Provisioned)
    }
}

/// Register the metrics emitted by the reconciler.
pub fn describe_metrics() {
    metrics::describe_counter!(METRIC_MODELS_PROVISIONED, metrics::Unit::Count, "models whose child objects were created");
    metrics::describe_counter!(METRIC_OBJECTS_CREATED, metrics::Unit::Count, "child objects created for models");
    metrics::describe_counter!(METRIC_OBJECT_CREATE_ERRORS, metrics::Unit::Count, "child object creates which failed");
}

/// Reconcile the Model identified by the given namespace & name.
///
/// The Model and its StatefulSet are always re-read from the store, the caller only supplies the
/// identifier.
#[tracing::instrument(level = "debug", skip(store))]
pub async fn reconcile<S>(store: &S, namespace: &str, name: &str) -> Result<ReconcileOutcome>
where
    S: ObjectStore + ?Sized,
{
    let model = match store.get_model(namespace, name).await? {
        Some(model) => model,
        None => {
            tracing::debug!("model not found, it has likely been deleted");
            return Ok(ReconcileOutcome::ModelAbsent);
        }
    };

    let sts_name = manifest::statefulset_name(name);
    if store.get_statefulset(namespace, &sts_name).await?.is_some() {
        tracing::debug!(statefulset = %sts_name, "statefulset already exists for model");
        return Ok(ReconcileOutcome::AlreadyProvisioned);
    }

    tracing::info!(statefulset = %sts_name, "statefulset not found for model, provisioning");
    provision(store, &model).await?;
    metrics::increment_counter!(METRIC_MODELS_PROVISIONED);
    Ok(ReconcileOutcome::Provisioned)
}

/// Build the child objects of the given Model and create them.
async fn provision<S>(store: &S, model: &Model) -> Result<()>
where
    S: ObjectStore + ?Sized,
{
    let serving = ModelServing::from(model);
    let owner = model.controller_owner_ref(&()).ok_or(Error::MissingObjectKey("metadata.uid"))?;

    let mut config_map = serving.config_map();
    let mut sts = serving.statefulset();
    let mut service = serving.service();
    set_owner(&mut config_map, &owner);
    set_owner(&mut sts, &owner);
    set_owner(&mut service, &owner);

    check_create(store.create_config_map(&config_map).await, "ConfigMap", &config_map)?;
    check_create(store.create_statefulset(&sts).await, "StatefulSet", &sts)?;
    check_create(store.create_service(&service).await, "Service", &service)?;
    Ok(())
}

/// Record the outcome of a create call, tolerating objects which already exist.
fn check_create<K, T>(res: Result<T>, kind: &'static str, obj: &K) -> Result<()>
where
    K: Resource,
{
    let name = obj.meta().name.as_deref().unwrap_or_default();
    match res {
        Ok(_) => {
            metrics::increment_counter!(METRIC_OBJECTS_CREATED, "kind" => kind);
            Ok(())
        }
        Err(err) if err.is_already_exists() => {
            tracing::warn!(kind, name, "object already exists, skipping create");
            Ok(())
        }
        Err(err) => {
            metrics::increment_counter!(METRIC_OBJECT_CREATE_ERRORS, "kind" => kind);
            tracing::error!(error = ?err, kind, name, "error creating object for model");
            Err(err)
        }
    }
}

/// Make the given Model the controlling owner of the given object.
fn set_owner<K: Resource>(obj: &mut K, owner: &OwnerReference) {
    obj.meta_mut().owner_references = Some(vec![owner.clone()]);
}
