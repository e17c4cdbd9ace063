//! Kubernetes controller.
//!
//! Registers interest in Model objects, plus the StatefulSets they own as a secondary trigger,
//! with the kube runtime. The runtime never reconciles the same object concurrently, while
//! different Models may be reconciled in parallel.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::prelude::*;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::api::Api;
use kube::client::Client;
use kube::runtime::controller::{Action, Controller};
use kube::runtime::watcher;

use crate::crd::{Model, RequiredMetadata};
use crate::error::Error;
use crate::reconcile::{self, ReconcileOutcome};
use crate::store::{KubeStore, ObjectStore};

/// The delay before a freshly provisioned Model is reconciled again.
pub const REQUEUE_PROVISIONED: Duration = Duration::from_secs(1);
/// The delay before a failed reconciliation is retried.
pub const REQUEUE_ERROR: Duration = Duration::from_secs(5);

/// Metric name for reconciliation errors.
pub const METRIC_RECONCILE_ERRORS: &str = "model_operator_reconcile_errors";

/// Shared state handed to every reconciliation.
pub struct Context {
    /// The object store used to read & create objects.
    store: Box<dyn ObjectStore>,
}

impl Context {
    /// Create a new instance.
    pub fn new(store: Box<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

/// Register the metrics emitted by the controller.
pub fn describe_metrics() {
    reconcile::describe_metrics();
    metrics::describe_counter!(METRIC_RECONCILE_ERRORS, metrics::Unit::Count, "model reconciliations which returned an error");
}

/// Run the controller until the given shutdown future resolves.
///
/// When `namespace` is `None`, Models in all namespaces are watched.
pub async fn run(client: Client, namespace: Option<String>, shutdown: impl Future<Output = ()> + Send + Sync + 'static) {
    let (models, statefulsets): (Api<Model>, Api<StatefulSet>) = match namespace.as_deref() {
        Some(ns) => (Api::namespaced(client.clone(), ns), Api::namespaced(client.clone(), ns)),
        None => (Api::all(client.clone()), Api::all(client.clone())),
    };
    let ctx = Arc::new(Context::new(Box::new(KubeStore::new(client))));

    tracing::info!(namespace = namespace.as_deref().unwrap_or("*"), "k8s controller initialized");
    Controller::new(models, watcher::Config::default())
        .owns(statefulsets, watcher::Config::default())
        .graceful_shutdown_on(shutdown)
        .run(reconcile_model, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => tracing::debug!(model = %obj, ?action, "reconciled model"),
                // Failures are already reported by the error policy.
                Err(err) => tracing::debug!(error = %err, "model reconciliation failed"),
            }
        })
        .await;
    tracing::debug!("k8s controller shutdown");
}

/// Reconcile the given Model, mapping the outcome into a runtime action.
async fn reconcile_model(model: Arc<Model>, ctx: Arc<Context>) -> Result<Action, Error> {
    let outcome = reconcile::reconcile(ctx.store.as_ref(), model.namespace(), model.name()).await?;
    Ok(action_for(outcome))
}

/// The runtime action which follows the given outcome.
pub fn action_for(outcome: ReconcileOutcome) -> Action {
    if outcome.requeue() {
        Action::requeue(REQUEUE_PROVISIONED)
    } else {
        Action::await_change()
    }
}

/// Requeue failed reconciliations after a fixed delay.
fn error_policy(model: Arc<Model>, err: &Error, _ctx: Arc<Context>) -> Action {
    tracing::error!(error = ?err, model = model.name(), namespace = model.namespace(), "error reconciling model");
    metrics::increment_counter!(METRIC_RECONCILE_ERRORS);
    Action::requeue(REQUEUE_ERROR)
}
