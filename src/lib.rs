//! The Model operator.
//!
//! Provisions a model-serving StatefulSet, Service and ConfigMap for every `Model` resource
//! declared in the cluster.

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
#[cfg(test)]
mod fixtures;
pub mod manifest;
pub mod reconcile;
pub mod store;

pub use error::{Error, Result};
