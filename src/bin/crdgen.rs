//! A script used to generate the Model CRD.
//!
//! Any time the CRD spec changes, this script can be run to ensure that the CRD is up-to-date and
//! ready to be synced with the cluster: `cargo run --bin crdgen > model.yaml`.

use anyhow::{Context, Result};
use kube::CustomResourceExt;
use model_operator::crd::Model;

fn main() -> Result<()> {
    let model = Model::crd();
    let model_yaml = serde_yaml::to_string(&model).context("error serializing Model CRD to yaml")?;
    print!("{}", model_yaml);
    Ok(())
}
