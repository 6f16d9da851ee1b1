//! Prints the MCops CRDs as a multi-document YAML stream.
//!
//! `cargo run -p crds --bin crdgen > config/crds.yaml`

use crds::{Gateway, ResourceExport};
use kube::CustomResourceExt;

fn main() -> anyhow::Result<()> {
    let crds = [Gateway::crd(), ResourceExport::crd()];
    for crd in &crds {
        print!("---\n{}", serde_yaml::to_string(crd)?);
    }
    Ok(())
}
