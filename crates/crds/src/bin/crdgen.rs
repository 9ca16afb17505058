//! Prints the CRD manifests of all GCP managed resources as YAML.
//!
//! Usage: `cargo run -p crds --bin crdgen > config/crd/bases/crds.yaml`

use crds::{CloudSqlInstance, ManagedZone, ProviderConfig, ResourceRecordSet};
use kube::CustomResourceExt;

fn main() -> Result<(), serde_yaml::Error> {
    let crds = [
        ProviderConfig::crd(),
        ManagedZone::crd(),
        ResourceRecordSet::crd(),
        CloudSqlInstance::crd(),
    ];

    for crd in &crds {
        println!("---");
        print!("{}", serde_yaml::to_string(crd)?);
    }

    Ok(())
}
