//! Startup utilities for the Solr operator

mod crds;

pub use crds::{crd_manifests, ensure_crds_installed};
