//! CRD installation utilities
//!
//! The operator installs the CRDs it owns on startup with server-side apply,
//! so their schema always matches the running version. ZookeeperCluster
//! belongs to the ZooKeeper operator and is never installed here.

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, Patch, PatchParams};
use kube::{Client, CustomResourceExt};

use solr_common::crd::{SolrCloud, SolrPrometheusExporter};

const FIELD_MANAGER: &str = "solr-operator";

/// CRD definition with name and resource
struct CrdDef {
    name: &'static str,
    crd: CustomResourceDefinition,
}

fn owned_crds() -> Vec<CrdDef> {
    vec![
        CrdDef {
            name: "solrclouds.solr.bloomberg.com",
            crd: SolrCloud::crd(),
        },
        CrdDef {
            name: "solrprometheusexporters.solr.bloomberg.com",
            crd: SolrPrometheusExporter::crd(),
        },
    ]
}

/// YAML manifests of every owned CRD, as a multi-document stream
pub fn crd_manifests() -> anyhow::Result<String> {
    let mut docs = Vec::new();
    for def in owned_crds() {
        docs.push(
            serde_yaml::to_string(&def.crd)
                .map_err(|e| anyhow::anyhow!("failed to serialize {} CRD: {}", def.name, e))?,
        );
    }
    Ok(docs.join("---\n"))
}

/// Ensure the SolrCloud and SolrPrometheusExporter CRDs are installed
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    for def in owned_crds() {
        tracing::info!("Installing {} CRD...", def.name);
        crds.patch(def.name, &params, &Patch::Apply(&def.crd))
            .await
            .map_err(|e| anyhow::anyhow!("failed to install {} CRD: {}", def.name, e))?;
    }

    tracing::info!("Solr CRDs installed/updated");
    Ok(())
}
