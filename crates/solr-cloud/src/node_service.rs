//! Per-node services
//!
//! With ingress addressing each Solr node is fronted by its own Service so
//! it can be routed to individually.

use kube::ResourceExt;
use solr_common::crd::SolrCloud;
use solr_common::kube_utils::{copy_service_fields, create_or_update};
use solr_common::{Error, Store};
use tracing::debug;

use crate::controller::owned;
use crate::resources::generate_node_service;

/// Create or update the Service for `node_name` and return its cluster IP
///
/// The IP is empty until the API server assigns one, which is normal right
/// after creation.
pub(crate) async fn reconcile_node_service(
    store: &Store,
    cloud: &SolrCloud,
    node_name: &str,
) -> Result<String, Error> {
    let desired = owned(cloud, generate_node_service(cloud, node_name))?;
    let live = create_or_update(store, desired, copy_service_fields).await?;
    let ip = live
        .spec
        .and_then(|spec| spec.cluster_ip)
        .unwrap_or_default();
    if ip.is_empty() {
        debug!(cloud = %cloud.name_any(), node = node_name, "cluster IP not assigned yet");
    }
    Ok(ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::Service;
    use solr_common::crd::{ExternalAddressability, SolrCloudSpec};
    use solr_common::testing::FakeStore;

    fn cloud() -> SolrCloud {
        let mut cloud = SolrCloud::new("books", SolrCloudSpec::default());
        cloud.metadata.namespace = Some("search".to_string());
        cloud.metadata.uid = Some("cloud-uid".to_string());
        cloud.spec.solr_addressability.external = Some(ExternalAddressability {
            domain_name: "example.com".to_string(),
            ..Default::default()
        });
        cloud.with_defaults(None);
        cloud
    }

    #[tokio::test]
    async fn fresh_service_has_no_ip() {
        let fake = FakeStore::new();
        let ip = reconcile_node_service(&fake.store(), &cloud(), "books-solrcloud-0")
            .await
            .unwrap();

        assert_eq!(ip, "");
        let svc = fake.object::<Service>("search", "books-solrcloud-0").unwrap();
        assert_eq!(
            svc.metadata.owner_references.unwrap()[0].uid,
            "cloud-uid"
        );
    }

    #[tokio::test]
    async fn assigned_ip_is_returned_and_kept() {
        let fake = FakeStore::new();
        let cloud = cloud();
        reconcile_node_service(&fake.store(), &cloud, "books-solrcloud-0")
            .await
            .unwrap();
        fake.modify::<Service>("search", "books-solrcloud-0", |svc| {
            if let Some(spec) = svc.spec.as_mut() {
                spec.cluster_ip = Some("10.0.0.7".to_string());
            }
        });

        let ip = reconcile_node_service(&fake.store(), &cloud, "books-solrcloud-0")
            .await
            .unwrap();
        assert_eq!(ip, "10.0.0.7");
    }
}
