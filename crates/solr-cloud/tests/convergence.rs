//! Multi-pass reconcile tests against the in-memory store
//!
//! Each story seeds a SolrCloud into a `FakeStore`, drives `reconcile` the
//! way the controller would and asserts on the stored objects and on the
//! writes each pass performed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetStatus};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, ContainerStatus, Pod, PodSpec, PodStatus, Service,
};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::ObjectMeta;
use kube::runtime::controller::Action;
use solr_cloud::{error_policy, reconcile, SolrCloudContext};
use solr_common::crd::{
    ContainerImage, ExternalAddressability, ExternalAddressabilityMethod, ProvidedZookeeper,
    SolrCloud, SolrCloudSpec, ZookeeperCluster, ZookeeperConnectionInfo, ZookeeperRef,
};
use solr_common::testing::{FakeStore, Verb};
use solr_common::{Error, OperatorConfig, REQUEUE_AFTER_DEFAULTS_SECS};

const NS: &str = "search";
const NAME: &str = "books";

// =============================================================================
// Harness
// =============================================================================

fn connection(internal: &str) -> ZookeeperRef {
    ZookeeperRef {
        connection_info: Some(ZookeeperConnectionInfo {
            internal_connection_string: internal.to_string(),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn solr_cloud(zk: ZookeeperRef) -> SolrCloud {
    let mut cloud = SolrCloud::new(NAME, SolrCloudSpec::default());
    cloud.metadata.namespace = Some(NS.to_string());
    cloud.spec.zookeeper_ref = Some(zk);
    cloud
}

fn with_ingress(mut cloud: SolrCloud, use_external_address: bool) -> SolrCloud {
    cloud.spec.solr_addressability.external = Some(ExternalAddressability {
        method: ExternalAddressabilityMethod::Ingress,
        domain_name: "example.com".to_string(),
        use_external_address,
        ..Default::default()
    });
    cloud
}

struct Harness {
    fake: Arc<FakeStore>,
    ctx: Arc<SolrCloudContext>,
}

impl Harness {
    fn new(cloud: &SolrCloud) -> Self {
        Self::with_config(cloud, OperatorConfig::default())
    }

    fn with_config(cloud: &SolrCloud, config: OperatorConfig) -> Self {
        let fake = FakeStore::new();
        fake.insert(cloud).unwrap();
        let ctx = Arc::new(SolrCloudContext::new(fake.store(), Arc::new(config)));
        Self { fake, ctx }
    }

    fn cloud(&self) -> SolrCloud {
        self.fake.object::<SolrCloud>(NS, NAME).unwrap()
    }

    async fn pass(&self) -> Result<Action, Error> {
        reconcile(Arc::new(self.cloud()), self.ctx.clone()).await
    }

    /// Run passes until one completes without asking for a requeue
    async fn converge(&self) {
        for _ in 0..3 {
            if self.pass().await.unwrap() == Action::await_change() {
                return;
            }
        }
        panic!("SolrCloud did not converge");
    }
}

fn solr_pod(name: &str, tag: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NS.to_string()),
            labels: Some(BTreeMap::from([
                ("solr-cloud".to_string(), NAME.to_string()),
                ("technology".to_string(), "solr-cloud".to_string()),
            ])),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "solrcloud-node".to_string(),
                image: Some(format!("library/solr:{tag}")),
                ..Default::default()
            }],
            ..Default::default()
        }),
        status: Some(PodStatus {
            container_statuses: Some(vec![ContainerStatus {
                name: "solrcloud-node".to_string(),
                ready: true,
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

// =============================================================================
// Story Tests: Convergence
// =============================================================================

/// Story: the first pass only normalizes the spec and asks to come back
#[tokio::test]
async fn story_defaults_are_persisted_first() {
    let h = Harness::new(&solr_cloud(connection("zk-0.zk:2181")));

    let action = h.pass().await.unwrap();
    assert_eq!(
        action,
        Action::requeue(Duration::from_secs(REQUEUE_AFTER_DEFAULTS_SECS))
    );

    let mutations = h.fake.mutations();
    assert_eq!(mutations.len(), 1);
    assert_eq!(mutations[0].verb, Verb::Replace);
    assert_eq!(mutations[0].kind, "SolrCloud");
    assert_eq!(h.cloud().spec.replicas, Some(3));
}

/// Story: a converged cloud is left alone
#[tokio::test]
async fn story_second_pass_writes_nothing() {
    let h = Harness::new(&solr_cloud(connection("zk-0.zk:2181")));
    h.converge().await;
    assert!(h.fake.object::<StatefulSet>(NS, "books-solrcloud").is_some());

    h.fake.clear_mutations();
    assert_eq!(h.pass().await.unwrap(), Action::await_change());
    assert!(h.fake.mutations().is_empty(), "{:?}", h.fake.mutations());
}

/// Story: an ingress-addressed cloud on a provided ensemble also settles
#[tokio::test]
async fn story_external_topology_second_pass_writes_nothing() {
    let mut cloud = with_ingress(
        solr_cloud(ZookeeperRef {
            provided: Some(ProvidedZookeeper::default()),
            ..Default::default()
        }),
        true,
    );
    cloud.spec.replicas = Some(2);
    let h = Harness::new(&cloud);
    h.converge().await;

    for (i, node) in ["books-solrcloud-0", "books-solrcloud-1"].iter().enumerate() {
        h.fake.modify::<Service>(NS, node, |svc| {
            if let Some(spec) = svc.spec.as_mut() {
                spec.cluster_ip = Some(format!("10.0.0.{i}"));
            }
        });
    }
    h.pass().await.unwrap();
    assert!(h.fake.object::<StatefulSet>(NS, "books-solrcloud").is_some());
    assert!(h.fake.object::<Ingress>(NS, "books-solrcloud-common").is_some());

    h.fake.clear_mutations();
    assert_eq!(h.pass().await.unwrap(), Action::await_change());
    assert!(h.fake.mutations().is_empty(), "{:?}", h.fake.mutations());
}

/// Story: every dependent is controlled by the SolrCloud
#[tokio::test]
async fn story_dependents_are_owned_by_the_cloud() {
    let h = Harness::new(&solr_cloud(connection("zk-0.zk:2181")));
    h.converge().await;
    let uid = h.cloud().metadata.uid.unwrap();

    let mut owners = Vec::new();
    owners.extend(h.fake.objects::<Service>().into_iter().map(|o| o.metadata));
    owners.extend(h.fake.objects::<ConfigMap>().into_iter().map(|o| o.metadata));
    owners.extend(h.fake.objects::<StatefulSet>().into_iter().map(|o| o.metadata));
    assert_eq!(owners.len(), 4);
    for meta in owners {
        let refs = meta.owner_references.unwrap();
        assert_eq!(refs[0].uid, uid);
        assert_eq!(refs[0].controller, Some(true));
    }
}

/// Story: the StatefulSet waits until ZooKeeper has a host:port
#[tokio::test]
async fn story_statefulset_deferred_without_zookeeper_address() {
    let h = Harness::new(&solr_cloud(connection("")));
    h.converge().await;

    assert!(h.fake.object::<StatefulSet>(NS, "books-solrcloud").is_none());
    assert!(h.fake.object::<ConfigMap>(NS, "books-solrcloud-configmap").is_some());
    assert_eq!(h.fake.mutations_of("SolrCloud").last().map(|m| m.verb), Some(Verb::PatchStatus));
    let status = h.cloud().status.unwrap();
    assert_eq!((status.replicas, status.ready_replicas), (0, 0));
}

/// Story: advertised external addresses need every node service IP first
#[tokio::test]
async fn story_statefulset_waits_for_node_service_ips() {
    let mut cloud = with_ingress(solr_cloud(connection("zk-0.zk:2181")), true);
    cloud.spec.replicas = Some(2);
    let h = Harness::new(&cloud);
    h.converge().await;

    assert!(h.fake.object::<Service>(NS, "books-solrcloud-0").is_some());
    assert!(h.fake.object::<Service>(NS, "books-solrcloud-1").is_some());
    assert!(h.fake.object::<Service>(NS, "books-solrcloud-headless").is_none());
    assert!(h.fake.object::<StatefulSet>(NS, "books-solrcloud").is_none());

    for (i, node) in ["books-solrcloud-0", "books-solrcloud-1"].iter().enumerate() {
        h.fake.modify::<Service>(NS, node, |svc| {
            if let Some(spec) = svc.spec.as_mut() {
                spec.cluster_ip = Some(format!("10.0.0.{i}"));
            }
        });
    }
    h.pass().await.unwrap();

    let sts = h.fake.object::<StatefulSet>(NS, "books-solrcloud").unwrap();
    let aliases = sts.spec.unwrap().template.spec.unwrap().host_aliases.unwrap();
    assert_eq!(aliases.len(), 2);
    assert_eq!(aliases[0].ip, "10.0.0.0");
    assert_eq!(
        aliases[0].hostnames.as_deref(),
        Some(&["search-books-solrcloud-0.example.com".to_string()][..])
    );
}

/// Story: updating a service keeps the cluster IP the API server assigned
#[tokio::test]
async fn story_merge_keeps_cluster_ip() {
    let h = Harness::new(&solr_cloud(connection("zk-0.zk:2181")));
    h.converge().await;
    h.fake.modify::<Service>(NS, "books-solrcloud-common", |svc| {
        if let Some(spec) = svc.spec.as_mut() {
            spec.cluster_ip = Some("10.1.1.1".to_string());
        }
    });
    h.fake.modify::<SolrCloud>(NS, NAME, |cloud| {
        cloud.spec.solr_addressability.common_service_port = 8080;
    });

    h.pass().await.unwrap();

    let svc = h.fake.object::<Service>(NS, "books-solrcloud-common").unwrap();
    let spec = svc.spec.unwrap();
    assert_eq!(spec.cluster_ip.as_deref(), Some("10.1.1.1"));
    assert_eq!(spec.ports.unwrap()[0].port, 8080);
}

// =============================================================================
// Story Tests: Status
// =============================================================================

/// Story: an upgrade in flight reports the old version and the target
#[tokio::test]
async fn story_status_reports_version_skew() {
    let mut cloud = solr_cloud(connection("zk-0.zk:2181"));
    cloud.spec.solr_image = Some(ContainerImage::new("library/solr", "v2"));
    let h = Harness::new(&cloud);
    h.fake.insert(&solr_pod("books-solrcloud-0", "v1")).unwrap();
    h.fake.insert(&solr_pod("books-solrcloud-1", "v1")).unwrap();
    h.fake.insert(&solr_pod("books-solrcloud-2", "v2")).unwrap();
    h.converge().await;

    let status = h.cloud().status.unwrap();
    assert_eq!(status.version, "v1");
    assert_eq!(status.target_version.as_deref(), Some("v2"));
    assert_eq!(status.solr_nodes.len(), 3);
    assert_eq!(
        status.zookeeper_connection_info.internal_connection_string,
        "zk-0.zk:2181"
    );
}

/// Story: StatefulSet replica counts flow into the SolrCloud status
#[tokio::test]
async fn story_status_tracks_statefulset_replicas() {
    let h = Harness::new(&solr_cloud(connection("zk-0.zk:2181")));
    h.converge().await;
    h.fake.modify::<StatefulSet>(NS, "books-solrcloud", |sts| {
        sts.status = Some(StatefulSetStatus {
            replicas: 3,
            ready_replicas: Some(2),
            ..Default::default()
        });
    });

    h.fake.clear_mutations();
    h.pass().await.unwrap();

    let status = h.cloud().status.unwrap();
    assert_eq!(status.replicas, 3);
    assert_eq!(status.ready_replicas, 2);
    assert_eq!(h.fake.mutations().len(), 1);
    assert_eq!(h.fake.mutations()[0].verb, Verb::PatchStatus);
}

// =============================================================================
// Story Tests: Ingress and ZooKeeper
// =============================================================================

#[tokio::test]
async fn story_ingress_only_for_ingress_method() {
    let h = Harness::new(&with_ingress(solr_cloud(connection("zk-0.zk:2181")), false));
    h.converge().await;
    assert!(h.fake.object::<Ingress>(NS, "books-solrcloud-common").is_some());

    let mut cloud = solr_cloud(connection("zk-0.zk:2181"));
    cloud.spec.solr_addressability.external = Some(ExternalAddressability {
        method: ExternalAddressabilityMethod::ExternalDNS,
        domain_name: "example.com".to_string(),
        ..Default::default()
    });
    let h = Harness::new(&cloud);
    h.converge().await;
    assert!(h.fake.objects::<Ingress>().is_empty());
    assert!(h.fake.object::<Service>(NS, "books-solrcloud-headless").is_some());
}

#[tokio::test]
async fn story_base_domain_enables_ingress() {
    let h = Harness::with_config(
        &solr_cloud(connection("zk-0.zk:2181")),
        OperatorConfig::default().with_ingress_base_domain(Some("corp.example".to_string())),
    );
    h.converge().await;

    let external = h.cloud().spec.solr_addressability.external.unwrap();
    assert_eq!(external.domain_name, "corp.example");
    assert!(h.fake.object::<Ingress>(NS, "books-solrcloud-common").is_some());
}

#[tokio::test]
async fn story_provided_zookeeper_feeds_the_statefulset() {
    let cloud = solr_cloud(ZookeeperRef {
        provided: Some(ProvidedZookeeper::default()),
        ..Default::default()
    });
    let h = Harness::new(&cloud);
    h.converge().await;

    let zk = h
        .fake
        .object::<ZookeeperCluster>(NS, "books-solrcloud-zookeeper")
        .unwrap();
    assert_eq!(zk.spec.replicas, 3);
    assert!(h.fake.object::<StatefulSet>(NS, "books-solrcloud").is_some());
    let status = h.cloud().status.unwrap();
    assert!(status
        .zookeeper_connection_info
        .internal_connection_string
        .starts_with("books-solrcloud-zookeeper-0.books-solrcloud-zookeeper-headless.search:2181"));
}

// =============================================================================
// Story Tests: Failures
// =============================================================================

/// Story: a missing ZooKeeper reference waits for a spec change
#[tokio::test]
async fn story_missing_zookeeper_reference_is_not_retried() {
    let mut cloud = solr_cloud(connection("zk-0.zk:2181"));
    cloud.spec.zookeeper_ref = None;
    let h = Harness::new(&cloud);
    h.pass().await.unwrap();

    let err = h.pass().await.unwrap_err();
    assert!(matches!(err, Error::BadRequest { .. }));
    assert_eq!(
        error_policy(Arc::new(h.cloud()), &err, h.ctx.clone()),
        Action::await_change()
    );
    assert!(h.fake.objects::<Service>().is_empty());
}

/// Story: an API failure aborts the pass before later steps run
#[tokio::test]
async fn story_api_failure_aborts_pass() {
    let h = Harness::new(&solr_cloud(connection("zk-0.zk:2181")));
    h.pass().await.unwrap();
    h.fake.fail_on(Verb::Create, "ConfigMap");

    let err = h.pass().await.unwrap_err();
    assert!(err.is_retryable());
    assert!(h.fake.mutations_of("StatefulSet").is_empty());
    assert!(!h
        .fake
        .mutations_of("SolrCloud")
        .iter()
        .any(|m| m.verb == Verb::PatchStatus));
    assert_ne!(
        error_policy(Arc::new(h.cloud()), &err, h.ctx.clone()),
        Action::await_change()
    );
}
