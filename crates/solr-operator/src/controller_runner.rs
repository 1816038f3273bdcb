//! Controller runner - builds controller futures for each custom resource
//!
//! Each `build_*` function returns a Vec of boxed futures that can be composed
//! by the caller.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client};

use solr_cloud::SolrCloudContext;
use solr_common::crd::{SolrCloud, SolrPrometheusExporter, ZookeeperCluster};
use solr_common::OperatorConfig;
use solr_exporter::ExporterContext;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
const WATCH_TIMEOUT_SECS: u32 = 25;

type ControllerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

fn watcher_config() -> WatcherConfig {
    WatcherConfig::default().timeout(WATCH_TIMEOUT_SECS)
}

/// Build the SolrCloud controller
///
/// Watches every owned kind so drift in a dependent triggers a pass on its
/// cloud. ZookeeperClusters are only watched when the ZooKeeper operator is
/// in use, since their CRD may not exist otherwise.
pub fn build_solr_cloud_controllers(
    client: Client,
    config: Arc<OperatorConfig>,
) -> Vec<ControllerFuture> {
    let use_zk_operator = config.use_zk_operator;
    let ctx = Arc::new(SolrCloudContext::from_client(client.clone(), config));
    let clouds: Api<SolrCloud> = Api::all(client.clone());

    tracing::info!(use_zk_operator, "- SolrCloud controller");

    let mut controller = Controller::new(clouds, watcher_config())
        .owns(Api::<StatefulSet>::all(client.clone()), watcher_config())
        .owns(Api::<Service>::all(client.clone()), watcher_config())
        .owns(Api::<ConfigMap>::all(client.clone()), watcher_config())
        .owns(Api::<Ingress>::all(client.clone()), watcher_config())
        .owns(Api::<Deployment>::all(client.clone()), watcher_config());
    if use_zk_operator {
        controller = controller.owns(Api::<ZookeeperCluster>::all(client), watcher_config());
    }

    vec![Box::pin(
        controller
            .shutdown_on_signal()
            .run(solr_cloud::reconcile, solr_cloud::error_policy, ctx)
            .for_each(log_reconcile_result("SolrCloud")),
    )]
}

/// Build the SolrPrometheusExporter controller
pub fn build_exporter_controllers(
    client: Client,
    config: Arc<OperatorConfig>,
) -> Vec<ControllerFuture> {
    let ctx = Arc::new(ExporterContext::from_client(client.clone(), config));
    let exporters: Api<SolrPrometheusExporter> = Api::all(client.clone());

    tracing::info!("- SolrPrometheusExporter controller");

    vec![Box::pin(
        Controller::new(exporters, watcher_config())
            .owns(Api::<Deployment>::all(client.clone()), watcher_config())
            .owns(Api::<Service>::all(client.clone()), watcher_config())
            .owns(Api::<ConfigMap>::all(client), watcher_config())
            .shutdown_on_signal()
            .run(solr_exporter::reconcile, solr_exporter::error_policy, ctx)
            .for_each(log_reconcile_result("SolrPrometheusExporter")),
    )]
}

/// Create a closure for logging reconciliation results
fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
