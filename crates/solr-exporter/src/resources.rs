//! Generators for the objects a SolrPrometheusExporter owns

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, ContainerPort, HTTPGetAction, KeyToPath,
    LocalObjectReference, PodSecurityContext, PodSpec, PodTemplateSpec, Probe, Service,
    ServicePort, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use solr_common::crd::{merge_maps, MetaOptions, SolrPrometheusExporter, EXPORTER_TECHNOLOGY};

/// Port the exporter serves metrics on
pub const METRICS_PORT: i32 = 8080;
/// Name of the metrics port inside pods
pub const METRICS_PORT_NAME: &str = "solr-metrics";
/// Port the metrics service exposes
pub const EXT_METRICS_PORT: i32 = 80;
/// Name of the metrics port on the service
pub const EXT_METRICS_PORT_NAME: &str = "ext-solr-metrics";
/// Exporter binary in the stock Solr image
pub const DEFAULT_EXPORTER_ENTRYPOINT: &str =
    "/opt/solr/contrib/prometheus-exporter/bin/solr-exporter";
/// ConfigMap key of a custom exporter configuration
pub const METRICS_CONFIG_KEY: &str = "solr-prometheus-exporter.xml";

const EXPORTER_CONTAINER: &str = "solr-prometheus-exporter";
const CONFIG_VOLUME: &str = "solr-prometheus-exporter-xml";
const CONFIG_MOUNT_DIR: &str = "/opt/solr-exporter";
const DEFAULT_CONFIG_PATH: &str = "/opt/solr/contrib/prometheus-exporter/conf/solr-exporter-config.xml";
const TERMINATION_GRACE_SECS: i64 = 10;

/// Where the exporter scrapes Solr
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SolrConnection {
    /// A SolrCloud, through its ZooKeeper connection string
    ZooKeeper(String),
    /// A standalone Solr base address
    Standalone(String),
}

fn metadata(
    exporter: &SolrPrometheusExporter,
    options: Option<&MetaOptions>,
    extra_labels: &[(&str, &str)],
) -> ObjectMeta {
    let user_labels = match options {
        Some(options) => merge_maps(exporter.labels().clone(), &options.labels),
        None => exporter.labels().clone(),
    };
    let mut labels = exporter.shared_labels_with(&user_labels);
    for (key, value) in extra_labels {
        labels.insert(key.to_string(), value.to_string());
    }
    let annotations = options.map(|o| o.annotations.clone()).unwrap_or_default();

    ObjectMeta {
        name: Some(exporter.metrics_resource_name()),
        namespace: exporter.namespace(),
        labels: Some(labels),
        annotations: (!annotations.is_empty()).then_some(annotations),
        ..Default::default()
    }
}

/// ConfigMap holding a custom exporter configuration
pub fn generate_metrics_config_map(exporter: &SolrPrometheusExporter, config: &str) -> ConfigMap {
    let options = exporter
        .spec
        .custom_prometheus_kube_options
        .config_map_options
        .as_ref();
    ConfigMap {
        metadata: metadata(exporter, options, &[]),
        data: Some(BTreeMap::from([(
            METRICS_CONFIG_KEY.to_string(),
            config.to_string(),
        )])),
        ..Default::default()
    }
}

/// Service Prometheus scrapes, so several exporter pods never double count
pub fn generate_metrics_service(exporter: &SolrPrometheusExporter) -> Service {
    let mut meta = metadata(exporter, None, &[("service-type", "metrics")]);
    meta.annotations = Some(BTreeMap::from([
        ("prometheus.io/scrape".to_string(), "true".to_string()),
        ("prometheus.io/scheme".to_string(), "http".to_string()),
        ("prometheus.io/path".to_string(), "/metrics".to_string()),
        ("prometheus.io/port".to_string(), EXT_METRICS_PORT.to_string()),
    ]));

    Service {
        metadata: meta,
        spec: Some(ServiceSpec {
            ports: Some(vec![ServicePort {
                name: Some(EXT_METRICS_PORT_NAME.to_string()),
                port: EXT_METRICS_PORT,
                protocol: Some("TCP".to_string()),
                target_port: Some(IntOrString::Int(METRICS_PORT)),
                ..Default::default()
            }]),
            selector: Some(exporter.pod_selector_labels()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn exporter_args(exporter: &SolrPrometheusExporter, connection: &SolrConnection) -> Vec<String> {
    let spec = &exporter.spec;
    let mut args = vec![
        "-p".to_string(),
        METRICS_PORT.to_string(),
        "-n".to_string(),
        spec.num_threads.to_string(),
    ];
    if spec.scrape_interval > 0 {
        args.extend(["-s".to_string(), spec.scrape_interval.to_string()]);
    }
    match connection {
        SolrConnection::ZooKeeper(zk) => args.extend(["-z".to_string(), zk.clone()]),
        SolrConnection::Standalone(address) => args.extend(["-b".to_string(), address.clone()]),
    }
    let config_path = if spec.metrics_config.is_some() {
        format!("{CONFIG_MOUNT_DIR}/{METRICS_CONFIG_KEY}")
    } else {
        DEFAULT_CONFIG_PATH.to_string()
    };
    args.extend(["-f".to_string(), config_path]);
    args
}

/// Single-replica Deployment running the exporter against `connection`
pub fn generate_exporter_deployment(
    exporter: &SolrPrometheusExporter,
    connection: &SolrConnection,
) -> Deployment {
    let spec = &exporter.spec;
    let kube_options = &spec.custom_prometheus_kube_options;
    let pod_options = kube_options.pod_options.clone().unwrap_or_default();
    let image = exporter.image();

    let technology = [("technology", EXPORTER_TECHNOLOGY)];
    let pod_labels = merge_maps(
        metadata(exporter, None, &technology).labels.unwrap_or_default(),
        &pod_options.labels,
    );

    let (volumes, volume_mounts) = match spec.metrics_config {
        Some(_) => (
            Some(vec![Volume {
                name: CONFIG_VOLUME.to_string(),
                config_map: Some(ConfigMapVolumeSource {
                    name: exporter.metrics_resource_name(),
                    items: Some(vec![KeyToPath {
                        key: METRICS_CONFIG_KEY.to_string(),
                        path: METRICS_CONFIG_KEY.to_string(),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
                ..Default::default()
            }]),
            Some(vec![VolumeMount {
                name: CONFIG_VOLUME.to_string(),
                mount_path: CONFIG_MOUNT_DIR.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]),
        ),
        None => (None, None),
    };

    let container = Container {
        name: EXPORTER_CONTAINER.to_string(),
        image: Some(image.to_image_name()),
        image_pull_policy: image.pull_policy.clone(),
        command: Some(vec![spec
            .exporter_entrypoint
            .clone()
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| DEFAULT_EXPORTER_ENTRYPOINT.to_string())]),
        args: Some(exporter_args(exporter, connection)),
        ports: Some(vec![ContainerPort {
            container_port: METRICS_PORT,
            name: Some(METRICS_PORT_NAME.to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: (!pod_options.env_variables.is_empty()).then(|| pod_options.env_variables.clone()),
        volume_mounts,
        liveness_probe: Some(Probe {
            initial_delay_seconds: Some(20),
            period_seconds: Some(10),
            http_get: Some(HTTPGetAction {
                scheme: Some("HTTP".to_string()),
                path: Some("/metrics".to_string()),
                port: IntOrString::Int(METRICS_PORT),
                ..Default::default()
            }),
            ..Default::default()
        }),
        resources: pod_options.resources.clone(),
        ..Default::default()
    };

    Deployment {
        metadata: metadata(
            exporter,
            kube_options.deployment_options.as_ref(),
            &technology,
        ),
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(exporter.pod_selector_labels()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(pod_labels),
                    annotations: (!pod_options.annotations.is_empty())
                        .then(|| pod_options.annotations.clone()),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    termination_grace_period_seconds: Some(TERMINATION_GRACE_SECS),
                    security_context: Some(PodSecurityContext {
                        fs_group: Some(i64::from(METRICS_PORT)),
                        ..Default::default()
                    }),
                    volumes,
                    containers: vec![container],
                    affinity: pod_options.affinity.clone(),
                    tolerations: (!pod_options.tolerations.is_empty())
                        .then(|| pod_options.tolerations.clone()),
                    node_selector: (!pod_options.node_selector.is_empty())
                        .then(|| pod_options.node_selector.clone()),
                    image_pull_secrets: image
                        .image_pull_secret
                        .map(|name| vec![LocalObjectReference { name }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solr_common::crd::SolrPrometheusExporterSpec;

    fn exporter() -> SolrPrometheusExporter {
        let mut exporter = SolrPrometheusExporter::new("metrics", SolrPrometheusExporterSpec::default());
        exporter.metadata.namespace = Some("search".to_string());
        exporter.with_defaults();
        exporter
    }

    fn container(deployment: &Deployment) -> Container {
        deployment
            .spec
            .as_ref()
            .and_then(|s| s.template.spec.as_ref())
            .map(|s| s.containers[0].clone())
            .unwrap()
    }

    #[test]
    fn deployment_scrapes_zookeeper_with_default_config() {
        let zk = SolrConnection::ZooKeeper("zk-0.zk:2181/solr".to_string());
        let deployment = generate_exporter_deployment(&exporter(), &zk);

        assert_eq!(deployment.metadata.name.as_deref(), Some("metrics-solr-metrics"));
        let container = container(&deployment);
        assert_eq!(
            container.command,
            Some(vec![DEFAULT_EXPORTER_ENTRYPOINT.to_string()])
        );
        assert_eq!(
            container.args.unwrap(),
            vec!["-p", "8080", "-n", "1", "-z", "zk-0.zk:2181/solr", "-f", DEFAULT_CONFIG_PATH]
        );
        assert!(container.volume_mounts.is_none());
        assert_eq!(container.image.as_deref(), Some("library/solr:8.2.0"));

        let spec = deployment.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));
        assert_eq!(spec.selector.match_labels, Some(exporter().pod_selector_labels()));
    }

    #[test]
    fn custom_config_is_mounted_and_passed() {
        let mut exporter = exporter();
        exporter.spec.metrics_config = Some("<config/>".to_string());
        exporter.spec.scrape_interval = 30;
        let standalone = SolrConnection::Standalone("http://solr:8983/solr".to_string());
        let deployment = generate_exporter_deployment(&exporter, &standalone);

        let container = container(&deployment);
        assert_eq!(
            container.args.unwrap(),
            vec![
                "-p",
                "8080",
                "-n",
                "1",
                "-s",
                "30",
                "-b",
                "http://solr:8983/solr",
                "-f",
                "/opt/solr-exporter/solr-prometheus-exporter.xml",
            ]
        );
        assert_eq!(container.volume_mounts.unwrap()[0].read_only, Some(true));

        let cm = generate_metrics_config_map(&exporter, "<config/>");
        assert_eq!(cm.metadata.name.as_deref(), Some("metrics-solr-metrics"));
        assert_eq!(
            cm.data.unwrap().get(METRICS_CONFIG_KEY).map(String::as_str),
            Some("<config/>")
        );
    }

    #[test]
    fn metrics_service_is_annotated_for_prometheus() {
        let svc = generate_metrics_service(&exporter());
        let annotations = svc.metadata.annotations.unwrap();
        assert_eq!(annotations.get("prometheus.io/scrape").map(String::as_str), Some("true"));
        assert_eq!(annotations.get("prometheus.io/port").map(String::as_str), Some("80"));
        assert_eq!(
            svc.metadata.labels.unwrap().get("service-type").map(String::as_str),
            Some("metrics")
        );

        let port = &svc.spec.unwrap().ports.unwrap()[0];
        assert_eq!(port.port, EXT_METRICS_PORT);
        assert_eq!(port.target_port, Some(IntOrString::Int(METRICS_PORT)));
    }
}
