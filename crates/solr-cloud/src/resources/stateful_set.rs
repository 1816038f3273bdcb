//! StatefulSet generator for the Solr nodes

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapVolumeSource, Container, ContainerPort, EmptyDirVolumeSource, EnvVar, EnvVarSource,
    HTTPGetAction, HostAlias, KeyToPath, LocalObjectReference, ObjectFieldSelector,
    PersistentVolumeClaim, PodSecurityContext, PodSpec, PodTemplateSpec, Probe, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use solr_common::crd::{merge_maps, SolrCloud, SolrCloudStatus, BACKUP_RESTORE_VOLUME};

use super::{object_meta, SOLR_CLIENT_PORT_NAME, SOLR_XML_KEY};

/// Name of the Solr container
pub const SOLR_NODE_CONTAINER: &str = "solrcloud-node";
/// Solr home inside the container
pub const SOLR_DATA_DIR: &str = "/var/solr/data";

const DATA_VOLUME: &str = "data";
const SOLR_XML_VOLUME: &str = "solr-xml";
const SOLR_FS_GROUP: i64 = 8983;
const TERMINATION_GRACE_SECS: i64 = 10;

fn env(name: &str, value: impl Into<String>) -> EnvVar {
    EnvVar {
        name: name.to_string(),
        value: Some(value.into()),
        ..Default::default()
    }
}

fn solr_env(cloud: &SolrCloud, status: &SolrCloudStatus) -> Vec<EnvVar> {
    let spec = &cloud.spec;
    let zk = &status.zookeeper_connection_info;

    let mut vars = vec![
        env("SOLR_HOME", SOLR_DATA_DIR),
        env("SOLR_PORT", spec.solr_addressability.pod_port.to_string()),
        EnvVar {
            name: "POD_HOSTNAME".to_string(),
            value_from: Some(EnvVarSource {
                field_ref: Some(ObjectFieldSelector {
                    api_version: Some("v1".to_string()),
                    field_path: "metadata.name".to_string(),
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
        env("SOLR_HOST", cloud.advertised_node_host("$(POD_HOSTNAME)")),
        env("ZK_HOST", status.zk_connection_string()),
        env("ZK_SERVER", zk.internal_connection_string.clone()),
        env("ZK_CHROOT", zk.chroot.clone()),
        env("SOLR_LOG_LEVEL", spec.solr_log_level.clone().unwrap_or_default()),
    ];
    if let Some(ext) = cloud.external() {
        if ext.use_external_address {
            vars.push(env("SOLR_HOST_PORT", cloud.node_port().to_string()));
        }
    }
    if let Some(mem) = &spec.solr_java_mem {
        vars.push(env("SOLR_JAVA_MEM", mem.clone()));
    }
    if let Some(opts) = &spec.solr_opts {
        vars.push(env("SOLR_OPTS", opts.clone()));
    }
    if let Some(gc) = &spec.solr_gc_tune {
        vars.push(env("GC_TUNE", gc.clone()));
    }
    if let Some(pod) = &spec.custom_solr_kube_options.pod_options {
        vars.extend(pod.env_variables.iter().cloned());
    }
    vars
}

fn host_aliases(ips: &BTreeMap<String, String>) -> Option<Vec<HostAlias>> {
    if ips.is_empty() {
        return None;
    }
    Some(
        ips.iter()
            .map(|(host, ip)| HostAlias {
                ip: ip.clone(),
                hostnames: Some(vec![host.clone()]),
            })
            .collect(),
    )
}

fn admin_probe(port: i32, initial_delay: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/solr/admin/info/system".to_string()),
            port: IntOrString::Int(port),
            scheme: Some("HTTP".to_string()),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(10),
        timeout_seconds: Some(1),
        success_threshold: Some(1),
        failure_threshold: Some(3),
        ..Default::default()
    }
}

/// StatefulSet running the Solr nodes
///
/// `status` supplies the resolved ZooKeeper connection; `host_ips` maps
/// advertised node hosts to service IPs and becomes the pods' host aliases.
pub fn generate_stateful_set(
    cloud: &SolrCloud,
    status: &SolrCloudStatus,
    host_ips: &BTreeMap<String, String>,
) -> StatefulSet {
    let spec = &cloud.spec;
    let kube_options = &spec.custom_solr_kube_options;
    let pod_options = kube_options.pod_options.clone().unwrap_or_default();
    let solr_image = cloud.solr_image();
    let busy_box = cloud.busy_box_image();
    let pod_port = spec.solr_addressability.pod_port;

    let pod_labels = merge_maps(cloud.pod_selector_labels(), &pod_options.labels);

    let mut volumes = vec![
        Volume {
            name: SOLR_XML_VOLUME.to_string(),
            config_map: Some(ConfigMapVolumeSource {
                name: cloud.config_map_name(),
                items: Some(vec![KeyToPath {
                    key: SOLR_XML_KEY.to_string(),
                    path: SOLR_XML_KEY.to_string(),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        },
    ];
    let mut solr_mounts = vec![VolumeMount {
        name: DATA_VOLUME.to_string(),
        mount_path: SOLR_DATA_DIR.to_string(),
        ..Default::default()
    }];

    let volume_claim_templates = match &spec.data_pvc_spec {
        Some(pvc_spec) => Some(vec![PersistentVolumeClaim {
            metadata: ObjectMeta {
                name: Some(DATA_VOLUME.to_string()),
                labels: Some(cloud.shared_labels()),
                ..Default::default()
            },
            spec: Some(pvc_spec.clone()),
            ..Default::default()
        }]),
        None => {
            volumes.push(Volume {
                name: DATA_VOLUME.to_string(),
                empty_dir: Some(EmptyDirVolumeSource::default()),
                ..Default::default()
            });
            None
        }
    };

    if let Some(backup) = &spec.backup_restore_volume {
        volumes.push(Volume {
            name: BACKUP_RESTORE_VOLUME.to_string(),
            ..backup.clone()
        });
        solr_mounts.push(VolumeMount {
            name: BACKUP_RESTORE_VOLUME.to_string(),
            mount_path: format!("{SOLR_DATA_DIR}/{BACKUP_RESTORE_VOLUME}"),
            ..Default::default()
        });
    }

    let init_container = Container {
        name: "cp-solr-xml".to_string(),
        image: Some(busy_box.to_image_name()),
        image_pull_policy: busy_box.pull_policy.clone(),
        command: Some(vec![
            "sh".to_string(),
            "-c".to_string(),
            format!("cp /tmp/{SOLR_XML_KEY} /tmp-config/{SOLR_XML_KEY}"),
        ]),
        volume_mounts: Some(vec![
            VolumeMount {
                name: SOLR_XML_VOLUME.to_string(),
                mount_path: "/tmp".to_string(),
                ..Default::default()
            },
            VolumeMount {
                name: DATA_VOLUME.to_string(),
                mount_path: "/tmp-config".to_string(),
                ..Default::default()
            },
        ]),
        ..Default::default()
    };

    let solr_container = Container {
        name: SOLR_NODE_CONTAINER.to_string(),
        image: Some(solr_image.to_image_name()),
        image_pull_policy: solr_image.pull_policy.clone(),
        ports: Some(vec![ContainerPort {
            container_port: pod_port,
            name: Some(SOLR_CLIENT_PORT_NAME.to_string()),
            protocol: Some("TCP".to_string()),
            ..Default::default()
        }]),
        env: Some(solr_env(cloud, status)),
        volume_mounts: Some(solr_mounts),
        liveness_probe: Some(admin_probe(pod_port, 20)),
        readiness_probe: Some(admin_probe(pod_port, 15)),
        resources: pod_options.resources.clone(),
        ..Default::default()
    };

    let image_pull_secrets = solr_image
        .image_pull_secret
        .as_ref()
        .map(|name| vec![LocalObjectReference { name: name.clone() }]);

    StatefulSet {
        metadata: object_meta(
            cloud,
            cloud.stateful_set_name(),
            kube_options.stateful_set_options.as_ref(),
            &[("technology", solr_common::crd::SOLR_CLOUD_TECHNOLOGY)],
        ),
        spec: Some(StatefulSetSpec {
            replicas: Some(cloud.replicas()),
            service_name: cloud.headless_service_name(),
            pod_management_policy: Some("Parallel".to_string()),
            selector: LabelSelector {
                match_labels: Some(cloud.pod_selector_labels()),
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
                        fs_group: Some(SOLR_FS_GROUP),
                        ..Default::default()
                    }),
                    host_aliases: host_aliases(host_ips),
                    volumes: Some(volumes),
                    init_containers: Some(vec![init_container]),
                    containers: vec![solr_container],
                    affinity: pod_options.affinity.clone(),
                    tolerations: (!pod_options.tolerations.is_empty())
                        .then(|| pod_options.tolerations.clone()),
                    node_selector: (!pod_options.node_selector.is_empty())
                        .then(|| pod_options.node_selector.clone()),
                    image_pull_secrets,
                    ..Default::default()
                }),
            },
            volume_claim_templates,
            ..Default::default()
        }),
        ..Default::default()
    }
}
