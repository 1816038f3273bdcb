//! Shared Kubernetes utilities
//!
//! Owner wiring, field-level merges of generated objects into live ones,
//! and the create-or-update step every dependent goes through.
//!
//! The `copy_*_fields` functions copy only the fields this operator owns
//! from a freshly generated object onto the live one and report whether
//! anything changed. Fields the API server assigns (cluster IPs, status,
//! selectors that are immutable after creation) are left untouched.

use std::collections::BTreeMap;

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Container, PodTemplateSpec, Service};
use k8s_openapi::api::networking::v1::Ingress;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use tracing::{debug, info};

use crate::crd::ZookeeperCluster;
use crate::store::{Store, StoredResource};
use crate::Error;

// =============================================================================
// Ownership
// =============================================================================

/// Make `owner` the controlling owner of the object described by `meta`
///
/// Fails when the owner has no uid yet, i.e. was never persisted.
pub fn set_owner<O>(owner: &O, meta: &mut ObjectMeta) -> Result<(), Error>
where
    O: Resource<DynamicType = ()>,
{
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or_else(|| Error::missing_metadata(O::kind(&()), "uid"))?;
    meta.owner_references = Some(vec![owner_ref]);
    Ok(())
}

// =============================================================================
// Create or update
// =============================================================================

/// Signature of the field-copy functions below
pub type CopyFields<K> = fn(&K, &mut K) -> bool;

/// Create `desired` if it does not exist, otherwise merge its owned fields
/// into the live object and update it when the merge changed anything
///
/// Returns the live object after the step.
pub async fn create_or_update<K: StoredResource>(
    store: &Store,
    desired: K,
    copy: CopyFields<K>,
) -> Result<K, Error> {
    let kind = K::kind(&());
    let name = desired.name_any();
    let namespace = desired
        .namespace()
        .ok_or_else(|| Error::missing_metadata(kind.clone(), "namespace"))?;

    match store.get::<K>(&namespace, &name).await? {
        None => {
            info!(%kind, %namespace, %name, "Creating");
            store.create(&desired).await
        }
        Some(mut found) => {
            if copy(&desired, &mut found) {
                info!(%kind, %namespace, %name, "Updating");
                store.replace(&found).await
            } else {
                debug!(%kind, %namespace, %name, "Up to date");
                Ok(found)
            }
        }
    }
}

// =============================================================================
// Field copies
// =============================================================================

fn sync<T: PartialEq + Clone>(from: &T, to: &mut T) -> bool {
    if from != to {
        *to = from.clone();
        true
    } else {
        false
    }
}

fn copy_map_entries(
    from: &Option<BTreeMap<String, String>>,
    to: &mut Option<BTreeMap<String, String>>,
) -> bool {
    let Some(from) = from else {
        return false;
    };
    let to = to.get_or_insert_with(BTreeMap::new);
    let mut changed = false;
    for (key, value) in from {
        if to.get(key) != Some(value) {
            to.insert(key.clone(), value.clone());
            changed = true;
        }
    }
    changed
}

/// Copy labels and annotations present on `from`; extra keys on `to` survive
pub fn copy_labels_and_annotations(from: &ObjectMeta, to: &mut ObjectMeta) -> bool {
    let labels = copy_map_entries(&from.labels, &mut to.labels);
    let annotations = copy_map_entries(&from.annotations, &mut to.annotations);
    labels || annotations
}

/// Copy ports, selector and publish-not-ready; the cluster IP is never touched
pub fn copy_service_fields(from: &Service, to: &mut Service) -> bool {
    let mut changed = copy_labels_and_annotations(&from.metadata, &mut to.metadata);
    let Some(from_spec) = from.spec.as_ref() else {
        return changed;
    };
    let to_spec = to.spec.get_or_insert_with(Default::default);
    changed |= sync(&from_spec.ports, &mut to_spec.ports);
    changed |= sync(&from_spec.selector, &mut to_spec.selector);
    changed |= sync(
        &from_spec.publish_not_ready_addresses,
        &mut to_spec.publish_not_ready_addresses,
    );
    changed
}

/// Copy the data entries of a ConfigMap
pub fn copy_config_map_fields(from: &ConfigMap, to: &mut ConfigMap) -> bool {
    let changed = copy_labels_and_annotations(&from.metadata, &mut to.metadata);
    sync(&from.data, &mut to.data) || changed
}

fn copy_container_fields(from: &[Container], to: &mut Vec<Container>) -> bool {
    if from.len() != to.len()
        || from
            .iter()
            .zip(to.iter())
            .any(|(f, t)| f.name != t.name)
    {
        *to = from.to_vec();
        return true;
    }
    let mut changed = false;
    for (f, t) in from.iter().zip(to.iter_mut()) {
        changed |= sync(&f.image, &mut t.image);
        changed |= sync(&f.image_pull_policy, &mut t.image_pull_policy);
        changed |= sync(&f.command, &mut t.command);
        changed |= sync(&f.args, &mut t.args);
        changed |= sync(&f.env, &mut t.env);
        changed |= sync(&f.ports, &mut t.ports);
        changed |= sync(&f.resources, &mut t.resources);
        changed |= sync(&f.volume_mounts, &mut t.volume_mounts);
    }
    changed
}

/// Copy the owned parts of a pod template
///
/// Volumes are compared by name only, since the API server fills defaults
/// into their sources.
pub fn copy_pod_template_fields(from: &PodTemplateSpec, to: &mut PodTemplateSpec) -> bool {
    let mut changed = match (from.metadata.as_ref(), to.metadata.as_mut()) {
        (Some(f), Some(t)) => copy_labels_and_annotations(f, t),
        (Some(f), None) => {
            to.metadata = Some(f.clone());
            true
        }
        (None, _) => false,
    };

    let Some(from_spec) = from.spec.as_ref() else {
        return changed;
    };
    let to_spec = to.spec.get_or_insert_with(Default::default);

    changed |= copy_container_fields(&from_spec.containers, &mut to_spec.containers);

    let from_init = from_spec.init_containers.clone().unwrap_or_default();
    let mut to_init = to_spec.init_containers.clone().unwrap_or_default();
    if copy_container_fields(&from_init, &mut to_init) {
        to_spec.init_containers = Some(to_init);
        changed = true;
    }

    let volume_names = |volumes: &Option<Vec<k8s_openapi::api::core::v1::Volume>>| {
        volumes
            .iter()
            .flatten()
            .map(|v| v.name.clone())
            .collect::<Vec<_>>()
    };
    if volume_names(&from_spec.volumes) != volume_names(&to_spec.volumes) {
        to_spec.volumes = from_spec.volumes.clone();
        changed = true;
    }

    changed |= sync(&from_spec.host_aliases, &mut to_spec.host_aliases);
    changed |= sync(&from_spec.affinity, &mut to_spec.affinity);
    changed |= sync(&from_spec.tolerations, &mut to_spec.tolerations);
    changed |= sync(&from_spec.node_selector, &mut to_spec.node_selector);
    changed |= sync(&from_spec.image_pull_secrets, &mut to_spec.image_pull_secrets);
    changed
}

/// Copy replicas and the pod template; selector and claim templates are immutable
pub fn copy_stateful_set_fields(from: &StatefulSet, to: &mut StatefulSet) -> bool {
    let mut changed = copy_labels_and_annotations(&from.metadata, &mut to.metadata);
    let Some(from_spec) = from.spec.as_ref() else {
        return changed;
    };
    let to_spec = to.spec.get_or_insert_with(Default::default);
    changed |= sync(&from_spec.replicas, &mut to_spec.replicas);
    changed |= copy_pod_template_fields(&from_spec.template, &mut to_spec.template);
    changed
}

/// Copy replicas and the pod template of a Deployment
pub fn copy_deployment_fields(from: &Deployment, to: &mut Deployment) -> bool {
    let mut changed = copy_labels_and_annotations(&from.metadata, &mut to.metadata);
    let Some(from_spec) = from.spec.as_ref() else {
        return changed;
    };
    let to_spec = to.spec.get_or_insert_with(Default::default);
    changed |= sync(&from_spec.replicas, &mut to_spec.replicas);
    changed |= copy_pod_template_fields(&from_spec.template, &mut to_spec.template);
    changed
}

/// Copy rules and TLS of an Ingress
pub fn copy_ingress_fields(from: &Ingress, to: &mut Ingress) -> bool {
    let mut changed = copy_labels_and_annotations(&from.metadata, &mut to.metadata);
    let Some(from_spec) = from.spec.as_ref() else {
        return changed;
    };
    let to_spec = to.spec.get_or_insert_with(Default::default);
    changed |= sync(&from_spec.rules, &mut to_spec.rules);
    changed |= sync(&from_spec.tls, &mut to_spec.tls);
    changed
}

/// Copy size, image, pod labels and persistence of a ZookeeperCluster
pub fn copy_zookeeper_cluster_fields(from: &ZookeeperCluster, to: &mut ZookeeperCluster) -> bool {
    let mut changed = copy_labels_and_annotations(&from.metadata, &mut to.metadata);
    changed |= sync(&from.spec.replicas, &mut to.spec.replicas);
    changed |= sync(&from.spec.image, &mut to.spec.image);
    changed |= sync(&from.spec.labels, &mut to.spec.labels);
    changed |= sync(&from.spec.persistence, &mut to.spec.persistence);
    changed
}
