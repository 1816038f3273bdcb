//! Object store abstraction over the Kubernetes API
//!
//! Reconcilers talk to the cluster through [`ResourceStore`], an object-safe
//! trait over `DynamicObject`s, so one store can serve every kind a
//! controller touches and tests can swap in a mock or an in-memory store.
//! [`Store`] layers typed access on top of it.

use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use kube::api::{Api, ApiResource, DynamicObject, ListParams, Patch, PatchParams, PostParams};
use kube::core::TypeMeta;
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::trace;

#[cfg(any(test, feature = "testing"))]
use mockall::automock;

use crate::Error;

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "solr-operator";

// =============================================================================
// Untyped store
// =============================================================================

/// Create/read/update access to namespaced objects of any kind
///
/// No delete: dependents are garbage collected through their owner references.
#[cfg_attr(any(test, feature = "testing"), automock)]
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Get an object, `None` when it does not exist
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error>;

    /// Create an object, returning the stored version
    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, Error>;

    /// Replace an existing object, returning the stored version
    async fn replace(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, Error>;

    /// Merge-patch the status subresource
    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<(), Error>;

    /// List objects in a namespace matching an equality label selector
    async fn list(
        &self,
        resource: &ApiResource,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, Error>;
}

/// [`ResourceStore`] backed by the Kubernetes API server
pub struct KubeResourceStore {
    client: Client,
}

impl KubeResourceStore {
    /// Create a store wrapping the given client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, resource: &ApiResource, namespace: &str) -> Api<DynamicObject> {
        Api::namespaced_with(self.client.clone(), namespace, resource)
    }
}

fn namespace_of(resource: &ApiResource, object: &DynamicObject) -> Result<String, Error> {
    object
        .metadata
        .namespace
        .clone()
        .ok_or_else(|| Error::missing_metadata(&resource.kind, "namespace"))
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        Ok(self.api(resource, namespace).get_opt(name).await?)
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let namespace = namespace_of(resource, object)?;
        Ok(self
            .api(resource, &namespace)
            .create(&PostParams::default(), object)
            .await?)
    }

    async fn replace(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        let namespace = namespace_of(resource, object)?;
        Ok(self
            .api(resource, &namespace)
            .replace(&object.name_any(), &PostParams::default(), object)
            .await?)
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<(), Error> {
        let patch = serde_json::json!({ "status": status });
        self.api(resource, namespace)
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, Error> {
        let params = ListParams::default().labels(label_selector);
        Ok(self.api(resource, namespace).list(&params).await?.items)
    }
}

// =============================================================================
// Typed access
// =============================================================================

/// Resources that can be moved through a [`Store`]
pub trait StoredResource:
    Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
}

impl<K> StoredResource for K where
    K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static
{
}

/// Typed facade over a shared [`ResourceStore`]
#[derive(Clone)]
pub struct Store {
    inner: Arc<dyn ResourceStore>,
}

impl Store {
    /// Wrap an existing store
    pub fn new(inner: Arc<dyn ResourceStore>) -> Self {
        Self { inner }
    }

    /// Store backed by the API server
    pub fn from_client(client: Client) -> Self {
        Self::new(Arc::new(KubeResourceStore::new(client)))
    }

    /// Get an object by namespace and name
    pub async fn get<K: StoredResource>(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<K>, Error> {
        let resource = ApiResource::erase::<K>(&());
        trace!(kind = %resource.kind, namespace, name, "get");
        self.inner
            .get(&resource, namespace, name)
            .await?
            .map(from_dynamic::<K>)
            .transpose()
    }

    /// Create an object
    pub async fn create<K: StoredResource>(&self, object: &K) -> Result<K, Error> {
        let resource = ApiResource::erase::<K>(&());
        let created = self.inner.create(&resource, &to_dynamic(object)?).await?;
        from_dynamic(created)
    }

    /// Replace an existing object
    pub async fn replace<K: StoredResource>(&self, object: &K) -> Result<K, Error> {
        let resource = ApiResource::erase::<K>(&());
        let replaced = self.inner.replace(&resource, &to_dynamic(object)?).await?;
        from_dynamic(replaced)
    }

    /// Merge-patch the status of an object
    pub async fn patch_status<K: StoredResource, S: Serialize + Sync>(
        &self,
        object: &K,
        status: &S,
    ) -> Result<(), Error> {
        let resource = ApiResource::erase::<K>(&());
        let namespace = object
            .namespace()
            .ok_or_else(|| Error::missing_metadata(K::kind(&()), "namespace"))?;
        let status = serde_json::to_value(status)?;
        self.inner
            .patch_status(&resource, &namespace, &object.name_any(), &status)
            .await
    }

    /// List objects in a namespace matching a label selector
    pub async fn list<K: StoredResource>(
        &self,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<K>, Error> {
        let resource = ApiResource::erase::<K>(&());
        self.inner
            .list(&resource, namespace, label_selector)
            .await?
            .into_iter()
            .map(from_dynamic)
            .collect()
    }
}

/// Convert a typed object into a `DynamicObject`
pub fn to_dynamic<K: StoredResource>(object: &K) -> Result<DynamicObject, Error> {
    let value = serde_json::to_value(object)
        .map_err(|e| Error::serialization_for_kind(K::kind(&()), e.to_string()))?;
    let mut dynamic: DynamicObject = serde_json::from_value(value)
        .map_err(|e| Error::serialization_for_kind(K::kind(&()), e.to_string()))?;
    dynamic.types.get_or_insert_with(type_meta::<K>);
    Ok(dynamic)
}

/// Convert a `DynamicObject` into a typed object
///
/// List responses omit per-item type information, so it is filled in first.
pub fn from_dynamic<K: StoredResource>(mut object: DynamicObject) -> Result<K, Error> {
    object.types.get_or_insert_with(type_meta::<K>);
    let value = serde_json::to_value(&object)
        .map_err(|e| Error::serialization_for_kind(K::kind(&()), e.to_string()))?;
    serde_json::from_value(value)
        .map_err(|e| Error::serialization_for_kind(K::kind(&()), e.to_string()))
}

fn type_meta<K: StoredResource>() -> TypeMeta {
    TypeMeta {
        api_version: K::api_version(&()).to_string(),
        kind: K::kind(&()).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{ConfigMap, Service, ServiceSpec};
    use kube::api::ObjectMeta;
    use std::collections::BTreeMap;

    fn config_map() -> ConfigMap {
        ConfigMap {
            metadata: ObjectMeta {
                name: Some("books-solrcloud-configmap".to_string()),
                namespace: Some("search".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([(
                "solr.xml".to_string(),
                "<solr/>".to_string(),
            )])),
            ..Default::default()
        }
    }

    #[test]
    fn dynamic_conversion_keeps_type_and_data() {
        let dynamic = to_dynamic(&config_map()).unwrap();
        let types = dynamic.types.clone().unwrap();
        assert_eq!(types.kind, "ConfigMap");
        assert_eq!(types.api_version, "v1");
        assert_eq!(dynamic.data["data"]["solr.xml"], "<solr/>");

        let back: ConfigMap = from_dynamic(dynamic).unwrap();
        assert_eq!(back, config_map());
    }

    #[test]
    fn list_items_without_type_meta_still_convert() {
        let mut dynamic = to_dynamic(&config_map()).unwrap();
        dynamic.types = None;
        let back: ConfigMap = from_dynamic(dynamic).unwrap();
        assert_eq!(back.metadata.name.as_deref(), Some("books-solrcloud-configmap"));
    }

    #[tokio::test]
    async fn typed_get_maps_absent_objects_to_none() {
        let mut mock = MockResourceStore::new();
        mock.expect_get()
            .withf(|resource, namespace, name| {
                resource.kind == "Service" && namespace == "search" && name == "missing"
            })
            .returning(|_, _, _| Ok(None));

        let store = Store::new(Arc::new(mock));
        let found: Option<Service> = store.get("search", "missing").await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn typed_patch_status_sends_serialized_status() {
        let mut mock = MockResourceStore::new();
        mock.expect_patch_status()
            .withf(|resource, namespace, name, status| {
                resource.kind == "Service"
                    && namespace == "search"
                    && name == "common"
                    && status["loadBalancer"].is_object()
            })
            .returning(|_, _, _, _| Ok(()));

        let service = Service {
            metadata: ObjectMeta {
                name: Some("common".to_string()),
                namespace: Some("search".to_string()),
                ..Default::default()
            },
            spec: Some(ServiceSpec::default()),
            ..Default::default()
        };
        let status = serde_json::json!({ "loadBalancer": {} });
        let store = Store::new(Arc::new(mock));
        store.patch_status(&service, &status).await.unwrap();
    }

    #[tokio::test]
    async fn patch_status_requires_namespace() {
        let store = Store::new(Arc::new(MockResourceStore::new()));
        let service = Service {
            metadata: ObjectMeta {
                name: Some("common".to_string()),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = store
            .patch_status(&service, &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingMetadata { field: "namespace", .. }));
    }
}
