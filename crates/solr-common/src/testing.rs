//! In-memory object store for controller tests
//!
//! `FakeStore` behaves like a tiny API server: it assigns uids and resource
//! versions, keeps status across spec replaces, filters lists by equality
//! label selectors, and records every write so tests can assert on exactly
//! what a reconcile pass did.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use kube::api::{ApiResource, DynamicObject};
use kube::error::ErrorResponse;
use kube::ResourceExt;

use crate::store::{from_dynamic, to_dynamic, ResourceStore, Store, StoredResource};
use crate::Error;

/// Store operation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verb {
    /// Read one object
    Get,
    /// Create an object
    Create,
    /// Replace an object
    Replace,
    /// Patch the status subresource
    PatchStatus,
    /// List objects
    List,
}

/// A write performed against the store
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mutation {
    /// Operation
    pub verb: Verb,
    /// Object kind
    pub kind: String,
    /// Object name
    pub name: String,
}

type Key = (String, String, String);

#[derive(Default)]
struct State {
    objects: BTreeMap<Key, DynamicObject>,
    mutations: Vec<Mutation>,
    failures: Vec<(Verb, String)>,
    stalls: Vec<(Verb, String)>,
    next_uid: u64,
}

/// In-memory [`ResourceStore`]
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<State>,
}

fn api_error(code: u16, reason: &str, message: String) -> Error {
    Error::from(kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    }))
}

fn matches_selector(object: &DynamicObject, selector: &str) -> bool {
    let labels = object.labels();
    selector
        .split(',')
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
            None => labels.contains_key(term),
        })
}

impl FakeStore {
    /// Create an empty store
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Typed facade over this store
    pub fn store(self: &Arc<Self>) -> Store {
        Store::new(self.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Seed an object without recording a mutation
    pub fn insert<K: StoredResource>(&self, object: &K) -> Result<(), Error> {
        let mut dynamic = to_dynamic(object)?;
        let mut state = self.lock();
        state.next_uid += 1;
        let uid = format!("uid-{}", state.next_uid);
        dynamic.metadata.uid.get_or_insert(uid);
        dynamic.metadata.resource_version.get_or_insert_with(|| "1".to_string());
        let key = (
            K::kind(&()).to_string(),
            dynamic.namespace().unwrap_or_default(),
            dynamic.name_any(),
        );
        state.objects.insert(key, dynamic);
        Ok(())
    }

    /// Read an object for assertions
    pub fn object<K: StoredResource>(&self, namespace: &str, name: &str) -> Option<K> {
        let key = (K::kind(&()).to_string(), namespace.to_string(), name.to_string());
        let dynamic = self.lock().objects.get(&key).cloned()?;
        from_dynamic(dynamic).ok()
    }

    /// All objects of a kind, ordered by namespace and name
    pub fn objects<K: StoredResource>(&self) -> Vec<K> {
        let kind = K::kind(&()).to_string();
        let matching: Vec<DynamicObject> = self
            .lock()
            .objects
            .iter()
            .filter(|((k, _, _), _)| *k == kind)
            .map(|(_, o)| o.clone())
            .collect();
        matching
            .into_iter()
            .filter_map(|o| from_dynamic(o).ok())
            .collect()
    }

    /// Mutate a stored object in place, as another actor would
    ///
    /// Used to simulate the API server assigning cluster IPs or a
    /// controller reporting status. Returns false if the object is absent.
    pub fn modify<K: StoredResource>(
        &self,
        namespace: &str,
        name: &str,
        f: impl FnOnce(&mut K),
    ) -> bool {
        let Some(mut object) = self.object::<K>(namespace, name) else {
            return false;
        };
        f(&mut object);
        self.insert(&object).is_ok()
    }

    /// Fail every future `verb` on `kind` with a 500
    pub fn fail_on(&self, verb: Verb, kind: &str) {
        self.lock().failures.push((verb, kind.to_string()));
    }

    /// Never complete any future `verb` on `kind`, like an API server that hangs
    pub fn stall_on(&self, verb: Verb, kind: &str) {
        self.lock().stalls.push((verb, kind.to_string()));
    }

    async fn stall_if_requested(&self, verb: Verb, kind: &str) {
        let stalled = self.lock().stalls.iter().any(|(v, k)| *v == verb && k == kind);
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    /// Writes recorded so far
    pub fn mutations(&self) -> Vec<Mutation> {
        self.lock().mutations.clone()
    }

    /// Writes of one kind recorded so far
    pub fn mutations_of(&self, kind: &str) -> Vec<Mutation> {
        self.mutations()
            .into_iter()
            .filter(|m| m.kind == kind)
            .collect()
    }

    /// Forget recorded writes
    pub fn clear_mutations(&self) {
        self.lock().mutations.clear();
    }

    fn check_failure(state: &State, verb: Verb, kind: &str) -> Result<(), Error> {
        if state
            .failures
            .iter()
            .any(|(v, k)| *v == verb && k == kind)
        {
            return Err(api_error(
                500,
                "InternalError",
                format!("injected {verb:?} failure for {kind}"),
            ));
        }
        Ok(())
    }

    fn key(resource: &ApiResource, object: &DynamicObject) -> Key {
        (
            resource.kind.clone(),
            object.namespace().unwrap_or_default(),
            object.name_any(),
        )
    }

    fn record(state: &mut State, verb: Verb, resource: &ApiResource, name: &str) {
        state.mutations.push(Mutation {
            verb,
            kind: resource.kind.clone(),
            name: name.to_string(),
        });
    }
}

#[async_trait]
impl ResourceStore for FakeStore {
    async fn get(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
    ) -> Result<Option<DynamicObject>, Error> {
        self.stall_if_requested(Verb::Get, &resource.kind).await;
        let state = self.lock();
        Self::check_failure(&state, Verb::Get, &resource.kind)?;
        let key = (resource.kind.clone(), namespace.to_string(), name.to_string());
        Ok(state.objects.get(&key).cloned())
    }

    async fn create(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        self.stall_if_requested(Verb::Create, &resource.kind).await;
        let mut state = self.lock();
        Self::check_failure(&state, Verb::Create, &resource.kind)?;
        let key = Self::key(resource, object);
        if state.objects.contains_key(&key) {
            return Err(api_error(
                409,
                "AlreadyExists",
                format!("{} {} already exists", resource.kind, key.2),
            ));
        }

        let mut stored = object.clone();
        state.next_uid += 1;
        stored.metadata.uid = Some(format!("uid-{}", state.next_uid));
        stored.metadata.resource_version = Some("1".to_string());
        if let Some(data) = stored.data.as_object_mut() {
            data.remove("status");
        }

        Self::record(&mut state, Verb::Create, resource, &key.2);
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace(
        &self,
        resource: &ApiResource,
        object: &DynamicObject,
    ) -> Result<DynamicObject, Error> {
        self.stall_if_requested(Verb::Replace, &resource.kind).await;
        let mut state = self.lock();
        Self::check_failure(&state, Verb::Replace, &resource.kind)?;
        let key = Self::key(resource, object);
        let Some(existing) = state.objects.get(&key) else {
            return Err(api_error(
                404,
                "NotFound",
                format!("{} {} not found", resource.kind, key.2),
            ));
        };

        let mut stored = object.clone();
        stored.metadata.uid = existing.metadata.uid.clone();
        let version = existing
            .metadata
            .resource_version
            .as_deref()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        stored.metadata.resource_version = Some((version + 1).to_string());
        let status = existing.data.get("status").cloned();
        if let Some(data) = stored.data.as_object_mut() {
            match status {
                Some(status) => data.insert("status".to_string(), status),
                None => data.remove("status"),
            };
        }

        Self::record(&mut state, Verb::Replace, resource, &key.2);
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn patch_status(
        &self,
        resource: &ApiResource,
        namespace: &str,
        name: &str,
        status: &serde_json::Value,
    ) -> Result<(), Error> {
        self.stall_if_requested(Verb::PatchStatus, &resource.kind).await;
        let mut state = self.lock();
        Self::check_failure(&state, Verb::PatchStatus, &resource.kind)?;
        let key = (resource.kind.clone(), namespace.to_string(), name.to_string());
        let Some(existing) = state.objects.get_mut(&key) else {
            return Err(api_error(404, "NotFound", format!("{} {name} not found", resource.kind)));
        };
        if let Some(data) = existing.data.as_object_mut() {
            data.insert("status".to_string(), status.clone());
        }
        Self::record(&mut state, Verb::PatchStatus, resource, name);
        Ok(())
    }

    async fn list(
        &self,
        resource: &ApiResource,
        namespace: &str,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, Error> {
        self.stall_if_requested(Verb::List, &resource.kind).await;
        let state = self.lock();
        Self::check_failure(&state, Verb::List, &resource.kind)?;
        Ok(state
            .objects
            .iter()
            .filter(|((kind, ns, _), _)| *kind == resource.kind && ns == namespace)
            .map(|(_, object)| object)
            .filter(|object| matches_selector(object, label_selector))
            .cloned()
            .collect())
    }
}
