// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::APIError;
use crate::kubernetes_api_objects::marshal::{marshal, unmarshal};
use crate::shim_layer::api_client::ApiClient;
use async_trait::async_trait;
use kube::api::DynamicObject;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

// SimulatedApiServer is an in-memory API server and datastore.
//
// It follows how the real API server handles the requests the controller sends:
// * every object is keyed by kind, namespace and name
// * create allocates a fresh uid and resource version, and drops the status
// * update compares the resource version and ignores any change to the status
// * update status ignores any change other than the status
// * a write that changes nothing keeps the resource version
//
// Watch is not modeled. Tests invoke reconcile passes directly.
//
// Clones share the same datastore, so a test can keep one handle while the shim owns another.
#[derive(Clone, Default)]
pub struct SimulatedApiServer {
    state: Arc<Mutex<APIServerState>>,
}

#[derive(Default)]
struct APIServerState {
    resources: BTreeMap<ObjectKey, DynamicObject>,
    resource_version_counter: u64,
    uid_counter: u64,
    // Every create, update and update status request received, including the failed ones.
    write_requests: Vec<String>,
    injected_errors: HashMap<(Operation, String), VecDeque<APIError>>,
    latency: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
    kind: String,
    namespace: String,
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Get,
    List,
    Create,
    Update,
    UpdateStatus,
}

impl SimulatedApiServer {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, APIServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes the next `op` request on objects of `kind` fail with `err` without touching the store.
    pub fn fail_next(&self, op: Operation, kind: &str, err: APIError) {
        self.lock()
            .injected_errors
            .entry((op, kind.to_string()))
            .or_default()
            .push_back(err);
    }

    /// Delays every request by `latency`, which lets concurrent passes interleave.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = latency;
    }

    /// Stores obj as is (including its status) on behalf of a user or another controller.
    /// Returns the stored object, with uid and resource version assigned.
    pub fn apply<K>(&self, obj: &K) -> K
    where
        K: Resource<DynamicType = ()> + Serialize + DeserializeOwned + Clone,
    {
        let kind = K::kind(&()).to_string();
        let mut dynamic = match marshal(obj) {
            Ok(dynamic) => dynamic,
            Err(_) => return obj.clone(),
        };
        let mut state = self.lock();
        let key = ObjectKey {
            kind,
            namespace: dynamic.metadata.namespace.clone().unwrap_or_default(),
            name: dynamic.metadata.name.clone().unwrap_or_default(),
        };
        match state.resources.get(&key) {
            Some(existing) => dynamic.metadata.uid = existing.metadata.uid.clone(),
            None => {
                state.uid_counter += 1;
                dynamic.metadata.uid = Some(format!("uid-{}", state.uid_counter));
            }
        }
        state.resource_version_counter += 1;
        dynamic.metadata.resource_version = Some(state.resource_version_counter.to_string());
        state.resources.insert(key, dynamic.clone());
        unmarshal(dynamic).unwrap_or_else(|_| obj.clone())
    }

    pub fn get_object<K>(&self, namespace: &str, name: &str) -> Option<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let key = ObjectKey {
            kind: K::kind(&()).to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        let obj = self.lock().resources.get(&key).cloned()?;
        unmarshal(obj).ok()
    }

    pub fn list_objects<K>(&self, namespace: &str) -> Vec<K>
    where
        K: Resource<DynamicType = ()> + DeserializeOwned,
    {
        let kind = K::kind(&()).to_string();
        self.lock()
            .resources
            .iter()
            .filter(|(key, _)| key.kind == kind && key.namespace == namespace)
            .filter_map(|(_, obj)| unmarshal(obj.clone()).ok())
            .collect()
    }

    /// Deletes the object right away; there are no finalizers in this datastore.
    pub fn delete<K>(&self, namespace: &str, name: &str) -> bool
    where
        K: Resource<DynamicType = ()>,
    {
        let key = ObjectKey {
            kind: K::kind(&()).to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        self.lock().resources.remove(&key).is_some()
    }

    /// Deletes every object whose controller owner no longer exists, as the garbage collector does.
    pub fn collect_garbage(&self) {
        let mut state = self.lock();
        loop {
            let live_uids: Vec<String> = state
                .resources
                .values()
                .filter_map(|obj| obj.metadata.uid.clone())
                .collect();
            let orphans: Vec<ObjectKey> = state
                .resources
                .iter()
                .filter(|(_, obj)| {
                    obj.metadata
                        .owner_references
                        .iter()
                        .flatten()
                        .any(|owner| owner.controller == Some(true) && !live_uids.contains(&owner.uid))
                })
                .map(|(key, _)| key.clone())
                .collect();
            if orphans.is_empty() {
                return;
            }
            for key in orphans {
                state.resources.remove(&key);
            }
        }
    }

    /// Keys (kind/namespace/name) of all the write requests received so far, in order.
    pub fn write_requests(&self) -> Vec<String> {
        self.lock().write_requests.clone()
    }

    pub fn write_count(&self) -> usize {
        self.lock().write_requests.len()
    }

    pub fn clear_write_requests(&self) {
        self.lock().write_requests.clear();
    }

    async fn delay(&self) {
        let latency = self.lock().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
    }
}

impl APIServerState {
    fn injected_error(&mut self, op: Operation, kind: &str) -> Option<APIError> {
        self.injected_errors
            .get_mut(&(op, kind.to_string()))
            .and_then(VecDeque::pop_front)
    }

    fn handle_get_request(&mut self, req: &KubeGetRequest) -> Result<DynamicObject, APIError> {
        if let Some(err) = self.injected_error(Operation::Get, &req.api_resource.kind) {
            return Err(err);
        }
        let key = ObjectKey {
            kind: req.api_resource.kind.clone(),
            namespace: req.namespace.clone(),
            name: req.name.clone(),
        };
        self.resources.get(&key).cloned().ok_or(APIError::ObjectNotFound)
    }

    fn handle_list_request(&mut self, req: &KubeListRequest) -> Result<Vec<DynamicObject>, APIError> {
        if let Some(err) = self.injected_error(Operation::List, &req.api_resource.kind) {
            return Err(err);
        }
        let selector = match &req.label_selector {
            Some(selector) => parse_label_selector(selector)?,
            None => BTreeMap::new(),
        };
        Ok(self
            .resources
            .iter()
            .filter(|(key, _)| key.kind == req.api_resource.kind && key.namespace == req.namespace)
            .filter(|(_, obj)| {
                selector.iter().all(|(label, value)| {
                    obj.metadata
                        .labels
                        .as_ref()
                        .and_then(|labels| labels.get(label))
                        == Some(value)
                })
            })
            .map(|(_, obj)| obj.clone())
            .collect())
    }

    fn handle_create_request(&mut self, req: &KubeCreateRequest) -> Result<DynamicObject, APIError> {
        self.write_requests.push(req.key());
        if let Some(err) = self.injected_error(Operation::Create, &req.api_resource.kind) {
            return Err(err);
        }
        let name = req.obj.metadata.name.clone().ok_or(APIError::Invalid)?;
        if req
            .obj
            .metadata
            .namespace
            .as_ref()
            .is_some_and(|namespace| namespace != &req.namespace)
        {
            return Err(APIError::BadRequest);
        }
        if has_multiple_controllers(&req.obj) {
            return Err(APIError::Invalid);
        }
        let key = ObjectKey {
            kind: req.api_resource.kind.clone(),
            namespace: req.namespace.clone(),
            name,
        };
        if self.resources.contains_key(&key) {
            return Err(APIError::ObjectAlreadyExists);
        }
        let mut created_obj = req.obj.clone();
        self.uid_counter += 1;
        self.resource_version_counter += 1;
        created_obj.metadata.namespace = Some(req.namespace.clone());
        created_obj.metadata.uid = Some(format!("uid-{}", self.uid_counter));
        created_obj.metadata.resource_version = Some(self.resource_version_counter.to_string());
        created_obj.metadata.deletion_timestamp = None;
        // Overwrite the status with the default (empty) one.
        remove_status(&mut created_obj);
        self.resources.insert(key, created_obj.clone());
        Ok(created_obj)
    }

    // check_update is shared by update and update status: the object must exist,
    // and the resource version and uid, when given, must match the stored ones.
    fn check_update(
        &self,
        kind: &str,
        name: &str,
        namespace: &str,
        obj: &DynamicObject,
    ) -> Result<ObjectKey, APIError> {
        if obj.metadata.name.as_deref() != Some(name) {
            return Err(APIError::BadRequest);
        }
        if obj
            .metadata
            .namespace
            .as_ref()
            .is_some_and(|obj_namespace| obj_namespace != namespace)
        {
            return Err(APIError::BadRequest);
        }
        let key = ObjectKey {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        };
        let stored = self.resources.get(&key).ok_or(APIError::ObjectNotFound)?;
        if obj.metadata.resource_version.is_some()
            && obj.metadata.resource_version != stored.metadata.resource_version
        {
            return Err(APIError::Conflict);
        }
        if obj.metadata.uid.is_some() && obj.metadata.uid != stored.metadata.uid {
            return Err(APIError::Conflict);
        }
        Ok(key)
    }

    fn handle_update_request(&mut self, req: &KubeUpdateRequest) -> Result<DynamicObject, APIError> {
        self.write_requests.push(req.key());
        if let Some(err) = self.injected_error(Operation::Update, &req.api_resource.kind) {
            return Err(err);
        }
        let key = self.check_update(&req.api_resource.kind, &req.name, &req.namespace, &req.obj)?;
        if has_multiple_controllers(&req.obj) {
            return Err(APIError::Invalid);
        }
        let old_obj = self.resources.get(&key).cloned().ok_or(APIError::ObjectNotFound)?;
        let mut updated_obj = req.obj.clone();
        updated_obj.metadata.namespace = old_obj.metadata.namespace.clone();
        updated_obj.metadata.uid = old_obj.metadata.uid.clone();
        updated_obj.metadata.resource_version = old_obj.metadata.resource_version.clone();
        updated_obj.metadata.deletion_timestamp = old_obj.metadata.deletion_timestamp.clone();
        // Ignore any change to the status.
        set_status(&mut updated_obj, status_of(&old_obj));
        Ok(self.commit(key, old_obj, updated_obj))
    }

    fn handle_update_status_request(&mut self, req: &KubeUpdateStatusRequest) -> Result<DynamicObject, APIError> {
        self.write_requests.push(req.key());
        if let Some(err) = self.injected_error(Operation::UpdateStatus, &req.api_resource.kind) {
            return Err(err);
        }
        let key = self.check_update(&req.api_resource.kind, &req.name, &req.namespace, &req.obj)?;
        let old_obj = self.resources.get(&key).cloned().ok_or(APIError::ObjectNotFound)?;
        // Ignore any change other than the status.
        let mut updated_obj = old_obj.clone();
        set_status(&mut updated_obj, status_of(&req.obj));
        Ok(self.commit(key, old_obj, updated_obj))
    }

    // commit stores updated_obj with a new resource version, unless nothing changed.
    fn commit(&mut self, key: ObjectKey, old_obj: DynamicObject, mut updated_obj: DynamicObject) -> DynamicObject {
        if updated_obj == old_obj {
            return old_obj;
        }
        self.resource_version_counter += 1;
        updated_obj.metadata.resource_version = Some(self.resource_version_counter.to_string());
        self.resources.insert(key, updated_obj.clone());
        updated_obj
    }
}

#[async_trait]
impl ApiClient for SimulatedApiServer {
    async fn get(&self, req: &KubeGetRequest) -> Result<DynamicObject, APIError> {
        self.delay().await;
        self.lock().handle_get_request(req)
    }

    async fn list(&self, req: &KubeListRequest) -> Result<Vec<DynamicObject>, APIError> {
        self.delay().await;
        self.lock().handle_list_request(req)
    }

    async fn create(&self, req: &KubeCreateRequest) -> Result<DynamicObject, APIError> {
        self.delay().await;
        self.lock().handle_create_request(req)
    }

    async fn update(&self, req: &KubeUpdateRequest) -> Result<DynamicObject, APIError> {
        self.delay().await;
        self.lock().handle_update_request(req)
    }

    async fn update_status(&self, req: &KubeUpdateStatusRequest) -> Result<DynamicObject, APIError> {
        self.delay().await;
        self.lock().handle_update_status_request(req)
    }
}

// parse_label_selector accepts the equality-based form "k1=v1,k2=v2" only.
fn parse_label_selector(selector: &str) -> Result<BTreeMap<String, String>, APIError> {
    selector
        .split(',')
        .filter(|requirement| !requirement.trim().is_empty())
        .map(|requirement| match requirement.split_once('=') {
            Some((label, value)) if !label.trim().is_empty() => {
                Ok((label.trim().to_string(), value.trim().to_string()))
            }
            _ => Err(APIError::BadRequest),
        })
        .collect()
}

fn has_multiple_controllers(obj: &DynamicObject) -> bool {
    obj.metadata
        .owner_references
        .iter()
        .flatten()
        .filter(|owner| owner.controller == Some(true))
        .count()
        > 1
}

fn status_of(obj: &DynamicObject) -> Option<serde_json::Value> {
    obj.data.get("status").cloned()
}

fn set_status(obj: &mut DynamicObject, status: Option<serde_json::Value>) {
    match status {
        Some(status) => {
            if let Some(data) = obj.data.as_object_mut() {
                data.insert("status".to_string(), status);
            }
        }
        None => remove_status(obj),
    }
}

fn remove_status(obj: &mut DynamicObject) {
    if let Some(data) = obj.data.as_object_mut() {
        data.remove("status");
    }
}

