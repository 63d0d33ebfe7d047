// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::{kube_error_to_api_error, APIError};
use async_trait::async_trait;
use kube::api::{Api, DynamicObject, ListParams, PostParams};
use kube::discovery::ApiResource;
use kube::Client;

/// The store the shim layer reads and writes the cluster state through.
///
/// Production code talks to the Kubernetes API via [`KubeApiClient`];
/// tests use the in-memory `SimulatedApiServer`.
#[async_trait]
pub trait ApiClient: Send + Sync {
    async fn get(&self, req: &KubeGetRequest) -> Result<DynamicObject, APIError>;

    async fn list(&self, req: &KubeListRequest) -> Result<Vec<DynamicObject>, APIError>;

    async fn create(&self, req: &KubeCreateRequest) -> Result<DynamicObject, APIError>;

    async fn update(&self, req: &KubeUpdateRequest) -> Result<DynamicObject, APIError>;

    /// Writes only the status of req.obj.
    async fn update_status(&self, req: &KubeUpdateStatusRequest) -> Result<DynamicObject, APIError>;
}

pub struct KubeApiClient {
    client: Client,
}

impl KubeApiClient {
    pub fn new(client: Client) -> Self {
        KubeApiClient { client }
    }

    fn api(&self, namespace: &str, api_resource: &ApiResource) -> Api<DynamicObject> {
        Api::<DynamicObject>::namespaced_with(self.client.clone(), namespace, api_resource)
    }
}

// Every read is served by kube-rs from the API server (quorum read), never from a watch cache.
#[async_trait]
impl ApiClient for KubeApiClient {
    async fn get(&self, req: &KubeGetRequest) -> Result<DynamicObject, APIError> {
        self.api(&req.namespace, &req.api_resource)
            .get(&req.name)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn list(&self, req: &KubeListRequest) -> Result<Vec<DynamicObject>, APIError> {
        let mut lp = ListParams::default();
        if let Some(selector) = &req.label_selector {
            lp = lp.labels(selector);
        }
        self.api(&req.namespace, &req.api_resource)
            .list(&lp)
            .await
            .map(|obj_list| obj_list.items)
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn create(&self, req: &KubeCreateRequest) -> Result<DynamicObject, APIError> {
        self.api(&req.namespace, &req.api_resource)
            .create(&PostParams::default(), &req.obj)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn update(&self, req: &KubeUpdateRequest) -> Result<DynamicObject, APIError> {
        self.api(&req.namespace, &req.api_resource)
            .replace(&req.name, &PostParams::default(), &req.obj)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }

    async fn update_status(&self, req: &KubeUpdateStatusRequest) -> Result<DynamicObject, APIError> {
        let data = serde_json::to_vec(&req.obj).map_err(|_| APIError::BadRequest)?;
        self.api(&req.namespace, &req.api_resource)
            .replace_status(&req.name, &PostParams::default(), data)
            .await
            .map_err(|err| kube_error_to_api_error(&err))
    }
}
