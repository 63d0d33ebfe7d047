// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::error::APIError;
use kube::api::DynamicObject;
use kube::discovery::ApiResource;

// KubeAPIRequest represents API requests issued by reconcile_core.
//
// kube-rs uses a generic type kube::api::Api as an api handle to send
// requests to the Kubernetes API.
// So KubeAPIRequest wraps around the variables used to instantiate kube::api::Api
// (the ApiResource and the namespace) and to call its methods.
//
// Objects travel as DynamicObject so that one request type serves every kind.
#[derive(Debug, Clone, PartialEq)]
pub enum KubeAPIRequest {
    GetRequest(KubeGetRequest),
    ListRequest(KubeListRequest),
    CreateRequest(KubeCreateRequest),
    UpdateRequest(KubeUpdateRequest),
    UpdateStatusRequest(KubeUpdateStatusRequest),
}

impl KubeAPIRequest {
    pub fn key(&self) -> String {
        match self {
            KubeAPIRequest::GetRequest(req) => req.key(),
            KubeAPIRequest::ListRequest(req) => req.key(),
            KubeAPIRequest::CreateRequest(req) => req.key(),
            KubeAPIRequest::UpdateRequest(req) => req.key(),
            KubeAPIRequest::UpdateStatusRequest(req) => req.key(),
        }
    }

    /// Whether the request changes the cluster state.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            KubeAPIRequest::CreateRequest(_)
                | KubeAPIRequest::UpdateRequest(_)
                | KubeAPIRequest::UpdateStatusRequest(_)
        )
    }
}

// KubeGetRequest has the name as the parameter of Api.get(), and namespace to instantiate an Api.
#[derive(Debug, Clone, PartialEq)]
pub struct KubeGetRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
}

impl KubeGetRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeListRequest has the namespace to instantiate an Api, and an optional
// equality-based label selector (e.g., "app=Janusgraph,janusgraph_cr=g1") for ListParams.
#[derive(Debug, Clone, PartialEq)]
pub struct KubeListRequest {
    pub api_resource: ApiResource,
    pub namespace: String,
    pub label_selector: Option<String>,
}

impl KubeListRequest {
    pub fn key(&self) -> String {
        match &self.label_selector {
            Some(selector) => format!("{}/{}?{}", self.api_resource.kind, self.namespace, selector),
            None => format!("{}/{}", self.api_resource.kind, self.namespace),
        }
    }
}

// KubeCreateRequest has the obj as the parameter of Api.create().
#[derive(Debug, Clone, PartialEq)]
pub struct KubeCreateRequest {
    pub api_resource: ApiResource,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeCreateRequest {
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_resource.kind,
            self.namespace,
            self.obj.metadata.name.as_deref().unwrap_or("")
        )
    }
}

// KubeUpdateRequest has the obj as the parameter of Api.replace().
#[derive(Debug, Clone, PartialEq)]
pub struct KubeUpdateRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeUpdateRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeUpdateStatusRequest has the obj as the parameter of Api.replace_status().
// Only the status of obj is written; the API server ignores everything else.
#[derive(Debug, Clone, PartialEq)]
pub struct KubeUpdateStatusRequest {
    pub api_resource: ApiResource,
    pub name: String,
    pub namespace: String,
    pub obj: DynamicObject,
}

impl KubeUpdateStatusRequest {
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.api_resource.kind, self.namespace, self.name)
    }
}

// KubeAPIResponse represents API results fed back to reconcile_core.
// Each variant pairs with the KubeAPIRequest variant of the same name.
#[derive(Debug, Clone, PartialEq)]
pub enum KubeAPIResponse {
    GetResponse(KubeGetResponse),
    ListResponse(KubeListResponse),
    CreateResponse(KubeCreateResponse),
    UpdateResponse(KubeUpdateResponse),
    UpdateStatusResponse(KubeUpdateStatusResponse),
}

#[derive(Debug, Clone, PartialEq)]
pub struct KubeGetResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KubeListResponse {
    pub res: Result<Vec<DynamicObject>, APIError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KubeCreateResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KubeUpdateResponse {
    pub res: Result<DynamicObject, APIError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KubeUpdateStatusResponse {
    pub res: Result<DynamicObject, APIError>,
}

// The into_*_response helpers return None when the response is of a different kind,
// which reconcile_core treats as an unexpected response.
impl KubeAPIResponse {
    pub fn into_get_response(self) -> Option<Result<DynamicObject, APIError>> {
        match self {
            KubeAPIResponse::GetResponse(resp) => Some(resp.res),
            _ => None,
        }
    }

    pub fn into_list_response(self) -> Option<Result<Vec<DynamicObject>, APIError>> {
        match self {
            KubeAPIResponse::ListResponse(resp) => Some(resp.res),
            _ => None,
        }
    }

    pub fn into_create_response(self) -> Option<Result<DynamicObject, APIError>> {
        match self {
            KubeAPIResponse::CreateResponse(resp) => Some(resp.res),
            _ => None,
        }
    }

    pub fn into_update_response(self) -> Option<Result<DynamicObject, APIError>> {
        match self {
            KubeAPIResponse::UpdateResponse(resp) => Some(resp.res),
            _ => None,
        }
    }

    pub fn into_update_status_response(self) -> Option<Result<DynamicObject, APIError>> {
        match self {
            KubeAPIResponse::UpdateStatusResponse(resp) => Some(resp.res),
            _ => None,
        }
    }
}
