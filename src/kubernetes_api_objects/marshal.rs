// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube::api::DynamicObject;
use kube::discovery::ApiResource;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};

// marshal converts a typed object into the DynamicObject carried by requests.
// The type meta (apiVersion and kind) comes from the serialized form,
// so both k8s-openapi types and custom resources keep their identity.
pub fn marshal<K>(obj: &K) -> Result<DynamicObject, serde_json::Error>
where
    K: Serialize,
{
    serde_json::from_value(serde_json::to_value(obj)?)
}

// unmarshal converts a DynamicObject returned by the API server back into a typed object.
pub fn unmarshal<K>(obj: DynamicObject) -> Result<K, serde_json::Error>
where
    K: DeserializeOwned,
{
    serde_json::from_value(serde_json::to_value(obj)?)
}

pub fn api_resource<K>() -> ApiResource
where
    K: Resource<DynamicType = ()>,
{
    ApiResource::erase::<K>(&())
}
