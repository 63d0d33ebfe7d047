// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod common;
pub mod pod;
pub mod service;
pub mod stateful_set;
pub mod status;

pub use common::*;
pub use pod::*;
pub use service::*;
pub use stateful_set::*;
pub use status::*;

use crate::janusgraph_controller::trusted::exec_types::*;
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::APIError;
use crate::kubernetes_api_objects::marshal::{api_resource, marshal};
use kube::api::DynamicObject;
use kube::Resource;
use serde::{de::DeserializeOwned, Serialize};

// ResourceBuilder describes one child object owned by a Janusgraph:
// its identity and its desired shape. The requests for reading and creating it
// are derived from these two, so every child is looked up by the same name it is created with.
pub trait ResourceBuilder {
    type Object: Resource<DynamicType = ()> + Serialize + DeserializeOwned;

    fn name(janusgraph: &Janusgraph) -> String;

    fn make(janusgraph: &Janusgraph) -> Self::Object;

    fn get_request(janusgraph: &Janusgraph) -> KubeGetRequest {
        KubeGetRequest {
            api_resource: api_resource::<Self::Object>(),
            name: Self::name(janusgraph),
            namespace: janusgraph.metadata.namespace.clone().unwrap_or_default(),
        }
    }

    fn create_request(janusgraph: &Janusgraph) -> Result<KubeCreateRequest, serde_json::Error> {
        Ok(KubeCreateRequest {
            api_resource: api_resource::<Self::Object>(),
            namespace: janusgraph.metadata.namespace.clone().unwrap_or_default(),
            obj: marshal(&Self::make(janusgraph))?,
        })
    }
}

/// What a point lookup of a child object found.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Present(DynamicObject),
    Absent,
}

/// How a child object came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ensured {
    // Created by this pass; the caller must stop the pass and be re-invoked.
    Created,
    AlreadyPresent,
}

// ensure_after_get interprets the response to the lookup of a child object.
// Any error other than not-found is passed on unchanged.
pub fn ensure_after_get(res: Result<DynamicObject, APIError>) -> Result<Lookup, APIError> {
    match res {
        Ok(obj) => Ok(Lookup::Present(obj)),
        Err(err) if err.is_object_not_found() => Ok(Lookup::Absent),
        Err(err) => Err(err),
    }
}

// ensure_after_create interprets the response to the creation of a child object.
// A create that lost the race against another creator (or against its own earlier
// attempt whose response was lost) reports AlreadyExists, which means the object is there.
pub fn ensure_after_create(res: Result<DynamicObject, APIError>) -> Result<Ensured, APIError> {
    match res {
        Ok(_) => Ok(Ensured::Created),
        Err(err) if err.is_object_already_exists() => Ok(Ensured::AlreadyPresent),
        Err(err) => Err(err),
    }
}
