// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use super::common::*;
use crate::janusgraph_controller::trusted::exec_types::*;
use crate::kubernetes_api_objects::api_method::KubeListRequest;
use crate::kubernetes_api_objects::marshal::api_resource;
use k8s_openapi::api::core::v1::Pod;
use kube::api::DynamicObject;

// list_pods_request lists the pods selected by the same labels the stateful set stamps on them.
pub fn list_pods_request(janusgraph: &Janusgraph) -> KubeListRequest {
    KubeListRequest {
        api_resource: api_resource::<Pod>(),
        namespace: janusgraph.metadata.namespace.clone().unwrap_or_default(),
        label_selector: Some(make_label_selector(&make_labels(janusgraph))),
    }
}

// member_names keeps the order in which the API server returned the pods.
pub fn member_names(pods: &[DynamicObject]) -> Vec<String> {
    pods.iter()
        .filter_map(|pod| pod.metadata.name.clone())
        .collect()
}
