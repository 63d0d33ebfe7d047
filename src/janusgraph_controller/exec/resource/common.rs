// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::janusgraph_controller::trusted::exec_types::*;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use kube::Resource;
use std::collections::BTreeMap;

// Port the gremlin server listens on, both in the container and on the service.
pub const GREMLIN_PORT: i32 = 8182;

pub const JANUSGRAPH_IMAGE: &str = "horeaporutiu/janusgraph";

// These names are part of the contract with already-deployed clusters:
// renaming them breaks the lookup of existing children.
pub fn make_service_name(janusgraph: &Janusgraph) -> String {
    janusgraph_name(janusgraph) + "-service"
}

pub fn make_stateful_set_name(janusgraph: &Janusgraph) -> String {
    janusgraph_name(janusgraph)
}

// make_labels returns the only label set of the cluster. The service selector,
// the stateful set selector, the pod template labels and the pod list selector
// are all derived from it so they cannot drift apart.
pub fn make_labels(janusgraph: &Janusgraph) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("app".to_string(), "Janusgraph".to_string()),
        ("janusgraph_cr".to_string(), janusgraph_name(janusgraph)),
    ])
}

// make_label_selector renders labels as an equality-based selector, e.g. "app=Janusgraph,janusgraph_cr=g1".
pub fn make_label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join(",")
}

// The controller owner reference lets the garbage collector delete the children with the custom resource.
// It is empty only for a custom resource without uid, which the shim layer never hands to reconcile_core.
pub fn make_owner_references(janusgraph: &Janusgraph) -> Vec<OwnerReference> {
    janusgraph.controller_owner_ref(&()).into_iter().collect()
}

pub fn image_for_version(version: &str) -> String {
    format!("{}:{}", JANUSGRAPH_IMAGE, version)
}

fn janusgraph_name(janusgraph: &Janusgraph) -> String {
    janusgraph.metadata.name.clone().unwrap_or_default()
}

// Whether the object carries the controller owner reference of this very custom resource.
// A child left behind by a deleted custom resource of the same name has a different uid.
pub fn is_controlled_by(metadata: &ObjectMeta, janusgraph: &Janusgraph) -> bool {
    match (&metadata.owner_references, janusgraph.controller_owner_ref(&())) {
        (Some(owner_references), Some(owner_ref)) => owner_references.contains(&owner_ref),
        _ => false,
    }
}
