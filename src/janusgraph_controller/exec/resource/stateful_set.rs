// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use super::common::*;
use super::ResourceBuilder;
use crate::janusgraph_controller::trusted::exec_types::*;
use k8s_openapi::api::apps::v1::{StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{Container, ContainerPort, PodSpec, PodTemplateSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

// Replicas the API server assumes when a stateful set does not set any.
const DEFAULT_REPLICAS: i32 = 1;

pub struct StatefulSetBuilder {}

impl ResourceBuilder for StatefulSetBuilder {
    type Object = StatefulSet;

    fn name(janusgraph: &Janusgraph) -> String {
        make_stateful_set_name(janusgraph)
    }

    fn make(janusgraph: &Janusgraph) -> StatefulSet {
        make_stateful_set(janusgraph)
    }
}

pub fn make_stateful_set(janusgraph: &Janusgraph) -> StatefulSet {
    StatefulSet {
        metadata: ObjectMeta {
            name: Some(make_stateful_set_name(janusgraph)),
            namespace: janusgraph.metadata.namespace.clone(),
            labels: Some(make_labels(janusgraph)),
            owner_references: Some(make_owner_references(janusgraph)),
            ..ObjectMeta::default()
        },
        spec: Some(StatefulSetSpec {
            replicas: Some(janusgraph.spec.replica_count),
            selector: LabelSelector {
                match_labels: Some(make_labels(janusgraph)),
                ..LabelSelector::default()
            },
            service_name: make_service_name(janusgraph),
            template: make_pod_template_spec(janusgraph),
            ..StatefulSetSpec::default()
        }),
        ..StatefulSet::default()
    }
}

// The image version is only baked in here, at creation time; later changes
// to imageVersion are not rolled out to an existing stateful set.
fn make_pod_template_spec(janusgraph: &Janusgraph) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(make_labels(janusgraph)),
            ..ObjectMeta::default()
        }),
        spec: Some(PodSpec {
            containers: vec![Container {
                name: "janusgraph".to_string(),
                image: Some(image_for_version(&janusgraph.spec.image_version)),
                ports: Some(vec![ContainerPort {
                    container_port: GREMLIN_PORT,
                    name: Some("janusgraph".to_string()),
                    ..ContainerPort::default()
                }]),
                ..Container::default()
            }],
            restart_policy: Some("Always".to_string()),
            ..PodSpec::default()
        }),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DriftCorrection {
    // The stateful set to send in an update request.
    Updated(StatefulSet),
    Unchanged,
}

pub fn current_replicas(stateful_set: &StatefulSet) -> i32 {
    stateful_set
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(DEFAULT_REPLICAS)
}

// correct_replicas compares the replicas of an existing stateful set with the desired count.
// Replicas is the only field corrected after creation; the returned object keeps
// the resource version of the existing one so a concurrent change surfaces as a conflict.
pub fn correct_replicas(existing: StatefulSet, desired_replicas: i32) -> DriftCorrection {
    if current_replicas(&existing) == desired_replicas {
        return DriftCorrection::Unchanged;
    }
    let mut stateful_set = existing;
    let mut spec = stateful_set.spec.take().unwrap_or_default();
    spec.replicas = Some(desired_replicas);
    stateful_set.spec = Some(spec);
    DriftCorrection::Updated(stateful_set)
}
