// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use super::common::*;
use super::ResourceBuilder;
use crate::janusgraph_controller::trusted::exec_types::*;
use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

pub struct ServiceBuilder {}

impl ResourceBuilder for ServiceBuilder {
    type Object = Service;

    fn name(janusgraph: &Janusgraph) -> String {
        make_service_name(janusgraph)
    }

    fn make(janusgraph: &Janusgraph) -> Service {
        make_service(janusgraph)
    }
}

// The service is headless: it gives each pod of the stateful set a stable DNS name
// instead of load balancing across them.
pub fn make_service(janusgraph: &Janusgraph) -> Service {
    Service {
        metadata: ObjectMeta {
            name: Some(make_service_name(janusgraph)),
            namespace: janusgraph.metadata.namespace.clone(),
            labels: Some(make_labels(janusgraph)),
            owner_references: Some(make_owner_references(janusgraph)),
            ..ObjectMeta::default()
        },
        spec: Some(ServiceSpec {
            cluster_ip: Some("None".to_string()),
            ports: Some(vec![ServicePort {
                name: Some("gremlin".to_string()),
                port: GREMLIN_PORT,
                target_port: Some(IntOrString::Int(GREMLIN_PORT)),
                ..ServicePort::default()
            }]),
            selector: Some(make_labels(janusgraph)),
            ..ServiceSpec::default()
        }),
        ..Service::default()
    }
}
