// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod exec;
pub mod trusted;

use crate::janusgraph_controller::trusted::exec_types::Janusgraph;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Service;
use kube::runtime::{watcher, Controller};
use kube::{Api, Client};

// make_controller watches every Janusgraph in the cluster, and the services and stateful sets
// they own, so that deleting or editing a child triggers a reconcile of its owner.
pub fn make_controller(client: Client) -> Controller<Janusgraph> {
    Controller::new(Api::<Janusgraph>::all(client.clone()), watcher::Config::default())
        .owns(Api::<Service>::all(client.clone()), watcher::Config::default())
        .owns(Api::<StatefulSet>::all(client), watcher::Config::default())
}
