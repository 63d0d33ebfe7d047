// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{
    api::{Api, DeleteParams, DynamicObject, ListParams},
    discovery::{ApiResource, Discovery},
    core::GroupVersionKind,
    Client,
};
use std::time::{Duration, Instant};
use tokio::time::sleep;

use crate::common::*;

pub fn janusgraph() -> String {
    "
    apiVersion: anvil.dev/v1
    kind: Janusgraph
    metadata:
      name: janusgraph
      namespace: default
    spec:
      replicaCount: 3
      imageVersion: latest
    "
    .to_string()
}

fn janusgraph_api(client: Client) -> Api<DynamicObject> {
    let gvk = GroupVersionKind::gvk("anvil.dev", "v1", "Janusgraph");
    Api::default_namespaced_with(client, &ApiResource::from_gvk(&gvk))
}

fn stateful_set_replicas(sts: &StatefulSet) -> Option<i32> {
    sts.spec.as_ref().and_then(|spec| spec.replicas)
}

fn ready_replicas(sts: &StatefulSet) -> i32 {
    sts.status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or(0)
}

fn status_members(jg: &DynamicObject) -> Vec<String> {
    jg.data["status"]["members"]
        .as_array()
        .map(|members| {
            members
                .iter()
                .filter_map(|member| member.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub async fn desired_state_test(client: Client, jg_name: String, replicas: i32) -> Result<(), Error> {
    let timeout = Duration::from_secs(600);
    let start = Instant::now();
    let svc_api: Api<Service> = Api::default_namespaced(client.clone());
    let sts_api: Api<StatefulSet> = Api::default_namespaced(client.clone());
    loop {
        sleep(Duration::from_secs(5)).await;
        if start.elapsed() > timeout {
            return Err(Error::Timeout);
        }

        match svc_api.get(&(jg_name.clone() + "-service")).await {
            Err(e) => {
                println!("Get service failed with error {}.", e);
                continue;
            }
            Ok(svc) => {
                let spec = svc.spec.unwrap_or_default();
                let gremlin_port = spec
                    .ports
                    .unwrap_or_default()
                    .iter()
                    .any(|port| port.port == 8182);
                if spec.cluster_ip.as_deref() != Some("None") || !gremlin_port {
                    println!("Service is not headless or does not expose 8182. E2e test failed.");
                    return Err(Error::JanusgraphSvcFailed);
                }
            }
        };

        match sts_api.get(&jg_name).await {
            Err(e) => {
                println!("Get stateful set failed with error {}.", e);
                continue;
            }
            Ok(sts) => {
                if stateful_set_replicas(&sts) != Some(replicas) {
                    println!("Stateful set spec is not consistent with janusgraph spec. E2e test failed.");
                    return Err(Error::JanusgraphStsFailed);
                }
                println!("Stateful set is found as expected.");
                let ready = ready_replicas(&sts);
                if ready == replicas {
                    println!("All stateful set pods are ready.");
                    break;
                }
                println!("Only {} pods are ready now.", ready);
            }
        };
    }
    println!("Desired state test passed.");
    Ok(())
}

// status_test waits for the member list of the custom resource to name every pod of the cluster.
pub async fn status_test(client: Client, jg_name: String, replicas: usize) -> Result<(), Error> {
    let timeout = Duration::from_secs(360);
    let start = Instant::now();
    let jg_api = janusgraph_api(client.clone());
    let pod_api: Api<Pod> = Api::default_namespaced(client.clone());
    let lp = ListParams::default().labels(&format!("app=Janusgraph,janusgraph_cr={}", jg_name));
    loop {
        sleep(Duration::from_secs(5)).await;
        if start.elapsed() > timeout {
            return Err(Error::Timeout);
        }

        let jg = match jg_api.get(&jg_name).await {
            Err(e) => {
                println!("Get janusgraph failed with error {}.", e);
                continue;
            }
            Ok(jg) => jg,
        };
        let members = status_members(&jg);
        if members.len() != replicas {
            println!("Status has {} members, expecting {}.", members.len(), replicas);
            continue;
        }
        let pods = match pod_api.list(&lp).await {
            Err(e) => {
                println!("List pods failed with error {}.", e);
                continue;
            }
            Ok(pods) => pods,
        };
        let pod_names: Vec<String> = pods.items.into_iter().filter_map(|pod| pod.metadata.name).collect();
        if members.iter().all(|member| pod_names.contains(member)) {
            println!("Status members {:?} match the pods.", members);
            break;
        }
        println!("Status members {:?} do not match pods {:?} yet.", members, pod_names);
    }
    println!("Status test passed.");
    Ok(())
}

pub async fn scaling_test(client: Client, jg_name: String) -> Result<(), Error> {
    run_command(
        "kubectl",
        vec![
            "patch",
            "jg",
            &jg_name,
            "--type=json",
            "-p",
            "[{\"op\": \"replace\", \"path\": \"/spec/replicaCount\", \"value\": 5}]",
        ],
    )?;

    desired_state_test(client.clone(), jg_name.clone(), 5).await?;
    status_test(client, jg_name, 5).await?;
    println!("Scaling test passed.");
    Ok(())
}

// drift_test changes the stateful set behind the controller's back and waits for the controller to undo it.
pub async fn drift_test(client: Client, jg_name: String) -> Result<(), Error> {
    let timeout = Duration::from_secs(300);
    let start = Instant::now();
    let sts_api: Api<StatefulSet> = Api::default_namespaced(client.clone());

    run_command("kubectl", vec!["scale", "statefulset", &jg_name, "--replicas=1"])?;

    loop {
        sleep(Duration::from_secs(5)).await;
        if start.elapsed() > timeout {
            return Err(Error::Timeout);
        }
        match sts_api.get(&jg_name).await {
            Err(e) => println!("Get stateful set failed with error {}.", e),
            Ok(sts) if stateful_set_replicas(&sts) == Some(3) => break,
            Ok(sts) => println!("Stateful set has {:?} replicas, waiting for correction.", stateful_set_replicas(&sts)),
        }
    }
    println!("Drift test passed.");
    Ok(())
}

// service_recreation_test deletes the owned service and waits for the controller to create it again.
pub async fn service_recreation_test(client: Client, jg_name: String) -> Result<(), Error> {
    let timeout = Duration::from_secs(300);
    let start = Instant::now();
    let svc_api: Api<Service> = Api::default_namespaced(client.clone());
    let svc_name = jg_name + "-service";

    let old_uid = svc_api.get(&svc_name).await?.metadata.uid;
    svc_api.delete(&svc_name, &DeleteParams::default()).await?;

    loop {
        sleep(Duration::from_secs(5)).await;
        if start.elapsed() > timeout {
            return Err(Error::Timeout);
        }
        match svc_api.get(&svc_name).await {
            Err(e) => println!("Get service failed with error {}.", e),
            Ok(svc) if svc.metadata.uid != old_uid => break,
            Ok(_) => println!("Old service is still there."),
        }
    }
    println!("Service recreation test passed.");
    Ok(())
}

async fn check_crd(client: Client) -> Result<(), Error> {
    let crd_api: Api<CustomResourceDefinition> = Api::all(client);
    match crd_api.get("janusgraphs.anvil.dev").await {
        Err(e) => {
            println!("No CRD found, create one before run the e2e test.");
            Err(Error::CRDGetFailed(e))
        }
        Ok(_) => {
            println!("CRD found, continue to run the e2e test.");
            Ok(())
        }
    }
}

pub async fn janusgraph_e2e_test() -> Result<(), Error> {
    let client = Client::try_default().await?;
    check_crd(client.clone()).await?;

    let discovery = Discovery::new(client.clone()).run().await?;
    let jg_name = apply(janusgraph(), client.clone(), &discovery).await?;

    desired_state_test(client.clone(), jg_name.clone(), 3).await?;
    status_test(client.clone(), jg_name.clone(), 3).await?;
    drift_test(client.clone(), jg_name.clone()).await?;
    service_recreation_test(client.clone(), jg_name.clone()).await?;

    println!("E2e test passed.");
    Ok(())
}

pub async fn janusgraph_scaling_e2e_test() -> Result<(), Error> {
    let client = Client::try_default().await?;
    check_crd(client.clone()).await?;

    let discovery = Discovery::new(client.clone()).run().await?;
    let jg_name = apply(janusgraph(), client.clone(), &discovery).await?;

    desired_state_test(client.clone(), jg_name.clone(), 3).await?;
    status_test(client.clone(), jg_name.clone(), 3).await?;
    scaling_test(client.clone(), jg_name.clone()).await?;

    println!("E2e test passed.");
    Ok(())
}
