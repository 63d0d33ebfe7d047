// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use anyhow::Result;
use janusgraph_controller::config::ControllerConfig;
use janusgraph_controller::janusgraph_controller::exec::reconciler::JanusgraphReconciler;
use janusgraph_controller::janusgraph_controller::make_controller;
use janusgraph_controller::janusgraph_controller::trusted::exec_types::Janusgraph;
use janusgraph_controller::shim_layer::api_client::KubeApiClient;
use janusgraph_controller::shim_layer::run_controller;
use kube::{Client, CustomResourceExt};
use std::env;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    let cmd = args.get(1).map(String::as_str).unwrap_or("");

    match cmd {
        "export" => {
            println!("{}", serde_yaml::to_string(&Janusgraph::crd())?);
        }
        "run" => {
            info!("running janusgraph-controller");
            run(false).await?;
        }
        "crash" => {
            info!("running janusgraph-controller in crash-testing mode");
            run(true).await?;
        }
        _ => {
            error!("wrong command; please use \"export\", \"run\" or \"crash\"");
        }
    }
    Ok(())
}

async fn run(fault_injection: bool) -> Result<()> {
    let config = ControllerConfig::from_env()?;
    info!("{:?}", config);
    let client = Client::try_default().await?;
    run_controller::<Janusgraph, JanusgraphReconciler, _>(
        make_controller(client.clone()),
        KubeApiClient::new(client),
        config,
        fault_injection,
    )
    .await
}
