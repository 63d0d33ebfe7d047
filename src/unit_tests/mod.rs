mod error_tests;
mod reconciler_tests;

use crate::config::ControllerConfig;
use crate::janusgraph_controller::exec::reconciler::JanusgraphReconciler;
use crate::janusgraph_controller::exec::resource::make_labels;
use crate::janusgraph_controller::trusted::exec_types::*;
use crate::kubernetes_cluster::SimulatedApiServer;
use crate::shim_layer::{reconcile_with, Data, ReconcileOutcome};
use crate::Error;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::time::Duration;

pub const NAMESPACE: &str = "default";

// A record as the pure reconcile functions see it after the shim fetched it.
pub fn make_janusgraph(name: &str, replica_count: i32, image_version: &str) -> Janusgraph {
    let mut janusgraph = Janusgraph::new(
        name,
        JanusgraphSpec {
            replica_count,
            image_version: image_version.to_string(),
        },
    );
    janusgraph.metadata.namespace = Some(NAMESPACE.to_string());
    janusgraph.metadata.uid = Some(format!("{}-uid", name));
    janusgraph
}

// A record as a user submits it; the simulated API server assigns the uid.
pub fn new_janusgraph(name: &str, replica_count: i32, image_version: &str) -> Janusgraph {
    let mut janusgraph = make_janusgraph(name, replica_count, image_version);
    janusgraph.metadata.uid = None;
    janusgraph
}

// A pod as the stateful set controller would create it for the record.
pub fn make_pod(janusgraph: &Janusgraph, ordinal: usize) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(format!("{}-{}", janusgraph.metadata.name.as_deref().unwrap_or(""), ordinal)),
            namespace: Some(NAMESPACE.to_string()),
            labels: Some(make_labels(janusgraph)),
            ..ObjectMeta::default()
        },
        ..Pod::default()
    }
}

pub fn test_config() -> ControllerConfig {
    ControllerConfig {
        request_timeout: Duration::from_secs(1),
        backoff_base: Duration::from_millis(100),
        backoff_max: Duration::from_secs(10),
        ..ControllerConfig::default()
    }
}

pub async fn run_pass(server: &SimulatedApiServer, janusgraph: &Janusgraph) -> Result<ReconcileOutcome, Error> {
    let data = Data::new(server.clone(), test_config(), false);
    reconcile_with::<Janusgraph, JanusgraphReconciler, _>(janusgraph, &data).await
}

pub fn stored_janusgraph(server: &SimulatedApiServer, name: &str) -> Option<Janusgraph> {
    server.get_object::<Janusgraph>(NAMESPACE, name)
}
