// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::{KubeGetRequest, KubeUpdateRequest};
use crate::kubernetes_api_objects::marshal::{api_resource, marshal, unmarshal};
use crate::shim_layer::api_client::ApiClient;
use crate::Error;
use k8s_openapi::api::core::v1::ConfigMap;
use tracing::debug;

pub const FAULT_INJECTION_CONFIG: &str = "fault-injection-config";
pub const FAULT_INJECTION_NAMESPACE: &str = "default";

// crash_or_continue bumps the "current" counter of the fault injection config map
// and returns true when it has just reached "expected", i.e., it is time to crash.
pub async fn crash_or_continue<C>(client: &C) -> Result<bool, Error>
where
    C: ApiClient + ?Sized,
{
    let api_resource = api_resource::<ConfigMap>();
    let obj = client
        .get(&KubeGetRequest {
            api_resource: api_resource.clone(),
            name: FAULT_INJECTION_CONFIG.to_string(),
            namespace: FAULT_INJECTION_NAMESPACE.to_string(),
        })
        .await
        .map_err(|err| fault_injection_error(format!("fail to get {}: {}", FAULT_INJECTION_CONFIG, err)))?;
    let mut config_map = unmarshal::<ConfigMap>(obj).map_err(|err| fault_injection_error(err.to_string()))?;

    let data = config_map
        .data
        .get_or_insert_with(Default::default);
    let current = parse_counter(data.get("current"), "current")?;
    let expected = parse_counter(data.get("expected"), "expected")?;
    debug!("{}: current {} expected {}", FAULT_INJECTION_CONFIG, current, expected);
    data.insert("current".to_string(), (current + 1).to_string());

    let obj = marshal(&config_map).map_err(|err| fault_injection_error(err.to_string()))?;
    client
        .update(&KubeUpdateRequest {
            api_resource,
            name: FAULT_INJECTION_CONFIG.to_string(),
            namespace: FAULT_INJECTION_NAMESPACE.to_string(),
            obj,
        })
        .await
        .map_err(|err| fault_injection_error(format!("fail to update {}: {}", FAULT_INJECTION_CONFIG, err)))?;

    Ok(current == expected)
}

fn parse_counter(value: Option<&String>, field: &str) -> Result<i32, Error> {
    value
        .ok_or_else(|| fault_injection_error(format!("fail to get {}", field)))?
        .parse::<i32>()
        .map_err(|_| fault_injection_error(format!("fail to parse {} value to i32", field)))
}

fn fault_injection_error(msg: String) -> Error {
    Error::ShimLayerError(format!("fault injection: {}", msg))
}
