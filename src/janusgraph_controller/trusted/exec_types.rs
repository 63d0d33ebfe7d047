// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(
    kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq,
)]
#[kube(group = "anvil.dev", version = "v1", kind = "Janusgraph")]
#[kube(shortname = "jg", namespaced)]
#[kube(derive = "PartialEq")]
#[kube(status = "JanusgraphStatus")]
#[kube(printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".spec.replicaCount"}"#)]
#[kube(printcolumn = r#"{"name":"Version", "type":"string", "jsonPath":".spec.imageVersion"}"#)]
pub struct JanusgraphSpec {
    #[serde(rename = "replicaCount")]
    pub replica_count: i32,
    #[serde(rename = "imageVersion")]
    pub image_version: String,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct JanusgraphStatus {
    // Names of the live pods of the cluster, in the order the API server listed them.
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<JanusgraphCondition>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct JanusgraphCondition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: String,
    pub reason: String,
    pub message: String,
}

impl JanusgraphSpec {
    // Checks the spec fields that the schema cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.replica_count < 0 {
            return Err(format!(
                "replicaCount must not be negative, got {}",
                self.replica_count
            ));
        }
        if self.image_version.trim().is_empty() {
            return Err("imageVersion must not be empty".to_string());
        }
        Ok(())
    }
}
