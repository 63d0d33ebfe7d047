// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::janusgraph_controller::trusted::exec_types::*;
use crate::kubernetes_api_objects::api_method::KubeUpdateStatusRequest;
use crate::kubernetes_api_objects::marshal::{api_resource, marshal};

pub const READY_CONDITION: &str = "Ready";
pub const INVALID_SPEC_REASON: &str = "InvalidSpec";

// members_equal is order sensitive: a reordering reported by the API server counts as a change.
pub fn members_equal(current: &[String], discovered: &[String]) -> bool {
    current.len() == discovered.len()
        && current
            .iter()
            .zip(discovered.iter())
            .all(|(current, discovered)| current == discovered)
}

// project_status returns the status to write, or None if the recorded one is already up to date.
// A status that was never written counts as out of date even for an empty member list.
// Projecting also clears a previously reported invalid spec, since reaching this point means
// the spec is valid again.
pub fn project_status(janusgraph: &Janusgraph, discovered: Vec<String>) -> Option<JanusgraphStatus> {
    match &janusgraph.status {
        Some(status) if members_equal(&status.members, &discovered) && status.conditions.is_empty() => None,
        _ => Some(JanusgraphStatus {
            members: discovered,
            conditions: Vec::new(),
        }),
    }
}

pub fn invalid_spec_condition(reason: &str) -> JanusgraphCondition {
    JanusgraphCondition {
        type_: READY_CONDITION.to_string(),
        status: "False".to_string(),
        reason: INVALID_SPEC_REASON.to_string(),
        message: reason.to_string(),
    }
}

// report_invalid_spec returns the status carrying the invalid spec condition, or None if it is already there.
// The member list is left as is.
pub fn report_invalid_spec(janusgraph: &Janusgraph, reason: &str) -> Option<JanusgraphStatus> {
    let condition = invalid_spec_condition(reason);
    let status = janusgraph.status.clone().unwrap_or_default();
    if status.conditions == [condition.clone()] {
        return None;
    }
    Some(JanusgraphStatus {
        conditions: vec![condition],
        ..status
    })
}

// update_status_request sends the fetched custom resource with the new status.
// It keeps the resource version of the fetched copy, so a concurrent write is detected as a conflict.
pub fn update_status_request(
    janusgraph: &Janusgraph,
    status: JanusgraphStatus,
) -> Result<KubeUpdateStatusRequest, serde_json::Error> {
    let mut janusgraph = janusgraph.clone();
    janusgraph.status = Some(status);
    Ok(KubeUpdateStatusRequest {
        api_resource: api_resource::<Janusgraph>(),
        name: janusgraph.metadata.name.clone().unwrap_or_default(),
        namespace: janusgraph.metadata.namespace.clone().unwrap_or_default(),
        obj: marshal(&janusgraph)?,
    })
}
