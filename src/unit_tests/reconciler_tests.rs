// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use super::*;
use crate::janusgraph_controller::exec::reconciler::*;
use crate::janusgraph_controller::exec::resource::*;
use crate::janusgraph_controller::trusted::step::*;
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::APIError;
use crate::kubernetes_api_objects::marshal::marshal;
use crate::reconciler::reconciler::{ReconcileFailure, Reconciler};
use kube::api::DynamicObject;

fn step_of(state: &JanusgraphReconcileState) -> JanusgraphReconcileStep {
    state.reconcile_step
}

fn at(step: JanusgraphReconcileStep) -> JanusgraphReconcileState {
    JanusgraphReconcileState {
        reconcile_step: step,
        failure: None,
    }
}

fn get_response(res: Result<DynamicObject, APIError>) -> Option<KubeAPIResponse> {
    Some(KubeAPIResponse::GetResponse(KubeGetResponse { res }))
}

fn create_response(res: Result<DynamicObject, APIError>) -> Option<KubeAPIResponse> {
    Some(KubeAPIResponse::CreateResponse(KubeCreateResponse { res }))
}

#[test]
pub fn test_init_gets_service() {
    let janusgraph = make_janusgraph("g1", 3, "1.0");
    let (state, req) = reconcile_core(&janusgraph, None, reconcile_init_state());
    assert_eq!(
        step_of(&state),
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::Service)
    );
    match req {
        Some(KubeAPIRequest::GetRequest(get_req)) => assert_eq!(get_req.key(), "Service/default/g1-service"),
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
pub fn test_absent_service_is_created_then_requeued() {
    let janusgraph = make_janusgraph("g1", 3, "1.0");
    let (state, req) = reconcile_core(
        &janusgraph,
        get_response(Err(APIError::ObjectNotFound)),
        at(JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::Service)),
    );
    match req {
        Some(KubeAPIRequest::CreateRequest(create_req)) => {
            assert_eq!(create_req.key(), "Service/default/g1-service");
            assert_eq!(create_req.obj, marshal(&make_service(&janusgraph)).unwrap());
        }
        other => panic!("unexpected request {:?}", other),
    }

    let service = marshal(&make_service(&janusgraph)).unwrap();
    let (state, req) = reconcile_core(&janusgraph, create_response(Ok(service)), state);
    assert_eq!(step_of(&state), JanusgraphReconcileStep::Requeue(RequeueReason::ServiceCreated));
    assert!(req.is_none());
    assert!(JanusgraphReconciler::reconcile_done(&state));
    assert!(JanusgraphReconciler::reconcile_requeue(&state));
}

#[test]
pub fn test_service_already_exists_moves_on_to_stateful_set() {
    let janusgraph = make_janusgraph("g1", 3, "1.0");
    let (state, req) = reconcile_core(
        &janusgraph,
        create_response(Err(APIError::ObjectAlreadyExists)),
        at(JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Create, SubResource::Service)),
    );
    assert_eq!(
        step_of(&state),
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::StatefulSet)
    );
    assert!(matches!(req, Some(KubeAPIRequest::GetRequest(_))));
}

#[test]
pub fn test_stateful_set_already_exists_is_read_back() {
    let janusgraph = make_janusgraph("g1", 3, "1.0");
    let (state, req) = reconcile_core(
        &janusgraph,
        create_response(Err(APIError::ObjectAlreadyExists)),
        at(JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Create, SubResource::StatefulSet)),
    );
    assert_eq!(
        step_of(&state),
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::StatefulSet)
    );
    match req {
        Some(KubeAPIRequest::GetRequest(get_req)) => assert_eq!(get_req.key(), "StatefulSet/default/g1"),
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
pub fn test_drifted_replicas_are_updated_then_requeued() {
    let janusgraph = make_janusgraph("g1", 5, "1.0");
    let mut existing = make_stateful_set(&make_janusgraph("g1", 2, "1.0"));
    existing.metadata.resource_version = Some("12".to_string());

    let (state, req) = reconcile_core(
        &janusgraph,
        get_response(Ok(marshal(&existing).unwrap())),
        at(JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::StatefulSet)),
    );
    assert_eq!(
        step_of(&state),
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Update, SubResource::StatefulSet)
    );
    match req {
        Some(KubeAPIRequest::UpdateRequest(update_req)) => {
            assert_eq!(update_req.key(), "StatefulSet/default/g1");
            assert_eq!(update_req.obj.metadata.resource_version.as_deref(), Some("12"));
            assert_eq!(update_req.obj.data["spec"]["replicas"], 5);
        }
        other => panic!("unexpected request {:?}", other),
    }

    let (state, req) = reconcile_core(
        &janusgraph,
        Some(KubeAPIResponse::UpdateResponse(KubeUpdateResponse {
            res: Ok(marshal(&existing).unwrap()),
        })),
        state,
    );
    assert_eq!(step_of(&state), JanusgraphReconcileStep::Requeue(RequeueReason::ReplicasCorrected));
    assert!(req.is_none());
}

#[test]
pub fn test_converged_stateful_set_lists_pods() {
    let janusgraph = make_janusgraph("g1", 3, "1.0");
    let existing = make_stateful_set(&janusgraph);
    let (state, req) = reconcile_core(
        &janusgraph,
        get_response(Ok(marshal(&existing).unwrap())),
        at(JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::StatefulSet)),
    );
    assert_eq!(step_of(&state), JanusgraphReconcileStep::AfterListPods);
    match req {
        Some(KubeAPIRequest::ListRequest(list_req)) => {
            assert_eq!(list_req, list_pods_request(&janusgraph));
        }
        other => panic!("unexpected request {:?}", other),
    }
}

#[test]
pub fn test_foreign_stateful_set_is_not_touched() {
    let janusgraph = make_janusgraph("g1", 5, "1.0");
    let mut previous_owner = make_janusgraph("g1", 2, "1.0");
    previous_owner.metadata.uid = Some("deleted-uid".to_string());
    let existing = make_stateful_set(&previous_owner);

    let (state, req) = reconcile_core(
        &janusgraph,
        get_response(Ok(marshal(&existing).unwrap())),
        at(JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::StatefulSet)),
    );
    assert!(req.is_none());
    assert!(JanusgraphReconciler::reconcile_error(&state));
    assert!(matches!(
        state.failure,
        Some((_, ReconcileFailure::NotControlled(_)))
    ));
}

#[test]
pub fn test_members_are_projected_into_status() {
    let janusgraph = make_janusgraph("g1", 2, "1.0");
    let pods = vec![
        marshal(&make_pod(&janusgraph, 0)).unwrap(),
        marshal(&make_pod(&janusgraph, 1)).unwrap(),
    ];
    let (state, req) = reconcile_core(
        &janusgraph,
        Some(KubeAPIResponse::ListResponse(KubeListResponse { res: Ok(pods) })),
        at(JanusgraphReconcileStep::AfterListPods),
    );
    assert_eq!(step_of(&state), JanusgraphReconcileStep::AfterUpdateStatus);
    match req {
        Some(KubeAPIRequest::UpdateStatusRequest(update_status_req)) => {
            assert_eq!(
                update_status_req.obj.data["status"]["members"],
                serde_json::json!(["g1-0", "g1-1"])
            );
        }
        other => panic!("unexpected request {:?}", other),
    }

    let (state, req) = reconcile_core(
        &janusgraph,
        Some(KubeAPIResponse::UpdateStatusResponse(KubeUpdateStatusResponse {
            res: Ok(marshal(&janusgraph).unwrap()),
        })),
        state,
    );
    assert_eq!(step_of(&state), JanusgraphReconcileStep::Done);
    assert!(req.is_none());
    assert!(!JanusgraphReconciler::reconcile_requeue(&state));
}

#[test]
pub fn test_unchanged_members_skip_status_write() {
    let mut janusgraph = make_janusgraph("g1", 1, "1.0");
    janusgraph.status = Some(JanusgraphStatus {
        members: vec!["g1-0".to_string()],
        conditions: Vec::new(),
    });
    let pods = vec![marshal(&make_pod(&janusgraph, 0)).unwrap()];
    let (state, req) = reconcile_core(
        &janusgraph,
        Some(KubeAPIResponse::ListResponse(KubeListResponse { res: Ok(pods) })),
        at(JanusgraphReconcileStep::AfterListPods),
    );
    assert_eq!(step_of(&state), JanusgraphReconcileStep::Done);
    assert!(req.is_none());
}

#[test]
pub fn test_errors_abort_the_pass() {
    let janusgraph = make_janusgraph("g1", 3, "1.0");
    let step = JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::Service);
    let (state, req) = reconcile_core(&janusgraph, get_response(Err(APIError::Timeout)), at(step));
    assert!(req.is_none());
    assert!(JanusgraphReconciler::reconcile_error(&state));
    assert_eq!(state.failure, Some((step, ReconcileFailure::Api(APIError::Timeout))));

    match JanusgraphReconciler::reconcile_failure(state) {
        Error::ReconcileCoreError { step, failure } => {
            assert_eq!(step, "AfterKRequestStep(Get, Service)");
            assert_eq!(failure, ReconcileFailure::Api(APIError::Timeout));
        }
        other => panic!("unexpected error {:?}", other),
    }
}

#[test]
pub fn test_unexpected_response_aborts_the_pass() {
    let janusgraph = make_janusgraph("g1", 3, "1.0");
    // A list response where the get response of the service is expected.
    let (state, req) = reconcile_core(
        &janusgraph,
        Some(KubeAPIResponse::ListResponse(KubeListResponse { res: Ok(Vec::new()) })),
        at(JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::Service)),
    );
    assert!(req.is_none());
    assert!(matches!(state.failure, Some((_, ReconcileFailure::UnexpectedResponse))));

    // No response at all.
    let (state, _) = reconcile_core(&janusgraph, None, at(JanusgraphReconcileStep::AfterListPods));
    assert!(matches!(state.failure, Some((_, ReconcileFailure::UnexpectedResponse))));
}

#[test]
pub fn test_invalid_spec_is_reported_once() {
    let janusgraph = make_janusgraph("g1", -1, "1.0");
    let (state, req) = reconcile_core(&janusgraph, None, reconcile_init_state());
    assert_eq!(step_of(&state), JanusgraphReconcileStep::AfterReportInvalidSpec);
    let update_status_req = match req {
        Some(KubeAPIRequest::UpdateStatusRequest(update_status_req)) => update_status_req,
        other => panic!("unexpected request {:?}", other),
    };
    assert_eq!(update_status_req.obj.data["status"]["conditions"][0]["reason"], "InvalidSpec");

    let (state, req) = reconcile_core(
        &janusgraph,
        Some(KubeAPIResponse::UpdateStatusResponse(KubeUpdateStatusResponse {
            res: Ok(update_status_req.obj),
        })),
        state,
    );
    assert!(req.is_none());
    assert!(matches!(
        JanusgraphReconciler::reconcile_failure(state),
        Error::InvalidSpec(_)
    ));

    // Already reported: fail without writing.
    let mut reported = janusgraph.clone();
    reported.status = report_invalid_spec(&janusgraph, &janusgraph.spec.validate().unwrap_err());
    let (state, req) = reconcile_core(&reported, None, reconcile_init_state());
    assert!(req.is_none());
    assert!(JanusgraphReconciler::reconcile_error(&state));
    assert!(JanusgraphReconciler::reconcile_failure(state).is_permanent());
}

#[test]
pub fn test_failed_invalid_spec_report_is_transient() {
    let janusgraph = make_janusgraph("g1", -1, "1.0");
    let (state, _) = reconcile_core(&janusgraph, None, reconcile_init_state());
    let (state, req) = reconcile_core(
        &janusgraph,
        Some(KubeAPIResponse::UpdateStatusResponse(KubeUpdateStatusResponse {
            res: Err(APIError::Conflict),
        })),
        state,
    );
    assert!(req.is_none());
    assert_eq!(
        state.failure,
        Some((
            JanusgraphReconcileStep::AfterReportInvalidSpec,
            ReconcileFailure::Api(APIError::Conflict)
        ))
    );
    assert!(!JanusgraphReconciler::reconcile_failure(state).is_permanent());
}

#[test]
pub fn test_terminal_states_issue_nothing() {
    let janusgraph = make_janusgraph("g1", 3, "1.0");
    for step in [
        JanusgraphReconcileStep::Done,
        JanusgraphReconcileStep::Error,
        JanusgraphReconcileStep::Requeue(RequeueReason::StatefulSetCreated),
    ] {
        let (state, req) = reconcile_core(&janusgraph, None, at(step));
        assert_eq!(step_of(&state), step);
        assert!(req.is_none());
    }
}
