// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::janusgraph_controller::exec::resource::*;
use crate::janusgraph_controller::trusted::{exec_types::*, step::*};
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::marshal::{api_resource, marshal, unmarshal};
use crate::reconciler::reconciler::*;
use crate::Error;
use k8s_openapi::api::apps::v1::StatefulSet;
use kube::api::DynamicObject;

// JanusgraphReconcileState describes the local state with which the reconcile functions makes decisions.
#[derive(Debug, Clone, PartialEq)]
pub struct JanusgraphReconcileState {
    pub reconcile_step: JanusgraphReconcileStep,
    // Set together with the Error step: the step that failed and why.
    pub failure: Option<(JanusgraphReconcileStep, ReconcileFailure)>,
}

pub struct JanusgraphReconciler {}

impl Reconciler for JanusgraphReconciler {
    type K = Janusgraph;
    type S = JanusgraphReconcileState;

    fn reconcile_init_state() -> JanusgraphReconcileState {
        reconcile_init_state()
    }

    fn reconcile_core(
        janusgraph: &Janusgraph,
        resp_o: Option<KubeAPIResponse>,
        state: JanusgraphReconcileState,
    ) -> (JanusgraphReconcileState, Option<KubeAPIRequest>) {
        reconcile_core(janusgraph, resp_o, state)
    }

    fn reconcile_done(state: &JanusgraphReconcileState) -> bool {
        reconcile_done(state)
    }

    fn reconcile_error(state: &JanusgraphReconcileState) -> bool {
        reconcile_error(state)
    }

    fn reconcile_requeue(state: &JanusgraphReconcileState) -> bool {
        matches!(state.reconcile_step, JanusgraphReconcileStep::Requeue(_))
    }

    fn reconcile_failure(state: JanusgraphReconcileState) -> Error {
        match state.failure {
            Some((_, ReconcileFailure::InvalidSpec(reason))) => Error::InvalidSpec(reason),
            Some((step, failure)) => Error::ReconcileCoreError {
                step: step.to_string(),
                failure,
            },
            None => Error::ShimLayerError(format!(
                "reconcile ended at {} without a failure",
                state.reconcile_step
            )),
        }
    }
}

pub fn reconcile_init_state() -> JanusgraphReconcileState {
    JanusgraphReconcileState {
        reconcile_step: JanusgraphReconcileStep::Init,
        failure: None,
    }
}

pub fn reconcile_done(state: &JanusgraphReconcileState) -> bool {
    matches!(
        state.reconcile_step,
        JanusgraphReconcileStep::Done | JanusgraphReconcileStep::Requeue(_)
    )
}

pub fn reconcile_error(state: &JanusgraphReconcileState) -> bool {
    matches!(state.reconcile_step, JanusgraphReconcileStep::Error)
}

// reconcile_core walks through the following steps, and every step may end the pass:
//   Init: validate the spec, then get the service
//   get/create service: create it if absent, and requeue after creating
//   get/create stateful set: same as the service
//   correct replicas: update the stateful set if its replicas drifted, and requeue after updating
//   list pods: collect the member names
//   update status: only if the member list changed
pub fn reconcile_core(
    janusgraph: &Janusgraph,
    resp_o: Option<KubeAPIResponse>,
    state: JanusgraphReconcileState,
) -> (JanusgraphReconcileState, Option<KubeAPIRequest>) {
    let step = state.reconcile_step;
    match step {
        JanusgraphReconcileStep::Init => {
            if let Err(reason) = janusgraph.spec.validate() {
                return match report_invalid_spec(janusgraph, &reason) {
                    Some(status) => match update_status_request(janusgraph, status) {
                        Ok(req) => (
                            next_state(state, JanusgraphReconcileStep::AfterReportInvalidSpec),
                            Some(KubeAPIRequest::UpdateStatusRequest(req)),
                        ),
                        Err(err) => (error_state(state, err.into()), None),
                    },
                    None => (error_state(state, ReconcileFailure::InvalidSpec(reason)), None),
                };
            }
            get_sub_resource::<ServiceBuilder>(janusgraph, state, SubResource::Service)
        }
        JanusgraphReconcileStep::AfterReportInvalidSpec => {
            // A failed report is retried like any other write; once written, the pass
            // ends here until the spec changes.
            if let Some(Err(err)) = resp_o.and_then(KubeAPIResponse::into_update_status_response) {
                return (error_state(state, err.into()), None);
            }
            let reason = janusgraph
                .spec
                .validate()
                .err()
                .unwrap_or_else(|| "spec changed while reporting".to_string());
            (error_state(state, ReconcileFailure::InvalidSpec(reason)), None)
        }
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::Service) => {
            let Some(res) = resp_o.and_then(KubeAPIResponse::into_get_response) else {
                return (error_state(state, ReconcileFailure::UnexpectedResponse), None);
            };
            match ensure_after_get(res) {
                Ok(Lookup::Present(_)) => {
                    get_sub_resource::<StatefulSetBuilder>(janusgraph, state, SubResource::StatefulSet)
                }
                Ok(Lookup::Absent) => {
                    create_sub_resource::<ServiceBuilder>(janusgraph, state, SubResource::Service)
                }
                Err(err) => (error_state(state, err.into()), None),
            }
        }
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Create, SubResource::Service) => {
            let Some(res) = resp_o.and_then(KubeAPIResponse::into_create_response) else {
                return (error_state(state, ReconcileFailure::UnexpectedResponse), None);
            };
            match ensure_after_create(res) {
                Ok(Ensured::Created) => (
                    next_state(state, JanusgraphReconcileStep::Requeue(RequeueReason::ServiceCreated)),
                    None,
                ),
                Ok(Ensured::AlreadyPresent) => {
                    get_sub_resource::<StatefulSetBuilder>(janusgraph, state, SubResource::StatefulSet)
                }
                Err(err) => (error_state(state, err.into()), None),
            }
        }
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::StatefulSet) => {
            let Some(res) = resp_o.and_then(KubeAPIResponse::into_get_response) else {
                return (error_state(state, ReconcileFailure::UnexpectedResponse), None);
            };
            match ensure_after_get(res) {
                Ok(Lookup::Present(obj)) => correct_stateful_set(janusgraph, obj, state),
                Ok(Lookup::Absent) => {
                    create_sub_resource::<StatefulSetBuilder>(janusgraph, state, SubResource::StatefulSet)
                }
                Err(err) => (error_state(state, err.into()), None),
            }
        }
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Create, SubResource::StatefulSet) => {
            let Some(res) = resp_o.and_then(KubeAPIResponse::into_create_response) else {
                return (error_state(state, ReconcileFailure::UnexpectedResponse), None);
            };
            match ensure_after_create(res) {
                Ok(Ensured::Created) => (
                    next_state(state, JanusgraphReconcileStep::Requeue(RequeueReason::StatefulSetCreated)),
                    None,
                ),
                // Someone else created it; read it back so its replicas can be checked.
                Ok(Ensured::AlreadyPresent) => {
                    get_sub_resource::<StatefulSetBuilder>(janusgraph, state, SubResource::StatefulSet)
                }
                Err(err) => (error_state(state, err.into()), None),
            }
        }
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Update, SubResource::StatefulSet) => {
            match resp_o.and_then(KubeAPIResponse::into_update_response) {
                Some(Ok(_)) => (
                    next_state(state, JanusgraphReconcileStep::Requeue(RequeueReason::ReplicasCorrected)),
                    None,
                ),
                Some(Err(err)) => (error_state(state, err.into()), None),
                None => (error_state(state, ReconcileFailure::UnexpectedResponse), None),
            }
        }
        JanusgraphReconcileStep::AfterListPods => {
            let pods = match resp_o.and_then(KubeAPIResponse::into_list_response) {
                Some(Ok(pods)) => pods,
                Some(Err(err)) => return (error_state(state, err.into()), None),
                None => return (error_state(state, ReconcileFailure::UnexpectedResponse), None),
            };
            match project_status(janusgraph, member_names(&pods)) {
                Some(status) => match update_status_request(janusgraph, status) {
                    Ok(req) => (
                        next_state(state, JanusgraphReconcileStep::AfterUpdateStatus),
                        Some(KubeAPIRequest::UpdateStatusRequest(req)),
                    ),
                    Err(err) => (error_state(state, err.into()), None),
                },
                None => (next_state(state, JanusgraphReconcileStep::Done), None),
            }
        }
        JanusgraphReconcileStep::AfterUpdateStatus => {
            match resp_o.and_then(KubeAPIResponse::into_update_status_response) {
                Some(Ok(_)) => (next_state(state, JanusgraphReconcileStep::Done), None),
                Some(Err(err)) => (error_state(state, err.into()), None),
                None => (error_state(state, ReconcileFailure::UnexpectedResponse), None),
            }
        }
        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Update, SubResource::Service) => {
            // The service is never updated after creation.
            (error_state(state, ReconcileFailure::UnexpectedResponse), None)
        }
        JanusgraphReconcileStep::Requeue(_)
        | JanusgraphReconcileStep::Done
        | JanusgraphReconcileStep::Error => (state, None),
    }
}

fn get_sub_resource<B: ResourceBuilder>(
    janusgraph: &Janusgraph,
    state: JanusgraphReconcileState,
    sub_resource: SubResource,
) -> (JanusgraphReconcileState, Option<KubeAPIRequest>) {
    let req = KubeAPIRequest::GetRequest(B::get_request(janusgraph));
    (
        next_state(state, JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Get, sub_resource)),
        Some(req),
    )
}

fn create_sub_resource<B: ResourceBuilder>(
    janusgraph: &Janusgraph,
    state: JanusgraphReconcileState,
    sub_resource: SubResource,
) -> (JanusgraphReconcileState, Option<KubeAPIRequest>) {
    match B::create_request(janusgraph) {
        Ok(req) => (
            next_state(state, JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Create, sub_resource)),
            Some(KubeAPIRequest::CreateRequest(req)),
        ),
        Err(err) => (error_state(state, err.into()), None),
    }
}

// correct_stateful_set either updates the replicas of the found stateful set or moves on to list the pods.
//
// We check the owner reference of the found stateful set here to ensure that it is not left over from
// a previously deleted custom resource of the same name. If it is, the reconciler enters the error state
// and waits for the garbage collector to delete it; the next pass then creates a fresh one.
fn correct_stateful_set(
    janusgraph: &Janusgraph,
    obj: DynamicObject,
    state: JanusgraphReconcileState,
) -> (JanusgraphReconcileState, Option<KubeAPIRequest>) {
    let found = match unmarshal::<StatefulSet>(obj) {
        Ok(found) => found,
        Err(err) => return (error_state(state, err.into()), None),
    };
    if !is_controlled_by(&found.metadata, janusgraph) {
        return (
            error_state(
                state,
                ReconcileFailure::NotControlled(format!(
                    "StatefulSet/{}",
                    make_stateful_set_name(janusgraph)
                )),
            ),
            None,
        );
    }
    match correct_replicas(found, janusgraph.spec.replica_count) {
        DriftCorrection::Updated(stateful_set) => match marshal(&stateful_set) {
            Ok(obj) => {
                let req = KubeAPIRequest::UpdateRequest(KubeUpdateRequest {
                    api_resource: api_resource::<StatefulSet>(),
                    name: make_stateful_set_name(janusgraph),
                    namespace: janusgraph.metadata.namespace.clone().unwrap_or_default(),
                    obj,
                });
                (
                    next_state(
                        state,
                        JanusgraphReconcileStep::AfterKRequestStep(ActionKind::Update, SubResource::StatefulSet),
                    ),
                    Some(req),
                )
            }
            Err(err) => (error_state(state, err.into()), None),
        },
        DriftCorrection::Unchanged => (
            next_state(state, JanusgraphReconcileStep::AfterListPods),
            Some(KubeAPIRequest::ListRequest(list_pods_request(janusgraph))),
        ),
    }
}

fn next_state(state: JanusgraphReconcileState, step: JanusgraphReconcileStep) -> JanusgraphReconcileState {
    JanusgraphReconcileState {
        reconcile_step: step,
        ..state
    }
}

pub fn error_state(state: JanusgraphReconcileState, failure: ReconcileFailure) -> JanusgraphReconcileState {
    JanusgraphReconcileState {
        reconcile_step: JanusgraphReconcileStep::Error,
        failure: Some((state.reconcile_step, failure)),
    }
}
