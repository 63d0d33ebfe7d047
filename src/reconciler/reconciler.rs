// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::APIError;
use crate::Error;
use std::fmt;

// Reconciler is implemented by each controller and driven by the shim layer.
//
// reconcile_core is a pure state transition: it takes the custom resource,
// the response to the request issued in the previous step (if any) and the local state,
// and returns the next local state together with at most one request to send.
// It performs no I/O itself, which keeps every step re-derivable and lets the
// shim abandon a pass at any point without leaving partial local state behind.
pub trait Reconciler {
    // The custom resource type this reconciler drives.
    type K;
    // The local state of one reconcile pass.
    type S;

    fn reconcile_init_state() -> Self::S;

    fn reconcile_core(
        cr: &Self::K,
        resp_o: Option<KubeAPIResponse>,
        state: Self::S,
    ) -> (Self::S, Option<KubeAPIRequest>);

    // The pass finished without error (it may still ask to be requeued).
    fn reconcile_done(state: &Self::S) -> bool;

    fn reconcile_error(state: &Self::S) -> bool;

    // Only meaningful once reconcile_done holds: the pass stopped early on purpose
    // and wants to be invoked again right away.
    fn reconcile_requeue(state: &Self::S) -> bool;

    // Turns an error state into the error reported to the controller runtime.
    fn reconcile_failure(state: Self::S) -> Error;
}

/// Why a pass stopped with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileFailure {
    // The API server rejected or failed a request.
    Api(APIError),
    // The custom resource asks for something that cannot be built.
    InvalidSpec(String),
    // The response does not belong to the request issued in the previous step.
    UnexpectedResponse,
    // An object could not be converted to or from its typed form.
    Marshal(String),
    // A child object with the expected name is controlled by someone else.
    NotControlled(String),
}

impl ReconcileFailure {
    pub fn is_permanent(&self) -> bool {
        matches!(self, ReconcileFailure::InvalidSpec(_))
    }
}

impl fmt::Display for ReconcileFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileFailure::Api(err) => write!(f, "API request failed with {}", err),
            ReconcileFailure::InvalidSpec(reason) => write!(f, "invalid spec: {}", reason),
            ReconcileFailure::UnexpectedResponse => write!(f, "unexpected response"),
            ReconcileFailure::Marshal(reason) => write!(f, "marshal failed: {}", reason),
            ReconcileFailure::NotControlled(key) => write!(f, "{} is not controlled by this custom resource", key),
        }
    }
}

impl From<APIError> for ReconcileFailure {
    fn from(err: APIError) -> Self {
        ReconcileFailure::Api(err)
    }
}

impl From<serde_json::Error> for ReconcileFailure {
    fn from(err: serde_json::Error) -> Self {
        ReconcileFailure::Marshal(err.to_string())
    }
}
