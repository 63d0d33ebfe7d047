// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod config;
pub mod janusgraph_controller;
pub mod kubernetes_api_objects;
pub mod kubernetes_cluster;
pub mod reconciler;
pub mod shim_layer;

#[cfg(test)]
mod unit_tests;

use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::reconciler::ReconcileFailure;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),
    #[error("ShimLayerError: {0}")]
    ShimLayerError(String),
    #[error("Get custom resource {key} failed: {cause}")]
    CRGetFailed { key: String, cause: APIError },
    #[error("ReconcileCoreError at {step}: {failure}")]
    ReconcileCoreError {
        step: String,
        failure: ReconcileFailure,
    },
    #[error("InvalidSpec: {0}")]
    InvalidSpec(String),
    #[error("InvalidConfig: {var}={value}")]
    InvalidConfig { var: &'static str, value: String },
}

impl Error {
    /// Permanent errors do not go away by retrying; they wait for the custom resource to change.
    pub fn is_permanent(&self) -> bool {
        match self {
            Error::MissingObjectKey(_) | Error::InvalidSpec(_) | Error::InvalidConfig { .. } => {
                true
            }
            Error::ReconcileCoreError { failure, .. } => failure.is_permanent(),
            _ => false,
        }
    }

    /// Errors caused by the request itself; retried, but at the slowest pace.
    pub fn is_rejected_request(&self) -> bool {
        match self {
            Error::CRGetFailed { cause, .. } => !cause.is_transient(),
            Error::ReconcileCoreError {
                failure: ReconcileFailure::Api(cause),
                ..
            } => !cause.is_transient(),
            _ => false,
        }
    }
}
