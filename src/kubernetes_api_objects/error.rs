// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube_core::ErrorResponse;

// APIError is the error a request to the API server can end with.
// It is what reconcile_core sees, so the reconciler never touches kube-rs errors directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum APIError {
    #[error("BadRequest")]
    BadRequest,
    #[error("Conflict")]
    Conflict,
    #[error("Forbidden")]
    Forbidden,
    #[error("Invalid")]
    Invalid,
    #[error("ObjectNotFound")]
    ObjectNotFound,
    #[error("ObjectAlreadyExists")]
    ObjectAlreadyExists,
    #[error("InternalError")]
    InternalError,
    #[error("Timeout")]
    Timeout,
    #[error("ServerTimeout")]
    ServerTimeout,
    #[error("Other")]
    Other,
}

impl APIError {
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, APIError::ObjectNotFound)
    }

    pub fn is_object_already_exists(&self) -> bool {
        matches!(self, APIError::ObjectAlreadyExists)
    }

    /// Whether retrying the same request later can succeed without anyone changing it.
    /// BadRequest, Forbidden and Invalid describe the request itself, so they stay
    /// the same until the inputs change.
    pub fn is_transient(&self) -> bool {
        !matches!(
            self,
            APIError::BadRequest | APIError::Forbidden | APIError::Invalid
        )
    }
}

// kube_error_to_api_error translates the error returned by kube-rs APIs
// to the form that can be processed by reconcile_core.
pub fn kube_error_to_api_error(error: &kube_client::Error) -> APIError {
    match error {
        kube_client::Error::Api(ErrorResponse { reason, .. }) => match reason.as_str() {
            "NotFound" => APIError::ObjectNotFound,
            "AlreadyExists" => APIError::ObjectAlreadyExists,
            "BadRequest" => APIError::BadRequest,
            "Conflict" => APIError::Conflict,
            "Forbidden" => APIError::Forbidden,
            "Invalid" => APIError::Invalid,
            "InternalError" => APIError::InternalError,
            "Timeout" => APIError::Timeout,
            "ServerTimeout" => APIError::ServerTimeout,
            _ => APIError::Other,
        },
        _ => APIError::Other,
    }
}
