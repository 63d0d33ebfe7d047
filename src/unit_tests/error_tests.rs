// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::*;
use crate::reconciler::reconciler::ReconcileFailure;
use crate::Error;
use kube::discovery::ApiResource;
use kube_core::ErrorResponse;

fn test_api_resource() -> ApiResource {
    ApiResource {
        group: "group".to_string(),
        version: "version".to_string(),
        kind: "kind".to_string(),
        api_version: "api_version".to_string(),
        plural: "plural".to_string(),
    }
}

fn kube_api_error(reason: &str, code: u16) -> kube_client::Error {
    kube_client::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message: format!("{} happened", reason),
        reason: reason.to_string(),
        code,
    })
}

#[test]
pub fn test_getrequest_key() {
    let req = KubeGetRequest {
        api_resource: test_api_resource(),
        name: "name".to_string(),
        namespace: "namespace".to_string(),
    };
    assert_eq!(req.key(), "kind/namespace/name");
}

#[test]
pub fn test_listrequest_key() {
    let req = KubeListRequest {
        api_resource: test_api_resource(),
        namespace: "namespace".to_string(),
        label_selector: None,
    };
    assert_eq!(req.key(), "kind/namespace");

    let req = KubeListRequest {
        label_selector: Some("app=Janusgraph".to_string()),
        ..req
    };
    assert_eq!(req.key(), "kind/namespace?app=Janusgraph");
}

#[test]
pub fn test_apierror_fmt() {
    assert_eq!(format!("{}", APIError::ObjectNotFound), "ObjectNotFound");
    assert_eq!(format!("{}", APIError::Conflict), "Conflict");
    assert_eq!(format!("{:?}", APIError::ServerTimeout), "ServerTimeout");
}

#[test]
pub fn test_kube_error_to_api_error() {
    let cases = [
        ("NotFound", 404, APIError::ObjectNotFound),
        ("AlreadyExists", 409, APIError::ObjectAlreadyExists),
        ("Conflict", 409, APIError::Conflict),
        ("BadRequest", 400, APIError::BadRequest),
        ("Forbidden", 403, APIError::Forbidden),
        ("Invalid", 422, APIError::Invalid),
        ("InternalError", 500, APIError::InternalError),
        ("Timeout", 504, APIError::Timeout),
        ("ServerTimeout", 500, APIError::ServerTimeout),
        ("TooManyRequests", 429, APIError::Other),
    ];
    for (reason, code, expected) in cases {
        assert_eq!(kube_error_to_api_error(&kube_api_error(reason, code)), expected, "{}", reason);
    }
}

#[test]
pub fn test_existence_errors() {
    assert!(APIError::ObjectNotFound.is_object_not_found());
    assert!(!APIError::ObjectAlreadyExists.is_object_not_found());
    assert!(APIError::ObjectAlreadyExists.is_object_already_exists());
    assert!(!APIError::Conflict.is_object_already_exists());
}

#[test]
pub fn test_transient_api_errors() {
    assert!(APIError::Conflict.is_transient());
    assert!(APIError::Timeout.is_transient());
    assert!(APIError::InternalError.is_transient());
    assert!(APIError::Other.is_transient());
    assert!(!APIError::BadRequest.is_transient());
    assert!(!APIError::Forbidden.is_transient());
    assert!(!APIError::Invalid.is_transient());
}

#[test]
pub fn test_error_classification() {
    let invalid_spec = Error::InvalidSpec("replicaCount must not be negative, got -1".to_string());
    assert!(invalid_spec.is_permanent());
    assert!(!invalid_spec.is_rejected_request());

    let conflict = Error::ReconcileCoreError {
        step: "AfterKRequestStep(Update, StatefulSet)".to_string(),
        failure: ReconcileFailure::Api(APIError::Conflict),
    };
    assert!(!conflict.is_permanent());
    assert!(!conflict.is_rejected_request());

    let forbidden = Error::ReconcileCoreError {
        step: "AfterKRequestStep(Create, Service)".to_string(),
        failure: ReconcileFailure::Api(APIError::Forbidden),
    };
    assert!(!forbidden.is_permanent());
    assert!(forbidden.is_rejected_request());

    let get_failed = Error::CRGetFailed {
        key: "Janusgraph/default/g1".to_string(),
        cause: APIError::ServerTimeout,
    };
    assert!(!get_failed.is_permanent());
    assert!(!get_failed.is_rejected_request());

    let not_controlled = Error::ReconcileCoreError {
        step: "AfterKRequestStep(Get, StatefulSet)".to_string(),
        failure: ReconcileFailure::NotControlled("StatefulSet/g1".to_string()),
    };
    assert!(!not_controlled.is_permanent());
}

#[test]
pub fn test_error_fmt() {
    let err = Error::ReconcileCoreError {
        step: "AfterListPods".to_string(),
        failure: ReconcileFailure::Api(APIError::InternalError),
    };
    assert_eq!(
        err.to_string(),
        "ReconcileCoreError at AfterListPods: API request failed with InternalError"
    );
}
