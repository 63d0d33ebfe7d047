// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JanusgraphReconcileStep {
    Init,
    AfterKRequestStep(ActionKind, SubResource),
    AfterListPods,
    AfterUpdateStatus,
    AfterReportInvalidSpec,
    Requeue(RequeueReason),
    Done,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Get,
    Create,
    Update,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubResource {
    Service,
    StatefulSet,
}

// RequeueReason records which write ended the pass early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequeueReason {
    ServiceCreated,
    StatefulSetCreated,
    ReplicasCorrected,
}

impl fmt::Display for JanusgraphReconcileStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JanusgraphReconcileStep::AfterKRequestStep(action, sub_resource) => {
                write!(f, "AfterKRequestStep({:?}, {:?})", action, sub_resource)
            }
            JanusgraphReconcileStep::Requeue(reason) => write!(f, "Requeue({:?})", reason),
            other => write!(f, "{:?}", other),
        }
    }
}
