// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::config::ControllerConfig;
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::error::APIError;
use crate::kubernetes_api_objects::marshal::{api_resource, unmarshal};
use crate::reconciler::reconciler::Reconciler;
use crate::shim_layer::api_client::ApiClient;
use crate::shim_layer::backoff::Backoff;
use crate::shim_layer::fault_injection::crash_or_continue;
use crate::Error;
use futures::{Future, StreamExt};
use kube::runtime::controller::{self, Action, Controller};
use kube::Resource;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

// The shim layer connects the sans-IO reconciler to the kube-rs controller runtime.
// The key is to implement the reconcile function (impl FnMut(Arc<K>, Arc<Ctx>) -> ReconcilerFut),
// which is required by the kube-rs framework to build a controller,
// on top of reconcile_core, which is provided by the developer.

// Data is passed to every reconcile and error_policy invocation.
// It carries the client that communicates with the Kubernetes API.
pub struct Data<C> {
    pub client: C,
    pub config: ControllerConfig,
    pub fault_injection: bool,
    pub backoff: Backoff,
}

impl<C> Data<C> {
    pub fn new(client: C, config: ControllerConfig, fault_injection: bool) -> Self {
        let backoff = Backoff::new(config.backoff_base, config.backoff_max);
        Data {
            client,
            config,
            fault_injection,
            backoff,
        }
    }
}

/// How a reconcile pass that did not fail ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    // The custom resource is gone; nothing to do until it shows up again.
    Deleted,
    // Converged; wait for the next change (or the periodic resync).
    AwaitChange,
    // The pass stopped after a write and wants to run again to observe its effect.
    Requeue,
}

// run_controller runs the prebuilt controller until a termination signal arrives.
// The controller decides what to watch; every event for K or its owned objects
// ends up in one reconcile_with pass for the owning K.
pub async fn run_controller<K, R, C>(
    controller: Controller<K>,
    client: C,
    config: ControllerConfig,
    fault_injection: bool,
) -> anyhow::Result<()>
where
    K: Clone + Resource<DynamicType = ()> + DeserializeOwned + Debug + Send + Sync + 'static,
    R: Reconciler<K = K> + 'static,
    R::S: Send,
    C: ApiClient + 'static,
{
    let concurrency = config.concurrency;
    let data = Arc::new(Data::new(client, config, fault_injection));

    info!("starting controller with concurrency {}", concurrency);
    controller
        .with_config(controller::Config::default().concurrency(concurrency))
        .shutdown_on_signal()
        .run(reconcile::<K, R, C>, error_policy::<K, C>, data)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("reconciled {:?}", obj),
                Err(err) => debug!("reconcile failed: {}", err),
            }
        })
        .await;
    info!("controller terminated");
    Ok(())
}

// reconcile is the function registered with the kube-rs controller.
pub async fn reconcile<K, R, C>(cr: Arc<K>, data: Arc<Data<C>>) -> Result<Action, Error>
where
    K: Resource<DynamicType = ()> + DeserializeOwned + Send + Sync,
    R: Reconciler<K = K>,
    R::S: Send,
    C: ApiClient,
{
    let outcome = reconcile_with::<K, R, C>(cr.as_ref(), data.as_ref()).await?;
    data.backoff.reset(&object_key(cr.as_ref()));
    Ok(outcome_to_action(outcome, &data.config))
}

// reconcile_with implements one reconcile pass by repeatedly invoking R::reconcile_core.
// It starts with R::reconcile_init_state, and in each iteration it invokes R::reconcile_core
// with the new state returned by the previous invocation.
// For each request from R::reconcile_core, it sends the request through the client and
// feeds the response to the next invocation.
// It ends the loop when R reports the reconcile is done (R::reconcile_done)
// or encounters error (R::reconcile_error).
pub async fn reconcile_with<K, R, C>(cr: &K, data: &Data<C>) -> Result<ReconcileOutcome, Error>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
    R: Reconciler<K = K>,
    C: ApiClient,
{
    let cr_name = cr
        .meta()
        .name
        .clone()
        .ok_or(Error::MissingObjectKey("metadata.name"))?;
    let cr_namespace = cr
        .meta()
        .namespace
        .clone()
        .ok_or(Error::MissingObjectKey("metadata.namespace"))?;
    let cr_key = object_key(cr);
    let log_header = format!("Reconciling {}:", cr_key);

    // Get the custom resource by a quorum read so the pass never acts on a stale copy from the watch cache.
    let get_cr_req = KubeGetRequest {
        api_resource: api_resource::<K>(),
        name: cr_name,
        namespace: cr_namespace,
    };
    let cr = match with_deadline(data.config.request_timeout, data.client.get(&get_cr_req)).await {
        Err(err) if err.is_object_not_found() => {
            info!("{} custom resource not found, end reconcile", log_header);
            return Ok(ReconcileOutcome::Deleted);
        }
        Err(err) => {
            warn!("{} get custom resource failed with error: {}, will retry reconcile", log_header, err);
            return Err(Error::CRGetFailed {
                key: cr_key,
                cause: err,
            });
        }
        Ok(obj) => unmarshal::<K>(obj)
            .map_err(|err| Error::ShimLayerError(format!("{} cannot unmarshal custom resource: {}", cr_key, err)))?,
    };
    if cr.meta().uid.is_none() {
        return Err(Error::MissingObjectKey("metadata.uid"));
    }
    debug!("{} get custom resource done", log_header);

    let mut state = R::reconcile_init_state();
    let mut resp_o: Option<KubeAPIResponse> = None;
    loop {
        if R::reconcile_done(&state) {
            return if R::reconcile_requeue(&state) {
                info!("{} done, requeue", log_header);
                Ok(ReconcileOutcome::Requeue)
            } else {
                info!("{} done", log_header);
                Ok(ReconcileOutcome::AwaitChange)
            };
        }
        if R::reconcile_error(&state) {
            let err = R::reconcile_failure(state);
            warn!("{} error: {}", log_header, err);
            return Err(err);
        }
        let (state_prime, req_o) = R::reconcile_core(&cr, resp_o, state);
        resp_o = match req_o {
            Some(req) => {
                let is_write = req.is_write();
                let resp = execute(data, req, &log_header).await;
                // check_fault_timing is only true right after a create, update or update status request.
                if is_write && data.fault_injection {
                    match crash_or_continue(&data.client).await {
                        Ok(true) => {
                            error!("{} crash as configured by fault injection", log_header);
                            panic!("{} crash as configured by fault injection", log_header);
                        }
                        Ok(false) => {}
                        Err(err) => warn!("{} crash_or_continue fails due to {}", log_header, err),
                    }
                }
                Some(resp)
            }
            None => {
                if !R::reconcile_done(&state_prime) && !R::reconcile_error(&state_prime) {
                    return Err(Error::ShimLayerError(format!(
                        "{} reconcile_core stopped issuing requests before finishing",
                        log_header
                    )));
                }
                None
            }
        };
        state = state_prime;
    }
}

// execute sends one request and wraps the result into the matching response.
// A request that misses the deadline ends with APIError::Timeout.
async fn execute<C: ApiClient>(data: &Data<C>, req: KubeAPIRequest, log_header: &str) -> KubeAPIResponse {
    let client = &data.client;
    let timeout = data.config.request_timeout;
    let key = req.key();
    match req {
        KubeAPIRequest::GetRequest(get_req) => {
            let res = with_deadline(timeout, client.get(&get_req)).await;
            log_result(log_header, "Get", &key, &res);
            KubeAPIResponse::GetResponse(KubeGetResponse { res })
        }
        KubeAPIRequest::ListRequest(list_req) => {
            let res = with_deadline(timeout, client.list(&list_req)).await;
            log_result(log_header, "List", &key, &res);
            KubeAPIResponse::ListResponse(KubeListResponse { res })
        }
        KubeAPIRequest::CreateRequest(create_req) => {
            let res = with_deadline(timeout, client.create(&create_req)).await;
            log_result(log_header, "Create", &key, &res);
            KubeAPIResponse::CreateResponse(KubeCreateResponse { res })
        }
        KubeAPIRequest::UpdateRequest(update_req) => {
            let res = with_deadline(timeout, client.update(&update_req)).await;
            log_result(log_header, "Update", &key, &res);
            KubeAPIResponse::UpdateResponse(KubeUpdateResponse { res })
        }
        KubeAPIRequest::UpdateStatusRequest(update_status_req) => {
            let res = with_deadline(timeout, client.update_status(&update_status_req)).await;
            log_result(log_header, "UpdateStatus", &key, &res);
            KubeAPIResponse::UpdateStatusResponse(KubeUpdateStatusResponse { res })
        }
    }
}

async fn with_deadline<T, F>(timeout: Duration, fut: F) -> Result<T, APIError>
where
    F: Future<Output = Result<T, APIError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .unwrap_or(Err(APIError::Timeout))
}

fn log_result<T>(log_header: &str, op: &str, key: &str, res: &Result<T, APIError>) {
    match res {
        Ok(_) => info!("{} {} {} done", log_header, op, key),
        // Expected outcomes of the get/create existence checks.
        Err(err @ (APIError::ObjectNotFound | APIError::ObjectAlreadyExists)) => {
            info!("{} {} {} failed with error: {}", log_header, op, key, err)
        }
        Err(err) => warn!("{} {} {} failed with error: {}", log_header, op, key, err),
    }
}

pub fn outcome_to_action(outcome: ReconcileOutcome, config: &ControllerConfig) -> Action {
    match outcome {
        ReconcileOutcome::Deleted => Action::await_change(),
        ReconcileOutcome::Requeue => Action::requeue(config.requeue_delay),
        ReconcileOutcome::AwaitChange => match config.resync_period {
            Some(period) => Action::requeue(period),
            None => Action::await_change(),
        },
    }
}

// error_policy defines the controller's behavior when the reconcile ends with an error.
//
// Permanent errors wait for the custom resource to change. Requests the API server rejected
// are retried at the slowest pace, and every other error backs off exponentially.
pub fn error_policy<K, C>(cr: Arc<K>, err: &Error, data: Arc<Data<C>>) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let key = object_key(cr.as_ref());
    if err.is_permanent() {
        data.backoff.reset(&key);
        warn!("{} failed permanently with {}, waiting for a change", key, err);
        return Action::await_change();
    }
    let delay = if err.is_rejected_request() {
        data.backoff.record_failure(&key);
        data.backoff.max_delay()
    } else {
        data.backoff.next_delay(&key)
    };
    warn!(
        "{} failed with {} ({} consecutive failures), retry in {:?}",
        key,
        err,
        data.backoff.failures(&key),
        delay
    );
    Action::requeue(delay)
}

// object_key identifies a custom resource as kind/namespace/name.
pub fn object_key<K: Resource<DynamicType = ()>>(cr: &K) -> String {
    format!(
        "{}/{}/{}",
        K::kind(&()),
        cr.meta().namespace.as_deref().unwrap_or(""),
        cr.meta().name.as_deref().unwrap_or("")
    )
}
