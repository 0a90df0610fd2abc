//! Request processor: the request-lifecycle engine.
//!
//! Receives parsed envelopes from the transport, validates them into
//! [`ActionRequest`]s, resolves the target module, runs the action on a
//! bounded worker, and emits the appropriate response message. Every error
//! kind is caught at this boundary: a single bad request produces an error
//! reply and a log line, never a crash.
//!
//! Sends are best-effort. A send failure is logged at error level and the
//! transaction is abandoned; the processor never retries.

use std::sync::Arc;
use std::thread;

use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use tether_modules::registry::ModuleRegistry;
use tether_modules::request::{ActionRequest, RequestDescriptor, RequestType};
use tether_modules::results::ResultsStore;

use crate::connector::{Connector, DEFAULT_SEND_TIMEOUT};
use crate::envelope::InboundEnvelope;
use crate::messages::ResponseMessage;
use crate::pool::WorkerPool;

/// Tracing target for request processing.
const PROCESSOR_TARGET: &str = "tether_agent::processor";

/// Routes inbound envelopes to modules and emits responses.
pub struct RequestProcessor {
    registry: Arc<ModuleRegistry>,
    connector: Arc<dyn Connector>,
    results_store: ResultsStore,
    pool: WorkerPool,
}

impl RequestProcessor {
    /// Creates a processor over a populated registry.
    #[must_use]
    pub fn new(
        registry: Arc<ModuleRegistry>,
        connector: Arc<dyn Connector>,
        results_store: ResultsStore,
        max_workers: usize,
    ) -> Self {
        Self {
            registry,
            connector,
            results_store,
            pool: WorkerPool::new(max_workers),
        }
    }

    /// Returns the module registry.
    #[must_use]
    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    /// Processes one inbound envelope.
    ///
    /// Validation failures are answered inline; accepted requests run on a
    /// worker thread drawn from the bounded pool. For non-blocking requests
    /// the provisional response is sent before the worker is spawned, so it
    /// always precedes the final response on the wire.
    pub fn process(self: &Arc<Self>, envelope: &InboundEnvelope) {
        let request_id = envelope.request_id().unwrap_or_default().to_owned();

        let sender = match envelope.sender() {
            Ok(sender) => sender.to_owned(),
            Err(envelope_error) => {
                warn!(
                    target: PROCESSOR_TARGET,
                    request_id,
                    error = %envelope_error,
                    "dropping envelope; no reply can be routed"
                );
                return;
            }
        };

        let kind = match envelope.request_type() {
            Ok(kind) => kind,
            Err(envelope_error) => {
                self.send_pcp_error(&sender, &request_id, &envelope_error.to_string());
                return;
            }
        };

        let body = match envelope.request_body() {
            Ok(body) => body,
            Err(envelope_error) => {
                let transaction_id = envelope.raw_transaction_id().unwrap_or_default();
                self.send_pxp_error_fields(
                    &sender,
                    transaction_id,
                    &request_id,
                    &envelope_error.to_string(),
                );
                return;
            }
        };

        match self.registry.get(&body.module) {
            None => {
                self.send_pxp_error_fields(
                    &sender,
                    &body.transaction_id,
                    &request_id,
                    &format!("unknown module: {module}", module = body.module),
                );
                return;
            }
            Some(module) if !module.has_action(&body.action) => {
                self.send_pxp_error_fields(
                    &sender,
                    &body.transaction_id,
                    &request_id,
                    &format!(
                        "unknown action: {module} {action}",
                        module = body.module,
                        action = body.action
                    ),
                );
                return;
            }
            Some(_) => {}
        }

        let descriptor = RequestDescriptor {
            id: request_id.clone(),
            transaction_id: body.transaction_id.clone(),
            sender: sender.clone(),
            module: body.module,
            action: body.action,
            params: body.params,
        };

        let request = match kind {
            RequestType::Blocking => {
                ActionRequest::blocking(descriptor, envelope.chunks().clone())
            }
            RequestType::NonBlocking => {
                let results_dir = match self.results_store.prepare(&body.transaction_id) {
                    Ok(dir) => dir,
                    Err(results_error) => {
                        self.send_pxp_error_fields(
                            &sender,
                            &body.transaction_id,
                            &request_id,
                            &results_error.to_string(),
                        );
                        return;
                    }
                };
                match ActionRequest::non_blocking(descriptor, envelope.chunks().clone(), results_dir)
                {
                    Ok(request) => request,
                    Err(request_error) => {
                        self.send_pxp_error_fields(
                            &sender,
                            &body.transaction_id,
                            &request_id,
                            &request_error.to_string(),
                        );
                        return;
                    }
                }
            }
        };

        // The lookup above succeeded and the registry is immutable.
        let Some(module) = self.registry.get(request.module()) else {
            return;
        };
        if let Err(validation_error) = module.validate_input(request.action(), request.params()) {
            self.send_pxp_error(&request, &validation_error.to_string());
            return;
        }

        if request.kind() == RequestType::NonBlocking {
            self.send_provisional(&request);
        }

        let Some(permit) = self.pool.try_acquire() else {
            warn!(
                target: PROCESSOR_TARGET,
                label = request.pretty_label(),
                max_workers = self.pool.max(),
                "worker pool exhausted, refusing request"
            );
            self.send_pxp_error(&request, "agent at capacity: no worker available");
            return;
        };

        let this = Arc::clone(self);
        thread::spawn(move || {
            let _permit = permit;
            this.run_action(&request);
        });
    }

    /// Runs the action and emits its response. Executes on a worker thread.
    fn run_action(&self, request: &ActionRequest) {
        let Some(module) = self.registry.get(request.module()) else {
            self.send_pxp_error(
                request,
                &format!("unknown module: {module}", module = request.module()),
            );
            return;
        };

        match module.call(request) {
            Ok(outcome) => {
                if let Err(validation_error) =
                    module.validate_results(request.action(), outcome.results())
                {
                    error!(
                        target: PROCESSOR_TARGET,
                        label = request.pretty_label(),
                        error = %validation_error,
                        "action produced results that do not conform to its schema"
                    );
                    self.send_pxp_error(request, &validation_error.to_string());
                    return;
                }

                match request.kind() {
                    RequestType::Blocking => {
                        self.send_blocking_response(request, outcome.results().clone());
                    }
                    RequestType::NonBlocking => {
                        let job_id = Uuid::new_v4().to_string();
                        self.send_non_blocking_response(request, outcome.results().clone(), job_id);
                    }
                }
            }
            Err(module_error) => {
                self.send_pxp_error(request, &module_error.to_string());
            }
        }
    }

    /// Forwards the envelope's valid debug chunks, warning when the
    /// transport counted invalid ones.
    fn wrap_debug(request: &ActionRequest) -> Vec<Value> {
        let chunks = request.chunks();
        if chunks.num_invalid_debug() > 0 {
            warn!(
                target: PROCESSOR_TARGET,
                request_id = request.id(),
                num_invalid_debug = chunks.num_invalid_debug(),
                "message contained bad debug chunks"
            );
        }
        chunks.debug().to_vec()
    }

    fn send_provisional(&self, request: &ActionRequest) {
        let message = ResponseMessage::Provisional {
            transaction_id: request.transaction_id().to_owned(),
            debug: Self::wrap_debug(request),
        };
        match self
            .connector
            .send(request.sender(), message, DEFAULT_SEND_TIMEOUT)
        {
            Ok(()) => info!(
                target: PROCESSOR_TARGET,
                label = request.pretty_label(),
                sender = request.sender(),
                "sent provisional response"
            ),
            Err(send_error) => error!(
                target: PROCESSOR_TARGET,
                label = request.pretty_label(),
                sender = request.sender(),
                error = %send_error,
                "failed to send provisional response; no further attempts will be made"
            ),
        }
    }

    fn send_blocking_response(&self, request: &ActionRequest, results: Value) {
        let message = ResponseMessage::BlockingResponse {
            transaction_id: request.transaction_id().to_owned(),
            results,
            debug: Self::wrap_debug(request),
        };
        match self
            .connector
            .send(request.sender(), message, DEFAULT_SEND_TIMEOUT)
        {
            Ok(()) => info!(
                target: PROCESSOR_TARGET,
                label = request.pretty_label(),
                sender = request.sender(),
                "sent response"
            ),
            Err(send_error) => error!(
                target: PROCESSOR_TARGET,
                label = request.pretty_label(),
                sender = request.sender(),
                error = %send_error,
                "failed to reply; no further attempts will be made"
            ),
        }
    }

    fn send_non_blocking_response(&self, request: &ActionRequest, results: Value, job_id: String) {
        // Debug was delivered with the provisional response.
        let message = ResponseMessage::NonBlockingResponse {
            transaction_id: request.transaction_id().to_owned(),
            job_id,
            results,
        };
        match self
            .connector
            .send(request.sender(), message, DEFAULT_SEND_TIMEOUT)
        {
            Ok(()) => info!(
                target: PROCESSOR_TARGET,
                label = request.pretty_label(),
                sender = request.sender(),
                "sent response"
            ),
            Err(send_error) => error!(
                target: PROCESSOR_TARGET,
                label = request.pretty_label(),
                sender = request.sender(),
                error = %send_error,
                "failed to reply; no further attempts will be made"
            ),
        }
    }

    fn send_pxp_error(&self, request: &ActionRequest, description: &str) {
        self.send_pxp_error_fields(
            request.sender(),
            request.transaction_id(),
            request.id(),
            description,
        );
    }

    fn send_pxp_error_fields(
        &self,
        sender: &str,
        transaction_id: &str,
        request_id: &str,
        description: &str,
    ) {
        let message = ResponseMessage::PxpError {
            transaction_id: transaction_id.to_owned(),
            id: request_id.to_owned(),
            description: description.to_owned(),
        };
        match self.connector.send(sender, message, DEFAULT_SEND_TIMEOUT) {
            Ok(()) => info!(
                target: PROCESSOR_TARGET,
                request_id,
                sender,
                "replied with a PXP error message"
            ),
            Err(send_error) => error!(
                target: PROCESSOR_TARGET,
                request_id,
                sender,
                description,
                error = %send_error,
                "failed to send a PXP error message; no further attempts will be made"
            ),
        }
    }

    fn send_pcp_error(&self, sender: &str, request_id: &str, description: &str) {
        let message = ResponseMessage::PcpError {
            id: request_id.to_owned(),
            description: description.to_owned(),
        };
        match self.connector.send(sender, message, DEFAULT_SEND_TIMEOUT) {
            Ok(()) => info!(
                target: PROCESSOR_TARGET,
                request_id,
                "replied with a PCP error message"
            ),
            Err(send_error) => error!(
                target: PROCESSOR_TARGET,
                request_id,
                error = %send_error,
                "failed to send PCP error message"
            ),
        }
    }
}

impl std::fmt::Debug for RequestProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestProcessor")
            .field("modules", &self.registry.names())
            .field("spool_dir", &self.results_store.spool_dir())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
