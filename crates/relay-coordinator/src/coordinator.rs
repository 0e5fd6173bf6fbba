//! One request, one outcome, one callback.

use relay_callback::{CallbackDispatcher, DeliveryReport};
use relay_poller::{PollTerminal, PollerConfig, PollingEngine, ResultExtractor};
use relay_types::{
    CallbackPayload, CallbackSender, FailureReason, JobClientFactory, JobRequest, Outcome,
    PollState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::Instrument;

const INTERNAL_ERROR: &str = "internal error while processing request";

#[derive(Debug, Clone, Default)]
pub struct CoordinatorConfig {
    pub poller: PollerConfig,
    /// Attach token usage to success callbacks.
    pub include_usage: bool,
}

/// What happened to one request.
#[derive(Debug, Clone)]
pub struct Processed {
    pub outcome: Outcome,
    /// Final polling state; `None` when processing aborted before it was known.
    pub poll_state: Option<PollState>,
    /// `None` when delivery was cut short by a panic.
    pub report: Option<DeliveryReport>,
}

/// Map an outcome to the single payload delivered for `req`.
pub fn payload_for(req: &JobRequest, outcome: &Outcome, include_usage: bool) -> CallbackPayload {
    match outcome {
        Outcome::Success { text, usage } => {
            CallbackPayload::ok(req, text.clone(), usage.filter(|_| include_usage))
        }
        Outcome::Failure { detail, .. } => CallbackPayload::error(req, detail.clone()),
    }
}

pub struct RequestCoordinator {
    clients: Arc<dyn JobClientFactory>,
    dispatcher: CallbackDispatcher,
    config: CoordinatorConfig,
}

impl RequestCoordinator {
    pub fn new(
        clients: Arc<dyn JobClientFactory>,
        sender: Arc<dyn CallbackSender>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            clients,
            dispatcher: CallbackDispatcher::new(sender),
            config,
        }
    }

    /// Drive `req` to its outcome and deliver the callback.
    pub async fn process(&self, req: &JobRequest) -> Processed {
        self.process_marked(req, &AtomicBool::new(false)).await
    }

    /// As [`process`](Self::process), setting `delivering` once the first
    /// callback send begins.
    async fn process_marked(&self, req: &JobRequest, delivering: &AtomicBool) -> Processed {
        let client = self.clients.client(&req.job_credential);
        let mut engine = PollingEngine::new(Arc::clone(&client), self.config.poller.clone());
        let terminal = engine
            .run(&req.thread_id, &req.assistant_id, &req.message)
            .await;
        let outcome = match terminal {
            PollTerminal::Completed { run, usage } => {
                ResultExtractor::new(client).extract(&run, usage).await
            }
            PollTerminal::Failed(err) | PollTerminal::TimedOut(err) => Outcome::from(&err),
        };
        match &outcome {
            Outcome::Success { text, .. } => {
                tracing::info!(chars = text.len(), "request succeeded")
            }
            Outcome::Failure { reason, detail } => {
                tracing::warn!(?reason, %detail, "request failed")
            }
        }

        let payload = payload_for(req, &outcome, self.config.include_usage);
        delivering.store(true, Ordering::SeqCst);
        let report = self.dispatcher.deliver(&req.callback, &payload).await;
        Processed {
            outcome,
            poll_state: Some(engine.state()),
            report: Some(report),
        }
    }

    /// Process `req` on its own task. If processing panics before any callback
    /// send began, an error callback is still sent to the request's target.
    pub fn spawn(self: &Arc<Self>, req: JobRequest) -> JoinHandle<Processed> {
        let span = tracing::info_span!(
            "request",
            request_id = %req.request_id,
            thread_id = %req.thread_id,
            client_id = %req.client_id,
        );
        let this = Arc::clone(self);
        tokio::spawn(
            async move {
                let delivering = Arc::new(AtomicBool::new(false));
                let worker = {
                    let this = Arc::clone(&this);
                    let req = req.clone();
                    let delivering = Arc::clone(&delivering);
                    tokio::spawn(
                        async move { this.process_marked(&req, &delivering).await }
                            .in_current_span(),
                    )
                };
                match worker.await {
                    Ok(processed) => processed,
                    Err(e) => {
                        let outcome = Outcome::failure(FailureReason::Internal, INTERNAL_ERROR);
                        // The receiver may already hold the real callback.
                        if delivering.load(Ordering::SeqCst) {
                            tracing::error!(error = %e, "request aborted during callback delivery");
                            return Processed {
                                outcome,
                                poll_state: None,
                                report: None,
                            };
                        }
                        tracing::error!(error = %e, "request processing aborted");
                        let payload = payload_for(&req, &outcome, false);
                        let report = this.dispatcher.deliver(&req.callback, &payload).await;
                        Processed {
                            outcome,
                            poll_state: None,
                            report: Some(report),
                        }
                    }
                }
            }
            .instrument(span),
        )
    }
}
