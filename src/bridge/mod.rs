pub mod fsm;
mod types;

pub use types::*;

use crate::{config::BridgeConfig, transport::Transport};
use fsm::{CallEvent, CallStateMachine};
use std::{sync::Arc, time::Duration};
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

/// Turns one validated question into exactly one [`InferenceResult`],
/// whichever transport backs it, under a hard deadline.
///
/// The bridge holds no per-call state; concurrent calls share only the
/// immutable configuration and the transport handle.
#[derive(Clone)]
pub struct QueryBridge {
    transport: Arc<dyn Transport>,
    deadline: Duration,
    history_limit: usize,
    context_turns: usize,
}

impl QueryBridge {
    pub fn new(transport: Arc<dyn Transport>, config: &BridgeConfig) -> Self {
        Self {
            transport,
            deadline: Duration::from_secs(config.timeout_secs),
            history_limit: config.history_limit,
            context_turns: config.context_turns,
        }
    }

    pub fn transport_name(&self) -> &'static str {
        self.transport.name()
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    pub async fn query(
        &self,
        question: Question,
        history: Vec<ConversationTurn>,
    ) -> InferenceResult {
        let call_id = Uuid::new_v4();
        let span = info_span!("query", %call_id, transport = self.transport.name());

        async move {
            let history = ConversationHistory::bounded(history, self.history_limit);
            let request = InferenceRequest::new(question, &history, self.context_turns);

            info!(
                "Forwarding question ({} retained turns, {} in context)",
                history.turns().len(),
                request.context().len()
            );

            let mut call = CallStateMachine::new(call_id);

            // Dropping the transport future on expiry releases its resources,
            // which for the process transport terminates the child.
            let (event, result) =
                match tokio::time::timeout(self.deadline, self.transport.infer(&request)).await {
                    Ok(result) => (CallEvent::from(&result), result),
                    Err(_) => {
                        warn!("Deadline of {:?} elapsed, abandoning call", self.deadline);
                        (
                            CallEvent::DeadlineElapsed,
                            InferenceResult::failure(
                                FailureKind::Timeout,
                                format!(
                                    "no answer within {} seconds",
                                    self.deadline.as_secs()
                                ),
                            ),
                        )
                    }
                };

            if let Err(e) = call.transition(event) {
                error!("Call produced a second outcome: {}", e);
                return InferenceResult::failure(FailureKind::Unknown, e.to_string());
            }

            match &result {
                InferenceResult::Success { text, .. } => {
                    info!("Call succeeded with {} characters", text.chars().count());
                }
                InferenceResult::Failure { kind, detail } => {
                    error!(
                        "Call failed: {} ({})",
                        kind,
                        detail.as_deref().unwrap_or("no detail")
                    );
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}
