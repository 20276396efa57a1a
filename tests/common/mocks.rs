use async_trait::async_trait;
use cpm_agente::{
    bridge::{InferenceRequest, InferenceResult},
    transport::Transport,
};
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Behavior {
    /// Resolve immediately with the given result.
    Respond(InferenceResult),
    /// Resolve with the given result after a delay.
    Delay(Duration, InferenceResult),
    /// Never resolve.
    Hang,
}

/// Deterministic transport for bridge and route tests.
///
/// `terminations` counts calls whose in-flight work was dropped before it
/// produced a result, standing in for the kill signal a real child gets.
#[derive(Debug, Clone)]
pub struct StubTransport {
    behavior: Behavior,
    pub requests: Arc<Mutex<Vec<InferenceRequest>>>,
    pub terminations: Arc<AtomicUsize>,
    pub completions: Arc<AtomicUsize>,
}

impl StubTransport {
    pub fn new(behavior: Behavior) -> Self {
        Self {
            behavior,
            requests: Arc::new(Mutex::new(Vec::new())),
            terminations: Arc::new(AtomicUsize::new(0)),
            completions: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn answering(text: &str) -> Self {
        Self::new(Behavior::Respond(InferenceResult::success(text)))
    }

    pub fn hanging() -> Self {
        Self::new(Behavior::Hang)
    }

    pub fn get_requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn termination_count(&self) -> usize {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn completion_count(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }
}

struct TerminationProbe {
    counter: Arc<AtomicUsize>,
    armed: bool,
}

impl TerminationProbe {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for TerminationProbe {
    fn drop(&mut self) {
        if self.armed {
            self.counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl Transport for StubTransport {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn infer(&self, request: &InferenceRequest) -> InferenceResult {
        self.requests.lock().unwrap().push(request.clone());

        let probe = TerminationProbe {
            counter: self.terminations.clone(),
            armed: true,
        };

        let result = match &self.behavior {
            Behavior::Respond(result) => result.clone(),
            Behavior::Delay(delay, result) => {
                tokio::time::sleep(*delay).await;
                result.clone()
            }
            Behavior::Hang => std::future::pending::<InferenceResult>().await,
        };

        probe.disarm();
        self.completions.fetch_add(1, Ordering::SeqCst);
        result
    }
}
