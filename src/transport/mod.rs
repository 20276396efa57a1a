mod interpreter;
mod output;
mod process;
mod remote;

pub use interpreter::{Interpreter, InterpreterSource};
pub use output::OutputBuffer;
pub use process::ProcessTransport;
pub use remote::{DEFAULT_SYSTEM_PROMPT, RemoteTransport, classify_api_error};

use crate::{
    Error, Result,
    bridge::{InferenceRequest, InferenceResult},
    config::{Config, TransportKind},
};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// A way of reaching the inference collaborator.
///
/// Implementations never return a Rust error: every outcome, including
/// collaborator faults, is folded into an [`InferenceResult`]. Deadlines are
/// enforced by the caller, which may drop the returned future at any await
/// point; implementations must release their resources on drop.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &'static str;

    async fn infer(&self, request: &InferenceRequest) -> InferenceResult;
}

pub fn create_transport(config: &Config) -> Result<Arc<dyn Transport>> {
    info!("Creating {} transport", config.bridge.transport);

    match config.bridge.transport {
        TransportKind::Process => Ok(Arc::new(ProcessTransport::new(&config.bridge.process)?)),
        TransportKind::Remote => {
            let llm = config
                .llm
                .clone()
                .ok_or_else(|| Error::config("remote transport requires an 'llm' section"))?;
            Ok(Arc::new(RemoteTransport::new(llm)))
        }
    }
}
