//! Capability execution
//!
//! Runs one engine-requested capability call and always produces a
//! [`ToolCallRecord`]. Unknown names, calls outside the persona's
//! catalogue, invalid arguments, collaborator errors, timeouts and panics
//! all become failure envelopes; nothing here returns `Err` to the caller.

use crate::completion::ToolCall;
use crate::error::AssistantError;
use crate::models::{ToolCallRecord, ToolOutput};
use crate::tools::{Capability, CapabilityRegistry};
use crate::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

pub struct CapabilityExecutor {
    registry: Arc<CapabilityRegistry>,
    timeout: Duration,
}

impl CapabilityExecutor {
    pub fn new(registry: CapabilityRegistry, timeout: Duration) -> Self {
        Self {
            registry: Arc::new(registry),
            timeout,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// Execute `call` if its capability is part of `allowed`
    pub async fn execute(&self, call: &ToolCall, allowed: &[&str]) -> ToolCallRecord {
        let start = Instant::now();
        let result = self.run(call, allowed).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        if result.success {
            debug!(capability = %call.name, duration_ms, "Capability succeeded");
        } else {
            warn!(
                capability = %call.name,
                duration_ms,
                error = ?result.error,
                "Capability failed"
            );
        }

        ToolCallRecord {
            capability: call.name.clone(),
            arguments: call.arguments.clone(),
            result,
            duration_ms,
        }
    }

    async fn run(&self, call: &ToolCall, allowed: &[&str]) -> ToolOutput {
        match self.try_run(call, allowed).await {
            Ok(output) => output,
            Err(e) => {
                let message = match &e {
                    AssistantError::CapabilityNotFound(_) => "Capability not registered".to_string(),
                    AssistantError::CapabilityRefused(_) => "Capability not available".to_string(),
                    _ => format!("Failed to run {}", call.name),
                };
                ToolOutput::failure(e.to_string(), message)
            }
        }
    }

    fn resolve(&self, name: &str, allowed: &[&str]) -> Result<Arc<dyn Capability>> {
        if !allowed.contains(&name) {
            return Err(AssistantError::CapabilityRefused(name.to_string()));
        }
        self.registry
            .get(name)
            .ok_or_else(|| AssistantError::CapabilityNotFound(name.to_string()))
    }

    async fn try_run(&self, call: &ToolCall, allowed: &[&str]) -> Result<ToolOutput> {
        let capability = self.resolve(&call.name, allowed)?;

        let arguments = call.arguments.clone();
        let handle = tokio::spawn(async move { capability.execute(&arguments).await });
        let abort = handle.abort_handle();

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(joined) => {
                joined.map_err(|e| AssistantError::Capability(format!("aborted: {}", e)))?
            }
            Err(_) => {
                abort.abort();
                Err(AssistantError::Capability(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        }
    }
}
