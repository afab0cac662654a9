//! Reasoning provider trait and implementations
//!
//! The provider decides, at each turn, whether to request tools or produce
//! a final answer. It is injected into the executor at construction so
//! sessions can run in parallel against stubs or live endpoints.

use crate::error::OrchestrationError;
use crate::models::{ConversationEntry, ToolInvocationRequest};
use crate::tools::ToolContract;
use crate::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tracing::warn;

pub mod openai;
pub use openai::OpenAiProvider;

/// Trait for the reasoning step (LLM controlled)
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Produce exactly one new entry for the conversation: free text, or a
    /// non-empty set of tool invocation requests drawn from `tool_contracts`.
    async fn invoke(
        &self,
        conversation: &[ConversationEntry],
        tool_contracts: &[ToolContract],
    ) -> Result<ConversationEntry>;
}

/// Retry bounds for transient provider errors
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Initial backoff, doubled after each failed attempt.
    pub base_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
        }
    }
}

/// Invoke the provider, absorbing transient errors up to the retry budget.
/// Exhausting the budget, or any non-transient error, is a provider failure
/// that is fatal for the session.
pub async fn invoke_with_retry(
    provider: &dyn ReasoningProvider,
    conversation: &[ConversationEntry],
    tool_contracts: &[ToolContract],
    policy: RetryPolicy,
) -> Result<ConversationEntry> {
    let mut backoff = policy.base_backoff;
    let mut attempt = 1u32;

    loop {
        match provider.invoke(conversation, tool_contracts).await {
            Ok(entry) => return Ok(entry),
            Err(e) if e.is_transient() => {
                if attempt >= policy.max_attempts {
                    return Err(OrchestrationError::ProviderFailure(format!(
                        "Retry budget exhausted after {} attempts: {}",
                        policy.max_attempts, e
                    )));
                }
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    backoff_ms = backoff.as_millis() as u64,
                    error = %e,
                    "Transient provider error, retrying"
                );
                tokio::time::sleep(backoff).await;
                backoff *= 2;
                attempt += 1;
            }
            Err(OrchestrationError::ProviderFailure(msg)) => {
                return Err(OrchestrationError::ProviderFailure(msg))
            }
            Err(e) => return Err(OrchestrationError::ProviderFailure(e.to_string())),
        }
    }
}

//
// ================= Scripted provider =================
//

/// One scripted reasoning turn
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    Text(String),
    Requests(Vec<ToolInvocationRequest>),
    TransientError(String),
    FatalError(String),
}

/// Deterministic provider for tests, demos, and offline runs. Pops one
/// scripted turn per invocation.
pub struct ScriptedProvider {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of invocations issued so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    async fn invoke(
        &self,
        _conversation: &[ConversationEntry],
        _tool_contracts: &[ToolContract],
    ) -> Result<ConversationEntry> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let turn = self
            .turns
            .lock()
            .expect("script mutex poisoned")
            .pop_front()
            .ok_or_else(|| {
                OrchestrationError::ProviderFailure("Scripted turns exhausted".to_string())
            })?;

        match turn {
            ScriptedTurn::Text(text) => Ok(ConversationEntry::reasoner_text(text)),
            ScriptedTurn::Requests(requests) => {
                Ok(ConversationEntry::reasoner_requests(requests))
            }
            ScriptedTurn::TransientError(msg) => {
                Err(OrchestrationError::ProviderTransient(msg))
            }
            ScriptedTurn::FatalError(msg) => Err(OrchestrationError::ProviderFailure(msg)),
        }
    }
}
