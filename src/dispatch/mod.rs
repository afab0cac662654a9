//! Tool dispatcher for one turn's invocation requests
//!
//! Calls within a turn are independent, so they run concurrently under a
//! bounded worker pool. Results join at a barrier and are appended in
//! request order regardless of completion order. A single call's failure
//! becomes an error-tagged result for that id only.

use crate::models::{ToolInvocationRequest, ToolResult};
use crate::tools::ToolRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Default upper bound on concurrent tool calls within one turn
const DEFAULT_MAX_WIDTH: usize = 8;

/// Default per-call timeout
const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes one turn's requests against the registry
pub struct ToolDispatcher {
    registry: Arc<ToolRegistry>,
    max_width: usize,
    call_timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            max_width: DEFAULT_MAX_WIDTH,
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_max_width(mut self, width: usize) -> Self {
        self.max_width = width.max(1);
        self
    }

    /// Execute every request for the current turn, producing exactly one
    /// result per request, in request order.
    pub async fn dispatch(&self, requests: &[ToolInvocationRequest]) -> Vec<ToolResult> {
        let width = self.max_width.min(requests.len()).max(1);
        let permits = Arc::new(Semaphore::new(width));

        debug!(
            request_count = requests.len(),
            width, "Dispatching tool requests"
        );

        let handles: Vec<_> = requests
            .iter()
            .cloned()
            .map(|request| {
                let registry = Arc::clone(&self.registry);
                let permits = Arc::clone(&permits);
                let call_timeout = self.call_timeout;

                tokio::spawn(async move {
                    // Semaphore is never closed while handles are live.
                    let _permit = permits.acquire_owned().await.expect("dispatch pool closed");
                    execute_one(&registry, &request, call_timeout).await
                })
            })
            .collect();

        // Barrier: join every outstanding call before returning. Awaiting
        // handles in issue order yields results in request order.
        let mut results = Vec::with_capacity(requests.len());
        for (handle, request) in handles.into_iter().zip(requests) {
            let result = match handle.await {
                Ok(result) => result,
                Err(e) => {
                    warn!(
                        request_id = %request.request_id,
                        tool_name = %request.tool_name,
                        error = %e,
                        "Tool task aborted"
                    );
                    ToolResult::failure(request, format!("Tool task aborted: {}", e))
                }
            };
            results.push(result);
        }

        results
    }
}

async fn execute_one(
    registry: &ToolRegistry,
    request: &ToolInvocationRequest,
    call_timeout: Duration,
) -> ToolResult {
    let tool = match registry.resolve(&request.tool_name, &request.arguments) {
        Ok(tool) => tool,
        Err(e) => {
            warn!(
                request_id = %request.request_id,
                tool_name = %request.tool_name,
                error = %e,
                "Tool resolution failed"
            );
            return ToolResult::failure(request, e.to_string());
        }
    };

    match tokio::time::timeout(call_timeout, tool.execute(&request.arguments)).await {
        Ok(Ok(payload)) => ToolResult::success(request, payload),
        Ok(Err(e)) => {
            warn!(
                request_id = %request.request_id,
                tool_name = %request.tool_name,
                error = %e,
                "Tool execution failed"
            );
            ToolResult::failure(request, e.to_string())
        }
        Err(_) => {
            warn!(
                request_id = %request.request_id,
                tool_name = %request.tool_name,
                timeout_ms = call_timeout.as_millis() as u64,
                "Tool call timed out"
            );
            ToolResult::failure(
                request,
                format!("Tool call timed out after {:?}", call_timeout),
            )
        }
    }
}
