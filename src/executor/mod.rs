//! Graph executor - the top-level state machine
//!
//! START → REASON ⇄ DISPATCH, REASON → FINALIZE → DONE, with FAILED as the
//! fatal sink. Every transition is checkpointed before the next is
//! attempted, so a crash between transitions loses at most one step.

use crate::checkpoint::{snapshot, verify_integrity, CheckpointStore};
use crate::dispatch::ToolDispatcher;
use crate::error::OrchestrationError;
use crate::finalize::finalize;
use crate::models::{
    merge_entries, ConversationEntry, FinalState, MachineState, RiskProfile, SessionState,
    ToolInvocationRequest, ToolResultStatus,
};
use crate::provider::{invoke_with_retry, ReasoningProvider, RetryPolicy};
use crate::routing::{Route, RoutingPolicy};
use crate::tools::{ToolContract, ToolRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Executor limits and budgets, injected at construction
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Maximum reason/dispatch cycles before the session is forcibly failed.
    pub max_iterations: u32,
    pub retry: RetryPolicy,
    pub tool_call_timeout: Duration,
    pub dispatch_width: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            retry: RetryPolicy::default(),
            tool_call_timeout: Duration::from_secs(10),
            dispatch_width: 8,
        }
    }
}

/// Typed failure paired with the best-available partial state
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct SessionFailure {
    #[source]
    pub error: OrchestrationError,
    pub state: Option<Box<SessionState>>,
}

impl SessionFailure {
    fn new(error: OrchestrationError, state: Option<SessionState>) -> Self {
        Self {
            error,
            state: state.map(Box::new),
        }
    }
}

pub type RunResult = std::result::Result<FinalState, SessionFailure>;

/// Sequences reasoning, routing, dispatch, checkpointing, and finalize for
/// independent, isolated sessions.
pub struct GraphExecutor {
    provider: Arc<dyn ReasoningProvider>,
    registry: Arc<ToolRegistry>,
    dispatcher: ToolDispatcher,
    checkpoint_store: Arc<dyn CheckpointStore>,
    config: ExecutorConfig,
    cancellations: RwLock<HashMap<String, CancellationToken>>,
}

impl GraphExecutor {
    pub fn new(
        provider: Arc<dyn ReasoningProvider>,
        registry: Arc<ToolRegistry>,
        checkpoint_store: Arc<dyn CheckpointStore>,
        config: ExecutorConfig,
    ) -> Self {
        let dispatcher = ToolDispatcher::new(Arc::clone(&registry))
            .with_call_timeout(config.tool_call_timeout)
            .with_max_width(config.dispatch_width);

        Self {
            provider,
            registry,
            dispatcher,
            checkpoint_store,
            config,
            cancellations: RwLock::new(HashMap::new()),
        }
    }

    /// Public entry point: validate parameters, build the initial state,
    /// and run. Validation failures are rejected before any reasoning call.
    pub async fn run_session(
        &self,
        session_id: &str,
        investment_amount: f64,
        risk_profile: &str,
        initial_prompt: &str,
    ) -> RunResult {
        let profile = RiskProfile::parse(risk_profile)
            .map_err(|e| SessionFailure::new(e, None))?;
        let state = SessionState::new(session_id, investment_amount, profile, initial_prompt)
            .map_err(|e| SessionFailure::new(e, None))?;

        self.run(state).await
    }

    /// Run a session from a prepared initial state. An existing checkpoint
    /// for the session id takes precedence over `initial_state` (idempotent
    /// resumption).
    pub async fn run(&self, initial_state: SessionState) -> RunResult {
        let session_id = initial_state.session_id.clone();

        let state = match self.checkpoint_store.get(&session_id).await {
            Ok(Some(record)) => {
                if !verify_integrity(&record) {
                    return Err(SessionFailure::new(
                        OrchestrationError::CheckpointError(format!(
                            "Checkpoint for '{}' failed integrity verification",
                            session_id
                        )),
                        Some(initial_state),
                    ));
                }
                info!(
                    session_id = %session_id,
                    machine_state = %record.machine_state,
                    iteration = record.iteration_count,
                    "Resuming session from checkpoint"
                );
                record.state
            }
            Ok(None) => initial_state,
            Err(e) => return Err(SessionFailure::new(e, Some(initial_state))),
        };

        let token = CancellationToken::new();
        {
            let mut cancellations = self.cancellations.write().await;
            cancellations.insert(session_id.clone(), token.clone());
        }

        let result = self.drive(state, &token).await;

        let mut cancellations = self.cancellations.write().await;
        cancellations.remove(&session_id);

        result
    }

    /// Request cancellation of a running session. Observed at the next
    /// transition boundary; in-flight tool calls drain first.
    pub async fn cancel(&self, session_id: &str) -> bool {
        let cancellations = self.cancellations.read().await;
        match cancellations.get(session_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    async fn drive(&self, mut state: SessionState, token: &CancellationToken) -> RunResult {
        let contracts: Vec<ToolContract> = self.registry.contracts();

        info!(
            session_id = %state.session_id,
            amount = state.investment_amount,
            risk_profile = %state.risk_profile,
            "Executor: starting session"
        );

        loop {
            match state.machine_state {
                MachineState::Start => {
                    state.machine_state = MachineState::Reason;
                    if let Err(e) = self.checkpoint(&state).await {
                        return Err(SessionFailure::new(e, Some(state)));
                    }
                }

                MachineState::Reason => {
                    if token.is_cancelled() {
                        return self.cancelled(state);
                    }
                    if state.iteration_count >= self.config.max_iterations {
                        return self
                            .fail(
                                state,
                                OrchestrationError::LoopLimitExceeded(format!(
                                    "Exceeded {} reasoning iterations",
                                    self.config.max_iterations
                                )),
                            )
                            .await;
                    }
                    state.iteration_count += 1;

                    debug!(
                        session_id = %state.session_id,
                        iteration = state.iteration_count,
                        "Reasoning step"
                    );

                    let entry = match invoke_with_retry(
                        self.provider.as_ref(),
                        &state.conversation,
                        &contracts,
                        self.config.retry,
                    )
                    .await
                    {
                        Ok(entry) => entry,
                        Err(e) => return self.fail(state, e).await,
                    };

                    state = merge_entries(state, vec![entry]);

                    let route = state
                        .last_entry()
                        .map(RoutingPolicy::decide)
                        .unwrap_or(Route::Finalize);
                    state.machine_state = match route {
                        Route::Tools => MachineState::Dispatch,
                        Route::Finalize => MachineState::Finalize,
                    };

                    if let Err(e) = self.checkpoint(&state).await {
                        return Err(SessionFailure::new(e, Some(state)));
                    }
                }

                MachineState::Dispatch => {
                    if token.is_cancelled() {
                        return self.cancelled(state);
                    }

                    let requests: Vec<ToolInvocationRequest> = state
                        .last_entry()
                        .and_then(ConversationEntry::tool_requests)
                        .map(|requests| requests.to_vec())
                        .unwrap_or_default();

                    debug!(
                        session_id = %state.session_id,
                        request_count = requests.len(),
                        "Dispatch step"
                    );

                    let results = self.dispatcher.dispatch(&requests).await;

                    let mut entries = Vec::with_capacity(results.len());
                    for result in results {
                        if result.status == ToolResultStatus::Success {
                            state.recommendations.push(result.payload.clone());
                        }
                        entries.push(ConversationEntry::tool_result(result));
                    }
                    state = merge_entries(state, entries);

                    state.machine_state = MachineState::Reason;
                    if let Err(e) = self.checkpoint(&state).await {
                        return Err(SessionFailure::new(e, Some(state)));
                    }
                }

                MachineState::Finalize => {
                    if token.is_cancelled() {
                        return self.cancelled(state);
                    }

                    let final_state = finalize(&state);
                    state.machine_state = MachineState::Done;
                    if let Err(e) = self.checkpoint(&state).await {
                        return Err(SessionFailure::new(e, Some(state)));
                    }

                    info!(
                        session_id = %state.session_id,
                        iterations = state.iteration_count,
                        recommendations = final_state.recommendations.len(),
                        "Session complete"
                    );
                    return Ok(final_state);
                }

                // Resumed terminal states: re-finalizing a Done snapshot is
                // idempotent; a Failed snapshot reports its recorded reason.
                MachineState::Done => return Ok(finalize(&state)),

                MachineState::Failed => {
                    let reason = state
                        .failure_reason
                        .clone()
                        .unwrap_or_else(|| "no failure reason recorded".to_string());
                    return Err(SessionFailure::new(
                        OrchestrationError::SessionFailed(reason),
                        Some(state),
                    ));
                }
            }
        }
    }

    async fn checkpoint(&self, state: &SessionState) -> crate::Result<()> {
        self.checkpoint_store.put(snapshot(state)).await
    }

    /// Route to FAILED, recording the reason so a later resume can report
    /// it, and return the typed error with the partial state.
    async fn fail(&self, mut state: SessionState, error: OrchestrationError) -> RunResult {
        warn!(
            session_id = %state.session_id,
            error = %error,
            "Session failed"
        );

        state.machine_state = MachineState::Failed;
        state.failure_reason = Some(error.to_string());
        if let Err(checkpoint_error) = self.checkpoint(&state).await {
            warn!(
                session_id = %state.session_id,
                error = %checkpoint_error,
                "Could not checkpoint failed session"
            );
        }

        Err(SessionFailure::new(error, Some(state)))
    }

    /// Cancellation leaves the last checkpoint untouched so the session
    /// can be resumed later.
    fn cancelled(&self, state: SessionState) -> RunResult {
        info!(session_id = %state.session_id, "Session cancelled");
        let message = format!("Session '{}' cancelled by caller", state.session_id);
        Err(SessionFailure::new(
            OrchestrationError::Cancelled(message),
            Some(state),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::{CheckpointStore, InMemoryCheckpointStore};
    use crate::models::CheckpointRecord;
    use crate::provider::{ScriptedProvider, ScriptedTurn};
    use crate::tools::create_default_registry;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn allocation_request() -> ToolInvocationRequest {
        ToolInvocationRequest {
            request_id: "req-alloc".to_string(),
            tool_name: "calculate_portfolio_allocation".to_string(),
            arguments: json!({"amount": 10_000.0, "risk_profile": "moderate"}),
        }
    }

    fn quote_request(id: &str, symbol: &str) -> ToolInvocationRequest {
        ToolInvocationRequest {
            request_id: id.to_string(),
            tool_name: "get_stock_quote".to_string(),
            arguments: json!({"symbol": symbol}),
        }
    }

    fn executor_with(
        provider: Arc<ScriptedProvider>,
        store: Arc<dyn CheckpointStore>,
    ) -> GraphExecutor {
        let config = ExecutorConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                base_backoff: Duration::from_millis(1),
            },
            ..ExecutorConfig::default()
        };
        GraphExecutor::new(
            provider,
            Arc::new(create_default_registry()),
            store,
            config,
        )
    }

    /// Store that records the conversation length of every written record.
    struct RecordingStore {
        inner: InMemoryCheckpointStore,
        lengths: Mutex<Vec<usize>>,
        records: Mutex<Vec<CheckpointRecord>>,
    }

    impl RecordingStore {
        fn new() -> Self {
            Self {
                inner: InMemoryCheckpointStore::new(),
                lengths: Mutex::new(Vec::new()),
                records: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CheckpointStore for RecordingStore {
        async fn put(&self, record: CheckpointRecord) -> crate::Result<()> {
            self.lengths
                .lock()
                .unwrap()
                .push(record.state.conversation.len());
            self.records.lock().unwrap().push(record.clone());
            self.inner.put(record).await
        }

        async fn get(&self, session_id: &str) -> crate::Result<Option<CheckpointRecord>> {
            self.inner.get(session_id).await
        }

        async fn delete(&self, session_id: &str) -> crate::Result<()> {
            self.inner.delete(session_id).await
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    #[async_trait]
    impl CheckpointStore for BrokenStore {
        async fn put(&self, _record: CheckpointRecord) -> crate::Result<()> {
            Err(OrchestrationError::CheckpointError(
                "disk unavailable".to_string(),
            ))
        }

        async fn get(&self, _session_id: &str) -> crate::Result<Option<CheckpointRecord>> {
            Ok(None)
        }

        async fn delete(&self, _session_id: &str) -> crate::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_scenario_allocation_then_done() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedTurn::Requests(vec![allocation_request()]),
            ScriptedTurn::Text("Done".to_string()),
        ]));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let executor = executor_with(Arc::clone(&provider), store.clone());

        let final_state = executor
            .run_session("sess-scenario", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap();

        assert_eq!(final_state.result_text, "Done");
        assert_eq!(final_state.machine_state, MachineState::Done);
        assert_eq!(final_state.recommendations.len(), 1);
        assert_eq!(
            final_state.recommendations[0]["allocation"]["stocks"],
            json!(6000.0)
        );

        let record = store.get("sess-scenario").await.unwrap().unwrap();
        assert_eq!(record.machine_state, MachineState::Done);
        assert_eq!(record.iteration_count, 2);
        // user prompt, tool requests, tool result, final text
        assert_eq!(record.state.conversation.len(), 4);
    }

    #[tokio::test]
    async fn test_invalid_risk_profile_rejected_before_reasoning() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::Text(
            "never reached".to_string(),
        )]));
        let executor = executor_with(
            Arc::clone(&provider),
            Arc::new(InMemoryCheckpointStore::new()),
        );

        let failure = executor
            .run_session("sess-bad", 10_000.0, "speculative", "Advise me")
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            OrchestrationError::ConfigurationError(_)
        ));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_loop_limit_bounds_reasoning_visits() {
        let turns: Vec<ScriptedTurn> = (0..20)
            .map(|i| {
                ScriptedTurn::Requests(vec![ToolInvocationRequest {
                    request_id: format!("req-{}", i),
                    tool_name: "get_market_overview".to_string(),
                    arguments: json!({}),
                }])
            })
            .collect();
        let provider = Arc::new(ScriptedProvider::new(turns));
        let executor = executor_with(
            Arc::clone(&provider),
            Arc::new(InMemoryCheckpointStore::new()),
        );

        let failure = executor
            .run_session("sess-loop", 10_000.0, "aggressive", "Advise me")
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            OrchestrationError::LoopLimitExceeded(_)
        ));
        // Reasoning calls beyond the cap are never issued.
        assert_eq!(provider.calls(), 10);

        let state = failure.state.unwrap();
        assert_eq!(state.iteration_count, 10);
        assert_eq!(state.machine_state, MachineState::Failed);
        assert!(!state.conversation.is_empty());
    }

    #[tokio::test]
    async fn test_three_requests_yield_three_ordered_results() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedTurn::Requests(vec![
                quote_request("req-1", "AAPL"),
                quote_request("req-2", "MSFT"),
                quote_request("req-3", "NVDA"),
            ]),
            ScriptedTurn::Text("Done".to_string()),
        ]));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let executor = executor_with(Arc::clone(&provider), store.clone());

        executor
            .run_session("sess-three", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap();

        let record = store.get("sess-three").await.unwrap().unwrap();
        let result_ids: Vec<String> = record
            .state
            .conversation
            .iter()
            .filter_map(|e| match &e.content {
                crate::models::EntryContent::ToolResult { result } => {
                    Some(result.request_id.clone())
                }
                _ => None,
            })
            .collect();

        assert_eq!(result_ids, vec!["req-1", "req-2", "req-3"]);
    }

    #[tokio::test]
    async fn test_partial_tool_failure_does_not_abort_session() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedTurn::Requests(vec![
                quote_request("req-1", "AAPL"),
                ToolInvocationRequest {
                    request_id: "req-2".to_string(),
                    tool_name: "unknown_tool".to_string(),
                    arguments: json!({}),
                },
                quote_request("req-3", "MSFT"),
            ]),
            ScriptedTurn::Text("Done".to_string()),
        ]));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let executor = executor_with(Arc::clone(&provider), store.clone());

        let final_state = executor
            .run_session("sess-partial", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap();

        assert_eq!(final_state.machine_state, MachineState::Done);
        // Only the two successful payloads become recommendation records.
        assert_eq!(final_state.recommendations.len(), 2);

        let record = store.get("sess-partial").await.unwrap().unwrap();
        let statuses: Vec<ToolResultStatus> = record
            .state
            .conversation
            .iter()
            .filter_map(|e| match &e.content {
                crate::models::EntryContent::ToolResult { result } => Some(result.status),
                _ => None,
            })
            .collect();
        assert_eq!(
            statuses,
            vec![
                ToolResultStatus::Success,
                ToolResultStatus::Error,
                ToolResultStatus::Success,
            ]
        );
    }

    #[tokio::test]
    async fn test_text_only_turn_skips_dispatcher() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::Text(
            "Put it all in index funds.".to_string(),
        )]));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let executor = executor_with(Arc::clone(&provider), store.clone());

        let final_state = executor
            .run_session("sess-direct", 10_000.0, "conservative", "Advise me")
            .await
            .unwrap();

        assert_eq!(final_state.result_text, "Put it all in index funds.");
        assert!(final_state.recommendations.is_empty());

        let record = store.get("sess-direct").await.unwrap().unwrap();
        assert_eq!(record.iteration_count, 1);
        // user prompt + single reasoner entry; no tool traffic at all
        assert_eq!(record.state.conversation.len(), 2);
    }

    #[tokio::test]
    async fn test_conversation_growth_is_monotonic_across_transitions() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedTurn::Requests(vec![quote_request("req-1", "SPY")]),
            ScriptedTurn::Requests(vec![quote_request("req-2", "BND")]),
            ScriptedTurn::Text("Done".to_string()),
        ]));
        let store = Arc::new(RecordingStore::new());
        let executor = executor_with(Arc::clone(&provider), store.clone());

        executor
            .run_session("sess-monotonic", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap();

        let lengths = store.lengths.lock().unwrap().clone();
        assert!(!lengths.is_empty());
        assert!(
            lengths.windows(2).all(|w| w[0] <= w[1]),
            "conversation shrank across a transition: {:?}",
            lengths
        );
    }

    #[tokio::test]
    async fn test_resume_from_checkpoint_matches_uninterrupted_run() {
        // Uninterrupted reference run.
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedTurn::Requests(vec![allocation_request()]),
            ScriptedTurn::Text("Done".to_string()),
        ]));
        let reference_store = Arc::new(RecordingStore::new());
        let executor = executor_with(Arc::clone(&provider), reference_store.clone());
        let reference = executor
            .run_session("sess-resume", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap();

        // Simulate a crash after the dispatch transition: seed a fresh store
        // with the mid-run checkpoint (back at REASON, tool results merged)
        // and continue with only the remaining scripted turn.
        let mid_run = reference_store
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| {
                r.machine_state == MachineState::Reason && r.state.conversation.len() == 3
            })
            .cloned()
            .expect("mid-run checkpoint present");

        let resumed_store = Arc::new(InMemoryCheckpointStore::new());
        resumed_store.put(mid_run).await.unwrap();

        let resumed_provider = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::Text(
            "Done".to_string(),
        )]));
        let resumed_executor = executor_with(Arc::clone(&resumed_provider), resumed_store);

        let resumed = resumed_executor
            .run_session("sess-resume", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap();

        assert_eq!(resumed.result_text, reference.result_text);
        assert_eq!(resumed.recommendations, reference.recommendations);
        assert_eq!(resumed.machine_state, reference.machine_state);
    }

    #[tokio::test]
    async fn test_resuming_done_session_is_idempotent() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::Text(
            "Done".to_string(),
        )]));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let executor = executor_with(Arc::clone(&provider), store.clone());

        let first = executor
            .run_session("sess-idem", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap();

        // Second run resumes the Done checkpoint; the exhausted script would
        // fail if another reasoning call were issued.
        let second = executor
            .run_session("sess-idem", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap();

        assert_eq!(provider.calls(), 1);
        assert_eq!(first.result_text, second.result_text);
    }

    #[tokio::test]
    async fn test_provider_failure_preserves_checkpoint() {
        let provider = Arc::new(ScriptedProvider::new(vec![
            ScriptedTurn::Requests(vec![quote_request("req-1", "AAPL")]),
            ScriptedTurn::FatalError("provider melted".to_string()),
        ]));
        let store = Arc::new(InMemoryCheckpointStore::new());
        let executor = executor_with(Arc::clone(&provider), store.clone());

        let failure = executor
            .run_session("sess-provider", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            OrchestrationError::ProviderFailure(_)
        ));

        let record = store.get("sess-provider").await.unwrap().unwrap();
        assert_eq!(record.machine_state, MachineState::Failed);
        // First turn's traffic survived in the checkpointed conversation.
        assert_eq!(record.state.conversation.len(), 3);
    }

    #[tokio::test]
    async fn test_checkpoint_write_failure_is_fatal() {
        let provider = Arc::new(ScriptedProvider::new(vec![ScriptedTurn::Text(
            "never reached".to_string(),
        )]));
        let executor = executor_with(Arc::clone(&provider), Arc::new(BrokenStore));

        let failure = executor
            .run_session("sess-broken", 10_000.0, "moderate", "Advise me")
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            OrchestrationError::CheckpointError(_)
        ));
        // The START→REASON checkpoint fails before any reasoning call.
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancellation_observed_at_transition_boundary() {
        struct SlowThenRequests;

        #[async_trait]
        impl ReasoningProvider for SlowThenRequests {
            async fn invoke(
                &self,
                _conversation: &[ConversationEntry],
                _tool_contracts: &[ToolContract],
            ) -> crate::Result<ConversationEntry> {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(ConversationEntry::reasoner_requests(vec![
                    ToolInvocationRequest {
                        request_id: "req-1".to_string(),
                        tool_name: "get_market_overview".to_string(),
                        arguments: json!({}),
                    },
                ]))
            }
        }

        let executor = Arc::new(GraphExecutor::new(
            Arc::new(SlowThenRequests),
            Arc::new(create_default_registry()),
            Arc::new(InMemoryCheckpointStore::new()),
            ExecutorConfig::default(),
        ));

        let runner = Arc::clone(&executor);
        let handle = tokio::spawn(async move {
            runner
                .run_session("sess-cancel", 10_000.0, "moderate", "Advise me")
                .await
        });

        // Let the session enter its first reasoning call, then cancel; the
        // cancellation is observed at the next transition boundary.
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(executor.cancel("sess-cancel").await);

        let failure = handle.await.unwrap().unwrap_err();
        assert!(matches!(failure.error, OrchestrationError::Cancelled(_)));
    }
}
