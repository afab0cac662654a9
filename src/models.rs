//! Core data model for the advisory orchestration engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

use crate::error::OrchestrationError;
use crate::Result;

//
// ================= Enums =================
//

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RiskProfile {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskProfile {
    /// Parse a caller-supplied profile string. Unknown values are a
    /// configuration error, rejected before any reasoning call is made.
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "conservative" => Ok(RiskProfile::Conservative),
            "moderate" => Ok(RiskProfile::Moderate),
            "aggressive" => Ok(RiskProfile::Aggressive),
            other => Err(OrchestrationError::ConfigurationError(format!(
                "Unsupported risk profile '{}': use conservative, moderate, or aggressive",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    User,
    Reasoner,
    Tool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MachineState {
    Start,
    Reason,
    Dispatch,
    Finalize,
    Done,
    Failed,
}

impl MachineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MachineState::Done | MachineState::Failed)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ToolResultStatus {
    Success,
    Error,
}

//
// ================= Tool I/O =================
//

/// A discrete request from the reasoning step to execute a named capability.
/// Produced only by the reasoning step; matched to exactly one `ToolResult`
/// by `request_id` before the next reasoning call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocationRequest {
    pub request_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Outcome of one tool invocation. Produced only by the dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub request_id: String,
    pub tool_name: String,
    pub status: ToolResultStatus,
    pub payload: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(request: &ToolInvocationRequest, payload: Value) -> Self {
        Self {
            request_id: request.request_id.clone(),
            tool_name: request.tool_name.clone(),
            status: ToolResultStatus::Success,
            payload,
            error: None,
        }
    }

    pub fn failure(request: &ToolInvocationRequest, detail: String) -> Self {
        Self {
            request_id: request.request_id.clone(),
            tool_name: request.tool_name.clone(),
            status: ToolResultStatus::Error,
            payload: Value::Null,
            error: Some(detail),
        }
    }
}

//
// ================= Conversation =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntryContent {
    Text { text: String },
    ToolRequests { requests: Vec<ToolInvocationRequest> },
    ToolResult { result: ToolResult },
}

/// One item in the append-only conversation. The sequence is never mutated
/// or reordered after append; growth is monotonic.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationEntry {
    pub entry_id: Uuid,
    pub role: EntryRole,
    pub content: EntryContent,
}

impl ConversationEntry {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            role: EntryRole::User,
            content: EntryContent::Text { text: text.into() },
        }
    }

    pub fn reasoner_text(text: impl Into<String>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            role: EntryRole::Reasoner,
            content: EntryContent::Text { text: text.into() },
        }
    }

    pub fn reasoner_requests(requests: Vec<ToolInvocationRequest>) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            role: EntryRole::Reasoner,
            content: EntryContent::ToolRequests { requests },
        }
    }

    pub fn tool_result(result: ToolResult) -> Self {
        Self {
            entry_id: Uuid::new_v4(),
            role: EntryRole::Tool,
            content: EntryContent::ToolResult { result },
        }
    }

    /// Tool requests carried by this entry, if any.
    pub fn tool_requests(&self) -> Option<&[ToolInvocationRequest]> {
        match &self.content {
            EntryContent::ToolRequests { requests } => Some(requests),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.content {
            EntryContent::Text { text } => Some(text),
            _ => None,
        }
    }
}

//
// ================= Session State =================
//

/// Complete state of one advisory session. Owned exclusively by the
/// executing session; mutated only through pure transition functions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: String,
    pub conversation: Vec<ConversationEntry>,
    pub investment_amount: f64,
    pub risk_profile: RiskProfile,
    /// Opaque structured records collected incidentally during the run.
    pub recommendations: Vec<Value>,
    pub machine_state: MachineState,
    pub iteration_count: u32,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

impl SessionState {
    /// Validate session parameters and build the initial state.
    pub fn new(
        session_id: impl Into<String>,
        investment_amount: f64,
        risk_profile: RiskProfile,
        initial_prompt: impl Into<String>,
    ) -> Result<Self> {
        let session_id = session_id.into();
        if session_id.trim().is_empty() {
            return Err(OrchestrationError::ConfigurationError(
                "Session id must not be empty".to_string(),
            ));
        }
        if !investment_amount.is_finite() || investment_amount <= 0.0 {
            return Err(OrchestrationError::ConfigurationError(format!(
                "Investment amount must be a positive number, got {}",
                investment_amount
            )));
        }

        Ok(Self {
            session_id,
            conversation: vec![ConversationEntry::user(initial_prompt)],
            investment_amount,
            risk_profile,
            recommendations: Vec::new(),
            machine_state: MachineState::Start,
            iteration_count: 0,
            failure_reason: None,
        })
    }

    pub fn last_entry(&self) -> Option<&ConversationEntry> {
        self.conversation.last()
    }
}

/// Pure append-only merge: the new state is the old state with `new_entries`
/// concatenated onto the conversation. Existing entries are never touched.
pub fn merge_entries(mut state: SessionState, new_entries: Vec<ConversationEntry>) -> SessionState {
    state.conversation.extend(new_entries);
    state
}

//
// ================= Checkpoint =================
//

/// Persisted snapshot of a session, one per transition. Opaque to external
/// consumers beyond the documented fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub session_id: String,
    pub machine_state: MachineState,
    pub state: SessionState,
    pub iteration_count: u32,
    pub state_hash: String,
    pub timestamp: DateTime<Utc>,
}

//
// ================= Final Result =================
//

/// Output consumed downstream. Structured-field extraction from
/// `result_text` belongs to the presentation collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalState {
    pub result_text: String,
    pub recommendations: Vec<Value>,
    pub machine_state: MachineState,
}

impl fmt::Display for RiskProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskProfile::Conservative => "conservative",
            RiskProfile::Moderate => "moderate",
            RiskProfile::Aggressive => "aggressive",
        };
        write!(f, "{}", s)
    }
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MachineState::Start => "start",
            MachineState::Reason => "reason",
            MachineState::Dispatch => "dispatch",
            MachineState::Finalize => "finalize",
            MachineState::Done => "done",
            MachineState::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_risk_profile_parsing() {
        assert_eq!(
            RiskProfile::parse("moderate").unwrap(),
            RiskProfile::Moderate
        );
        assert_eq!(
            RiskProfile::parse(" Conservative ").unwrap(),
            RiskProfile::Conservative
        );
        assert!(matches!(
            RiskProfile::parse("speculative"),
            Err(OrchestrationError::ConfigurationError(_))
        ));
    }

    #[test]
    fn test_session_state_rejects_bad_amounts() {
        for amount in [0.0, -100.0, f64::NAN, f64::INFINITY] {
            let state = SessionState::new("s-1", amount, RiskProfile::Moderate, "advise me");
            assert!(matches!(
                state,
                Err(OrchestrationError::ConfigurationError(_))
            ));
        }
    }

    #[test]
    fn test_merge_entries_is_pure_concatenation() {
        let state = SessionState::new("s-1", 10_000.0, RiskProfile::Moderate, "hello").unwrap();
        let before: Vec<Uuid> = state.conversation.iter().map(|e| e.entry_id).collect();

        let merged = merge_entries(
            state,
            vec![
                ConversationEntry::reasoner_text("thinking"),
                ConversationEntry::reasoner_text("more"),
            ],
        );

        assert_eq!(merged.conversation.len(), 3);
        let prefix: Vec<Uuid> = merged.conversation[..1].iter().map(|e| e.entry_id).collect();
        assert_eq!(prefix, before);
    }

    #[test]
    fn test_entry_content_roundtrip() {
        let entry = ConversationEntry::reasoner_requests(vec![ToolInvocationRequest {
            request_id: "req-1".to_string(),
            tool_name: "get_stock_quote".to_string(),
            arguments: json!({"symbol": "AAPL"}),
        }]);

        let serialized = serde_json::to_string(&entry).unwrap();
        let deserialized: ConversationEntry = serde_json::from_str(&serialized).unwrap();
        assert_eq!(entry, deserialized);
        assert_eq!(deserialized.tool_requests().unwrap().len(), 1);
    }
}
