//! OpenAI-compatible chat-completions provider
//!
//! Speaks the tool-calling wire format over a long-lived pooled client.
//! Transient HTTP conditions (timeouts, 429, 5xx) surface as retryable
//! errors; everything else is fatal for the session.

use crate::error::OrchestrationError;
use crate::models::{ConversationEntry, EntryContent, EntryRole, ToolInvocationRequest};
use crate::provider::ReasoningProvider;
use crate::tools::ToolContract;
use crate::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::env;
use std::time::Duration;
use tracing::{error, info};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Reusable chat-completions client (connection-pooled)
pub struct OpenAiProvider {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    temperature: f32,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model,
            temperature: 0.2,
        }
    }

    /// Build from `OPENAI_API_KEY`, `OPENAI_MODEL`, and `OPENAI_ENDPOINT`.
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            OrchestrationError::ConfigurationError("OPENAI_API_KEY not configured".to_string())
        })?;
        let model = env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());

        let mut provider = Self::new(api_key, model);
        if let Ok(endpoint) = env::var("OPENAI_ENDPOINT") {
            provider.endpoint = endpoint;
        }
        Ok(provider)
    }

    pub fn with_endpoint(mut self, endpoint: String) -> Self {
        self.endpoint = endpoint;
        self
    }
}

#[async_trait]
impl ReasoningProvider for OpenAiProvider {
    async fn invoke(
        &self,
        conversation: &[ConversationEntry],
        tool_contracts: &[ToolContract],
    ) -> Result<ConversationEntry> {
        if self.api_key.is_empty() {
            return Err(OrchestrationError::ProviderFailure(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }

        let request = ChatRequest {
            model: self.model.clone(),
            temperature: self.temperature,
            messages: to_wire_messages(conversation)?,
            tools: to_wire_tools(tool_contracts),
        };

        info!(model = %self.model, "Calling chat-completions API");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                error!("Chat-completions request failed: {}", e);
                if e.is_timeout() || e.is_connect() {
                    OrchestrationError::ProviderTransient(format!("Request failed: {}", e))
                } else {
                    OrchestrationError::ProviderFailure(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Chat-completions error response");
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(OrchestrationError::ProviderTransient(format!(
                    "Provider returned {}: {}",
                    status, body
                )));
            }
            return Err(OrchestrationError::ProviderFailure(format!(
                "Provider returned {}: {}",
                status, body
            )));
        }

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            error!("Failed to parse chat-completions response: {}", e);
            OrchestrationError::ProviderFailure(format!("Response parse error: {}", e))
        })?;

        let message = chat_response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| {
                OrchestrationError::ProviderFailure("Empty provider response".to_string())
            })?;

        from_wire_message(message, tool_contracts)
    }
}

/// Convert the conversation into chat-completions messages.
fn to_wire_messages(conversation: &[ConversationEntry]) -> Result<Vec<WireMessage>> {
    conversation
        .iter()
        .map(|entry| match (&entry.role, &entry.content) {
            (EntryRole::User, EntryContent::Text { text }) => Ok(WireMessage {
                role: "user".to_string(),
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            }),
            (EntryRole::Reasoner, EntryContent::Text { text }) => Ok(WireMessage {
                role: "assistant".to_string(),
                content: Some(text.clone()),
                tool_calls: None,
                tool_call_id: None,
            }),
            (EntryRole::Reasoner, EntryContent::ToolRequests { requests }) => Ok(WireMessage {
                role: "assistant".to_string(),
                content: None,
                tool_calls: Some(
                    requests
                        .iter()
                        .map(|r| WireToolCall {
                            id: r.request_id.clone(),
                            kind: "function".to_string(),
                            function: WireFunctionCall {
                                name: r.tool_name.clone(),
                                arguments: r.arguments.to_string(),
                            },
                        })
                        .collect(),
                ),
                tool_call_id: None,
            }),
            (EntryRole::Tool, EntryContent::ToolResult { result }) => Ok(WireMessage {
                role: "tool".to_string(),
                content: Some(match &result.error {
                    Some(detail) => serde_json::json!({ "error": detail }).to_string(),
                    None => result.payload.to_string(),
                }),
                tool_calls: None,
                tool_call_id: Some(result.request_id.clone()),
            }),
            _ => Err(OrchestrationError::ProviderFailure(format!(
                "Conversation entry {} has a role/content mismatch",
                entry.entry_id
            ))),
        })
        .collect()
}

fn to_wire_tools(contracts: &[ToolContract]) -> Option<Vec<WireTool>> {
    if contracts.is_empty() {
        return None;
    }
    Some(
        contracts
            .iter()
            .map(|c| WireTool {
                kind: "function".to_string(),
                function: WireFunction {
                    name: c.name.clone(),
                    description: c.description.clone(),
                    parameters: c.parameters.clone(),
                },
            })
            .collect(),
    )
}

/// Convert a provider message back into a conversation entry. The provider
/// must never request a tool outside the advertised contracts.
fn from_wire_message(
    message: WireMessage,
    tool_contracts: &[ToolContract],
) -> Result<ConversationEntry> {
    if let Some(tool_calls) = message.tool_calls.filter(|calls| !calls.is_empty()) {
        let requests = tool_calls
            .into_iter()
            .map(|call| {
                if !tool_contracts.iter().any(|c| c.name == call.function.name) {
                    return Err(OrchestrationError::ProviderFailure(format!(
                        "Provider requested undeclared tool '{}'",
                        call.function.name
                    )));
                }
                let arguments: Value =
                    serde_json::from_str(&call.function.arguments).map_err(|e| {
                        OrchestrationError::ProviderFailure(format!(
                            "Unparsable arguments for '{}': {}",
                            call.function.name, e
                        ))
                    })?;
                Ok(ToolInvocationRequest {
                    request_id: call.id,
                    tool_name: call.function.name,
                    arguments,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        return Ok(ConversationEntry::reasoner_requests(requests));
    }

    match message.content {
        Some(text) if !text.is_empty() => Ok(ConversationEntry::reasoner_text(text)),
        _ => Err(OrchestrationError::ProviderFailure(
            "Provider returned neither text nor tool calls".to_string(),
        )),
    }
}

//
// ================= Wire format =================
//

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    temperature: f32,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<WireTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    kind: String,
    function: WireFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct WireTool {
    #[serde(rename = "type")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize)]
struct WireFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: WireMessage,
}
