//! Routing policy
//!
//! Pure decision rule selecting the next machine state after a reasoning
//! turn. No side effects, no I/O; deterministic given the same entry.

use crate::models::ConversationEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Tools,
    Finalize,
}

/// Routing policy over the single most recent reasoning entry
pub struct RoutingPolicy;

impl RoutingPolicy {
    /// Non-empty tool-request set routes to the dispatcher; anything else
    /// routes to finalize.
    pub fn decide(entry: &ConversationEntry) -> Route {
        match entry.tool_requests() {
            Some(requests) if !requests.is_empty() => Route::Tools,
            _ => Route::Finalize,
        }
    }
}
