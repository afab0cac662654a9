//! Finalize node
//!
//! Pure post-processing of the accumulated conversation into the final
//! result payload. No external calls and no semantic parsing of free text;
//! structured extraction belongs to the presentation collaborator.

use crate::models::{EntryRole, FinalState, MachineState, SessionState};

/// Produce the final payload: the last free-text reasoning entry as the
/// primary result, plus the structured records collected during the run.
pub fn finalize(state: &SessionState) -> FinalState {
    let result_text = state
        .conversation
        .iter()
        .rev()
        .filter(|entry| entry.role == EntryRole::Reasoner)
        .find_map(|entry| entry.as_text())
        .unwrap_or("Analysis completed.")
        .to_string();

    FinalState {
        result_text,
        recommendations: state.recommendations.clone(),
        machine_state: MachineState::Done,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{merge_entries, ConversationEntry, RiskProfile};
    use serde_json::json;

    #[test]
    fn test_last_reasoner_text_wins() {
        let state =
            SessionState::new("s-1", 10_000.0, RiskProfile::Moderate, "advise me").unwrap();
        let state = merge_entries(
            state,
            vec![
                ConversationEntry::reasoner_text("interim thinking"),
                ConversationEntry::reasoner_text("Buy broad index funds."),
            ],
        );

        let final_state = finalize(&state);
        assert_eq!(final_state.result_text, "Buy broad index funds.");
        assert_eq!(final_state.machine_state, MachineState::Done);
    }

    #[test]
    fn test_user_text_is_not_the_result() {
        let state = SessionState::new("s-1", 10_000.0, RiskProfile::Moderate, "hello").unwrap();
        let final_state = finalize(&state);
        assert_eq!(final_state.result_text, "Analysis completed.");
    }

    #[test]
    fn test_recommendations_pass_through_in_order() {
        let mut state =
            SessionState::new("s-1", 10_000.0, RiskProfile::Moderate, "advise me").unwrap();
        state.recommendations = vec![json!({"stocks": 6000.0}), json!({"symbol": "SPY"})];
        let state = merge_entries(state, vec![ConversationEntry::reasoner_text("Done")]);

        let final_state = finalize(&state);
        assert_eq!(final_state.recommendations.len(), 2);
        assert_eq!(final_state.recommendations[0], json!({"stocks": 6000.0}));
    }
}
