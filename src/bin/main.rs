use investment_advisor_orchestrator::{
    api::build_initial_prompt,
    checkpoint::InMemoryCheckpointStore,
    executor::{ExecutorConfig, GraphExecutor},
    models::{RiskProfile, ToolInvocationRequest},
    provider::{OpenAiProvider, ReasoningProvider, ScriptedProvider, ScriptedTurn},
    tools::create_default_registry,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Offline script mirroring a typical advisory run, used when no provider
/// credentials are configured.
fn demo_script(amount: f64, risk_profile: RiskProfile) -> Arc<ScriptedProvider> {
    Arc::new(ScriptedProvider::new(vec![
        ScriptedTurn::Requests(vec![
            ToolInvocationRequest {
                request_id: "req-overview".to_string(),
                tool_name: "get_market_overview".to_string(),
                arguments: serde_json::json!({}),
            },
            ToolInvocationRequest {
                request_id: "req-alloc".to_string(),
                tool_name: "calculate_portfolio_allocation".to_string(),
                arguments: serde_json::json!({
                    "amount": amount,
                    "risk_profile": risk_profile.to_string(),
                }),
            },
        ]),
        ScriptedTurn::Text(format!(
            "Based on current market conditions, allocate your ${:.2} according to the \
             {} profile shown in the attached allocation table.",
            amount, risk_profile
        )),
    ]))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    dotenv::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let amount: f64 = args.get(1).map(|a| a.parse()).transpose()?.unwrap_or(10_000.0);
    let risk_profile_arg = args
        .get(2)
        .cloned()
        .unwrap_or_else(|| "moderate".to_string());

    let risk_profile = match RiskProfile::parse(&risk_profile_arg) {
        Ok(profile) => profile,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    info!("Investment Advisor Orchestrator starting");

    let provider: Arc<dyn ReasoningProvider> = match OpenAiProvider::from_env() {
        Ok(provider) => {
            info!("Using chat-completions reasoning provider");
            Arc::new(provider)
        }
        Err(_) => {
            info!("OPENAI_API_KEY not set, using scripted demo provider");
            demo_script(amount, risk_profile)
        }
    };

    let executor = GraphExecutor::new(
        provider,
        Arc::new(create_default_registry()),
        Arc::new(InMemoryCheckpointStore::new()),
        ExecutorConfig::default(),
    );

    let session_id = Uuid::new_v4().to_string();
    let prompt = build_initial_prompt(amount, risk_profile);

    info!(
        session_id = %session_id,
        amount,
        risk_profile = %risk_profile,
        "Running advisory session"
    );

    match executor
        .run_session(&session_id, amount, &risk_profile_arg, &prompt)
        .await
    {
        Ok(final_state) => {
            println!("\n=== INVESTMENT RECOMMENDATION ===");
            println!("{}", final_state.result_text);
            if !final_state.recommendations.is_empty() {
                println!("\nStructured records:");
                for record in &final_state.recommendations {
                    println!("  {}", serde_json::to_string_pretty(record)?);
                }
            }
            Ok(())
        }
        Err(failure) => {
            eprintln!("Advisory run failed: {}", failure);
            if let Some(state) = &failure.state {
                eprintln!(
                    "Partial state: {} conversation entries, iteration {}",
                    state.conversation.len(),
                    state.iteration_count
                );
            }
            Err(Box::new(failure) as Box<dyn std::error::Error>)
        }
    }
}
