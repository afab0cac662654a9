//! Tool trait and registry
//!
//! Tools are deterministic, side-effect-free lookups with typed argument
//! contracts, validated before any execution attempt.

use crate::error::OrchestrationError;
use crate::models::RiskProfile;
use crate::Result;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Declared contract of a tool, advertised to the reasoning provider.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ToolContract {
    pub name: String,
    pub description: String,
    /// JSON schema for the argument object.
    pub parameters: Value,
}

/// Trait for a single tool (deterministic execution)
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON schema describing the argument object.
    fn argument_schema(&self) -> Value;
    async fn execute(&self, arguments: &Value) -> Result<Value>;

    fn contract(&self) -> ToolContract {
        ToolContract {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.argument_schema(),
        }
    }
}

/// Tool registry for contract lookup and pre-execution validation
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Contracts for every registered tool, handed to the reasoning provider.
    pub fn contracts(&self) -> Vec<ToolContract> {
        self.tools.values().map(|t| t.contract()).collect()
    }

    /// Resolve a name and validate arguments against the tool's contract.
    /// Fails before any execution attempt; the dispatcher converts the error
    /// into an error-tagged result rather than letting it cross uncaught.
    pub fn resolve(&self, name: &str, arguments: &Value) -> Result<Arc<dyn Tool>> {
        let tool = self.tools.get(name).cloned().ok_or_else(|| {
            OrchestrationError::ConfigurationError(format!("Unknown tool '{}'", name))
        })?;

        validate_arguments(name, &tool.argument_schema(), arguments)?;
        Ok(tool)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Validate an argument object against a tool's JSON schema: required keys
/// must be present and primitive types must match.
fn validate_arguments(tool_name: &str, schema: &Value, arguments: &Value) -> Result<()> {
    let args = arguments.as_object().ok_or_else(|| {
        OrchestrationError::ConfigurationError(format!(
            "Arguments for '{}' must be a JSON object",
            tool_name
        ))
    })?;

    let properties = schema
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !args.contains_key(key) {
                return Err(OrchestrationError::ConfigurationError(format!(
                    "Missing required argument '{}' for '{}'",
                    key, tool_name
                )));
            }
        }
    }

    for (key, value) in args {
        let Some(expected) = properties.get(key).and_then(|p| p.get("type")) else {
            continue;
        };
        let matches = match expected.as_str() {
            Some("string") => value.is_string(),
            Some("number") => value.is_number(),
            Some("integer") => value.is_i64() || value.is_u64(),
            Some("boolean") => value.is_boolean(),
            Some("object") => value.is_object(),
            Some("array") => value.is_array(),
            _ => true,
        };
        if !matches {
            return Err(OrchestrationError::ConfigurationError(format!(
                "Argument '{}' for '{}' has wrong type, expected {}",
                key, tool_name, expected
            )));
        }
    }

    Ok(())
}

fn require_str_argument(arguments: &Value, key: &str) -> Result<String> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.to_string())
        .ok_or_else(|| {
            OrchestrationError::ConfigurationError(format!("Expected string argument '{}'", key))
        })
}

fn require_number_argument(arguments: &Value, key: &str) -> Result<f64> {
    arguments
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            OrchestrationError::ConfigurationError(format!("Expected numeric argument '{}'", key))
        })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Stable per-input variation so repeated calls (and retries) agree.
fn byte_weight(input: &str) -> u64 {
    input.bytes().map(u64::from).sum()
}

//
// ================= Market data tools =================
//

/// Current quote for a single symbol
pub struct GetStockQuoteTool;

#[async_trait::async_trait]
impl Tool for GetStockQuoteTool {
    fn name(&self) -> &'static str {
        "get_stock_quote"
    }

    fn description(&self) -> &'static str {
        "Get the current quote (price, change, volume) for a stock symbol"
    }

    fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "symbol": {
                    "type": "string",
                    "description": "Ticker symbol, e.g. AAPL, MSFT, SPY"
                }
            },
            "required": ["symbol"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let symbol = require_str_argument(arguments, "symbol")?.to_uppercase();

        let base_price = match symbol.as_str() {
            "AAPL" => 180.0,
            "MSFT" => 380.0,
            "GOOGL" => 140.0,
            "AMZN" => 150.0,
            "TSLA" => 250.0,
            "NVDA" => 500.0,
            "SPY" => 450.0,
            "QQQ" => 380.0,
            "VTI" => 240.0,
            "BND" => 75.0,
            _ => 100.0,
        };

        let weight = byte_weight(&symbol);
        let change_percent = (weight % 7) as f64 - 3.0;

        Ok(json!({
            "symbol": symbol,
            "price": round2(base_price * (1.0 + change_percent / 100.0)),
            "change_percent": change_percent,
            "volume": 1_000_000 + weight * 37_000,
            "market_cap": format!("${}B", 100 + weight % 2_900),
        }))
    }
}

/// Broad market snapshot: index moves, volatility, sentiment
pub struct GetMarketOverviewTool;

#[async_trait::async_trait]
impl Tool for GetMarketOverviewTool {
    fn name(&self) -> &'static str {
        "get_market_overview"
    }

    fn description(&self) -> &'static str {
        "Get an overview of major indices, volatility, and market sentiment"
    }

    fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _arguments: &Value) -> Result<Value> {
        Ok(json!({
            "sp500_change": 0.45,
            "nasdaq_change": 0.82,
            "dow_change": 0.21,
            "vix": 16.4,
            "sentiment": "neutral",
            "sector_leaders": ["Technology", "Healthcare", "Financials"],
        }))
    }
}

/// Per-sector performance and representative holdings
pub struct AnalyzeSectorPerformanceTool;

#[async_trait::async_trait]
impl Tool for AnalyzeSectorPerformanceTool {
    fn name(&self) -> &'static str {
        "analyze_sector_performance"
    }

    fn description(&self) -> &'static str {
        "Analyze the performance and top holdings of a market sector"
    }

    fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "sector": {
                    "type": "string",
                    "description": "Sector name, e.g. Technology, Healthcare, Energy"
                }
            },
            "required": ["sector"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let sector = require_str_argument(arguments, "sector")?;

        let top_stocks: Vec<&str> = match sector.as_str() {
            "Technology" => vec!["AAPL", "MSFT", "NVDA", "GOOGL"],
            "Healthcare" => vec!["JNJ", "UNH", "PFE", "ABBV"],
            "Energy" => vec!["XOM", "CVX", "COP", "SLB"],
            "Financials" => vec!["JPM", "BAC", "WFC", "GS"],
            "Consumer" => vec!["AMZN", "TSLA", "NKE", "MCD"],
            _ => vec!["N/A"],
        };

        let weight = byte_weight(&sector);
        let ytd_performance = round2((weight % 40) as f64 - 10.0);
        let trend = match weight % 3 {
            0 => "upward",
            1 => "stable",
            _ => "downward",
        };
        let volatility = match weight % 3 {
            0 => "low",
            1 => "medium",
            _ => "high",
        };

        Ok(json!({
            "sector": sector,
            "ytd_performance": ytd_performance,
            "trend": trend,
            "top_stocks": top_stocks,
            "volatility": volatility,
        }))
    }
}

/// Asset-class allocation table by risk profile
pub struct CalculatePortfolioAllocationTool;

#[async_trait::async_trait]
impl Tool for CalculatePortfolioAllocationTool {
    fn name(&self) -> &'static str {
        "calculate_portfolio_allocation"
    }

    fn description(&self) -> &'static str {
        "Calculate the suggested portfolio allocation for an amount and risk profile"
    }

    fn argument_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "amount": {
                    "type": "number",
                    "description": "Amount to invest"
                },
                "risk_profile": {
                    "type": "string",
                    "description": "conservative, moderate, or aggressive"
                }
            },
            "required": ["amount", "risk_profile"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let amount = require_number_argument(arguments, "amount")?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(OrchestrationError::ConfigurationError(
                "Argument 'amount' must be positive".to_string(),
            ));
        }
        let profile = RiskProfile::parse(&require_str_argument(arguments, "risk_profile")?)?;

        let percentages: [(&str, f64); 4] = match profile {
            RiskProfile::Conservative => {
                [("stocks", 0.30), ("bonds", 0.50), ("cash", 0.15), ("commodities", 0.05)]
            }
            RiskProfile::Moderate => {
                [("stocks", 0.60), ("bonds", 0.30), ("cash", 0.05), ("commodities", 0.05)]
            }
            RiskProfile::Aggressive => {
                [("stocks", 0.80), ("bonds", 0.10), ("cash", 0.05), ("commodities", 0.05)]
            }
        };

        let allocation: serde_json::Map<String, Value> = percentages
            .iter()
            .map(|(asset, pct)| (asset.to_string(), json!(round2(amount * pct))))
            .collect();
        let allocation_percentages: serde_json::Map<String, Value> = percentages
            .iter()
            .map(|(asset, pct)| (asset.to_string(), json!(pct)))
            .collect();

        Ok(json!({
            "total_amount": amount,
            "risk_profile": profile.to_string(),
            "allocation": allocation,
            "allocation_percentages": allocation_percentages,
        }))
    }
}

/// Create the default registry with the advisory lookup tools.
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(GetStockQuoteTool));
    registry.register(Arc::new(GetMarketOverviewTool));
    registry.register(Arc::new(AnalyzeSectorPerformanceTool));
    registry.register(Arc::new(CalculatePortfolioAllocationTool));
    registry
}
