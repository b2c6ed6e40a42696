use std::sync::Arc;

use serde_json::Value;

use super::FnCapability;
use crate::domains::agent::AgentDefinition;

pub const ID: &str = "quantedge";
pub const DISPLAY_NAME: &str = "QuantEdge";

const INSTRUCTIONS: &str = "\
You are QuantEdge, a precise quant researcher:
1. Use `fetch_quantsignal_data` for market signals.
2. Use `analyze_quant_models` to assess strategies.
3. Use `summarize_edge_cases` for anomalies.
Output should resemble a quant research digest with clear metrics.";

const SIGNALS: &str = "\
Quant Signals:
- MACD bullish crossover on SPY
- High volatility alert on TSLA
- RSI oversold on AAPL";

const MODEL_ANALYSIS: &str = "\
Quant Model Analysis:
- Sharpe Ratio: 1.42
- Max Drawdown: 7.5%
- Annualized Alpha: 3.1%";

const EDGE_CASES: &str = "\
Edge Case Summary:
- Anomaly in BTC volatility spike (20% in 1 day)
- Unexpected drawdown in momentum strategy";

pub fn definition() -> AgentDefinition {
    AgentDefinition {
        id: ID,
        display_name: DISPLAY_NAME,
        instructions: INSTRUCTIONS.to_string(),
        default_prompt: "Give me today's market update".to_string(),
        capabilities: vec![
            Arc::new(FnCapability::new(
                "fetch_quantsignal_data",
                "Fetch recent quant signal data including indicators, volatility and asset targets",
                |_| Ok(Value::String(SIGNALS.to_string())),
            )),
            Arc::new(
                FnCapability::new(
                    "analyze_quant_models",
                    "Analyze quant models and return Sharpe ratio, drawdown and alpha",
                    |_| Ok(Value::String(MODEL_ANALYSIS.to_string())),
                )
                .with_text_arg("data", "Signals from fetch_quantsignal_data"),
            ),
            Arc::new(FnCapability::new(
                "summarize_edge_cases",
                "Summarize anomalies detected in quant data",
                |_| Ok(Value::String(EDGE_CASES.to_string())),
            )),
        ],
    }
}
