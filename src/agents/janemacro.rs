use std::sync::Arc;

use serde_json::Value;

use super::FnCapability;
use crate::domains::agent::AgentDefinition;
use crate::error::Result;

pub const ID: &str = "janemacro";
pub const DISPLAY_NAME: &str = "JaneMacro";

const INSTRUCTIONS: &str = "\
You are JaneMacro, a macroeconomic strategist and policy analyst.

Your task:
1. Use `fetch_macro_data` to gather key economic stats.
2. Use `analyze_policy_trends` to interpret central bank and fiscal policy direction.
3. Use `summarize_macro_news` to package it all into a markdown-style macro brief.

Make it concise and actionable for global investors and macro followers.";

const MACRO_DATA: &str = "\
- US GDP: 2.4% growth in Q2 2025
- Inflation: 3.1%
- Unemployment: 3.5%
- ECB Rate: Held steady at 4.5%";

const POLICY_TRENDS: &str = "\
- Fed likely to hold rates through Q4
- BOJ expected to exit negative rates in 2026
- China ramps up infrastructure stimulus";

const MACRO_NEWS: &str = "\
Macro Update:
- US economic growth exceeds forecasts
- ECB maintains dovish tone
- China prepares additional stimulus
- Fed stays cautious amid stable inflation";

pub fn definition() -> AgentDefinition {
    AgentDefinition {
        id: ID,
        display_name: DISPLAY_NAME,
        instructions: INSTRUCTIONS.to_string(),
        default_prompt: "Give me a macroeconomic update".to_string(),
        capabilities: vec![
            Arc::new(FnCapability::new(
                "fetch_macro_data",
                "Fetch recent macroeconomic indicators",
                |_| Ok(Value::String(MACRO_DATA.to_string())),
            )),
            Arc::new(FnCapability::new(
                "analyze_policy_trends",
                "Analyze global fiscal and monetary trends",
                |_| Ok(Value::String(POLICY_TRENDS.to_string())),
            )),
            Arc::new(FnCapability::new(
                "summarize_macro_news",
                "Summarize key macroeconomic developments",
                summarize_macro_news,
            )),
        ],
    }
}

fn summarize_macro_news(_args: &Value) -> Result<Value> {
    Ok(Value::String(MACRO_NEWS.to_string()))
}
