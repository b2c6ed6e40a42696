use std::sync::Arc;

use serde_json::Value;

use super::{random_price, text_arg, FnCapability};
use crate::domains::agent::AgentDefinition;
use crate::error::Result;

pub const ID: &str = "cryptonova";
pub const DISPLAY_NAME: &str = "CryptoNova";

const SYMBOLS: &[&str] = &["BTC", "ETH", "SOL", "ADA", "XRP"];

const HEADLINES: &[&str] = &[
    "Bitcoin ETF gains traction in global markets",
    "Ethereum 2.0 staking hits record high",
    "Solana partners with Visa for payments",
    "Regulatory pressure increases on altcoins",
];

const INSTRUCTIONS: &str = "\
You are CryptoNova, a confident crypto analyst and educator.
1. Use `fetch_crypto_data` to get live prices.
2. Analyze trends with `analyze_crypto_trends`.
3. Summarize news with `summarize_crypto_news`.
Format everything like a tweet thread for a crypto-savvy audience.";

pub fn definition() -> AgentDefinition {
    AgentDefinition {
        id: ID,
        display_name: DISPLAY_NAME,
        instructions: INSTRUCTIONS.to_string(),
        default_prompt: "What's the latest crypto update?".to_string(),
        capabilities: vec![
            Arc::new(FnCapability::new(
                "fetch_crypto_data",
                "Fetch simulated cryptocurrency market data",
                fetch_crypto_data,
            )),
            Arc::new(
                FnCapability::new(
                    "analyze_crypto_trends",
                    "Analyze trends based on market data",
                    analyze_crypto_trends,
                )
                .with_text_arg("data", "Market data from fetch_crypto_data"),
            ),
            Arc::new(FnCapability::new(
                "summarize_crypto_news",
                "Summarize trending crypto news",
                summarize_crypto_news,
            )),
        ],
    }
}

fn fetch_crypto_data(_args: &Value) -> Result<Value> {
    let mut prices = Vec::with_capacity(SYMBOLS.len());
    for symbol in SYMBOLS {
        prices.push(format!("{symbol}: ${}", random_price(100.0, 3000.0)?));
    }
    Ok(Value::String(format!("Prices: {}", prices.join(", "))))
}

fn analyze_crypto_trends(args: &Value) -> Result<Value> {
    let data = text_arg(args, "data");
    let verdict = if data.contains("BTC") && data.contains("ETH") {
        "BTC and ETH showing bullish momentum due to volume surge."
    } else {
        "Market trend is currently neutral or mixed."
    };
    Ok(Value::String(verdict.to_string()))
}

fn summarize_crypto_news(_args: &Value) -> Result<Value> {
    let lines: Vec<String> = HEADLINES.iter().map(|h| format!("- {h}")).collect();
    Ok(Value::String(format!(
        "Top Crypto News:\n{}",
        lines.join("\n")
    )))
}
