use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use super::{random_price, text_arg};
use crate::charts::ChartRenderer;
use crate::domains::agent::AgentDefinition;
use crate::domains::chart::ChartEntry;
use crate::error::{AgentDeskError, Result};
use crate::interfaces::capabilities::Capability;

pub const ID: &str = "atlasfx";
pub const DISPLAY_NAME: &str = "AtlasFX";

const DEFAULT_PAIR: &str = "USD/JPY";
const FALLBACK_SOURCE: &str = "Simulated";
const FALLBACK_PRICE: f64 = 150.5;
const BULLISH_ABOVE: f64 = 150.0;
const CONFIDENCE: u64 = 85;

const FREE_SOURCES: &[&str] = &[
    "FreeForexAPI",
    "YahooFinance",
    "TwelveData",
    "AlphaVantage",
    "Finnhub",
    "OANDA",
];

const INSTRUCTIONS: &str = "\
You are AtlasFX, a professional Forex market analyst.
1. Fetch FX quotes from all available sources with `fetch_fx_data`.
2. Analyze sentiment for each quote using `analyze_fx_sentiment`.
3. Generate a summary with `generate_fx_summary`.
4. Generate setup charts for all sources using `generate_fx_charts`.
Return a combined summary. End your answer with a line starting with
`ChartData:` followed by JSON shaped like
{\"chart_data\":[{\"pair\":\"USD/JPY\",\"price\":150.5,\"source\":\"OANDA\"}]}
with one entry per quote.";

const DEFAULT_PROMPT: &str = "What's the FX summary for USD/JPY?";

pub fn definition(renderer: Arc<ChartRenderer>) -> AgentDefinition {
    AgentDefinition {
        id: ID,
        display_name: DISPLAY_NAME,
        instructions: INSTRUCTIONS.to_string(),
        default_prompt: DEFAULT_PROMPT.to_string(),
        capabilities: vec![
            Arc::new(FetchFxData),
            Arc::new(AnalyzeFxSentiment),
            Arc::new(GenerateFxSummary),
            Arc::new(GenerateFxCharts { renderer }),
        ],
    }
}

fn fx_data_parameters() -> Value {
    json!({
        "type": "object",
        "properties": {
            "fx_data": {
                "type": "array",
                "description": "Quotes as returned by fetch_fx_data",
                "items": {"type": "object"}
            }
        },
        "required": ["fx_data"]
    })
}

/// Accepts `{"fx_data": [...]}` or a bare array.
fn quotes(args: &Value) -> Result<Vec<Value>> {
    let data = args.get("fx_data").unwrap_or(args);
    data.as_array()
        .cloned()
        .ok_or_else(|| AgentDeskError::Runtime("fx_data must be an array of quotes".to_string()))
}

fn quote_price(quote: &Value) -> Option<f64> {
    quote.get("price").and_then(Value::as_f64)
}

fn field<'a>(quote: &'a Value, key: &str) -> &'a str {
    quote.get(key).and_then(Value::as_str).unwrap_or("n/a")
}

pub struct FetchFxData;

#[async_trait]
impl Capability for FetchFxData {
    fn name(&self) -> &str {
        "fetch_fx_data"
    }

    fn description(&self) -> &str {
        "Fetch FX quotes for a currency pair from all free sources"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pair": {"type": "string", "description": "Currency pair, e.g. USD/JPY"}
            }
        })
    }

    async fn invoke(&self, args: Value) -> Result<Value> {
        let pair = match text_arg(&args, "pair").trim() {
            "" => DEFAULT_PAIR,
            pair => pair,
        };
        let timestamp = chrono::Utc::now().to_rfc3339();

        let mut results = Vec::new();
        for source in FREE_SOURCES {
            match random_price(140.0, 160.0) {
                Ok(price) => results.push(json!({
                    "pair": pair,
                    "price": price,
                    "source": source,
                    "timestamp": timestamp,
                })),
                Err(err) => warn!(source, error = %err, "Skipping FX source"),
            }
        }
        if results.is_empty() {
            results.push(json!({
                "pair": pair,
                "price": FALLBACK_PRICE,
                "source": FALLBACK_SOURCE,
                "timestamp": timestamp,
            }));
        }
        Ok(Value::Array(results))
    }
}

pub struct AnalyzeFxSentiment;

#[async_trait]
impl Capability for AnalyzeFxSentiment {
    fn name(&self) -> &str {
        "analyze_fx_sentiment"
    }

    fn description(&self) -> &str {
        "Tag each FX quote with a bullish or bearish sentiment"
    }

    fn parameters(&self) -> Value {
        fx_data_parameters()
    }

    async fn invoke(&self, args: Value) -> Result<Value> {
        let tagged = quotes(&args)?
            .into_iter()
            .map(|mut quote| {
                let sentiment = match quote_price(&quote) {
                    Some(price) if price > BULLISH_ABOVE => "bullish",
                    _ => "bearish",
                };
                if let Some(obj) = quote.as_object_mut() {
                    obj.insert("sentiment".to_string(), json!(sentiment));
                    obj.insert("confidence".to_string(), json!(CONFIDENCE));
                }
                quote
            })
            .collect();
        Ok(Value::Array(tagged))
    }
}

pub struct GenerateFxSummary;

#[async_trait]
impl Capability for GenerateFxSummary {
    fn name(&self) -> &str {
        "generate_fx_summary"
    }

    fn description(&self) -> &str {
        "Summarize analyzed FX quotes, one line per source"
    }

    fn parameters(&self) -> Value {
        fx_data_parameters()
    }

    async fn invoke(&self, args: Value) -> Result<Value> {
        let lines: Vec<String> = quotes(&args)?
            .iter()
            .map(|quote| {
                let price = quote_price(quote)
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "n/a".to_string());
                format!(
                    "{} | Price: {} | Source: {} | Sentiment: {} | Timestamp: {}",
                    field(quote, "pair"),
                    price,
                    field(quote, "source"),
                    field(quote, "sentiment"),
                    field(quote, "timestamp"),
                )
            })
            .collect();
        Ok(Value::String(lines.join("\n")))
    }
}

pub struct GenerateFxCharts {
    renderer: Arc<ChartRenderer>,
}

#[async_trait]
impl Capability for GenerateFxCharts {
    fn name(&self) -> &str {
        "generate_fx_charts"
    }

    fn description(&self) -> &str {
        "Render an entry/stop-loss/take-profit setup chart for each FX quote"
    }

    fn parameters(&self) -> Value {
        fx_data_parameters()
    }

    async fn invoke(&self, args: Value) -> Result<Value> {
        let mut charts = Vec::new();
        for quote in quotes(&args)? {
            let (Some(pair), Some(source), Some(price)) = (
                quote.get("pair").and_then(Value::as_str),
                quote.get("source").and_then(Value::as_str),
                quote_price(&quote),
            ) else {
                warn!(?quote, "Skipping FX quote without pair, source or price");
                continue;
            };
            let entry = ChartEntry::price(pair, source, price);
            let renderer = Arc::clone(&self.renderer);
            let rendered = tokio::task::spawn_blocking(move || renderer.render(&entry))
                .await
                .map_err(|e| AgentDeskError::Runtime(format!("chart worker failed: {e}")))?;
            match rendered {
                Ok(path) => charts.push(json!({
                    "source": source,
                    "file": path.display().to_string(),
                })),
                Err(err) => warn!(pair, source, error = %err, "FX chart render failed"),
            }
        }
        Ok(Value::Array(charts))
    }
}
