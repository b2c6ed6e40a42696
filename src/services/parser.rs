//! Splits raw agent output into a free-text summary and the chart entries
//! embedded after the `ChartData:` marker.

use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domains::chart::{ChartEntry, ChartEntryError, OhlcSeries};

pub const SENTINEL: &str = "ChartData:";

const OHLC_KEYS: [&str; 5] = ["date", "open", "high", "low", "close"];

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartPayloadError {
    #[error("chart payload is not valid json: {0}")]
    InvalidJson(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub summary: String,
    pub charts: Result<Vec<ChartEntry>, ChartPayloadError>,
    /// Index and reason for every `chart_data` element that was skipped.
    pub rejected: Vec<(usize, ChartEntryError)>,
}

impl ParsedResponse {
    /// Entries to render; a payload error counts as none.
    pub fn entries(&self) -> &[ChartEntry] {
        match &self.charts {
            Ok(entries) => entries,
            Err(_) => &[],
        }
    }
}

pub fn parse_response(raw: &str) -> ParsedResponse {
    let Some((before, after)) = raw.split_once(SENTINEL) else {
        return ParsedResponse {
            summary: raw.trim().to_string(),
            charts: Ok(Vec::new()),
            rejected: Vec::new(),
        };
    };

    let summary = before.trim().to_string();
    let document = match first_json_value(after) {
        Ok(document) => document,
        Err(err) => {
            warn!(error = %err, "Discarding chart payload");
            return ParsedResponse {
                summary,
                charts: Err(err),
                rejected: Vec::new(),
            };
        }
    };

    let Some(items) = document.get("chart_data").and_then(Value::as_array) else {
        debug!("Chart payload has no chart_data array");
        return ParsedResponse {
            summary,
            charts: Ok(Vec::new()),
            rejected: Vec::new(),
        };
    };

    let mut entries = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match parse_entry(item) {
            Ok(entry) => entries.push(entry),
            Err(err) => {
                warn!(index, error = %err, "Skipping malformed chart entry");
                rejected.push((index, err));
            }
        }
    }

    ParsedResponse {
        summary,
        charts: Ok(entries),
        rejected,
    }
}

fn strip_code_fence(payload: &str) -> &str {
    let trimmed = payload.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => rest
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric())
            .trim_start(),
        None => trimmed,
    }
}

/// Parses the first JSON value in `payload`; anything after it is ignored.
fn first_json_value(payload: &str) -> Result<Value, ChartPayloadError> {
    let payload = strip_code_fence(payload);
    let mut stream = serde_json::Deserializer::from_str(payload).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(err)) => Err(ChartPayloadError::InvalidJson(err.to_string())),
        None => Err(ChartPayloadError::InvalidJson("empty payload".to_string())),
    }
}

fn required_str(obj: &Map<String, Value>, key: &'static str) -> Result<String, ChartEntryError> {
    match obj.get(key) {
        None | Some(Value::Null) => Err(ChartEntryError::MissingField(key)),
        Some(Value::String(text)) if text.trim().is_empty() => {
            Err(ChartEntryError::MissingField(key))
        }
        Some(Value::String(text)) => Ok(text.trim().to_string()),
        Some(_) => Err(ChartEntryError::InvalidField(key)),
    }
}

fn array<'a>(obj: &'a Map<String, Value>, key: &'static str) -> Result<&'a Vec<Value>, ChartEntryError> {
    obj.get(key)
        .ok_or(ChartEntryError::MissingField(key))?
        .as_array()
        .ok_or(ChartEntryError::InvalidField(key))
}

fn number_column(obj: &Map<String, Value>, key: &'static str) -> Result<Vec<f64>, ChartEntryError> {
    array(obj, key)?
        .iter()
        .map(|value| value.as_f64().ok_or(ChartEntryError::InvalidField(key)))
        .collect()
}

fn date_column(obj: &Map<String, Value>) -> Result<Vec<String>, ChartEntryError> {
    array(obj, "date")?
        .iter()
        .map(|value| match value {
            Value::String(text) => Ok(text.clone()),
            Value::Number(number) => Ok(number.to_string()),
            _ => Err(ChartEntryError::InvalidField("date")),
        })
        .collect()
}

fn parse_entry(value: &Value) -> Result<ChartEntry, ChartEntryError> {
    let obj = value.as_object().ok_or(ChartEntryError::NotAnObject)?;
    let pair = required_str(obj, "pair")?;
    let source = required_str(obj, "source")?;

    if OHLC_KEYS.iter().any(|key| obj.contains_key(*key)) {
        let series = OhlcSeries::new(
            date_column(obj)?,
            number_column(obj, "open")?,
            number_column(obj, "high")?,
            number_column(obj, "low")?,
            number_column(obj, "close")?,
        )?;
        return Ok(ChartEntry::ohlc(pair, source, series));
    }

    let price = obj
        .get("price")
        .ok_or(ChartEntryError::MissingField("price"))?
        .as_f64()
        .ok_or(ChartEntryError::InvalidField("price"))?;
    Ok(ChartEntry::price(pair, source, price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::chart::ChartSeries;

    #[test]
    fn text_without_marker_is_all_summary() {
        let parsed = parse_response("  Just a summary, no chart.\n");
        assert_eq!(parsed.summary, "Just a summary, no chart.");
        assert_eq!(parsed.charts, Ok(Vec::new()));
        assert!(parsed.entries().is_empty());
    }

    #[test]
    fn calm_market_yields_one_price_entry() {
        let raw = "All calm. ChartData: {\"chart_data\":[{\"pair\":\"USD/JPY\",\"price\":150.5,\"source\":\"Sim\"}]}";
        let parsed = parse_response(raw);
        assert_eq!(parsed.summary, "All calm.");
        assert_eq!(
            parsed.entries(),
            &[ChartEntry::price("USD/JPY", "Sim", 150.5)]
        );
    }

    #[test]
    fn invalid_json_keeps_summary_and_reports_error() {
        let parsed = parse_response("Trend up.\nChartData: {\"chart_data\": [oops");
        assert_eq!(parsed.summary, "Trend up.");
        assert!(matches!(parsed.charts, Err(ChartPayloadError::InvalidJson(_))));
        assert!(parsed.entries().is_empty());

        let empty = parse_response("Nothing here. ChartData:   ");
        assert!(matches!(empty.charts, Err(ChartPayloadError::InvalidJson(_))));
    }

    #[test]
    fn splits_at_first_marker_only() {
        let raw = "A ChartData: {\"chart_data\":[]} ChartData: {\"chart_data\":[1]}";
        let parsed = parse_response(raw);
        assert_eq!(parsed.summary, "A");
        assert_eq!(parsed.charts, Ok(Vec::new()));
    }

    #[test]
    fn fenced_payload_with_trailing_text_is_accepted() {
        let raw = "Setup below.\nChartData:\n```json\n{\"chart_data\":[{\"pair\":\"EUR/USD\",\"price\":1.08,\"source\":\"ECB\"}]}\n```\nGood luck!";
        let parsed = parse_response(raw);
        assert_eq!(parsed.summary, "Setup below.");
        assert_eq!(parsed.entries().len(), 1);
        assert_eq!(parsed.entries()[0].source, "ECB");
    }

    #[test]
    fn other_shapes_yield_no_entries() {
        for payload in [
            "[1, 2, 3]",
            "{\"charts\": []}",
            "{\"chart_data\": {\"pair\": \"X\"}}",
            "42",
        ] {
            let parsed = parse_response(&format!("s ChartData: {payload}"));
            assert_eq!(parsed.charts, Ok(Vec::new()), "payload {payload}");
        }
    }

    #[test]
    fn malformed_entries_are_skipped_individually() {
        let raw = r#"Mixed. ChartData: {"chart_data":[
            {"pair":"USD/JPY","price":150.5,"source":"Sim"},
            {"pair":"","price":1.0,"source":"Sim"},
            {"pair":"EUR/USD","source":"Sim"},
            {"pair":"GBP/USD","price":"1.27","source":"Sim"},
            {"pair":"BTC/USD","source":"Sim","date":["d1","d2"],"open":[1,2],"high":[2,3],"low":[0.5,1],"close":[1.5]},
            {"pair":"ETH/USD","source":"Sim","date":["d1"],"open":[1]},
            "not an entry",
            {"pair":"AUD/USD","price":0.66,"source":"RBA"}
        ]}"#;
        let parsed = parse_response(raw);
        let pairs: Vec<&str> = parsed.entries().iter().map(|e| e.pair.as_str()).collect();
        assert_eq!(pairs, vec!["USD/JPY", "AUD/USD"]);

        let reasons: Vec<&ChartEntryError> = parsed.rejected.iter().map(|(_, e)| e).collect();
        assert_eq!(reasons.len(), 6);
        assert_eq!(reasons[0], &ChartEntryError::MissingField("pair"));
        assert_eq!(reasons[1], &ChartEntryError::MissingField("price"));
        assert_eq!(reasons[2], &ChartEntryError::InvalidField("price"));
        assert!(matches!(reasons[3], ChartEntryError::LengthMismatch { close: 1, .. }));
        assert_eq!(reasons[4], &ChartEntryError::MissingField("high"));
        assert_eq!(reasons[5], &ChartEntryError::NotAnObject);
    }

    #[test]
    fn full_ohlc_entry_becomes_candlestick_series() {
        let raw = r#"Candles. ChartData: {"chart_data":[{"pair":"BTC/USD","source":"Binance","price":1,
            "date":["2024-01-01","2024-01-02"],"open":[42000,42500],"high":[43000,43100],
            "low":[41500,42000],"close":[42500,42900]}]}"#;
        let parsed = parse_response(raw);
        let entries = parsed.entries();
        assert_eq!(entries.len(), 1);
        match &entries[0].series {
            ChartSeries::Ohlc(series) => {
                assert_eq!(series.len(), 2);
                assert_eq!(series.dates()[1], "2024-01-02");
            }
            other => panic!("expected ohlc, got {other:?}"),
        }
    }

    #[test]
    fn n_well_formed_entries_are_all_returned() {
        let items: Vec<String> = (0..7)
            .map(|i| format!("{{\"pair\":\"P{i}\",\"price\":{i}.5,\"source\":\"S\"}}"))
            .collect();
        let raw = format!("Summary text ChartData: {{\"chart_data\":[{}]}}", items.join(","));
        let parsed = parse_response(&raw);
        assert_eq!(parsed.summary, "Summary text");
        assert_eq!(parsed.entries().len(), 7);
        assert!(parsed.rejected.is_empty());
    }
}
