use serde::{Deserialize, Serialize};
use std::fs;

use crate::error::{AgentDeskError, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

/// Price offsets used to place the stop-loss and take-profit guides on a
/// single-price setup chart. Illustrative only.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
pub struct SetupLevels {
    #[serde(default = "default_stop_loss_offset")]
    pub stop_loss_offset: f64,
    #[serde(default = "default_take_profit_offset")]
    pub take_profit_offset: f64,
}

impl Default for SetupLevels {
    fn default() -> Self {
        Self {
            stop_loss_offset: default_stop_loss_offset(),
            take_profit_offset: default_take_profit_offset(),
        }
    }
}

fn default_stop_loss_offset() -> f64 {
    0.5
}

fn default_take_profit_offset() -> f64 {
    1.5
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_tool_rounds() -> usize {
    8
}

fn default_charts_dir() -> String {
    "./charts".to_string()
}

fn default_charts_url_prefix() -> String {
    "/charts".to_string()
}

fn default_chart_width() -> u32 {
    900
}

fn default_chart_height() -> u32 {
    520
}

fn default_schedule_interval_secs() -> u64 {
    6 * 60 * 60
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: usize,
    #[serde(default = "default_charts_dir")]
    pub charts_dir: String,
    #[serde(default = "default_charts_url_prefix")]
    pub charts_url_prefix: String,
    #[serde(default = "default_chart_width")]
    pub chart_width: u32,
    #[serde(default = "default_chart_height")]
    pub chart_height: u32,
    #[serde(flatten)]
    pub levels: SetupLevels,
    #[serde(default)]
    pub database_path: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_schedule_interval_secs")]
    pub schedule_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: None,
            request_timeout_secs: default_request_timeout_secs(),
            max_tool_rounds: default_max_tool_rounds(),
            charts_dir: default_charts_dir(),
            charts_url_prefix: default_charts_url_prefix(),
            chart_width: default_chart_width(),
            chart_height: default_chart_height(),
            levels: SetupLevels::default(),
            database_path: None,
            api_token: None,
            schedule_interval_secs: default_schedule_interval_secs(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| AgentDeskError::Config(format!("failed to read {path}: {e}")))?;
        serde_json::from_str(&content)
            .map_err(|e| AgentDeskError::Config(format!("failed to parse {path}: {e}")))
    }

    /// Loads `.env`, reads the optional JSON file, applies environment
    /// overrides and validates the result.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let _ = dotenvy::dotenv();
        let base = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base.with_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(model) = get("AGENT_DESK_MODEL") {
            self.model = Some(model);
        }
        if let Some(url) = get("AGENT_DESK_BASE_URL") {
            self.base_url = Some(url);
        }
        if let Some(secs) = get("AGENT_DESK_REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.request_timeout_secs = secs;
        }
        if let Some(dir) = get("AGENT_DESK_CHARTS_DIR") {
            self.charts_dir = dir;
        }
        if let Some(prefix) = get("AGENT_DESK_CHARTS_URL_PREFIX") {
            self.charts_url_prefix = prefix;
        }
        if let Some(offset) = get("AGENT_DESK_STOP_LOSS_OFFSET").and_then(|v| v.parse().ok()) {
            self.levels.stop_loss_offset = offset;
        }
        if let Some(offset) = get("AGENT_DESK_TAKE_PROFIT_OFFSET").and_then(|v| v.parse().ok()) {
            self.levels.take_profit_offset = offset;
        }
        if let Some(path) = get("AGENT_DESK_DB") {
            self.database_path = Some(path);
        }
        if let Some(token) = get("AGENT_DESK_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(secs) = get("AGENT_DESK_SCHEDULE_SECS").and_then(|v| v.parse().ok()) {
            self.schedule_interval_secs = secs;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        let has_key = self
            .api_key
            .as_deref()
            .map(|key| !key.trim().is_empty())
            .unwrap_or(false);
        if !has_key {
            return Err(AgentDeskError::Config(
                "GEMINI_API_KEY (or OPENAI_API_KEY) is missing".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(AgentDeskError::Config(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if !self.charts_url_prefix.starts_with('/') {
            return Err(AgentDeskError::Config(format!(
                "charts_url_prefix must start with '/': {}",
                self.charts_url_prefix
            )));
        }
        Ok(())
    }

    pub fn api_key(&self) -> Result<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| AgentDeskError::Config("missing API key".to_string()))
    }

    pub fn model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string())
    }

    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    pub fn charts_url_prefix(&self) -> &str {
        let trimmed = self.charts_url_prefix.trim_end_matches('/');
        if trimmed.is_empty() {
            "/"
        } else {
            trimmed
        }
    }
}
