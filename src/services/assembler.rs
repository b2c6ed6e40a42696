use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::charts::ChartRenderer;
use crate::config::Config;
use crate::services::parser::ParsedResponse;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub summary: String,
    pub chart_urls: Vec<String>,
    pub chart_imgs: Vec<String>,
}

/// Renders parsed chart entries and shapes the public response.
///
/// Charts are best effort: a payload error or a failed render is logged and
/// simply contributes no URL.
#[derive(Debug, Clone)]
pub struct ResultAssembler {
    renderer: Arc<ChartRenderer>,
    url_prefix: String,
}

impl ResultAssembler {
    pub fn new(renderer: Arc<ChartRenderer>, url_prefix: &str) -> Self {
        Self {
            renderer,
            url_prefix: url_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(renderer: Arc<ChartRenderer>, config: &Config) -> Self {
        Self::new(renderer, config.charts_url_prefix())
    }

    pub fn renderer(&self) -> &Arc<ChartRenderer> {
        &self.renderer
    }

    /// Mount point of the chart directory, without a trailing slash.
    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    pub fn chart_url(&self, file_name: &str) -> String {
        format!("{}/{}", self.url_prefix, file_name)
    }

    pub async fn assemble(&self, parsed: ParsedResponse) -> AgentResponse {
        if let Err(err) = &parsed.charts {
            warn!(error = %err, "Chart payload ignored");
        }

        let mut chart_urls = Vec::new();
        for entry in parsed.entries().iter().cloned() {
            let renderer = Arc::clone(&self.renderer);
            let pair = entry.pair.clone();
            let rendered = tokio::task::spawn_blocking(move || renderer.render(&entry)).await;
            let path = match rendered {
                Ok(Ok(path)) => path,
                Ok(Err(err)) => {
                    warn!(%pair, error = %err, "Chart render failed");
                    continue;
                }
                Err(err) => {
                    warn!(%pair, error = %err, "Chart worker panicked");
                    continue;
                }
            };
            match path.file_name().and_then(|name| name.to_str()) {
                Some(name) => chart_urls.push(self.chart_url(name)),
                None => warn!(path = %path.display(), "Rendered chart has no file name"),
            }
        }

        let chart_imgs = chart_urls
            .iter()
            .map(|url| format!("<img src=\"{url}\" alt=\"chart\" />"))
            .collect();

        AgentResponse {
            summary: parsed.summary,
            chart_urls,
            chart_imgs,
        }
    }
}
