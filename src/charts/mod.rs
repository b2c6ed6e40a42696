//! SVG chart rendering for parsed chart entries.
//!
//! A price entry becomes a setup chart (three-point line plus entry,
//! stop-loss and take-profit guides); an OHLC entry becomes a candlestick
//! chart. Files land in the output directory under collision-free names.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use plotters::prelude::*;
use tracing::debug;

use crate::config::{Config, SetupLevels};
use crate::domains::chart::{ChartEntry, ChartSeries, OhlcSeries};
use crate::error::{AgentDeskError, Result};

pub const CHART_EXTENSION: &str = "svg";

static NEXT_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Pads `[low, high]` by `ratio` of its span. Spans that overflow are
/// rejected, since plotters cannot lay out an unbounded axis.
fn padded_range(low: f64, high: f64, ratio: f64) -> Result<std::ops::Range<f64>> {
    let span = high - low;
    let padding = (span * ratio).max(1e-6);
    let (bottom, top) = (low - padding, high + padding);
    if !span.is_finite() || !bottom.is_finite() || !top.is_finite() {
        return Err(AgentDeskError::Render(format!(
            "value range {low}..{high} is too wide to plot"
        )));
    }
    Ok(bottom..top)
}

fn render_err<E: std::fmt::Display>(stage: &'static str) -> impl FnOnce(E) -> AgentDeskError {
    move |e| AgentDeskError::Render(format!("{stage}: {e}"))
}

/// Keeps ASCII alphanumerics and `-`; separators, slashes and whitespace go.
pub fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// `{pair}_{source}_{utc millis}_{sequence}.svg`
pub fn chart_file_name(entry: &ChartEntry) -> String {
    let stamp = chrono::Utc::now().format("%Y%m%d%H%M%S%3f");
    let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}_{}_{stamp}_{sequence}.{CHART_EXTENSION}",
        sanitize_component(&entry.pair),
        sanitize_component(&entry.source),
    )
}

#[derive(Debug, Clone)]
pub struct ChartRenderer {
    output_dir: PathBuf,
    width: u32,
    height: u32,
    levels: SetupLevels,
}

impl ChartRenderer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            width: 900,
            height: 520,
            levels: SetupLevels::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.charts_dir)
            .with_size(config.chart_width, config.chart_height)
            .with_levels(config.levels)
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(1);
        self.height = height.max(1);
        self
    }

    pub fn with_levels(mut self, levels: SetupLevels) -> Self {
        self.levels = levels;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn ensure_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.output_dir).map_err(|e| {
            AgentDeskError::Render(format!(
                "cannot create {}: {e}",
                self.output_dir.display()
            ))
        })
    }

    /// Renders `entry` and returns the absolute path of the written file.
    pub fn render(&self, entry: &ChartEntry) -> Result<PathBuf> {
        self.ensure_output_dir()?;
        let svg = self.render_svg(entry)?;

        let name = chart_file_name(entry);
        let target = self.output_dir.join(&name);
        let staging = self.output_dir.join(format!(".{name}.tmp"));
        if let Err(e) = fs::write(&staging, svg.as_bytes()) {
            let _ = fs::remove_file(&staging);
            return Err(AgentDeskError::Render(format!(
                "cannot write {}: {e}",
                staging.display()
            )));
        }
        if let Err(e) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(AgentDeskError::Render(format!(
                "cannot move chart into place: {e}"
            )));
        }

        let path = fs::canonicalize(&target).unwrap_or(target);
        debug!(path = %path.display(), pair = %entry.pair, "Chart written");
        Ok(path)
    }

    pub fn render_svg(&self, entry: &ChartEntry) -> Result<String> {
        let mut svg = String::new();
        {
            let root =
                SVGBackend::with_string(&mut svg, (self.width, self.height)).into_drawing_area();
            root.fill(&WHITE).map_err(render_err("fill canvas"))?;
            match &entry.series {
                ChartSeries::Price { price } => self.draw_setup(&root, entry, *price)?,
                ChartSeries::Ohlc(series) => self.draw_candles(&root, entry, series)?,
            }
            root.present().map_err(render_err("present"))?;
        }
        Ok(svg)
    }

    fn draw_setup(
        &self,
        root: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
        entry: &ChartEntry,
        price: f64,
    ) -> Result<()> {
        if !price.is_finite() {
            return Err(AgentDeskError::Render(format!(
                "price is not finite: {price}"
            )));
        }
        let stop_loss = price - self.levels.stop_loss_offset;
        let take_profit = price + self.levels.take_profit_offset;
        let line = [(-1, price - 1.0), (0, price), (1, price + 1.0)];

        let low = line
            .iter()
            .map(|(_, y)| *y)
            .chain([stop_loss, take_profit])
            .fold(f64::INFINITY, f64::min);
        let high = line
            .iter()
            .map(|(_, y)| *y)
            .chain([stop_loss, take_profit])
            .fold(f64::NEG_INFINITY, f64::max);
        let y_range = padded_range(low, high, 0.1)?;

        let mut chart = ChartBuilder::on(root)
            .caption(
                format!("{} Setup ({})", entry.pair, entry.source),
                ("sans-serif", 24).into_font(),
            )
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(-2i32..2i32, y_range)
            .map_err(render_err("build chart"))?;

        chart
            .configure_mesh()
            .x_labels(5)
            .x_label_formatter(&|x| match *x {
                -1 => "T-1".to_string(),
                0 => "T".to_string(),
                1 => "T+1".to_string(),
                _ => String::new(),
            })
            .y_desc("Price")
            .draw()
            .map_err(render_err("draw mesh"))?;

        chart
            .draw_series(LineSeries::new(line, BLUE.stroke_width(2)))
            .map_err(render_err("draw price line"))?
            .label("Price")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

        let guides = [
            ("Entry", price, BLACK),
            ("Stop Loss", stop_loss, RED),
            ("Take Profit", take_profit, GREEN),
        ];
        for (label, level, color) in guides {
            chart
                .draw_series(DashedLineSeries::new(
                    vec![(-2, level), (2, level)],
                    8,
                    6,
                    color.stroke_width(1),
                ))
                .map_err(render_err("draw guide"))?
                .label(format!("{label} {level:.4}"))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()
            .map_err(render_err("draw legend"))?;
        Ok(())
    }

    fn draw_candles(
        &self,
        root: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
        entry: &ChartEntry,
        series: &OhlcSeries,
    ) -> Result<()> {
        let low = series.min_low();
        let high = series.max_high();
        if !low.is_finite() || !high.is_finite() {
            return Err(AgentDeskError::Render("ohlc values are not finite".to_string()));
        }
        let y_range = padded_range(low, high, 0.05)?;
        let count = series.len() as i32;
        let dates = series.dates().to_vec();

        let mut chart = ChartBuilder::on(root)
            .caption(
                format!("{} ({})", entry.pair, entry.source),
                ("sans-serif", 24).into_font(),
            )
            .margin(15)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(-1i32..count, y_range)
            .map_err(render_err("build chart"))?;

        chart
            .configure_mesh()
            .x_labels((series.len() + 2).min(14))
            .x_label_formatter(&|x| {
                usize::try_from(*x)
                    .ok()
                    .and_then(|i| dates.get(i).cloned())
                    .unwrap_or_default()
            })
            .y_desc("Price")
            .draw()
            .map_err(render_err("draw mesh"))?;

        let body_width = ((self.width as usize / (series.len() + 2)) / 2).clamp(2, 30) as u32;
        chart
            .draw_series(series.candles().enumerate().map(|(i, (_, open, high, low, close))| {
                CandleStick::new(
                    i as i32,
                    open,
                    high,
                    low,
                    close,
                    GREEN.filled(),
                    RED.filled(),
                    body_width,
                )
            }))
            .map_err(render_err("draw candles"))?;
        Ok(())
    }
}
