use serde::Serialize;
use thiserror::Error;

/// Why a single `chart_data` element was rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChartEntryError {
    #[error("entry is not an object")]
    NotAnObject,
    #[error("missing or empty `{0}`")]
    MissingField(&'static str),
    #[error("`{0}` has the wrong type")]
    InvalidField(&'static str),
    #[error("ohlc series is empty")]
    EmptySeries,
    #[error("ohlc lengths differ (date={date}, open={open}, high={high}, low={low}, close={close})")]
    LengthMismatch {
        date: usize,
        open: usize,
        high: usize,
        low: usize,
        close: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OhlcSeries {
    date: Vec<String>,
    open: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    close: Vec<f64>,
}

impl OhlcSeries {
    /// Builds a series whose five columns share one non-zero length.
    pub fn new(
        date: Vec<String>,
        open: Vec<f64>,
        high: Vec<f64>,
        low: Vec<f64>,
        close: Vec<f64>,
    ) -> Result<Self, ChartEntryError> {
        let len = date.len();
        if [open.len(), high.len(), low.len(), close.len()]
            .iter()
            .any(|other| *other != len)
        {
            return Err(ChartEntryError::LengthMismatch {
                date: date.len(),
                open: open.len(),
                high: high.len(),
                low: low.len(),
                close: close.len(),
            });
        }
        if len == 0 {
            return Err(ChartEntryError::EmptySeries);
        }
        Ok(Self {
            date,
            open,
            high,
            low,
            close,
        })
    }

    pub fn len(&self) -> usize {
        self.date.len()
    }

    pub fn is_empty(&self) -> bool {
        self.date.is_empty()
    }

    pub fn dates(&self) -> &[String] {
        &self.date
    }

    /// Candles in input order as `(date, open, high, low, close)`.
    pub fn candles(&self) -> impl Iterator<Item = (&str, f64, f64, f64, f64)> + '_ {
        (0..self.len()).map(move |i| {
            (
                self.date[i].as_str(),
                self.open[i],
                self.high[i],
                self.low[i],
                self.close[i],
            )
        })
    }

    pub fn min_low(&self) -> f64 {
        self.low.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max_high(&self) -> f64 {
        self.high.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChartSeries {
    Price { price: f64 },
    Ohlc(OhlcSeries),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartEntry {
    pub pair: String,
    pub source: String,
    #[serde(flatten)]
    pub series: ChartSeries,
}

impl ChartEntry {
    pub fn price(pair: impl Into<String>, source: impl Into<String>, price: f64) -> Self {
        Self {
            pair: pair.into(),
            source: source.into(),
            series: ChartSeries::Price { price },
        }
    }

    pub fn ohlc(pair: impl Into<String>, source: impl Into<String>, series: OhlcSeries) -> Self {
        Self {
            pair: pair.into(),
            source: source.into(),
            series: ChartSeries::Ohlc(series),
        }
    }
}
