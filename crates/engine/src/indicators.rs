//! Indicator streams and the crossing primitive
//!
//! Streams wrap `ta` indicators with a bounded, oldest-first history so the
//! decision engine can look back a fixed number of samples. The crossing
//! primitive compares a fast/slow pair across two samples.

use ta::indicators::{ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage};
use ta::Next;

use crate::config::AverageKind;
use crate::error::{EngineError, EngineResult};
use crate::strategy::Signal;

/// Samples kept per stream
pub const HISTORY_DEPTH: usize = 10;

// ============================================================================
// Core trait
// ============================================================================

/// Stateful per-bar numeric transform
pub trait IndicatorStream: Send {
    /// Feed one sample; `None` while the indicator has no output yet
    fn advance(&mut self, value: f64) -> Option<f64>;

    fn current(&self) -> Option<f64>;

    fn previous(&self) -> Option<f64>;

    /// Recent outputs, oldest first, at most `HISTORY_DEPTH` long
    fn history(&self) -> &[f64];
}

/// A `ta` indicator with a bounded output history
pub struct Series<I> {
    inner: I,
    history: Vec<f64>,
    depth: usize,
}

impl<I> Series<I> {
    pub fn new(inner: I, depth: usize) -> Self {
        Self {
            inner,
            history: Vec::with_capacity(depth + 1),
            depth: depth.max(1),
        }
    }
}

impl<I> IndicatorStream for Series<I>
where
    I: Next<f64> + Send,
    I::Output: Into<Option<f64>>,
{
    fn advance(&mut self, value: f64) -> Option<f64> {
        let out: Option<f64> = self.inner.next(value).into();
        if let Some(v) = out {
            self.history.push(v);
            if self.history.len() > self.depth {
                self.history.remove(0);
            }
        }
        out
    }

    fn current(&self) -> Option<f64> {
        self.history.last().copied()
    }

    fn previous(&self) -> Option<f64> {
        let n = self.history.len();
        if n >= 2 {
            Some(self.history[n - 2])
        } else {
            None
        }
    }

    fn history(&self) -> &[f64] {
        &self.history
    }
}

// ============================================================================
// Triple-smoothed momentum (TRIX)
// ============================================================================

/// Percent change of a triple exponential average. No output on the first sample.
pub struct TripleSmoothed {
    first: ExponentialMovingAverage,
    second: ExponentialMovingAverage,
    third: ExponentialMovingAverage,
    last: Option<f64>,
}

impl TripleSmoothed {
    pub fn new(period: usize) -> EngineResult<Self> {
        Ok(Self {
            first: ema(period)?,
            second: ema(period)?,
            third: ema(period)?,
            last: None,
        })
    }
}

impl Next<f64> for TripleSmoothed {
    type Output = Option<f64>;

    fn next(&mut self, input: f64) -> Option<f64> {
        let smoothed = self.third.next(self.second.next(self.first.next(input)));
        let out = self
            .last
            .filter(|prev| *prev != 0.0)
            .map(|prev| (smoothed - prev) / prev * 100.0);
        self.last = Some(smoothed);
        out
    }
}

// ============================================================================
// Constructors
// ============================================================================

fn invalid_period(name: &str, period: usize, err: ta::errors::TaError) -> EngineError {
    EngineError::InvalidConfig(format!("{name} period {period}: {err:?}"))
}

fn ema(period: usize) -> EngineResult<ExponentialMovingAverage> {
    let period = period.max(1);
    ExponentialMovingAverage::new(period).map_err(|e| invalid_period("EMA", period, e))
}

/// Moving average of the given kind; periods below 1 are clamped to 1
pub fn moving_average(kind: AverageKind, period: usize) -> EngineResult<Box<dyn IndicatorStream>> {
    let period = period.max(1);
    Ok(match kind {
        AverageKind::Simple => Box::new(Series::new(
            SimpleMovingAverage::new(period).map_err(|e| invalid_period("SMA", period, e))?,
            HISTORY_DEPTH,
        )),
        AverageKind::Exponential => Box::new(Series::new(ema(period)?, HISTORY_DEPTH)),
    })
}

/// Relative strength oscillator (0–100) used as the momentum gate
pub fn momentum_oscillator(period: usize) -> EngineResult<Box<dyn IndicatorStream>> {
    let period = period.max(1);
    let rsi = RelativeStrengthIndex::new(period).map_err(|e| invalid_period("RSI", period, e))?;
    Ok(Box::new(Series::new(rsi, HISTORY_DEPTH)))
}

pub fn triple_smoothed(period: usize) -> EngineResult<Box<dyn IndicatorStream>> {
    Ok(Box::new(Series::new(
        TripleSmoothed::new(period.max(1))?,
        HISTORY_DEPTH,
    )))
}

// ============================================================================
// Crossing primitive
// ============================================================================

pub trait CrossDetector: Send {
    /// Classify the move of `a` relative to `b` between two samples
    fn classify(&self, prior_a: f64, prior_b: f64, current_a: f64, current_b: f64) -> Signal;
}

/// `a` crossing above `b` is a buy, crossing below is a sell. The gap after the
/// cross, as a percentage of `b`, must reach `threshold_pct`.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdCross {
    threshold_pct: f64,
}

impl ThresholdCross {
    pub fn new(threshold_pct: f64) -> Self {
        Self {
            threshold_pct: threshold_pct.max(0.0),
        }
    }

    fn gap_reached(&self, diff: f64, base: f64) -> bool {
        if self.threshold_pct == 0.0 {
            return true;
        }
        base != 0.0 && (diff / base).abs() * 100.0 >= self.threshold_pct
    }
}

impl CrossDetector for ThresholdCross {
    fn classify(&self, prior_a: f64, prior_b: f64, current_a: f64, current_b: f64) -> Signal {
        let before = prior_a - prior_b;
        let after = current_a - current_b;
        if !self.gap_reached(after, current_b) {
            return Signal::Hold;
        }
        if before <= 0.0 && after > 0.0 {
            Signal::Buy
        } else if before >= 0.0 && after < 0.0 {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }
}
