//! Configuration: parameter ranges, genetic settings and per-family search spaces
//!
//! Every settings struct carries a `Default` and `#[serde(default)]`, so a JSON
//! document only needs to name the fields it overrides.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Parse a JSON settings document and validate it.
fn load_validated<T>(json: &str, validate: impl FnOnce(&T) -> EngineResult<()>) -> EngineResult<T>
where
    T: DeserializeOwned,
{
    let settings: T = serde_json::from_str(json)?;
    validate(&settings)?;
    Ok(settings)
}

// ============================================================================
// Parameter range
// ============================================================================

/// Closed interval with a quantization step
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub from: f64,
    pub to: f64,
    pub step: f64,
    /// Draws must land on whole numbers
    #[serde(rename = "int", default)]
    pub integer: bool,
}

impl ParameterRange {
    pub fn new(from: f64, to: f64, step: f64, integer: bool) -> EngineResult<Self> {
        let range = Self {
            from,
            to,
            step,
            integer,
        };
        range.validate()?;
        Ok(range)
    }

    /// Shorthand for the common whole-number range
    pub(crate) const fn int(from: f64, to: f64, step: f64) -> Self {
        Self {
            from,
            to,
            step,
            integer: true,
        }
    }

    pub(crate) const fn real(from: f64, to: f64, step: f64) -> Self {
        Self {
            from,
            to,
            step,
            integer: false,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !self.from.is_finite() || !self.to.is_finite() || !self.step.is_finite() {
            return Err(EngineError::InvalidRange(format!(
                "non-finite bound in {:?}",
                self
            )));
        }
        if self.from > self.to {
            return Err(EngineError::InvalidRange(format!(
                "from {} exceeds to {}",
                self.from, self.to
            )));
        }
        if self.step <= 0.0 {
            return Err(EngineError::InvalidRange(format!(
                "step must be positive, got {}",
                self.step
            )));
        }
        if (self.to - self.from) / self.step >= u64::MAX as f64 {
            return Err(EngineError::InvalidRange(format!(
                "too many lattice points in {:?}",
                self
            )));
        }
        if self.integer && self.from.ceil() > self.to.floor() {
            return Err(EngineError::InvalidRange(format!(
                "no whole number between {} and {}",
                self.from, self.to
            )));
        }
        Ok(())
    }

    /// Number of lattice points `from + k*step` inside the interval
    pub fn lattice_len(&self) -> u64 {
        (((self.to - self.from) / self.step + 1e-9).floor() as u64).saturating_add(1)
    }

    /// Value of the `k`-th lattice point, snapped to an integer when required
    pub fn lattice_point(&self, k: u64) -> f64 {
        let raw = round9(self.from + k as f64 * self.step);
        if !self.integer {
            return raw;
        }
        raw.round().clamp(self.from.ceil(), self.to.floor())
    }
}

/// Round to 9 decimal places, keeping fingerprints free of float noise
pub(crate) fn round9(v: f64) -> f64 {
    (v * 1e9).round() / 1e9
}

// ============================================================================
// Genetic settings
// ============================================================================

/// Population shape and operator rates for one evolutionary search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneticConfig {
    #[serde(alias = "population")]
    pub population_size: usize,
    #[serde(alias = "crossoverPerc")]
    pub crossover_percent: u32,
    #[serde(alias = "bestPerc")]
    pub best_percent: u32,
    #[serde(alias = "mutationPerc")]
    pub mutation_percent: u32,
    #[serde(alias = "mutations")]
    pub mutation_count: usize,
    /// Retry cap per generated genome or mutation step
    pub max_attempts: usize,
}

impl Default for GeneticConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            crossover_percent: 20,
            best_percent: 10,
            mutation_percent: 20,
            mutation_count: 3,
            max_attempts: 10_000,
        }
    }
}

impl GeneticConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        load_validated(json, Self::validate)
    }

    pub fn validate(&self) -> EngineResult<()> {
        for (name, pct) in [
            ("crossover_percent", self.crossover_percent),
            ("best_percent", self.best_percent),
            ("mutation_percent", self.mutation_percent),
        ] {
            if pct > 100 {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must be within 0..=100, got {pct}"
                )));
            }
        }
        if self.mutation_count == 0 {
            return Err(EngineError::InvalidConfig(
                "mutation_count must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(EngineError::InvalidConfig(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// `population_size * percent / 100`, truncated
    pub fn share(&self, percent: u32) -> usize {
        self.population_size * percent as usize / 100
    }
}

// ============================================================================
// Scalar (exit / timeframe) ranges shared by both families
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalarRanges {
    /// Candle interval in seconds
    pub candle: ParameterRange,
    #[serde(alias = "sl")]
    pub stop_loss: ParameterRange,
    #[serde(alias = "tp")]
    pub take_profit: ParameterRange,
    #[serde(alias = "tsl")]
    pub trailing_stop_loss: ParameterRange,
}

impl Default for ScalarRanges {
    fn default() -> Self {
        Self {
            candle: ParameterRange::int(1.0, 900.0, 5.0),
            stop_loss: ParameterRange::int(0.0, 100.0, 5.0),
            take_profit: ParameterRange::int(0.0, 100.0, 5.0),
            trailing_stop_loss: ParameterRange::int(0.0, 100.0, 5.0),
        }
    }
}

impl ScalarRanges {
    fn validate(&self) -> EngineResult<()> {
        self.candle.validate()?;
        self.stop_loss.validate()?;
        self.take_profit.validate()?;
        self.trailing_stop_loss.validate()
    }
}

// ============================================================================
// Moving-average family
// ============================================================================

/// Kind of moving average used for the crossing pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AverageKind {
    Simple,
    Exponential,
}

/// Search space for the dual-moving-average family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MovingAverageSettings {
    #[serde(alias = "maLow")]
    pub fast_period: ParameterRange,
    #[serde(alias = "maHigh")]
    pub slow_period: ParameterRange,
    /// Minimum gap (percent) for a crossing to count
    #[serde(alias = "trs")]
    pub cross_threshold: ParameterRange,
    #[serde(alias = "rsi")]
    pub momentum_period: ParameterRange,
    #[serde(alias = "rsiUpper")]
    pub momentum_upper: ParameterRange,
    #[serde(alias = "rsiLower")]
    pub momentum_lower: ParameterRange,
    #[serde(alias = "ampTrs")]
    pub amplitude_trigger: ParameterRange,
    #[serde(flatten)]
    pub scalars: ScalarRanges,
    pub average: AverageKind,
}

impl Default for MovingAverageSettings {
    fn default() -> Self {
        Self {
            fast_period: ParameterRange::int(3.0, 20.0, 1.0),
            slow_period: ParameterRange::int(15.0, 40.0, 1.0),
            cross_threshold: ParameterRange::real(0.0, 1.0, 0.001),
            momentum_period: ParameterRange::int(5.0, 10.0, 1.0),
            momentum_upper: ParameterRange::int(30.0, 75.0, 5.0),
            momentum_lower: ParameterRange::int(25.0, 70.0, 5.0),
            amplitude_trigger: ParameterRange::real(0.0, 4.0, 0.1),
            scalars: ScalarRanges::default(),
            average: AverageKind::Simple,
        }
    }
}

impl MovingAverageSettings {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        load_validated(json, Self::validate)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.fast_period.validate()?;
        self.slow_period.validate()?;
        self.cross_threshold.validate()?;
        self.momentum_period.validate()?;
        self.momentum_upper.validate()?;
        self.momentum_lower.validate()?;
        self.amplitude_trigger.validate()?;
        self.scalars.validate()
    }
}

// ============================================================================
// Triple-smoothed family
// ============================================================================

/// Search space for the triple-smoothed momentum family
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TripleSmoothedSettings {
    #[serde(alias = "trix")]
    pub period: ParameterRange,
    #[serde(alias = "sma")]
    pub signal_period: ParameterRange,
    /// Upper edge of the neutral band
    pub upper: ParameterRange,
    /// Magnitude of the lower edge of the neutral band
    pub lower: ParameterRange,
    #[serde(flatten)]
    pub scalars: ScalarRanges,
}

impl Default for TripleSmoothedSettings {
    fn default() -> Self {
        Self {
            period: ParameterRange::int(1.0, 30.0, 1.0),
            signal_period: ParameterRange::int(1.0, 30.0, 1.0),
            upper: ParameterRange::real(0.001, 0.5, 0.001),
            lower: ParameterRange::real(0.001, 0.5, 0.001),
            scalars: ScalarRanges::default(),
        }
    }
}

impl TripleSmoothedSettings {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        load_validated(json, Self::validate)
    }

    pub fn validate(&self) -> EngineResult<()> {
        self.period.validate()?;
        self.signal_period.validate()?;
        self.upper.validate()?;
        self.lower.validate()?;
        self.scalars.validate()
    }
}
