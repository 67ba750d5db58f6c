//! Shared types for evolution, decisioning and backtesting

use std::fmt;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::genome::{GeneField, Genome};

/// A single candlestick (OHLCV)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kline {
    pub open_time: i64,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
}

impl Kline {
    /// Close price as f64 for indicator math
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(0.0)
    }

    /// A bar is green when it closed at or above its open
    pub fn is_green(&self) -> bool {
        self.close >= self.open
    }

    /// Bar range as a percentage of the low: `(high - low) / low * 100`
    pub fn amplitude_pct(&self) -> f64 {
        if self.low <= Decimal::ZERO {
            return 0.0;
        }
        ((self.high - self.low) / self.low * dec!(100))
            .to_f64()
            .unwrap_or(0.0)
    }
}

/// Side of a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn opposite(self) -> Self {
        match self {
            TradeSide::Buy => TradeSide::Sell,
            TradeSide::Sell => TradeSide::Buy,
        }
    }
}

/// Concrete strategy variant a genome is evaluated as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyType {
    #[serde(rename = "sma")]
    Sma,
    #[serde(rename = "ema")]
    Ema,
    #[serde(rename = "sma+rsi")]
    SmaMomentum,
    #[serde(rename = "ema+rsi")]
    EmaMomentum,
    #[serde(rename = "trix")]
    TripleSmoothed,
}

impl StrategyType {
    /// Whether decisions are confirmed by a momentum oscillator gate
    pub fn requires_momentum_gate(self) -> bool {
        matches!(self, StrategyType::SmaMomentum | StrategyType::EmaMomentum)
    }

    /// Whether the crossing series are simple (as opposed to exponential) averages
    pub fn uses_simple_average(self) -> bool {
        matches!(self, StrategyType::Sma | StrategyType::SmaMomentum)
    }

    pub fn tag(self) -> &'static str {
        match self {
            StrategyType::Sma => "sma",
            StrategyType::Ema => "ema",
            StrategyType::SmaMomentum => "sma+rsi",
            StrategyType::EmaMomentum => "ema+rsi",
            StrategyType::TripleSmoothed => "trix",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which prior pair of indicator values a crossing is measured against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryMode {
    /// Immediately preceding sample
    #[serde(rename = "2c")]
    TwoCandle,
    /// Three samples back, once enough history exists
    #[serde(rename = "3c")]
    ThreeCandle,
}

impl HistoryMode {
    pub fn tag(self) -> &'static str {
        match self {
            HistoryMode::TwoCandle => "2c",
            HistoryMode::ThreeCandle => "3c",
        }
    }
}

impl fmt::Display for HistoryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Provenance of a genome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OriginTag {
    Rand,
    Crossover,
    Mutation,
}

impl fmt::Display for OriginTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginTag::Rand => write!(f, "rand"),
            OriginTag::Crossover => write!(f, "crossover"),
            OriginTag::Mutation => write!(f, "mutation"),
        }
    }
}

/// A single round-trip trade realized by a position manager
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub entry_time: i64,
    pub exit_time: i64,
    pub side: TradeSide,
    pub entry_price: Decimal,
    pub exit_price: Decimal,
    /// Percent return on the entry price, signed by side
    pub pnl_pct: Decimal,
}

/// Aggregate performance of one genome, echoing the genome it was run with
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct BacktestResult<F: GeneField> {
    pub genome: Genome<F>,
    pub position_count: u32,
    /// Sum of per-trade percent returns
    pub net_profit: Decimal,
    /// Share of winning trades (%)
    pub probability_of_profit: Decimal,
    /// Share of losing trades (%)
    pub probability_of_loss: Decimal,
    pub average_profit: Decimal,
    pub average_loss: Decimal,
    pub expectancy: Decimal,
    pub annualized_performance: Decimal,
    /// Largest peak-to-trough fall of the cumulative return curve
    pub max_adverse: Decimal,
    /// Net profit over max adverse
    pub recovery: Decimal,
    pub trades: Vec<BacktestTrade>,
}

impl<F: GeneField> BacktestResult<F> {
    /// A result with no positions and zeroed metrics
    pub fn empty(genome: Genome<F>) -> Self {
        Self {
            genome,
            position_count: 0,
            net_profit: Decimal::ZERO,
            probability_of_profit: Decimal::ZERO,
            probability_of_loss: Decimal::ZERO,
            average_profit: Decimal::ZERO,
            average_loss: Decimal::ZERO,
            expectancy: Decimal::ZERO,
            annualized_performance: Decimal::ZERO,
            max_adverse: Decimal::ZERO,
            recovery: Decimal::ZERO,
            trades: Vec::new(),
        }
    }
}
