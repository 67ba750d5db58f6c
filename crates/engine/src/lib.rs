//! Crossing Engine — genetic search over crossing-strategy parameters
//!
//! Provides:
//! - Generic evolution engine (fill, elite selection, crossover, mutation)
//! - Dual moving average and triple-smoothed momentum gene schemas
//! - Per-bar crossing decision engine with pluggable position managers
//! - Kline backtester and result formatting

pub mod backtest;
pub mod config;
pub mod error;
pub mod evolution;
pub mod format;
pub mod genome;
pub mod indicators;
pub mod positions;
pub mod random;
pub mod schema;
pub mod strategy;
pub mod types;

// Re-exports for convenience
pub use backtest::{resample, summarize, BacktestConfig, BacktestRunner, KlineBacktester};
pub use config::{
    AverageKind, GeneticConfig, MovingAverageSettings, ParameterRange, ScalarRanges,
    TripleSmoothedSettings,
};
pub use error::{EngineError, EngineResult};
pub use evolution::{EvolutionEngine, MIN_ELITES};
pub use format::{FormattedResult, ResultFormatter};
pub use genome::{GeneField, GenePools, Genes, Genome, Inheritance, Locus};
pub use indicators::{CrossDetector, IndicatorStream, Series, ThresholdCross, TripleSmoothed};
pub use positions::{ExitRules, PaperPositions, PositionIntent, PositionManager};
pub use random::RandomNumberProvider;
pub use schema::{GeneSchema, MaField, MovingAverageSchema, TripleSmoothedSchema, TrixField};
pub use strategy::{
    Action, Decision, DecisionModel, MomentumGate, MovingAverageModel, Signal, StrategyEngine,
    StrategyFamily, TechSeries, TripleSmoothedModel,
};
pub use types::*;
