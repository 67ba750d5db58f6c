//! Gene schemas: per-family field lists, ranges, validity and repair rules
//!
//! The evolution engine is generic over [`GeneSchema`]; each strategy family
//! contributes one implementation.

use serde::{Deserialize, Serialize};

use crate::config::{AverageKind, MovingAverageSettings, ParameterRange, TripleSmoothedSettings};
use crate::error::EngineResult;
use crate::genome::{GeneField, Genome, Locus};
use crate::random::RandomNumberProvider;
use crate::types::StrategyType;

/// Momentum period used when a gated genome carries a zero period
pub const DEFAULT_MOMENTUM_PERIOD: f64 = 7.0;
/// Upper/lower gate threshold used when a gated genome carries a zero threshold
pub const DEFAULT_MOMENTUM_THRESHOLD: f64 = 50.0;

pub trait GeneSchema {
    type Field: GeneField;

    fn range(&self, locus: Locus<Self::Field>) -> &ParameterRange;

    /// Check every range; called once when an engine is built
    fn validate(&self) -> EngineResult<()>;

    fn draw_strategy_type<R>(&self, rng: &mut R) -> StrategyType
    where
        R: RandomNumberProvider + ?Sized;

    /// Fill-time validity. Invalid candidates are regenerated, not repaired.
    fn is_valid(&self, genome: &Genome<Self::Field>) -> bool {
        genome.candle > 0.0
    }

    /// Replace zero gate fields with their defaults for gated strategy types
    fn apply_gate_defaults(&self, _genome: &mut Genome<Self::Field>) {}

    /// Post-mutation fixup
    fn repair(&self, genome: &mut Genome<Self::Field>) {
        self.apply_gate_defaults(genome);
    }
}

// ============================================================================
// Dual moving average
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaField {
    FastPeriod,
    SlowPeriod,
    CrossThreshold,
    MomentumPeriod,
    MomentumUpper,
    MomentumLower,
    AmplitudeTrigger,
}

impl GeneField for MaField {
    const ALL: &'static [Self] = &[
        MaField::FastPeriod,
        MaField::SlowPeriod,
        MaField::CrossThreshold,
        MaField::MomentumPeriod,
        MaField::MomentumUpper,
        MaField::MomentumLower,
        MaField::AmplitudeTrigger,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            MaField::FastPeriod => "fast_period",
            MaField::SlowPeriod => "slow_period",
            MaField::CrossThreshold => "cross_threshold",
            MaField::MomentumPeriod => "momentum_period",
            MaField::MomentumUpper => "momentum_upper",
            MaField::MomentumLower => "momentum_lower",
            MaField::AmplitudeTrigger => "amplitude_trigger",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MovingAverageSchema {
    settings: MovingAverageSettings,
}

impl MovingAverageSchema {
    pub fn new(settings: MovingAverageSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &MovingAverageSettings {
        &self.settings
    }
}

impl GeneSchema for MovingAverageSchema {
    type Field = MaField;

    fn range(&self, locus: Locus<MaField>) -> &ParameterRange {
        let s = &self.settings;
        match locus {
            Locus::Gene(MaField::FastPeriod) => &s.fast_period,
            Locus::Gene(MaField::SlowPeriod) => &s.slow_period,
            Locus::Gene(MaField::CrossThreshold) => &s.cross_threshold,
            Locus::Gene(MaField::MomentumPeriod) => &s.momentum_period,
            Locus::Gene(MaField::MomentumUpper) => &s.momentum_upper,
            Locus::Gene(MaField::MomentumLower) => &s.momentum_lower,
            Locus::Gene(MaField::AmplitudeTrigger) => &s.amplitude_trigger,
            Locus::Candle => &s.scalars.candle,
            Locus::StopLoss => &s.scalars.stop_loss,
            Locus::TakeProfit => &s.scalars.take_profit,
            Locus::TrailingStopLoss => &s.scalars.trailing_stop_loss,
        }
    }

    fn validate(&self) -> EngineResult<()> {
        self.settings.validate()
    }

    /// Coin flip between the plain and the momentum-gated variant of the configured average
    fn draw_strategy_type<R>(&self, rng: &mut R) -> StrategyType
    where
        R: RandomNumberProvider + ?Sized,
    {
        let gated = !rng.coin();
        match (self.settings.average, gated) {
            (AverageKind::Simple, false) => StrategyType::Sma,
            (AverageKind::Simple, true) => StrategyType::SmaMomentum,
            (AverageKind::Exponential, false) => StrategyType::Ema,
            (AverageKind::Exponential, true) => StrategyType::EmaMomentum,
        }
    }

    fn is_valid(&self, genome: &Genome<MaField>) -> bool {
        genome.candle > 0.0 && genome.genes[MaField::FastPeriod] <= genome.genes[MaField::SlowPeriod]
    }

    fn apply_gate_defaults(&self, genome: &mut Genome<MaField>) {
        if !genome.strategy_type.requires_momentum_gate() {
            return;
        }
        let genes = &mut genome.genes;
        if genes[MaField::MomentumPeriod] == 0.0 {
            genes[MaField::MomentumPeriod] = DEFAULT_MOMENTUM_PERIOD;
        }
        if genes[MaField::MomentumUpper] == 0.0 {
            genes[MaField::MomentumUpper] = DEFAULT_MOMENTUM_THRESHOLD;
        }
        if genes[MaField::MomentumLower] == 0.0 {
            genes[MaField::MomentumLower] = DEFAULT_MOMENTUM_THRESHOLD;
        }
    }

    /// Mutation repairs an inverted pair by swapping instead of regenerating
    fn repair(&self, genome: &mut Genome<MaField>) {
        self.apply_gate_defaults(genome);
        let fast = genome.genes[MaField::FastPeriod];
        let slow = genome.genes[MaField::SlowPeriod];
        if fast > slow {
            genome.genes[MaField::FastPeriod] = slow;
            genome.genes[MaField::SlowPeriod] = fast;
        }
    }
}

// ============================================================================
// Triple-smoothed momentum
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrixField {
    Period,
    SignalPeriod,
    Upper,
    Lower,
}

impl GeneField for TrixField {
    const ALL: &'static [Self] = &[
        TrixField::Period,
        TrixField::SignalPeriod,
        TrixField::Upper,
        TrixField::Lower,
    ];

    fn index(self) -> usize {
        self as usize
    }

    fn name(self) -> &'static str {
        match self {
            TrixField::Period => "period",
            TrixField::SignalPeriod => "signal_period",
            TrixField::Upper => "upper",
            TrixField::Lower => "lower",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TripleSmoothedSchema {
    settings: TripleSmoothedSettings,
}

impl TripleSmoothedSchema {
    pub fn new(settings: TripleSmoothedSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TripleSmoothedSettings {
        &self.settings
    }
}

impl GeneSchema for TripleSmoothedSchema {
    type Field = TrixField;

    fn range(&self, locus: Locus<TrixField>) -> &ParameterRange {
        let s = &self.settings;
        match locus {
            Locus::Gene(TrixField::Period) => &s.period,
            Locus::Gene(TrixField::SignalPeriod) => &s.signal_period,
            Locus::Gene(TrixField::Upper) => &s.upper,
            Locus::Gene(TrixField::Lower) => &s.lower,
            Locus::Candle => &s.scalars.candle,
            Locus::StopLoss => &s.scalars.stop_loss,
            Locus::TakeProfit => &s.scalars.take_profit,
            Locus::TrailingStopLoss => &s.scalars.trailing_stop_loss,
        }
    }

    fn validate(&self) -> EngineResult<()> {
        self.settings.validate()
    }

    fn draw_strategy_type<R>(&self, _rng: &mut R) -> StrategyType
    where
        R: RandomNumberProvider + ?Sized,
    {
        StrategyType::TripleSmoothed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HistoryMode, OriginTag};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ma_genome(strategy_type: StrategyType) -> Genome<MaField> {
        let mut g = Genome::blank(strategy_type, HistoryMode::TwoCandle, OriginTag::Rand);
        g.candle = 60.0;
        g
    }

    #[test]
    fn test_ma_validity() {
        let schema = MovingAverageSchema::default();
        let mut g = ma_genome(StrategyType::Sma);
        g.genes[MaField::FastPeriod] = 10.0;
        g.genes[MaField::SlowPeriod] = 20.0;
        assert!(schema.is_valid(&g));

        g.genes[MaField::FastPeriod] = 25.0;
        assert!(!schema.is_valid(&g));

        g.genes[MaField::FastPeriod] = 5.0;
        g.candle = 0.0;
        assert!(!schema.is_valid(&g));
    }

    #[test]
    fn test_gate_defaults_only_for_gated_types() {
        let schema = MovingAverageSchema::default();

        let mut plain = ma_genome(StrategyType::Ema);
        schema.apply_gate_defaults(&mut plain);
        assert_eq!(plain.genes[MaField::MomentumPeriod], 0.0);

        let mut gated = ma_genome(StrategyType::EmaMomentum);
        gated.genes[MaField::MomentumUpper] = 70.0;
        schema.apply_gate_defaults(&mut gated);
        assert_eq!(gated.genes[MaField::MomentumPeriod], DEFAULT_MOMENTUM_PERIOD);
        assert_eq!(gated.genes[MaField::MomentumUpper], 70.0);
        assert_eq!(gated.genes[MaField::MomentumLower], DEFAULT_MOMENTUM_THRESHOLD);
    }

    #[test]
    fn test_repair_swaps_inverted_periods() {
        let schema = MovingAverageSchema::default();
        let mut g = ma_genome(StrategyType::Sma);
        g.genes[MaField::FastPeriod] = 30.0;
        g.genes[MaField::SlowPeriod] = 12.0;
        schema.repair(&mut g);
        assert_eq!(g.genes[MaField::FastPeriod], 12.0);
        assert_eq!(g.genes[MaField::SlowPeriod], 30.0);
    }

    #[test]
    fn test_strategy_type_follows_average_kind() {
        let schema = MovingAverageSchema::new(MovingAverageSettings {
            average: AverageKind::Exponential,
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..50 {
            let t = schema.draw_strategy_type(&mut rng);
            assert!(matches!(t, StrategyType::Ema | StrategyType::EmaMomentum));
        }

        let trix = TripleSmoothedSchema::default();
        assert_eq!(
            trix.draw_strategy_type(&mut rng),
            StrategyType::TripleSmoothed
        );
    }

    #[test]
    fn test_trix_validity_only_checks_candle() {
        let schema = TripleSmoothedSchema::default();
        let mut g: Genome<TrixField> =
            Genome::blank(StrategyType::TripleSmoothed, HistoryMode::ThreeCandle, OriginTag::Rand);
        assert!(!schema.is_valid(&g));
        g.candle = 5.0;
        g.genes[TrixField::Period] = 30.0;
        g.genes[TrixField::SignalPeriod] = 2.0;
        assert!(schema.is_valid(&g));
    }
}
