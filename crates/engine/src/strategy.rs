//! Per-bar crossing decision engine
//!
//! A [`StrategyEngine`] owns one [`DecisionModel`] (the indicator streams and
//! the family's confirmation rules) and turns its signals into position
//! intents. Two models are provided: a dual moving average with an optional
//! momentum gate and amplitude override, and a triple-smoothed oscillator
//! crossing its own signal line outside a neutral band.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AverageKind;
use crate::error::{EngineError, EngineResult};
use crate::genome::Genome;
use crate::indicators::{
    momentum_oscillator, moving_average, triple_smoothed, CrossDetector, IndicatorStream,
    ThresholdCross,
};
use crate::positions::PositionManager;
use crate::schema::{
    GeneSchema, MaField, MovingAverageSchema, TripleSmoothedSchema, TrixField,
};
use crate::types::{HistoryMode, Kline, TradeSide};

/// Trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn side(self) -> Option<TradeSide> {
        match self {
            Signal::Buy => Some(TradeSide::Buy),
            Signal::Sell => Some(TradeSide::Sell),
            Signal::Hold => None,
        }
    }
}

/// Named history of one owned stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechSeries {
    pub name: &'static str,
    pub values: Vec<f64>,
}

// ============================================================================
// Decision models
// ============================================================================

pub trait DecisionModel: Send {
    /// Feed a bar without deciding
    fn prime(&mut self, bar: &Kline);

    /// Advance on a bar and classify it given the current position side
    fn evaluate(&mut self, bar: &Kline, history: HistoryMode, position: Option<TradeSide>)
        -> Signal;

    fn tech_data(&self) -> Vec<TechSeries>;
}

/// Prior pair for a crossing: the preceding sample, or three samples back once
/// both histories are deep enough
pub fn prior_pair(
    a: &dyn IndicatorStream,
    b: &dyn IndicatorStream,
    history: HistoryMode,
) -> Option<(f64, f64)> {
    if history == HistoryMode::ThreeCandle {
        let (ha, hb) = (a.history(), b.history());
        if ha.len() >= 3 && hb.len() >= 3 {
            return Some((ha[ha.len() - 3], hb[hb.len() - 3]));
        }
    }
    Some((a.previous()?, b.previous()?))
}

fn classify(
    cross: &dyn CrossDetector,
    a: &dyn IndicatorStream,
    b: &dyn IndicatorStream,
    history: HistoryMode,
) -> Signal {
    let (Some(current_a), Some(current_b)) = (a.current(), b.current()) else {
        return Signal::Hold;
    };
    match prior_pair(a, b, history) {
        Some((prior_a, prior_b)) => cross.classify(prior_a, prior_b, current_a, current_b),
        None => Signal::Hold,
    }
}

fn period(value: f64) -> usize {
    value.round().max(1.0) as usize
}

/// Oscillator confirmation: sells need the value above `upper`, buys below `lower`
pub struct MomentumGate {
    oscillator: Box<dyn IndicatorStream>,
    upper: f64,
    lower: f64,
}

impl MomentumGate {
    pub fn new(oscillator: Box<dyn IndicatorStream>, upper: f64, lower: f64) -> Self {
        Self {
            oscillator,
            upper,
            lower,
        }
    }

    fn confirms(&self, signal: Signal) -> bool {
        match (signal, self.oscillator.current()) {
            (Signal::Sell, Some(v)) => v > self.upper,
            (Signal::Buy, Some(v)) => v < self.lower,
            _ => false,
        }
    }
}

pub struct MovingAverageModel {
    fast: Box<dyn IndicatorStream>,
    slow: Box<dyn IndicatorStream>,
    cross: Box<dyn CrossDetector>,
    gate: Option<MomentumGate>,
    amplitude_trigger: f64,
}

impl MovingAverageModel {
    pub fn new(
        fast: Box<dyn IndicatorStream>,
        slow: Box<dyn IndicatorStream>,
        cross: Box<dyn CrossDetector>,
        gate: Option<MomentumGate>,
        amplitude_trigger: f64,
    ) -> Self {
        Self {
            fast,
            slow,
            cross,
            gate,
            amplitude_trigger,
        }
    }

    pub fn from_genome(genome: &Genome<MaField>) -> EngineResult<Self> {
        let genes = &genome.genes;
        let kind = if genome.strategy_type.uses_simple_average() {
            AverageKind::Simple
        } else {
            AverageKind::Exponential
        };
        let gate = if genome.strategy_type.requires_momentum_gate() {
            Some(MomentumGate::new(
                momentum_oscillator(period(genes[MaField::MomentumPeriod]))?,
                genes[MaField::MomentumUpper],
                genes[MaField::MomentumLower],
            ))
        } else {
            None
        };
        Ok(Self::new(
            moving_average(kind, period(genes[MaField::FastPeriod]))?,
            moving_average(kind, period(genes[MaField::SlowPeriod]))?,
            Box::new(ThresholdCross::new(genes[MaField::CrossThreshold])),
            gate,
            genes[MaField::AmplitudeTrigger],
        ))
    }

    /// Forced exit on a wide bar against the open position
    fn amplitude_override(&self, bar: &Kline, position: Option<TradeSide>) -> Option<Signal> {
        if self.amplitude_trigger <= 0.0 || bar.amplitude_pct() < self.amplitude_trigger {
            return None;
        }
        match (position, bar.is_green()) {
            (Some(TradeSide::Buy), false) => Some(Signal::Sell),
            (Some(TradeSide::Sell), true) => Some(Signal::Buy),
            _ => None,
        }
    }

    fn advance(&mut self, close: f64) {
        self.fast.advance(close);
        self.slow.advance(close);
        if let Some(gate) = self.gate.as_mut() {
            gate.oscillator.advance(close);
        }
    }
}

impl DecisionModel for MovingAverageModel {
    fn prime(&mut self, bar: &Kline) {
        self.advance(bar.close_f64());
    }

    fn evaluate(
        &mut self,
        bar: &Kline,
        history: HistoryMode,
        position: Option<TradeSide>,
    ) -> Signal {
        self.advance(bar.close_f64());

        if let Some(forced) = self.amplitude_override(bar, position) {
            debug!(amplitude = bar.amplitude_pct(), signal = ?forced, "Amplitude override");
            return forced;
        }

        let signal = classify(self.cross.as_ref(), self.fast.as_ref(), self.slow.as_ref(), history);
        match &self.gate {
            Some(gate) if signal != Signal::Hold && !gate.confirms(signal) => Signal::Hold,
            _ => signal,
        }
    }

    fn tech_data(&self) -> Vec<TechSeries> {
        let mut out = vec![
            TechSeries {
                name: "fast",
                values: self.fast.history().to_vec(),
            },
            TechSeries {
                name: "slow",
                values: self.slow.history().to_vec(),
            },
        ];
        if let Some(gate) = &self.gate {
            out.push(TechSeries {
                name: "momentum",
                values: gate.oscillator.history().to_vec(),
            });
        }
        out
    }
}

pub struct TripleSmoothedModel {
    oscillator: Box<dyn IndicatorStream>,
    signal: Box<dyn IndicatorStream>,
    cross: Box<dyn CrossDetector>,
    upper: f64,
    /// Positive magnitude; the band's lower edge is `-lower`
    lower: f64,
}

impl TripleSmoothedModel {
    pub fn new(
        oscillator: Box<dyn IndicatorStream>,
        signal: Box<dyn IndicatorStream>,
        upper: f64,
        lower: f64,
    ) -> Self {
        Self {
            oscillator,
            signal,
            cross: Box::new(ThresholdCross::new(0.0)),
            upper,
            lower,
        }
    }

    pub fn from_genome(genome: &Genome<TrixField>) -> EngineResult<Self> {
        let genes = &genome.genes;
        Ok(Self::new(
            triple_smoothed(period(genes[TrixField::Period]))?,
            moving_average(AverageKind::Simple, period(genes[TrixField::SignalPeriod]))?,
            genes[TrixField::Upper],
            genes[TrixField::Lower],
        ))
    }

    fn advance(&mut self, close: f64) -> Option<f64> {
        let value = self.oscillator.advance(close);
        if let Some(v) = value {
            self.signal.advance(v);
        }
        value
    }

    fn outside_band(&self, value: f64) -> bool {
        value < -self.lower || value > self.upper
    }
}

impl DecisionModel for TripleSmoothedModel {
    fn prime(&mut self, bar: &Kline) {
        self.advance(bar.close_f64());
    }

    fn evaluate(
        &mut self,
        bar: &Kline,
        history: HistoryMode,
        _position: Option<TradeSide>,
    ) -> Signal {
        let value = self.advance(bar.close_f64());
        let signal = classify(
            self.cross.as_ref(),
            self.oscillator.as_ref(),
            self.signal.as_ref(),
            history,
        );
        match value {
            Some(v) if signal != Signal::Hold && self.outside_band(v) => signal,
            _ => Signal::Hold,
        }
    }

    fn tech_data(&self) -> Vec<TechSeries> {
        vec![
            TechSeries {
                name: "trix",
                values: self.oscillator.history().to_vec(),
            },
            TechSeries {
                name: "signal",
                values: self.signal.history().to_vec(),
            },
        ]
    }
}

// ============================================================================
// Engine
// ============================================================================

/// What a decision call did to the position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Open(TradeSide),
    /// Closed the open position and went to the given side
    Reverse(TradeSide),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub signal: Signal,
    pub action: Action,
}

enum Lifecycle<M> {
    Active(M),
    Stopped,
}

pub struct StrategyEngine<M> {
    state: Lifecycle<M>,
    history: HistoryMode,
    exchange_managed: bool,
}

impl<M: DecisionModel> StrategyEngine<M> {
    /// With `exchange_managed`, reversing a position is one close-and-reverse intent
    pub fn new(model: M, history: HistoryMode, exchange_managed: bool) -> Self {
        Self {
            state: Lifecycle::Active(model),
            history,
            exchange_managed,
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self.state, Lifecycle::Stopped)
    }

    fn model(&mut self) -> EngineResult<&mut M> {
        match &mut self.state {
            Lifecycle::Active(model) => Ok(model),
            Lifecycle::Stopped => Err(EngineError::DisposedEngineUse),
        }
    }

    /// Buffer mode: feed the bar to every stream, no decision
    pub fn warm_up(&mut self, bar: &Kline) -> EngineResult<()> {
        self.model()?.prime(bar);
        Ok(())
    }

    pub fn decide(
        &mut self,
        bar: &Kline,
        now: i64,
        positions: Option<&mut dyn PositionManager>,
        eval_time: Option<i64>,
    ) -> EngineResult<Decision> {
        let history = self.history;
        let exchange_managed = self.exchange_managed;
        let model = self.model()?;
        let Some(positions) = positions else {
            return Err(EngineError::InvalidDecisionCall(
                "decision mode requires a position manager".into(),
            ));
        };
        if now == 0 {
            return Err(EngineError::InvalidDecisionCall(
                "decision mode requires a non-zero timestamp".into(),
            ));
        }

        let current = if positions.is_open() {
            positions.side()
        } else {
            None
        };
        let signal = model.evaluate(bar, history, current);

        let action = match (signal.side(), current) {
            (None, _) => Action::None,
            (Some(target), Some(side)) if side == target => Action::None,
            (Some(target), Some(_)) => {
                if exchange_managed {
                    positions.close(now, true, eval_time);
                } else {
                    positions.close(now, false, eval_time);
                    positions.open(now, target, eval_time);
                }
                Action::Reverse(target)
            }
            (Some(target), None) => {
                positions.open(now, target, eval_time);
                Action::Open(target)
            }
        };

        if action != Action::None {
            debug!(time = now, signal = ?signal, action = ?action, "Position transition");
        }
        Ok(Decision { signal, action })
    }

    /// Snapshot of the owned streams' histories
    pub fn history_tech_data(&self) -> EngineResult<Vec<TechSeries>> {
        match &self.state {
            Lifecycle::Active(model) => Ok(model.tech_data()),
            Lifecycle::Stopped => Err(EngineError::DisposedEngineUse),
        }
    }

    /// Drop the streams; every later call fails
    pub fn stop(&mut self) -> EngineResult<()> {
        self.model()?;
        self.state = Lifecycle::Stopped;
        Ok(())
    }
}

// ============================================================================
// Family wiring
// ============================================================================

/// Binds a gene schema to the decision model its genomes run as
pub trait StrategyFamily: GeneSchema {
    type Model: DecisionModel;

    fn model_for(&self, genome: &Genome<Self::Field>) -> EngineResult<Self::Model>;

    fn strategy_for(
        &self,
        genome: &Genome<Self::Field>,
        exchange_managed: bool,
    ) -> EngineResult<StrategyEngine<Self::Model>> {
        Ok(StrategyEngine::new(
            self.model_for(genome)?,
            genome.history,
            exchange_managed,
        ))
    }
}

impl StrategyFamily for MovingAverageSchema {
    type Model = MovingAverageModel;

    fn model_for(&self, genome: &Genome<MaField>) -> EngineResult<MovingAverageModel> {
        MovingAverageModel::from_genome(genome)
    }
}

impl StrategyFamily for TripleSmoothedSchema {
    type Model = TripleSmoothedModel;

    fn model_for(&self, genome: &Genome<TrixField>) -> EngineResult<TripleSmoothedModel> {
        TripleSmoothedModel::from_genome(genome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::positions::{PaperPositions, PositionIntent};
    use crate::types::{OriginTag, StrategyType};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;

    /// Stream replaying fixed outputs regardless of input
    struct Scripted {
        outputs: VecDeque<Option<f64>>,
        history: Vec<f64>,
    }

    fn scripted(outputs: &[Option<f64>]) -> Box<dyn IndicatorStream> {
        Box::new(Scripted {
            outputs: outputs.iter().copied().collect(),
            history: Vec::new(),
        })
    }

    fn values(outputs: &[f64]) -> Box<dyn IndicatorStream> {
        let wrapped: Vec<Option<f64>> = outputs.iter().map(|v| Some(*v)).collect();
        scripted(&wrapped)
    }

    impl IndicatorStream for Scripted {
        fn advance(&mut self, _value: f64) -> Option<f64> {
            let out = self.outputs.pop_front().flatten();
            if let Some(v) = out {
                self.history.push(v);
            }
            out
        }

        fn current(&self) -> Option<f64> {
            self.history.last().copied()
        }

        fn previous(&self) -> Option<f64> {
            let n = self.history.len();
            (n >= 2).then(|| self.history[n - 2])
        }

        fn history(&self) -> &[f64] {
            &self.history
        }
    }

    /// Model replaying fixed signals
    struct Replay(VecDeque<Signal>);

    impl DecisionModel for Replay {
        fn prime(&mut self, _bar: &Kline) {}

        fn evaluate(&mut self, _bar: &Kline, _h: HistoryMode, _p: Option<TradeSide>) -> Signal {
            self.0.pop_front().unwrap_or(Signal::Hold)
        }

        fn tech_data(&self) -> Vec<TechSeries> {
            Vec::new()
        }
    }

    fn replay(signals: &[Signal], exchange_managed: bool) -> StrategyEngine<Replay> {
        StrategyEngine::new(
            Replay(signals.iter().copied().collect()),
            HistoryMode::TwoCandle,
            exchange_managed,
        )
    }

    fn bar(time: i64, open: Decimal, high: Decimal, low: Decimal, close: Decimal) -> Kline {
        Kline {
            open_time: time,
            open,
            high,
            low,
            close,
            volume: dec!(10),
            close_time: time + 59,
        }
    }

    fn quiet(time: i64) -> Kline {
        bar(time, dec!(100), dec!(100.1), dec!(99.9), dec!(100))
    }

    fn plain_ma(fast: &[f64], slow: &[f64], amplitude_trigger: f64) -> MovingAverageModel {
        MovingAverageModel::new(
            values(fast),
            values(slow),
            Box::new(ThresholdCross::new(0.0)),
            None,
            amplitude_trigger,
        )
    }

    #[test]
    fn test_flat_buy_opens_once() {
        let mut engine = replay(&[Signal::Buy, Signal::Buy], false);
        let mut positions = PaperPositions::default();

        let first = engine.decide(&quiet(60), 60, Some(&mut positions), None).unwrap();
        assert_eq!(first.action, Action::Open(TradeSide::Buy));
        let second = engine.decide(&quiet(120), 120, Some(&mut positions), None).unwrap();
        assert_eq!(second.action, Action::None);

        assert_eq!(
            positions.intents(),
            &[PositionIntent::Open {
                time: 60,
                side: TradeSide::Buy,
                eval_time: None
            }]
        );
    }

    #[test]
    fn test_reverse_is_close_then_open() {
        let mut engine = replay(&[Signal::Buy, Signal::Sell], false);
        let mut positions = PaperPositions::default();
        engine.decide(&quiet(60), 60, Some(&mut positions), None).unwrap();
        engine.decide(&quiet(120), 120, Some(&mut positions), Some(99)).unwrap();

        assert_eq!(
            &positions.intents()[1..],
            &[
                PositionIntent::Close {
                    time: 120,
                    eval_time: Some(99)
                },
                PositionIntent::Open {
                    time: 120,
                    side: TradeSide::Sell,
                    eval_time: Some(99)
                },
            ]
        );
        assert_eq!(positions.side(), Some(TradeSide::Sell));
    }

    #[test]
    fn test_exchange_managed_reverse_is_single_intent() {
        let mut engine = replay(&[Signal::Sell, Signal::Buy], true);
        let mut positions = PaperPositions::default();
        engine.decide(&quiet(60), 60, Some(&mut positions), None).unwrap();
        let d = engine.decide(&quiet(120), 120, Some(&mut positions), Some(42)).unwrap();

        assert_eq!(d.action, Action::Reverse(TradeSide::Buy));
        assert_eq!(positions.intents().len(), 2);
        assert_eq!(
            positions.intents()[1],
            PositionIntent::Reverse {
                time: 120,
                eval_time: Some(42)
            }
        );
        assert_eq!(positions.side(), Some(TradeSide::Buy));
    }

    #[test]
    fn test_invalid_decision_calls() {
        let mut engine = replay(&[], false);
        let err = engine.decide(&quiet(60), 60, None, None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDecisionCall(_)));

        let mut positions = PaperPositions::default();
        let err = engine.decide(&quiet(60), 0, Some(&mut positions), None).unwrap_err();
        assert!(matches!(err, EngineError::InvalidDecisionCall(_)));
    }

    #[test]
    fn test_stopped_engine_rejects_calls() {
        let mut engine = replay(&[], false);
        engine.stop().unwrap();
        assert!(engine.is_stopped());

        let mut positions = PaperPositions::default();
        assert!(matches!(
            engine.decide(&quiet(60), 60, Some(&mut positions), None),
            Err(EngineError::DisposedEngineUse)
        ));
        assert!(matches!(engine.warm_up(&quiet(60)), Err(EngineError::DisposedEngineUse)));
        assert!(matches!(engine.history_tech_data(), Err(EngineError::DisposedEngineUse)));
        assert!(matches!(engine.stop(), Err(EngineError::DisposedEngineUse)));
    }

    #[test]
    fn test_three_candle_falls_back_with_short_history() {
        let fast = values(&[9.0, 11.0]);
        let slow = values(&[10.0, 10.0]);
        let mut two = plain_ma(&[9.0, 11.0], &[10.0, 10.0], 0.0);
        let mut three = MovingAverageModel::new(fast, slow, Box::new(ThresholdCross::new(0.0)), None, 0.0);

        two.prime(&quiet(60));
        three.prime(&quiet(60));
        let a = two.evaluate(&quiet(120), HistoryMode::TwoCandle, None);
        let b = three.evaluate(&quiet(120), HistoryMode::ThreeCandle, None);
        assert_eq!(a, Signal::Buy);
        assert_eq!(a, b);
    }

    #[test]
    fn test_three_candle_looks_further_back() {
        // fast was above slow two samples ago, so no fresh cross three back
        let mut two = plain_ma(&[11.0, 9.0, 12.0], &[10.0, 10.0, 10.0], 0.0);
        let mut three = plain_ma(&[11.0, 9.0, 12.0], &[10.0, 10.0, 10.0], 0.0);
        for m in [&mut two, &mut three] {
            m.prime(&quiet(60));
            m.prime(&quiet(120));
        }
        assert_eq!(two.evaluate(&quiet(180), HistoryMode::TwoCandle, None), Signal::Buy);
        assert_eq!(three.evaluate(&quiet(180), HistoryMode::ThreeCandle, None), Signal::Hold);
    }

    #[test]
    fn test_missing_values_hold() {
        let mut model = MovingAverageModel::new(
            scripted(&[None, None]),
            values(&[10.0, 10.0]),
            Box::new(ThresholdCross::new(0.0)),
            None,
            0.0,
        );
        model.prime(&quiet(60));
        assert_eq!(model.evaluate(&quiet(120), HistoryMode::TwoCandle, None), Signal::Hold);
    }

    #[test]
    fn test_momentum_gate_confirms_direction() {
        let make = |rsi: f64| {
            MovingAverageModel::new(
                values(&[9.0, 11.0]),
                values(&[10.0, 10.0]),
                Box::new(ThresholdCross::new(0.0)),
                Some(MomentumGate::new(values(&[rsi, rsi]), 70.0, 30.0)),
                0.0,
            )
        };
        let mut blocked = make(45.0);
        blocked.prime(&quiet(60));
        assert_eq!(blocked.evaluate(&quiet(120), HistoryMode::TwoCandle, None), Signal::Hold);

        let mut confirmed = make(25.0);
        confirmed.prime(&quiet(60));
        assert_eq!(confirmed.evaluate(&quiet(120), HistoryMode::TwoCandle, None), Signal::Buy);
    }

    #[test]
    fn test_amplitude_override_flips_long() {
        // No cross, gate would block everything
        let model = MovingAverageModel::new(
            values(&[11.0, 12.0, 13.0]),
            values(&[10.0, 10.0, 10.0]),
            Box::new(ThresholdCross::new(0.0)),
            Some(MomentumGate::new(values(&[50.0, 50.0, 50.0]), 90.0, 10.0)),
            2.0,
        );
        let mut engine = StrategyEngine::new(model, HistoryMode::TwoCandle, false);
        let mut positions = PaperPositions::default();
        positions.mark(&quiet(60));
        positions.open(60, TradeSide::Buy, None);
        engine.warm_up(&quiet(60)).unwrap();

        // 5% range, red
        let wide_red = bar(120, dec!(104), dec!(105), dec!(100), dec!(101));
        positions.mark(&wide_red);
        let d = engine.decide(&wide_red, 120, Some(&mut positions), None).unwrap();

        assert_eq!(d.signal, Signal::Sell);
        assert_eq!(d.action, Action::Reverse(TradeSide::Sell));
        assert!(matches!(positions.intents()[1], PositionIntent::Close { .. }));
        assert!(matches!(
            positions.intents()[2],
            PositionIntent::Open {
                side: TradeSide::Sell,
                ..
            }
        ));
    }

    #[test]
    fn test_amplitude_override_needs_matching_colour() {
        let mut model = plain_ma(&[11.0, 12.0], &[10.0, 10.0], 2.0);
        model.prime(&quiet(60));
        let wide_green = bar(120, dec!(101), dec!(105), dec!(100), dec!(104));
        assert_eq!(
            model.evaluate(&wide_green, HistoryMode::TwoCandle, Some(TradeSide::Buy)),
            Signal::Hold
        );
    }

    #[test]
    fn test_amplitude_override_exchange_managed() {
        let model = plain_ma(&[9.0, 8.0], &[10.0, 10.0], 1.0);
        let mut engine = StrategyEngine::new(model, HistoryMode::TwoCandle, true);
        let mut positions = PaperPositions::default();
        positions.mark(&quiet(60));
        positions.open(60, TradeSide::Sell, None);
        engine.warm_up(&quiet(60)).unwrap();

        let wide_green = bar(120, dec!(100), dec!(103), dec!(100), dec!(102));
        positions.mark(&wide_green);
        let d = engine.decide(&wide_green, 120, Some(&mut positions), None).unwrap();
        assert_eq!(d.action, Action::Reverse(TradeSide::Buy));
        assert_eq!(positions.intents().len(), 2);
        assert!(matches!(positions.intents()[1], PositionIntent::Reverse { .. }));
    }

    #[test]
    fn test_trix_neutral_band() {
        let make = |osc: [f64; 2]| TripleSmoothedModel {
            oscillator: values(&osc),
            signal: values(&[0.0, 0.0]),
            cross: Box::new(ThresholdCross::new(0.0)),
            upper: 0.02,
            lower: 0.01,
        };

        // Crosses above the signal line but inside [-0.01, 0.02]
        let mut weak = make([-0.005, 0.005]);
        weak.prime(&quiet(60));
        assert_eq!(weak.evaluate(&quiet(120), HistoryMode::TwoCandle, None), Signal::Hold);

        let mut strong = make([-0.005, 0.05]);
        strong.prime(&quiet(60));
        assert_eq!(strong.evaluate(&quiet(120), HistoryMode::TwoCandle, None), Signal::Buy);

        let mut down = make([0.005, -0.03]);
        down.prime(&quiet(60));
        assert_eq!(down.evaluate(&quiet(120), HistoryMode::TwoCandle, None), Signal::Sell);
    }

    #[test]
    fn test_trix_signal_line_skips_missing_values() {
        let mut model = TripleSmoothedModel::new(
            scripted(&[None, Some(1.0)]),
            values(&[1.0]),
            0.5,
            0.5,
        );
        model.prime(&quiet(60));
        assert!(model.signal.history().is_empty());
        model.prime(&quiet(120));
        assert_eq!(model.signal.history(), &[1.0]);
    }

    #[test]
    fn test_strategy_for_genome_runs() {
        let schema = MovingAverageSchema::default();
        let mut genome: Genome<MaField> =
            Genome::blank(StrategyType::SmaMomentum, HistoryMode::ThreeCandle, OriginTag::Rand);
        genome.genes[MaField::FastPeriod] = 3.0;
        genome.genes[MaField::SlowPeriod] = 8.0;
        genome.genes[MaField::MomentumPeriod] = 5.0;
        genome.genes[MaField::MomentumUpper] = 60.0;
        genome.genes[MaField::MomentumLower] = 40.0;
        genome.candle = 60.0;

        let mut engine = schema.strategy_for(&genome, false).unwrap();
        let mut positions = PaperPositions::default();
        for i in 0..40i64 {
            let price = Decimal::from(100 + (i % 7));
            let k = bar(60 * (i + 1), price, price + dec!(1), price - dec!(1), price);
            positions.mark(&k);
            if i < 10 {
                engine.warm_up(&k).unwrap();
            } else {
                engine.decide(&k, k.open_time, Some(&mut positions), None).unwrap();
            }
        }
        let tech = engine.history_tech_data().unwrap();
        let names: Vec<&str> = tech.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["fast", "slow", "momentum"]);
        assert!(tech.iter().all(|s| s.values.len() == crate::indicators::HISTORY_DEPTH));
    }

    #[test]
    fn test_trix_family_builds_from_genome() {
        let schema = TripleSmoothedSchema::default();
        let mut genome: Genome<TrixField> =
            Genome::blank(StrategyType::TripleSmoothed, HistoryMode::TwoCandle, OriginTag::Rand);
        genome.genes[TrixField::Period] = 4.0;
        genome.genes[TrixField::SignalPeriod] = 3.0;
        genome.genes[TrixField::Upper] = 0.01;
        genome.genes[TrixField::Lower] = 0.01;

        let mut engine = schema.strategy_for(&genome, true).unwrap();
        engine.warm_up(&quiet(60)).unwrap();
        engine.warm_up(&quiet(120)).unwrap();
        let tech = engine.history_tech_data().unwrap();
        assert_eq!(tech[0].values.len(), 1);
        assert_eq!(tech[1].values.len(), 1);
    }
}
