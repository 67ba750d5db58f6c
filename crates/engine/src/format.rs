//! Reporting projection of backtest results

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::genome::{GeneField, Genome};
use crate::schema::{GeneSchema, MaField, MovingAverageSchema, TripleSmoothedSchema, TrixField};
use crate::types::{BacktestResult, HistoryMode, StrategyType};

/// Flat report record for one backtested genome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormattedResult {
    #[serde(flatten)]
    pub genes: BTreeMap<&'static str, f64>,
    pub sl: f64,
    /// Always 0 when a trailing stop is set
    pub tp: f64,
    pub tsl: f64,
    pub candle: f64,
    #[serde(rename = "type")]
    pub strategy_type: StrategyType,
    pub history: HistoryMode,
    pub positions: u32,
    pub profit: Decimal,
    pub annualized_performance: Decimal,
    pub expectancy: Decimal,
    pub probability_of_profit: Decimal,
    pub probability_of_loss: Decimal,
    pub average_profit: Decimal,
    pub average_loss: Decimal,
    pub id: String,
    pub max_adverse: Decimal,
    pub recovery: Decimal,
}

pub trait ResultFormatter: GeneSchema {
    /// Gene fields to report for this genome, with their reported values
    fn reported_genes(&self, genome: &Genome<Self::Field>) -> Vec<(Self::Field, f64)>;

    fn format_result(&self, result: &BacktestResult<Self::Field>) -> FormattedResult {
        let g = &result.genome;
        FormattedResult {
            genes: self
                .reported_genes(g)
                .into_iter()
                .map(|(field, v)| (field.name(), v))
                .collect(),
            sl: g.stop_loss,
            tp: if g.trailing_stop_loss != 0.0 {
                0.0
            } else {
                g.take_profit
            },
            tsl: g.trailing_stop_loss,
            candle: g.candle,
            strategy_type: g.strategy_type,
            history: g.history,
            positions: result.position_count,
            profit: result.net_profit,
            annualized_performance: result.annualized_performance,
            expectancy: result.expectancy,
            probability_of_profit: result.probability_of_profit,
            probability_of_loss: result.probability_of_loss,
            average_profit: result.average_profit,
            average_loss: result.average_loss,
            id: g.id.clone(),
            max_adverse: result.max_adverse,
            recovery: result.recovery,
        }
    }
}

impl ResultFormatter for MovingAverageSchema {
    /// Momentum gate fields only for gated types
    fn reported_genes(&self, genome: &Genome<MaField>) -> Vec<(MaField, f64)> {
        let gated = genome.strategy_type.requires_momentum_gate();
        genome
            .genes
            .iter()
            .filter(|(field, _)| {
                gated
                    || !matches!(
                        field,
                        MaField::MomentumPeriod | MaField::MomentumUpper | MaField::MomentumLower
                    )
            })
            .collect()
    }
}

impl ResultFormatter for TripleSmoothedSchema {
    /// The lower band is reported as its signed edge
    fn reported_genes(&self, genome: &Genome<TrixField>) -> Vec<(TrixField, f64)> {
        genome
            .genes
            .iter()
            .map(|(field, v)| match field {
                TrixField::Lower => (field, -v),
                _ => (field, v),
            })
            .collect()
    }
}
