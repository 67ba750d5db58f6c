//! Bar-by-bar replay of a genome over historical klines

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::genome::{GeneField, Genome};
use crate::positions::{ExitRules, PaperPositions, PositionManager};
use crate::strategy::StrategyFamily;
use crate::types::{BacktestResult, BacktestTrade, Kline};

const MS_PER_DAY: i64 = 86_400_000;

/// Backtest runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub symbol: String,
    /// Bars fed in buffer mode before decisions start
    pub warmup_bars: usize,
    pub exchange_managed: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            warmup_bars: 50,
            exchange_managed: false,
        }
    }
}

impl BacktestConfig {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

pub trait BacktestRunner<F: GeneField> {
    fn run(&self, genome: &Genome<F>) -> EngineResult<BacktestResult<F>>;
}

/// Replays a fixed kline series for every genome of one family
pub struct KlineBacktester<'a, S> {
    family: &'a S,
    klines: &'a [Kline],
    config: BacktestConfig,
}

impl<'a, S: StrategyFamily> KlineBacktester<'a, S> {
    pub fn new(family: &'a S, klines: &'a [Kline], config: BacktestConfig) -> Self {
        Self {
            family,
            klines,
            config,
        }
    }
}

impl<S: StrategyFamily> BacktestRunner<S::Field> for KlineBacktester<'_, S> {
    fn run(&self, genome: &Genome<S::Field>) -> EngineResult<BacktestResult<S::Field>> {
        let bars = resample(self.klines, genome.candle)?;
        let mut strategy = self.family.strategy_for(genome, self.config.exchange_managed)?;
        let mut positions = PaperPositions::new(ExitRules::from_percentages(
            genome.stop_loss,
            genome.take_profit,
            genome.trailing_stop_loss,
        ));

        info!(
            symbol = %self.config.symbol,
            genome = %genome.id,
            bars = bars.len(),
            warmup = self.config.warmup_bars,
            "Starting backtest"
        );

        for (i, bar) in bars.iter().enumerate() {
            positions.mark(bar);
            if i < self.config.warmup_bars {
                strategy.warm_up(bar)?;
                continue;
            }
            positions.check_exits(bar);
            strategy.decide(bar, bar.close_time, Some(&mut positions), None)?;
        }

        // Close any remaining open position at last bar
        if let Some(last) = bars.last() {
            if positions.is_open() {
                positions.close(last.close_time, false, None);
            }
        }
        strategy.stop()?;

        let span_days = match (bars.first(), bars.last()) {
            (Some(first), Some(last)) => {
                Decimal::from(last.close_time - first.open_time) / Decimal::from(MS_PER_DAY)
            }
            _ => Decimal::ZERO,
        };
        let result = summarize(genome.clone(), positions.into_trades(), span_days);

        info!(
            genome = %genome.id,
            positions = result.position_count,
            net_profit = %result.net_profit,
            max_adverse = %result.max_adverse,
            "Backtest complete"
        );
        Ok(result)
    }
}

/// Aggregate klines into buckets of `candle_secs` seconds
pub fn resample(klines: &[Kline], candle_secs: f64) -> EngineResult<Vec<Kline>> {
    let width = match (candle_secs.round() as i64).checked_mul(1000) {
        Some(width) if width > 0 => width,
        _ => {
            return Err(EngineError::InvalidConfig(format!(
                "candle interval must be positive and finite, got {candle_secs}"
            )))
        }
    };

    let mut out: Vec<Kline> = Vec::new();
    let mut bucket = None;
    for k in klines {
        let key = k.open_time.div_euclid(width);
        match out.last_mut() {
            Some(bar) if bucket == Some(key) => {
                bar.high = bar.high.max(k.high);
                bar.low = bar.low.min(k.low);
                bar.close = k.close;
                bar.volume += k.volume;
                bar.close_time = k.close_time;
            }
            _ => {
                bucket = Some(key);
                out.push(Kline {
                    open_time: key * width,
                    ..k.clone()
                });
            }
        }
    }
    Ok(out)
}

/// Performance metrics from realized trades
pub fn summarize<F: GeneField>(
    genome: Genome<F>,
    trades: Vec<BacktestTrade>,
    span_days: Decimal,
) -> BacktestResult<F> {
    if trades.is_empty() {
        return BacktestResult::empty(genome);
    }
    let hundred = dec!(100);
    let count = Decimal::from(trades.len());

    let wins: Vec<Decimal> = trades
        .iter()
        .filter(|t| t.pnl_pct > Decimal::ZERO)
        .map(|t| t.pnl_pct)
        .collect();
    let losses: Vec<Decimal> = trades
        .iter()
        .filter(|t| t.pnl_pct <= Decimal::ZERO)
        .map(|t| t.pnl_pct)
        .collect();

    let mean = |values: &[Decimal]| {
        if values.is_empty() {
            Decimal::ZERO
        } else {
            values.iter().sum::<Decimal>() / Decimal::from(values.len())
        }
    };
    let win_share = Decimal::from(wins.len()) / count;
    let loss_share = Decimal::from(losses.len()) / count;
    let average_profit = mean(&wins);
    let average_loss = mean(&losses);

    let net_profit: Decimal = trades.iter().map(|t| t.pnl_pct).sum();

    // Max drawdown of the cumulative return curve, starting flat
    let mut cumulative = Decimal::ZERO;
    let mut peak = Decimal::ZERO;
    let mut max_adverse = Decimal::ZERO;
    for t in &trades {
        cumulative += t.pnl_pct;
        peak = peak.max(cumulative);
        max_adverse = max_adverse.max(peak - cumulative);
    }

    let annualized_performance = if span_days > Decimal::ZERO {
        net_profit * dec!(365) / span_days
    } else {
        Decimal::ZERO
    };
    let recovery = if max_adverse > Decimal::ZERO {
        net_profit / max_adverse
    } else {
        Decimal::ZERO
    };

    BacktestResult {
        genome,
        position_count: trades.len() as u32,
        net_profit,
        probability_of_profit: win_share * hundred,
        probability_of_loss: loss_share * hundred,
        average_profit,
        average_loss,
        expectancy: win_share * average_profit + loss_share * average_loss,
        annualized_performance,
        max_adverse,
        recovery,
        trades,
    }
}
