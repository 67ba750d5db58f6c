//! Position manager seam and an in-memory paper implementation
//!
//! The decision engine only ever talks to [`PositionManager`]. `PaperPositions`
//! fills intents at the last marked close, enforces percent exits and keeps the
//! realized trades for metric computation.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use tracing::debug;

use crate::types::{BacktestTrade, Kline, TradeSide};

pub trait PositionManager {
    fn is_open(&self) -> bool;

    /// Side of the open position, `None` when flat
    fn side(&self) -> Option<TradeSide>;

    fn open(&mut self, now: i64, side: TradeSide, eval_time: Option<i64>);

    /// Close the open position; with `reopen_opposite` the close and the
    /// opposite open form a single intent
    fn close(&mut self, now: i64, reopen_opposite: bool, eval_time: Option<i64>);
}

/// Every call a decision engine made, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PositionIntent {
    Open {
        time: i64,
        side: TradeSide,
        eval_time: Option<i64>,
    },
    Close {
        time: i64,
        eval_time: Option<i64>,
    },
    Reverse {
        time: i64,
        eval_time: Option<i64>,
    },
}

/// Percent exits; zero disables a rule. A trailing stop supersedes take-profit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitRules {
    pub stop_loss_pct: Decimal,
    pub take_profit_pct: Decimal,
    pub trailing_stop_pct: Decimal,
}

impl ExitRules {
    pub fn from_percentages(stop_loss: f64, take_profit: f64, trailing_stop: f64) -> Self {
        let pct = |v: f64| Decimal::from_f64(v).unwrap_or(Decimal::ZERO).max(Decimal::ZERO);
        Self {
            stop_loss_pct: pct(stop_loss),
            take_profit_pct: pct(take_profit),
            trailing_stop_pct: pct(trailing_stop),
        }
    }
}

#[derive(Debug, Clone)]
struct OpenPosition {
    entry_time: i64,
    entry_price: Decimal,
    side: TradeSide,
    /// Most favourable price seen since entry
    extreme: Decimal,
}

#[derive(Debug, Default)]
pub struct PaperPositions {
    rules: ExitRules,
    position: Option<OpenPosition>,
    mark_price: Decimal,
    mark_time: i64,
    intents: Vec<PositionIntent>,
    trades: Vec<BacktestTrade>,
}

impl PaperPositions {
    pub fn new(rules: ExitRules) -> Self {
        Self {
            rules,
            ..Default::default()
        }
    }

    /// Set the fill price and time for subsequent intents
    pub fn mark(&mut self, bar: &Kline) {
        self.mark_price = bar.close;
        self.mark_time = bar.open_time;
    }

    pub fn intents(&self) -> &[PositionIntent] {
        &self.intents
    }

    pub fn trades(&self) -> &[BacktestTrade] {
        &self.trades
    }

    pub fn into_trades(self) -> Vec<BacktestTrade> {
        self.trades
    }

    /// Apply stop-loss, trailing stop and take-profit against the bar's range.
    /// Returns true when the position was closed.
    pub fn check_exits(&mut self, bar: &Kline) -> bool {
        let Some(pos) = self.position.as_mut() else {
            return false;
        };
        let hundred = dec!(100);
        let rules = self.rules;

        let exit_price = match pos.side {
            TradeSide::Buy => {
                let stop = pos.entry_price * (hundred - rules.stop_loss_pct) / hundred;
                let trail = pos.extreme * (hundred - rules.trailing_stop_pct) / hundred;
                let target = pos.entry_price * (hundred + rules.take_profit_pct) / hundred;
                if rules.stop_loss_pct > Decimal::ZERO && bar.low <= stop {
                    Some(stop)
                } else if rules.trailing_stop_pct > Decimal::ZERO && bar.low <= trail {
                    Some(trail)
                } else if rules.trailing_stop_pct.is_zero()
                    && rules.take_profit_pct > Decimal::ZERO
                    && bar.high >= target
                {
                    Some(target)
                } else {
                    pos.extreme = pos.extreme.max(bar.high);
                    None
                }
            }
            TradeSide::Sell => {
                let stop = pos.entry_price * (hundred + rules.stop_loss_pct) / hundred;
                let trail = pos.extreme * (hundred + rules.trailing_stop_pct) / hundred;
                let target = pos.entry_price * (hundred - rules.take_profit_pct) / hundred;
                if rules.stop_loss_pct > Decimal::ZERO && bar.high >= stop {
                    Some(stop)
                } else if rules.trailing_stop_pct > Decimal::ZERO && bar.high >= trail {
                    Some(trail)
                } else if rules.trailing_stop_pct.is_zero()
                    && rules.take_profit_pct > Decimal::ZERO
                    && bar.low <= target
                {
                    Some(target)
                } else {
                    pos.extreme = pos.extreme.min(bar.low);
                    None
                }
            }
        };

        match exit_price {
            Some(price) => {
                debug!(price = %price, time = bar.open_time, "Exit rule hit");
                self.realize(bar.open_time, price);
                true
            }
            None => false,
        }
    }

    fn fill(&mut self, time: i64, side: TradeSide) {
        self.position = Some(OpenPosition {
            entry_time: time,
            entry_price: self.mark_price,
            side,
            extreme: self.mark_price,
        });
    }

    fn realize(&mut self, time: i64, exit_price: Decimal) {
        let Some(pos) = self.position.take() else {
            return;
        };
        let pnl_pct = if pos.entry_price > Decimal::ZERO {
            let change = (exit_price - pos.entry_price) / pos.entry_price * dec!(100);
            match pos.side {
                TradeSide::Buy => change,
                TradeSide::Sell => -change,
            }
        } else {
            Decimal::ZERO
        };
        debug!(
            entry = %pos.entry_price,
            exit = %exit_price,
            pnl_pct = %pnl_pct,
            "Closed position"
        );
        self.trades.push(BacktestTrade {
            entry_time: pos.entry_time,
            exit_time: time,
            side: pos.side,
            entry_price: pos.entry_price,
            exit_price,
            pnl_pct,
        });
    }
}

impl PositionManager for PaperPositions {
    fn is_open(&self) -> bool {
        self.position.is_some()
    }

    fn side(&self) -> Option<TradeSide> {
        self.position.as_ref().map(|p| p.side)
    }

    fn open(&mut self, now: i64, side: TradeSide, eval_time: Option<i64>) {
        self.intents.push(PositionIntent::Open {
            time: now,
            side,
            eval_time,
        });
        if self.position.is_none() {
            self.fill(self.mark_time, side);
        }
    }

    fn close(&mut self, now: i64, reopen_opposite: bool, eval_time: Option<i64>) {
        let previous = self.side();
        self.intents.push(if reopen_opposite {
            PositionIntent::Reverse {
                time: now,
                eval_time,
            }
        } else {
            PositionIntent::Close {
                time: now,
                eval_time,
            }
        });
        self.realize(self.mark_time, self.mark_price);
        if let (true, Some(side)) = (reopen_opposite, previous) {
            self.fill(self.mark_time, side.opposite());
        }
    }
}
