use serde::{Deserialize, Serialize};

use super::trade::TradeRecord;

/// Buy/sell flags for one bar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRow {
    pub buy: bool,
    pub sell: bool,
}

/// Summary of a full-capital backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    pub final_value: f64,
    /// Percent return on the initial capital.
    pub total_return: f64,
    pub total_trades: usize,
    pub trades: Vec<TradeRecord>,
}
