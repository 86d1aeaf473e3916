use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::models::candle::Candle;
use crate::models::result::{BacktestReport, SignalRow};
use crate::models::trade::{TradeAction, TradeRecord};

/// Replay buy/sell signals with an all-in, all-out position.
///
/// While flat, a buy converts all capital into shares at the bar's close.
/// While holding, a sell converts all shares back to cash. No fees, no
/// slippage, no partial fills. A position still open after the last bar is
/// valued at the final close but is not recorded as a trade.
pub fn run_backtest(
    candles: &[Candle],
    signals: &[SignalRow],
    initial_capital: f64,
) -> Result<BacktestReport, AppError> {
    if candles.is_empty() {
        return Err(AppError::NoData);
    }
    if signals.len() != candles.len() {
        return Err(AppError::SignalLengthMismatch {
            signals: signals.len(),
            candles: candles.len(),
        });
    }
    if !initial_capital.is_finite() || initial_capital <= 0.0 {
        return Err(AppError::InvalidConfig(format!(
            "initial capital must be positive and finite, got {}",
            initial_capital
        )));
    }

    info!("Starting backtest: {} bars, capital={:.2}", candles.len(), initial_capital);

    let mut capital = initial_capital;
    let mut position = 0.0f64;
    let mut trades: Vec<TradeRecord> = Vec::new();

    for (candle, signal) in candles.iter().zip(signals) {
        let price = candle.close;

        if signal.buy && position == 0.0 {
            if !(price.is_finite() && price > 0.0) {
                warn!("Ignoring buy at {}: unusable price {}", candle.datetime, price);
                continue;
            }
            position = capital / price;
            capital = 0.0;
            trades.push(TradeRecord {
                date: candle.datetime.clone(),
                action: TradeAction::Buy,
                price,
                shares: position,
            });
            debug!("BUY {:.4} @ {:.4} on {}", position, price, candle.datetime);
        } else if signal.sell && position > 0.0 {
            capital = position * price;
            trades.push(TradeRecord {
                date: candle.datetime.clone(),
                action: TradeAction::Sell,
                price,
                shares: position,
            });
            debug!("SELL {:.4} @ {:.4} on {}", position, price, candle.datetime);
            position = 0.0;
        }
    }

    if position > 0.0 {
        if let Some(last) = candles.last() {
            capital = position * last.close;
            debug!("Marking open position to final close {:.4}", last.close);
        }
    }

    let total_return = (capital - initial_capital) / initial_capital * 100.0;
    info!(
        "Backtest complete: {} trades, final value {:.2} ({:.2}%)",
        trades.len(),
        capital,
        total_return
    );

    Ok(BacktestReport {
        final_value: capital,
        total_return,
        total_trades: trades.len(),
        trades,
    })
}
