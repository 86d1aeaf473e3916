use std::collections::HashMap;

use tracing::{debug, warn};

use super::indicators::{compute_indicator, IndicatorOutput};
use crate::models::candle::Candle;
use crate::models::config::ConverterConfig;
use crate::models::result::SignalRow;
use crate::models::script::{IndicatorKind, ScriptAnalysis, SignalRule, SignalSide};

/// Pre-computed indicator outputs keyed by kind.
pub type IndicatorCache = HashMap<IndicatorKind, IndicatorOutput>;

/// Compute every indicator the analysis detected, with its resolved window.
///
/// An indicator whose window resolves below 1 is left out of the cache, so
/// rules reading it never fire; the generated code fails on it the same way.
pub fn pre_compute_indicators(
    analysis: &ScriptAnalysis,
    candles: &[Candle],
    config: &ConverterConfig,
) -> IndicatorCache {
    let mut cache = IndicatorCache::new();
    for &kind in &analysis.indicators {
        let window = match analysis.window_for(kind, config) {
            Some(param) => match param.value() {
                Some(n) => n,
                None => {
                    warn!("Skipping {}: window {} is not a positive length", kind.label(), param.expr());
                    continue;
                }
            },
            None => kind.fallback_window(),
        };
        debug!("Computing {} with window {}", kind.label(), window);
        cache.insert(kind, compute_indicator(kind, window, candles));
    }
    cache
}

/// Evaluate the detected buy/sell rules bar by bar.
///
/// A side without a usable rule is false on every bar, matching the all-false
/// series the generated code falls back to.
pub fn generate_signals(
    analysis: &ScriptAnalysis,
    candles: &[Candle],
    config: &ConverterConfig,
) -> Vec<SignalRow> {
    let cache = pre_compute_indicators(analysis, candles, config);
    let buy_rule = analysis.rule_for(SignalSide::Buy);
    let sell_rule = analysis.rule_for(SignalSide::Sell);

    (0..candles.len())
        .map(|i| SignalRow {
            buy: buy_rule.is_some_and(|r| evaluate_rule(r, i, &cache, candles)),
            sell: sell_rule.is_some_and(|r| evaluate_rule(r, i, &cache, candles)),
        })
        .collect()
}

/// Evaluate a single rule at `bar_index`. NaN operands compare false.
pub fn evaluate_rule(rule: SignalRule, bar_index: usize, cache: &IndicatorCache, candles: &[Candle]) -> bool {
    if bar_index == 0 {
        return false;
    }
    let (Some(rsi), Some(ema)) = (
        cache.get(&IndicatorKind::Rsi),
        cache.get(&IndicatorKind::Ema),
    ) else {
        return false;
    };

    let curr = rsi.primary[bar_index];
    let prev = rsi.primary[bar_index - 1];
    let close = candles[bar_index].close;
    let ema_val = ema.primary[bar_index];
    let level = rule.threshold();

    match rule {
        SignalRule::RsiCrossover => curr > level && prev <= level && close > ema_val,
        SignalRule::RsiCrossunder => curr < level && prev >= level && close < ema_val,
    }
}
