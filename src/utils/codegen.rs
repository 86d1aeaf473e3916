use std::fmt::Write as FmtWrite;

use serde::Serialize;
use tracing::info;

use crate::engine::indicators::{MACD_FAST, MACD_SIGNAL, MACD_SLOW};
use crate::engine::scanner::analyze_script;
use crate::models::config::ConverterConfig;
use crate::models::script::{IndicatorKind, ScriptAnalysis, SignalRule, SignalSide, WindowParam};

// ══════════════════════════════════════════════════════════════
// Public API: types
// ══════════════════════════════════════════════════════════════

/// A single generated code file.
#[derive(Debug, Clone, Serialize)]
pub struct CodeFile {
    pub filename: String,
    pub code: String,
    /// Whether this is the main file (the strategy class).
    pub is_main: bool,
}

/// Result of code generation.
#[derive(Debug, Clone, Serialize)]
pub struct CodeGenerationResult {
    pub files: Vec<CodeFile>,
}

impl CodeGenerationResult {
    /// Code of the main file.
    pub fn main_code(&self) -> &str {
        self.files
            .iter()
            .find(|f| f.is_main)
            .map(|f| f.code.as_str())
            .unwrap_or("")
    }
}

// ══════════════════════════════════════════════════════════════
// Public API
// ══════════════════════════════════════════════════════════════

/// Convert a Pine Script strategy into a Python strategy class.
///
/// Never fails: unrecognised input yields a minimal but valid skeleton.
pub fn convert(source: &str) -> String {
    convert_with_config(source, &ConverterConfig::default())
}

/// [`convert`] with explicit settings.
pub fn convert_with_config(source: &str, config: &ConverterConfig) -> String {
    let analysis = analyze_script(source, config);
    let mut result = generate_python(&analysis, config);
    result
        .files
        .pop()
        .map(|f| f.code)
        .unwrap_or_default()
}

/// Render an analysed script as a Python strategy class.
pub fn generate_python(analysis: &ScriptAnalysis, config: &ConverterConfig) -> CodeGenerationResult {
    let mut out = String::with_capacity(4096);
    let class_name = python_class_name(analysis, config);

    python_header(&mut out);
    python_class(&mut out, &class_name, analysis);
    python_indicators(&mut out, analysis, config);
    python_signals(&mut out, analysis);
    python_backtest(&mut out, config);

    info!(
        "Generated {} ({} inputs, {} indicators, {} rules)",
        class_name,
        analysis.inputs.len(),
        analysis.indicators.len(),
        analysis.rules.len()
    );

    CodeGenerationResult {
        files: vec![CodeFile {
            filename: config.output_filename.clone(),
            code: out,
            is_main: true,
        }],
    }
}

// ══════════════════════════════════════════════════════════════
// Shared helpers
// ══════════════════════════════════════════════════════════════

/// Strategy name without spaces and `+`. An empty result falls back to the
/// configured title so the class statement stays valid.
fn python_class_name(analysis: &ScriptAnalysis, config: &ConverterConfig) -> String {
    let name = analysis.class_name();
    if name.is_empty() {
        config.fallback_title.replace([' ', '+'], "")
    } else {
        name
    }
}

/// Format a float as a Python literal: integral values without a fraction.
fn py_number(v: f64) -> String {
    if v == v.floor() && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Escape text placed inside a `"""` docstring.
fn py_doc_text(text: &str) -> String {
    text.replace('\\', "\\\\")
}

// ══════════════════════════════════════════════════════════════
// Python Generation
// ══════════════════════════════════════════════════════════════

fn python_header(out: &mut String) {
    writeln!(out, "import pandas as pd").ok();
    writeln!(out, "import numpy as np").ok();
    writeln!(out, "import matplotlib.pyplot as plt").ok();
    writeln!(out, "from typing import Tuple, Optional").ok();
    writeln!(out).ok();
    writeln!(out).ok();
}

fn python_class(out: &mut String, class_name: &str, analysis: &ScriptAnalysis) {
    writeln!(out, "class {}:", class_name).ok();
    writeln!(out, "    def __init__(self, data: pd.DataFrame):").ok();
    writeln!(out, "        \"\"\"").ok();
    writeln!(out, "        {}", py_doc_text(&analysis.strategy_name)).ok();
    writeln!(out).ok();
    writeln!(out, "        Parameters:").ok();
    writeln!(out, "        data (pd.DataFrame): OHLCV data with columns ['open', 'high', 'low', 'close', 'volume']").ok();
    writeln!(out, "        \"\"\"").ok();
    writeln!(out, "        self.data = data.copy()").ok();
    writeln!(out, "        self.signals = pd.DataFrame(index=data.index)").ok();
    writeln!(out).ok();
}

fn python_indicators(out: &mut String, analysis: &ScriptAnalysis, config: &ConverterConfig) {
    let params: Vec<String> = analysis
        .inputs
        .iter()
        .map(|input| format!("{}: int = {}", input.name, input.default))
        .collect();

    if params.is_empty() {
        writeln!(out, "    def calculate_indicators(self):").ok();
    } else {
        writeln!(out, "    def calculate_indicators(self, {}):", params.join(", ")).ok();
    }

    if analysis.inputs.is_empty() {
        writeln!(out, "        \"\"\"Calculate technical indicators\"\"\"").ok();
    } else {
        writeln!(out, "        \"\"\"").ok();
        writeln!(out, "        Calculate technical indicators").ok();
        writeln!(out).ok();
        writeln!(out, "        Parameters:").ok();
        for input in analysis.inputs.iter() {
            writeln!(out, "        {} (int): {}", input.name, py_doc_text(&input.title)).ok();
        }
        writeln!(out, "        \"\"\"").ok();
    }

    for kind in IndicatorKind::ALL {
        if !analysis.has_indicator(kind) {
            continue;
        }
        let window = analysis.window_for(kind, config);
        python_indicator_block(out, kind, window.as_ref());
    }

    writeln!(out).ok();
}

fn python_indicator_block(out: &mut String, kind: IndicatorKind, window: Option<&WindowParam>) {
    let w = window.map(|w| w.expr()).unwrap_or_default();

    writeln!(out, "        # {} calculation", kind.label()).ok();
    if let Some(WindowParam::Literal(n)) = window {
        writeln!(out, "        # No matching length input declared; using {}", n).ok();
    }

    match kind {
        IndicatorKind::Ema => {
            writeln!(out, "        self.data['ema'] = self.data['close'].ewm(span={}).mean()", w).ok();
        }
        IndicatorKind::Sma => {
            writeln!(out, "        self.data['sma'] = self.data['close'].rolling(window={}).mean()", w).ok();
        }
        IndicatorKind::Rsi => {
            writeln!(out, "        delta = self.data['close'].diff()").ok();
            writeln!(out, "        gain = (delta.where(delta > 0, 0)).rolling(window={}).mean()", w).ok();
            writeln!(out, "        loss = (-delta.where(delta < 0, 0)).rolling(window={}).mean()", w).ok();
            writeln!(out, "        rs = gain / loss").ok();
            writeln!(out, "        self.data['rsi'] = 100 - (100 / (1 + rs))").ok();
        }
        IndicatorKind::Macd => {
            writeln!(out, "        ema{0} = self.data['close'].ewm(span={0}).mean()", MACD_FAST).ok();
            writeln!(out, "        ema{0} = self.data['close'].ewm(span={0}).mean()", MACD_SLOW).ok();
            writeln!(out, "        self.data['macd'] = ema{} - ema{}", MACD_FAST, MACD_SLOW).ok();
            writeln!(out, "        self.data['macd_signal'] = self.data['macd'].ewm(span={}).mean()", MACD_SIGNAL).ok();
            writeln!(out, "        self.data['macd_histogram'] = self.data['macd'] - self.data['macd_signal']").ok();
        }
    }
}

fn python_signals(out: &mut String, analysis: &ScriptAnalysis) {
    writeln!(out, "    def generate_signals(self):").ok();
    writeln!(out, "        \"\"\"Generate buy/sell signals based on strategy logic\"\"\"").ok();

    python_condition(out, analysis, SignalSide::Buy);
    python_condition(out, analysis, SignalSide::Sell);

    writeln!(out).ok();
    writeln!(out, "        self.signals['buy'] = buy_condition").ok();
    writeln!(out, "        self.signals['sell'] = sell_condition").ok();
    writeln!(out).ok();
    writeln!(out, "        return self.signals").ok();
    writeln!(out).ok();
}

/// Emit `buy_condition` / `sell_condition`. Always defines the variable.
fn python_condition(out: &mut String, analysis: &ScriptAnalysis, side: SignalSide) {
    let var = match side {
        SignalSide::Buy => "buy_condition",
        SignalSide::Sell => "sell_condition",
    };

    if let Some(rule) = analysis.rule_for(side) {
        python_rule_block(out, rule, var);
        return;
    }

    let matched_but_unusable = analysis.rules.iter().any(|r| r.side() == side);
    if matched_but_unusable {
        writeln!(out, "        # {} pattern found, but RSI and EMA are not both calculated", side_label(side)).ok();
    } else {
        writeln!(out, "        # No {} pattern detected", side_label(side).to_lowercase()).ok();
    }
    writeln!(out, "        {} = pd.Series(False, index=self.data.index)", var).ok();
}

fn python_rule_block(out: &mut String, rule: SignalRule, var: &str) {
    let level = py_number(rule.threshold());
    match rule {
        SignalRule::RsiCrossover => {
            writeln!(out, "        # Buy condition: RSI crosses above {} AND close > EMA", level).ok();
            writeln!(
                out,
                "        rsi_crossover = (self.data['rsi'] > {0}) & (self.data['rsi'].shift(1) <= {0})",
                level
            )
            .ok();
            writeln!(out, "        {} = rsi_crossover & (self.data['close'] > self.data['ema'])", var).ok();
        }
        SignalRule::RsiCrossunder => {
            writeln!(out, "        # Sell condition: RSI crosses below {} AND close < EMA", level).ok();
            writeln!(
                out,
                "        rsi_crossunder = (self.data['rsi'] < {0}) & (self.data['rsi'].shift(1) >= {0})",
                level
            )
            .ok();
            writeln!(out, "        {} = rsi_crossunder & (self.data['close'] < self.data['ema'])", var).ok();
        }
    }
}

fn side_label(side: SignalSide) -> &'static str {
    match side {
        SignalSide::Buy => "Buy",
        SignalSide::Sell => "Sell",
    }
}

fn python_backtest(out: &mut String, config: &ConverterConfig) {
    writeln!(
        out,
        "    def backtest(self, initial_capital: float = {}) -> dict:",
        py_number(config.initial_capital)
    )
    .ok();
    writeln!(out, "        \"\"\"Simple backtest implementation\"\"\"").ok();
    writeln!(out, "        capital = initial_capital").ok();
    writeln!(out, "        position = 0").ok();
    writeln!(out, "        trades = []").ok();
    writeln!(out).ok();
    writeln!(out, "        for i, (date, row) in enumerate(self.signals.iterrows()):").ok();
    writeln!(out, "            current_price = self.data.loc[date, 'close']").ok();
    writeln!(out).ok();
    writeln!(out, "            if row['buy'] and position == 0:").ok();
    writeln!(out, "                position = capital / current_price").ok();
    writeln!(out, "                capital = 0").ok();
    writeln!(out, "                trades.append({{").ok();
    writeln!(out, "                    'date': date, 'action': 'BUY', 'price': current_price, 'shares': position").ok();
    writeln!(out, "                }})").ok();
    writeln!(out).ok();
    writeln!(out, "            elif row['sell'] and position > 0:").ok();
    writeln!(out, "                capital = position * current_price").ok();
    writeln!(out, "                trades.append({{").ok();
    writeln!(out, "                    'date': date, 'action': 'SELL', 'price': current_price, 'shares': position").ok();
    writeln!(out, "                }})").ok();
    writeln!(out, "                position = 0").ok();
    writeln!(out).ok();
    writeln!(out, "        if position > 0:").ok();
    writeln!(out, "            final_price = self.data['close'].iloc[-1]").ok();
    writeln!(out, "            capital = position * final_price").ok();
    writeln!(out).ok();
    writeln!(out, "        return {{").ok();
    writeln!(out, "            'final_value': capital,").ok();
    writeln!(out, "            'total_return': (capital - initial_capital) / initial_capital * 100,").ok();
    writeln!(out, "            'total_trades': len(trades),").ok();
    writeln!(out, "            'trades': trades").ok();
    writeln!(out, "        }}").ok();
}

// ══════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════
