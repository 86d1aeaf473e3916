use serde::{Deserialize, Serialize};

use super::config::ConverterConfig;

// ── Indicators ──

/// Indicators the converter knows how to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorKind {
    Ema,
    Sma,
    Rsi,
    Macd,
}

impl IndicatorKind {
    /// All kinds, in the order their blocks are emitted.
    pub const ALL: [IndicatorKind; 4] = [
        IndicatorKind::Ema,
        IndicatorKind::Sma,
        IndicatorKind::Rsi,
        IndicatorKind::Macd,
    ];

    /// Literal whose presence anywhere in the script marks the indicator as used.
    pub fn keyword(&self) -> &'static str {
        match self {
            IndicatorKind::Ema => "ta.ema",
            IndicatorKind::Sma => "ta.sma",
            IndicatorKind::Rsi => "ta.rsi",
            IndicatorKind::Macd => "ta.macd",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IndicatorKind::Ema => "EMA",
            IndicatorKind::Sma => "SMA",
            IndicatorKind::Rsi => "RSI",
            IndicatorKind::Macd => "MACD",
        }
    }

    /// Whether the formula takes a window length parameter.
    pub fn is_windowed(&self) -> bool {
        !matches!(self, IndicatorKind::Macd)
    }

    /// Window used when neither the script nor the config provides one.
    pub fn fallback_window(&self) -> usize {
        match self {
            IndicatorKind::Ema | IndicatorKind::Sma => 20,
            IndicatorKind::Rsi => 14,
            IndicatorKind::Macd => 26,
        }
    }
}

// ── Signal rules ──

/// Which side of the book a rule feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalSide {
    Buy,
    Sell,
}

/// Fixed entry/exit patterns recognised in a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalRule {
    /// RSI crosses above 30 while close is above the EMA.
    RsiCrossover,
    /// RSI crosses below 70 while close is below the EMA.
    RsiCrossunder,
}

impl SignalRule {
    pub const ALL: [SignalRule; 2] = [SignalRule::RsiCrossover, SignalRule::RsiCrossunder];

    /// Both literals must appear in the script for the rule to match.
    pub fn patterns(&self) -> [&'static str; 2] {
        match self {
            SignalRule::RsiCrossover => ["crossover(rsi, 30)", "close > ema"],
            SignalRule::RsiCrossunder => ["crossunder(rsi, 70)", "close < ema"],
        }
    }

    pub fn side(&self) -> SignalSide {
        match self {
            SignalRule::RsiCrossover => SignalSide::Buy,
            SignalRule::RsiCrossunder => SignalSide::Sell,
        }
    }

    pub fn threshold(&self) -> f64 {
        match self {
            SignalRule::RsiCrossover => 30.0,
            SignalRule::RsiCrossunder => 70.0,
        }
    }

    /// Indicator columns the rule's expression reads.
    pub fn requires(&self) -> [IndicatorKind; 2] {
        [IndicatorKind::Rsi, IndicatorKind::Ema]
    }
}

// ── Inputs ──

/// An `input.int` declaration found in the script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedInput {
    pub name: String,
    pub default: i64,
    pub title: String,
}

/// Detected inputs keyed by name, in first-seen order.
///
/// Re-declaring a name replaces its default and title but keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InputMap {
    entries: Vec<DetectedInput>,
}

impl InputMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, input: DetectedInput) {
        match self.entries.iter_mut().find(|e| e.name == input.name) {
            Some(existing) => *existing = input,
            None => self.entries.push(input),
        }
    }

    pub fn get(&self, name: &str) -> Option<&DetectedInput> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DetectedInput> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ── Window resolution ──

/// Where an indicator's window length comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowParam {
    /// A detected input: the generated code references it by name.
    Input { name: String, value: i64 },
    /// No matching input: the window is inlined as a literal.
    Literal(usize),
}

impl WindowParam {
    /// Python expression for the window argument.
    pub fn expr(&self) -> String {
        match self {
            WindowParam::Input { name, .. } => name.clone(),
            WindowParam::Literal(n) => n.to_string(),
        }
    }

    /// Concrete window length for native computation, or `None` when the
    /// length is below 1 (pandas rejects such a window at run time).
    pub fn value(&self) -> Option<usize> {
        let n = match self {
            WindowParam::Input { value, .. } => usize::try_from(*value).ok()?,
            WindowParam::Literal(n) => *n,
        };
        (n >= 1).then_some(n)
    }
}

// ── Analysis ──

/// Everything the scanner recognised in one script.
///
/// Code generation and the native preview both work from this record, so the
/// set of emitted blocks is decided in exactly one place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptAnalysis {
    pub strategy_name: String,
    /// False when the fallback title was used.
    pub name_detected: bool,
    pub inputs: InputMap,
    /// Detected indicators, in `IndicatorKind::ALL` order.
    pub indicators: Vec<IndicatorKind>,
    /// Detected rules, in `SignalRule::ALL` order.
    pub rules: Vec<SignalRule>,
}

impl ScriptAnalysis {
    pub fn has_indicator(&self, kind: IndicatorKind) -> bool {
        self.indicators.contains(&kind)
    }

    /// A rule is usable only if every indicator column it reads is computed.
    pub fn rule_is_usable(&self, rule: SignalRule) -> bool {
        self.rules.contains(&rule) && rule.requires().iter().all(|k| self.has_indicator(*k))
    }

    /// Usable rule for one side, if any.
    pub fn rule_for(&self, side: SignalSide) -> Option<SignalRule> {
        self.rules
            .iter()
            .copied()
            .find(|r| r.side() == side && self.rule_is_usable(*r))
    }

    /// Resolve an indicator's window through the configured binding.
    pub fn window_for(&self, kind: IndicatorKind, config: &ConverterConfig) -> Option<WindowParam> {
        if !kind.is_windowed() {
            return None;
        }
        let param = match config.binding(kind) {
            Some(binding) => match self.inputs.get(&binding.param_name) {
                Some(input) => WindowParam::Input {
                    name: input.name.clone(),
                    value: input.default,
                },
                None => WindowParam::Literal(binding.default_window),
            },
            None => WindowParam::Literal(kind.fallback_window()),
        };
        Some(param)
    }

    /// Strategy name with spaces and `+` removed, used as the class name.
    pub fn class_name(&self) -> String {
        self.strategy_name.replace([' ', '+'], "")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str, default: i64) -> DetectedInput {
        DetectedInput {
            name: name.into(),
            default,
            title: format!("{} title", name),
        }
    }

    #[test]
    fn test_input_map_keeps_first_position_last_value() {
        let mut map = InputMap::new();
        map.insert(input("a", 1));
        map.insert(input("b", 2));
        map.insert(input("a", 3));

        let names: Vec<&str> = map.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
        assert_eq!(map.get("a").unwrap().default, 3);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_class_name_strips_spaces_and_plus() {
        let analysis = ScriptAnalysis {
            strategy_name: "RSI + EMA Strategy".into(),
            name_detected: true,
            inputs: InputMap::new(),
            indicators: vec![],
            rules: vec![],
        };
        assert_eq!(analysis.class_name(), "RSIEMAStrategy");
    }

    #[test]
    fn test_window_resolution() {
        let mut inputs = InputMap::new();
        inputs.insert(input("emaLength", 50));
        let analysis = ScriptAnalysis {
            strategy_name: "x".into(),
            name_detected: true,
            inputs,
            indicators: vec![IndicatorKind::Ema, IndicatorKind::Rsi, IndicatorKind::Macd],
            rules: vec![],
        };
        let config = ConverterConfig::default();

        let ema = analysis.window_for(IndicatorKind::Ema, &config).unwrap();
        assert_eq!(ema.expr(), "emaLength");
        assert_eq!(ema.value(), Some(50));

        let rsi = analysis.window_for(IndicatorKind::Rsi, &config).unwrap();
        assert_eq!(rsi, WindowParam::Literal(14));
        assert_eq!(rsi.expr(), "14");

        assert!(analysis.window_for(IndicatorKind::Macd, &config).is_none());
    }

    #[test]
    fn test_window_value_rejects_non_positive() {
        let zero = WindowParam::Input {
            name: "emaLength".into(),
            value: 0,
        };
        let negative = WindowParam::Input {
            name: "emaLength".into(),
            value: -5,
        };
        assert_eq!(zero.value(), None);
        assert_eq!(negative.value(), None);
        assert_eq!(zero.expr(), "emaLength");
        assert_eq!(WindowParam::Literal(0).value(), None);
        assert_eq!(WindowParam::Literal(9).value(), Some(9));
    }

    #[test]
    fn test_rule_requires_indicators() {
        let mut analysis = ScriptAnalysis {
            strategy_name: "x".into(),
            name_detected: true,
            inputs: InputMap::new(),
            indicators: vec![IndicatorKind::Rsi],
            rules: vec![SignalRule::RsiCrossover],
        };
        assert!(!analysis.rule_is_usable(SignalRule::RsiCrossover));
        assert_eq!(analysis.rule_for(SignalSide::Buy), None);

        analysis.indicators.insert(0, IndicatorKind::Ema);
        assert_eq!(analysis.rule_for(SignalSide::Buy), Some(SignalRule::RsiCrossover));
        assert_eq!(analysis.rule_for(SignalSide::Sell), None);
    }
}
