use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::models::config::ConverterConfig;
use crate::models::script::{DetectedInput, IndicatorKind, InputMap, ScriptAnalysis, SignalRule};

/// `strategy("Title"`: first quoted argument of the declaration call.
static STRATEGY_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"strategy\("([^"]+)""#).unwrap());

/// `name = input.int(50, title="Title")`. Defaults are ASCII digits only.
static INT_INPUT_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*input\.int\(([0-9]+),\s*title="([^"]+)"\)"#).unwrap()
});

/// Scan a script for everything the converter recognises.
///
/// Never fails: anything that does not match is simply absent from the result.
pub fn analyze_script(source: &str, config: &ConverterConfig) -> ScriptAnalysis {
    let (strategy_name, name_detected) = match extract_strategy_name(source) {
        Some(name) => (name, true),
        None => (config.fallback_title.clone(), false),
    };

    let inputs = extract_inputs(source);

    let indicators: Vec<IndicatorKind> = IndicatorKind::ALL
        .into_iter()
        .filter(|kind| source.contains(kind.keyword()))
        .collect();

    let rules: Vec<SignalRule> = SignalRule::ALL
        .into_iter()
        .filter(|rule| rule.patterns().iter().all(|p| source.contains(p)))
        .collect();

    debug!(
        "Scanned script: name={:?} (detected={}), inputs={}, indicators={:?}, rules={:?}",
        strategy_name,
        name_detected,
        inputs.len(),
        indicators,
        rules
    );

    ScriptAnalysis {
        strategy_name,
        name_detected,
        inputs,
        indicators,
        rules,
    }
}

/// Title of the first `strategy("...")` declaration.
pub fn extract_strategy_name(source: &str) -> Option<String> {
    STRATEGY_DECL
        .captures(source)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// All integer inputs, in first-seen order.
pub fn extract_inputs(source: &str) -> InputMap {
    let mut inputs = InputMap::new();
    for caps in INT_INPUT_DECL.captures_iter(source) {
        let (_, [name, default, title]) = caps.extract();
        match default.parse::<i64>() {
            Ok(default) => inputs.insert(DetectedInput {
                name: name.to_string(),
                default,
                title: title.to_string(),
            }),
            Err(e) => warn!("Skipping input {}: default {} is not a valid integer ({})", name, default, e),
        }
    }
    inputs
}
