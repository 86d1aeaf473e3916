use std::path::Path;

use serde::{Deserialize, Serialize};

use super::script::IndicatorKind;
use crate::errors::AppError;

/// Binds an indicator to the script input that holds its window length.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct IndicatorBinding {
    pub kind: IndicatorKind,
    /// Input name the generated formula references (e.g. `emaLength`).
    pub param_name: String,
    /// Window used when the script does not declare `param_name`.
    pub default_window: usize,
}

/// Converter settings. Every field has a default, so a config file only
/// needs the keys it overrides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConverterConfig {
    /// Title used when the script has no `strategy("...")` declaration.
    pub fallback_title: String,
    pub indicator_bindings: Vec<IndicatorBinding>,
    /// Filename offered for the generated code.
    pub output_filename: String,
    pub content_type: String,
    /// Default for the generated `backtest(initial_capital=...)` and the native preview.
    pub initial_capital: f64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            fallback_title: "Trading Strategy".into(),
            indicator_bindings: vec![
                IndicatorBinding {
                    kind: IndicatorKind::Ema,
                    param_name: "emaLength".into(),
                    default_window: 20,
                },
                IndicatorBinding {
                    kind: IndicatorKind::Sma,
                    param_name: "smaLength".into(),
                    default_window: 20,
                },
                IndicatorBinding {
                    kind: IndicatorKind::Rsi,
                    param_name: "rsiLength".into(),
                    default_window: 14,
                },
            ],
            output_filename: "strategy.py".into(),
            content_type: "text/plain".into(),
            initial_capital: 10_000.0,
        }
    }
}

impl ConverterConfig {
    /// Load a config from a JSON file, filling missing keys with defaults.
    pub fn from_json_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        let config: ConverterConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.output_filename.trim().is_empty() {
            return Err(AppError::InvalidConfig("output_filename must not be empty".into()));
        }
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            return Err(AppError::InvalidConfig(format!(
                "initial_capital must be positive and finite, got {}",
                self.initial_capital
            )));
        }
        for binding in &self.indicator_bindings {
            if binding.param_name.trim().is_empty() {
                return Err(AppError::InvalidConfig(format!(
                    "{} binding has an empty param_name",
                    binding.kind.label()
                )));
            }
            if binding.default_window == 0 {
                return Err(AppError::InvalidConfig(format!(
                    "{} binding has a zero default_window",
                    binding.kind.label()
                )));
            }
        }
        Ok(())
    }

    pub fn binding(&self, kind: IndicatorKind) -> Option<&IndicatorBinding> {
        self.indicator_bindings.iter().find(|b| b.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bindings() {
        let config = ConverterConfig::default();
        assert_eq!(config.binding(IndicatorKind::Ema).unwrap().param_name, "emaLength");
        assert_eq!(config.binding(IndicatorKind::Sma).unwrap().param_name, "smaLength");
        assert_eq!(config.binding(IndicatorKind::Rsi).unwrap().param_name, "rsiLength");
        assert!(config.binding(IndicatorKind::Macd).is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "initial_capital": 5000.0 }"#).unwrap();

        let config = ConverterConfig::from_json_path(&path).unwrap();
        assert_eq!(config.initial_capital, 5000.0);
        assert_eq!(config.output_filename, "strategy.py");
        assert_eq!(config.indicator_bindings.len(), 3);
    }

    #[test]
    fn test_custom_binding_from_json() {
        let json = r#"{
            "indicator_bindings": [
                { "kind": "ema", "param_name": "fastLen", "default_window": 9 }
            ]
        }"#;
        let config: ConverterConfig = serde_json::from_str(json).unwrap();
        let ema = config.binding(IndicatorKind::Ema).unwrap();
        assert_eq!(ema.param_name, "fastLen");
        assert_eq!(ema.default_window, 9);
        assert!(config.binding(IndicatorKind::Rsi).is_none());
    }

    #[test]
    fn test_rejects_unknown_fields_and_bad_values() {
        assert!(serde_json::from_str::<ConverterConfig>(r#"{ "bogus": 1 }"#).is_err());

        let config = ConverterConfig {
            initial_capital: 0.0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_non_finite_capital() {
        for capital in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let config = ConverterConfig {
                initial_capital: capital,
                ..Default::default()
            };
            assert!(matches!(config.validate(), Err(AppError::InvalidConfig(_))));
        }
    }
}
