use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::data::loader;
use crate::engine::{executor, scanner, signals};
use crate::errors::AppError;
use crate::models::config::ConverterConfig;
use crate::models::result::BacktestReport;
use crate::models::script::ScriptAnalysis;
use crate::utils::codegen::{self, CodeFile};
use crate::utils::export;

/// The sample strategy shown to first-time users.
pub const DEFAULT_SCRIPT: &str = r#"//@version=5
strategy("RSI + EMA Strategy", overlay=true)
emaLength = input.int(50, title="EMA Length")
rsiLength = input.int(14, title="RSI Length")
ema = ta.ema(close, emaLength)
rsi = ta.rsi(close, rsiLength)
buy = crossover(rsi, 30) and close > ema
sell = crossunder(rsi, 70) and close < ema
plot(ema, color=color.orange, title="EMA")
strategy.entry("Buy", strategy.long, when=buy)
strategy.close("Buy", when=sell)"#;

/// Generated code together with what the scanner recognised.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionOutput {
    pub code: String,
    pub analysis: ScriptAnalysis,
}

/// A generated file ready to be offered for download.
#[derive(Debug, Clone, Serialize)]
pub struct DownloadPayload {
    pub filename: String,
    pub content_type: String,
    pub contents: String,
}

// ── Conversion Commands ──

/// The documented sample input.
pub fn default_script() -> &'static str {
    DEFAULT_SCRIPT
}

/// Convert a script. Never fails; unrecognised input yields a skeleton.
pub fn convert_script(source: &str, config: &ConverterConfig) -> ConversionOutput {
    let analysis = scanner::analyze_script(source, config);
    let result = codegen::generate_python(&analysis, config);
    ConversionOutput {
        code: result.main_code().to_string(),
        analysis,
    }
}

/// Wrap generated code as a download with the configured filename and type.
pub fn download_payload(code: &str, config: &ConverterConfig) -> DownloadPayload {
    DownloadPayload {
        filename: config.output_filename.clone(),
        content_type: config.content_type.clone(),
        contents: code.to_string(),
    }
}

/// Save a download payload into `dir`.
pub fn save_download(payload: &DownloadPayload, dir: &Path) -> Result<PathBuf, AppError> {
    let file = CodeFile {
        filename: payload.filename.clone(),
        code: payload.contents.clone(),
        is_main: true,
    };
    export::write_code_file(&file, dir)
}

// ── Preview Commands ──

/// Run the recognised strategy natively over a CSV of candles.
pub fn preview_backtest(
    source: &str,
    csv_path: &Path,
    config: &ConverterConfig,
) -> Result<BacktestReport, AppError> {
    let analysis = scanner::analyze_script(source, config);
    info!(
        "Previewing backtest: strategy={}, data={}",
        analysis.strategy_name,
        csv_path.display()
    );

    let candles = loader::load_candles_csv(csv_path)?;
    let signal_rows = signals::generate_signals(&analysis, &candles, config);
    executor::run_backtest(&candles, &signal_rows, config.initial_capital)
}

/// Write the trade ledger and/or the full report, when a path is given.
pub fn save_backtest_outputs(
    report: &BacktestReport,
    trades_path: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<(), AppError> {
    if let Some(path) = trades_path {
        export::write_trades_csv(&report.trades, path)?;
        info!("Trades written to {}", path.display());
    }
    if let Some(path) = report_path {
        export::write_report_json(report, path)?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_script_converts() {
        let output = convert_script(default_script(), &ConverterConfig::default());
        assert!(output.code.contains("class RSIEMAStrategy:"));
        assert_eq!(output.analysis.inputs.len(), 2);
        assert_eq!(output.analysis.rules.len(), 2);
    }

    #[test]
    fn test_download_payload_defaults() {
        let payload = download_payload("print(1)\n", &ConverterConfig::default());
        assert_eq!(payload.filename, "strategy.py");
        assert_eq!(payload.content_type, "text/plain");
        assert_eq!(payload.contents, "print(1)\n");
    }

    #[test]
    fn test_save_download() {
        let dir = tempfile::tempdir().unwrap();
        let output = convert_script(default_script(), &ConverterConfig::default());
        let payload = download_payload(&output.code, &ConverterConfig::default());

        let path = save_download(&payload, dir.path()).unwrap();
        assert!(path.ends_with("strategy.py"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), output.code);
    }

    #[test]
    fn test_preview_backtest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("prices.csv");
        let closes = [10.0, 9.0, 8.0, 7.0, 12.0, 13.0, 14.0, 6.0, 5.0];
        let mut csv = String::from("date,close\n");
        for (i, c) in closes.iter().enumerate() {
            csv.push_str(&format!("2024-01-{:02},{}\n", i + 1, c));
        }
        std::fs::write(&csv_path, csv).unwrap();

        let script = r#"strategy("Reversal")
emaLength = input.int(3, title="EMA Length")
rsiLength = input.int(2, title="RSI Length")
ema = ta.ema(close, emaLength)
rsi = ta.rsi(close, rsiLength)
buy = crossover(rsi, 30) and close > ema
sell = crossunder(rsi, 70) and close < ema"#;

        let report = preview_backtest(script, &csv_path, &ConverterConfig::default()).unwrap();
        assert_eq!(report.total_trades, 2);
        // Buy at 12, sell at 6
        assert_eq!(report.trades[0].price, 12.0);
        assert_eq!(report.trades[1].price, 6.0);
        assert!((report.final_value - 5_000.0).abs() < 1e-9);
        assert!((report.total_return + 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_save_backtest_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let report = BacktestReport {
            final_value: 10_000.0,
            total_return: 0.0,
            total_trades: 0,
            trades: vec![],
        };
        let trades_path = dir.path().join("trades.csv");
        let report_path = dir.path().join("report.json");

        save_backtest_outputs(&report, None, Some(&report_path)).unwrap();
        assert!(!trades_path.exists());
        let saved: BacktestReport =
            serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(saved, report);

        save_backtest_outputs(&report, Some(&trades_path), None).unwrap();
        assert_eq!(
            std::fs::read_to_string(&trades_path).unwrap().trim(),
            "Date,Action,Price,Shares"
        );
    }

    #[test]
    fn test_preview_missing_data_file() {
        let err = preview_backtest(
            default_script(),
            Path::new("/no/such/prices.csv"),
            &ConverterConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::FileNotFound(_)));
    }
}
