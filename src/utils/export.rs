use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::AppError;
use crate::models::result::BacktestReport;
use crate::models::trade::TradeRecord;
use crate::utils::codegen::CodeFile;

/// Write a generated file into `dir`, creating the directory if needed.
/// Returns the full path written.
pub fn write_code_file(file: &CodeFile, dir: &Path) -> Result<PathBuf, AppError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| AppError::FileWrite(format!("Cannot create {}: {}", dir.display(), e)))?;

    let path = dir.join(&file.filename);
    let mut out = std::fs::File::create(&path)
        .map_err(|e| AppError::FileWrite(format!("Cannot create {}: {}", path.display(), e)))?;
    out.write_all(file.code.as_bytes())
        .map_err(|e| AppError::FileWrite(e.to_string()))?;

    info!("Wrote {} ({} bytes)", path.display(), file.code.len());
    Ok(path)
}

/// Write the trade ledger to a CSV file.
pub fn write_trades_csv(trades: &[TradeRecord], path: &Path) -> Result<(), AppError> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| AppError::FileWrite(format!("Cannot create CSV: {}", e)))?;

    wtr.write_record(["Date", "Action", "Price", "Shares"])
        .map_err(|e| AppError::FileWrite(e.to_string()))?;

    for t in trades {
        let price = format!("{:.6}", t.price);
        let shares = format!("{:.6}", t.shares);
        wtr.write_record([t.date.as_str(), t.action.as_str(), price.as_str(), shares.as_str()])
            .map_err(|e| AppError::FileWrite(e.to_string()))?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// Write a backtest report as pretty-printed JSON.
pub fn write_report_json(report: &BacktestReport, path: &Path) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)
        .map_err(|e| AppError::FileWrite(format!("Cannot write {}: {}", path.display(), e)))?;
    Ok(())
}
