use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::models::candle::Candle;

const DATETIME_ALIASES: [&str; 4] = ["datetime", "date", "time", "timestamp"];

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y.%m.%d %H:%M:%S",
];

/// Column positions resolved from the header row.
struct ColumnMap {
    datetime: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    close: usize,
    volume: Option<usize>,
}

/// Load OHLCV candles from a CSV file with a header row.
///
/// Only the datetime and close columns are required; missing open/high/low
/// default to the close and a missing volume to zero. Header names are
/// matched case-insensitively.
pub fn load_candles_csv(path: &Path) -> Result<Vec<Candle>, AppError> {
    if !path.exists() {
        return Err(AppError::FileNotFound(path.display().to_string()));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = rdr.headers()?.clone();
    let columns = resolve_columns(&headers)?;

    let mut candles = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record?;
        // Header is line 1
        let row = i + 2;

        let datetime = record.get(columns.datetime).unwrap_or("").to_string();
        if datetime.is_empty() {
            return Err(AppError::CsvParseError {
                row,
                message: "empty datetime".into(),
            });
        }

        let close = parse_field(&record, columns.close, "close", row)?;
        let open = optional_field(&record, columns.open, "open", row)?.unwrap_or(close);
        let high = optional_field(&record, columns.high, "high", row)?.unwrap_or(close);
        let low = optional_field(&record, columns.low, "low", row)?.unwrap_or(close);
        let volume = optional_field(&record, columns.volume, "volume", row)?.unwrap_or(0.0);

        candles.push(Candle {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    check_chronological(&candles)?;
    info!("Loaded {} candles from {}", candles.len(), path.display());
    Ok(candles)
}

fn resolve_columns(headers: &csv::StringRecord) -> Result<ColumnMap, AppError> {
    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let find = |name: &str| lower.iter().position(|h| h == name);

    let datetime = DATETIME_ALIASES
        .iter()
        .find_map(|alias| find(*alias))
        .ok_or_else(|| AppError::InvalidCsvFormat("missing datetime column".into()))?;
    let close = find("close")
        .ok_or_else(|| AppError::InvalidCsvFormat("missing close column".into()))?;

    Ok(ColumnMap {
        datetime,
        open: find("open"),
        high: find("high"),
        low: find("low"),
        close,
        volume: find("volume"),
    })
}

fn parse_field(record: &csv::StringRecord, idx: usize, name: &str, row: usize) -> Result<f64, AppError> {
    let raw = record.get(idx).unwrap_or("");
    let value: f64 = raw.parse().map_err(|_| AppError::CsvParseError {
        row,
        message: format!("invalid {} value {:?}", name, raw),
    })?;
    if !value.is_finite() {
        return Err(AppError::CsvParseError {
            row,
            message: format!("non-finite {} value", name),
        });
    }
    Ok(value)
}

fn optional_field(
    record: &csv::StringRecord,
    idx: Option<usize>,
    name: &str,
    row: usize,
) -> Result<Option<f64>, AppError> {
    match idx {
        Some(idx) if !record.get(idx).unwrap_or("").is_empty() => {
            parse_field(record, idx, name, row).map(Some)
        }
        _ => Ok(None),
    }
}

/// Parse a candle timestamp in any of the accepted layouts.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Reject files whose timestamps go backwards. Unparseable timestamps are
/// kept as opaque labels and skip the check.
fn check_chronological(candles: &[Candle]) -> Result<(), AppError> {
    let parsed: Option<Vec<NaiveDateTime>> =
        candles.iter().map(|c| parse_datetime(&c.datetime)).collect();

    let Some(times) = parsed else {
        warn!("Candle timestamps not in a recognised format; skipping order check");
        return Ok(());
    };

    if let Some(pos) = times.windows(2).position(|w| w[1] < w[0]) {
        return Err(AppError::InvalidCsvFormat(format!(
            "rows are not in chronological order at {}",
            candles[pos + 1].datetime
        )));
    }
    Ok(())
}
