use serde::Serialize;

/// All application errors, categorized by domain.
///
/// Conversion itself never fails; these cover the file, data and preview
/// surfaces around it.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ── Data / Import ──
    #[error("Invalid CSV format: {0}")]
    InvalidCsvFormat(String),

    #[error("CSV parse error at row {row}: {message}")]
    CsvParseError { row: usize, message: String },

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    FileRead(String),

    #[error("Failed to write file: {0}")]
    FileWrite(String),

    // ── Configuration ──
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Backtest ──
    #[error("No candle data available")]
    NoData,

    #[error("Signal series length {signals} does not match candle count {candles}")]
    SignalLengthMismatch { signals: usize, candles: usize },

    // ── Serialization ──
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Serializable error response for callers that render errors as data.
#[derive(Debug, Serialize, Clone)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(err: &AppError) -> Self {
        let code = match err {
            AppError::InvalidCsvFormat(_) => "INVALID_CSV_FORMAT",
            AppError::CsvParseError { .. } => "CSV_PARSE_ERROR",
            AppError::FileNotFound(_) => "FILE_NOT_FOUND",
            AppError::FileRead(_) => "FILE_READ",
            AppError::FileWrite(_) => "FILE_WRITE",
            AppError::InvalidConfig(_) => "INVALID_CONFIG",
            AppError::NoData => "NO_DATA",
            AppError::SignalLengthMismatch { .. } => "SIGNAL_LENGTH_MISMATCH",
            AppError::Serialization(_) => "SERIALIZATION",
        };
        ErrorResponse {
            code: code.to_string(),
            message: err.to_string(),
        }
    }
}

impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let response = ErrorResponse::from(self);
        response.serialize(serializer)
    }
}

// ── Conversions from external errors ──

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::FileNotFound(err.to_string()),
            _ => AppError::FileRead(err.to_string()),
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(err: csv::Error) -> Self {
        let row = err
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(0);
        AppError::CsvParseError {
            row,
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let err = AppError::SignalLengthMismatch { signals: 3, candles: 4 };
        let resp = ErrorResponse::from(&err);
        assert_eq!(resp.code, "SIGNAL_LENGTH_MISMATCH");
        assert!(resp.message.contains("3"));
        assert!(resp.message.contains("4"));
    }

    #[test]
    fn test_io_not_found_maps_to_file_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.csv");
        assert!(matches!(AppError::from(io), AppError::FileNotFound(_)));
    }

    #[test]
    fn test_serializes_as_error_response() {
        let json = serde_json::to_value(AppError::NoData).unwrap();
        assert_eq!(json["code"], "NO_DATA");
        assert_eq!(json["message"], "No candle data available");
    }
}
