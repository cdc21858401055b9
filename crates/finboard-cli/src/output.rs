use std::io::{self, Write};

use finboard_core::{CollectorError, FetchAttempt, UtcDateTime};
use serde::Serialize;
use serde_json::Value;

use crate::error::CliError;

/// Top-level JSON document written to stdout.
#[derive(Debug, Serialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub data: Value,
    pub errors: Vec<ReportError>,
}

#[derive(Debug, Serialize)]
pub struct ReportMeta {
    pub command: &'static str,
    pub provider: &'static str,
    pub generated_at: UtcDateTime,
    pub latency_ms: u64,
    /// Whether the DuckDB cache was in use.
    pub persistent: bool,
    pub warnings: Vec<String>,
}

/// One per-symbol failure.
#[derive(Debug, Clone, Serialize)]
pub struct ReportError {
    pub symbol: Option<String>,
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
    pub attempts: Vec<FetchAttempt>,
}

impl From<&CollectorError> for ReportError {
    fn from(error: &CollectorError) -> Self {
        let (symbol, retryable) = match error {
            CollectorError::InvalidTicker { symbol, .. } => (Some(symbol.to_string()), false),
            CollectorError::HardFailure {
                symbol, last_error, ..
            } => (Some(symbol.to_string()), last_error.retryable()),
            CollectorError::Validation(_) => (None, false),
        };
        Self {
            symbol,
            code: error.code(),
            message: error.to_string(),
            retryable,
            attempts: error.attempts().to_vec(),
        }
    }
}

pub fn render(report: &Report, pretty: bool) -> Result<(), CliError> {
    let payload = if pretty {
        serde_json::to_string_pretty(report)?
    } else {
        serde_json::to_string(report)?
    };

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{payload}")?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use finboard_core::{ProviderError, Symbol};

    use super::*;

    #[test]
    fn hard_failure_reports_retryable_classification() {
        let error = CollectorError::HardFailure {
            symbol: Symbol::parse("AAPL").expect("symbol"),
            last_error: ProviderError::rate_limited("HTTP 429"),
            attempts: Vec::new(),
        };

        let reported = ReportError::from(&error);
        assert_eq!(reported.symbol.as_deref(), Some("AAPL"));
        assert_eq!(reported.code, "collector.hard_failure");
        assert!(reported.retryable);
    }

    #[test]
    fn report_serializes_with_meta_data_errors() {
        let report = Report {
            meta: ReportMeta {
                command: "quote",
                provider: "yahoo",
                generated_at: UtcDateTime::parse("2024-05-01T00:00:00Z").expect("timestamp"),
                latency_ms: 12,
                persistent: false,
                warnings: Vec::new(),
            },
            data: serde_json::json!({ "quotes": [] }),
            errors: Vec::new(),
        };

        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["meta"]["command"], "quote");
        assert_eq!(value["meta"]["generated_at"], "2024-05-01T00:00:00Z");
        assert!(value["errors"].as_array().expect("errors array").is_empty());
    }
}
