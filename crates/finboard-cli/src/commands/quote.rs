use finboard_core::{DataCollector, FetchOutcome};
use serde::Serialize;

use crate::cli::QuoteArgs;
use crate::error::CliError;
use crate::output::ReportError;

use super::{parse_symbol, CommandResult};

#[derive(Debug, Serialize)]
struct QuoteResponseData {
    quotes: Vec<FetchOutcome>,
}

pub async fn run(args: &QuoteArgs, collector: &DataCollector, refresh: bool) -> Result<CommandResult, CliError> {
    let symbols = args
        .symbols
        .iter()
        .map(|raw| parse_symbol(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let mut quotes = Vec::new();
    let mut warnings = Vec::new();
    let mut errors = Vec::new();
    for outcome in collector.fetch_many(symbols, refresh).await.into_values() {
        match outcome {
            Ok(outcome) => {
                warnings.extend(outcome_warnings(&outcome));
                quotes.push(outcome);
            }
            Err(error) => errors.push(ReportError::from(&error)),
        }
    }

    let data = serde_json::to_value(QuoteResponseData { quotes })?;
    Ok(CommandResult::ok(data)
        .with_warnings(warnings)
        .with_errors(errors))
}

/// Warnings for stale or non-persisted outcomes.
pub(super) fn outcome_warnings(outcome: &FetchOutcome) -> Vec<String> {
    let symbol = &outcome.snapshot.symbol;
    let mut warnings = Vec::new();
    if outcome.is_stale() {
        warnings.push(format!(
            "{symbol}: serving stale snapshot fetched at {}",
            outcome.snapshot.fetched_at
        ));
    }
    if outcome.cache_degraded {
        warnings.push(format!("{symbol}: snapshot could not be written to the local cache"));
    }
    warnings
}
