use finboard_core::{DataCollector, HistoryPeriod};
use serde_json::json;

use crate::cli::HistoryArgs;
use crate::error::CliError;
use crate::output::ReportError;

use super::quote::outcome_warnings;
use super::{parse_symbol, CommandResult};

pub async fn run(args: &HistoryArgs, collector: &DataCollector, refresh: bool) -> Result<CommandResult, CliError> {
    let symbol = parse_symbol(&args.symbol)?;
    let period: HistoryPeriod = args.period.parse()?;

    match collector.fetch_with_indicators(&symbol, period, refresh).await {
        Ok(outcome) => {
            let mut warnings = outcome_warnings(&outcome);
            if outcome.snapshot.technical_indicators.is_none() {
                warnings.push(format!("{symbol}: indicators unavailable, history could not be fetched"));
            }
            Ok(CommandResult::ok(serde_json::to_value(outcome)?).with_warnings(warnings))
        }
        Err(error) => Ok(CommandResult::ok(json!({ "snapshot": null })).with_errors(vec![ReportError::from(&error)])),
    }
}
