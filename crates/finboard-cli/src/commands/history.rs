use finboard_core::{DataCollector, HistoryPeriod};
use serde_json::json;

use crate::cli::HistoryArgs;
use crate::error::CliError;
use crate::output::ReportError;

use super::{parse_symbol, CommandResult};

pub async fn run(args: &HistoryArgs, collector: &DataCollector) -> Result<CommandResult, CliError> {
    let symbol = parse_symbol(&args.symbol)?;
    let period: HistoryPeriod = args.period.parse()?;

    match collector.fetch_history(&symbol, period).await {
        Ok(outcome) => Ok(CommandResult::ok(serde_json::to_value(outcome)?)),
        Err(error) => Ok(CommandResult::ok(json!({ "history": null })).with_errors(vec![ReportError::from(&error)])),
    }
}
