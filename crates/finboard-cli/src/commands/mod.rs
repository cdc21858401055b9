mod cache;
mod history;
mod indicators;
mod quote;

use std::sync::Arc;
use std::time::{Duration, Instant};

use finboard_core::{
    CacheStore, CollectorConfig, DataCollector, ReqwestHttpClient, Symbol, UtcDateTime, YahooProvider,
};
use finboard_warehouse::{resolve_finboard_home, Warehouse, WarehouseConfig};
use serde_json::Value;
use tracing::debug;

use crate::cli::{CacheCommand, Cli, Command};
use crate::error::CliError;
use crate::output::{Report, ReportError, ReportMeta};

pub struct CommandResult {
    pub data: Value,
    pub warnings: Vec<String>,
    pub errors: Vec<ReportError>,
}

impl CommandResult {
    pub fn ok(data: Value) -> Self {
        Self {
            data,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings.extend(warnings);
        self
    }

    pub fn with_errors(mut self, errors: Vec<ReportError>) -> Self {
        self.errors.extend(errors);
        self
    }
}

pub async fn run(cli: &Cli) -> Result<Report, CliError> {
    let started = Instant::now();
    let collector = build_collector(cli)?;

    let result = match &cli.command {
        Command::Quote(args) => quote::run(args, &collector, cli.refresh).await?,
        Command::History(args) => history::run(args, &collector).await?,
        Command::Indicators(args) => indicators::run(args, &collector, cli.refresh).await?,
        Command::Cache(args) => match &args.command {
            CacheCommand::Status => cache::status(&collector).await?,
            CacheCommand::Clear(clear) => cache::clear(clear, &collector).await?,
        },
    };

    Ok(Report {
        meta: ReportMeta {
            command: cli.command.name(),
            provider: collector.provider_name(),
            generated_at: UtcDateTime::now(),
            latency_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            persistent: collector.cache().is_persistent(),
            warnings: result.warnings,
        },
        data: result.data,
        errors: result.errors,
    })
}

/// Environment configuration with CLI flags applied on top.
fn build_collector(cli: &Cli) -> Result<DataCollector, CliError> {
    let mut config = CollectorConfig::from_env()?;
    if let Some(timeout_ms) = cli.timeout_ms {
        config.set_request_timeout(Duration::from_millis(timeout_ms));
    }

    let cache = if cli.no_persist {
        CacheStore::in_memory(config.cache)
    } else {
        let home = cli.home.clone().unwrap_or_else(resolve_finboard_home);
        let warehouse = Warehouse::open(WarehouseConfig::in_home(home))?;
        debug!(db_path = %warehouse.db_path().display(), "opened snapshot warehouse");
        CacheStore::with_backend(config.cache, Arc::new(warehouse))
    };

    let http = Arc::new(ReqwestHttpClient::new()?);
    let provider = YahooProvider::new(http).with_request_timeout(config.request_timeout);
    Ok(DataCollector::new(Arc::new(provider), cache, config)?)
}

fn parse_symbol(raw: &str) -> Result<Symbol, CliError> {
    Ok(Symbol::parse(raw)?)
}
