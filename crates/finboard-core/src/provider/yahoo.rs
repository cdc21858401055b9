use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, warn};

use super::{MarketDataProvider, ProviderError, ProviderFuture};
use crate::http_client::{HttpClient, HttpError, HttpErrorKind, HttpRequest, HttpResponse};
use crate::{
    decimal_from_f64, Fundamentals, HistoryPeriod, PeriodValue, PriceBar, PriceHistory, Symbol,
    TickerSnapshot, UtcDateTime,
};

const QUOTE_MODULES: &str = "price,summaryDetail,defaultKeyStatistics,financialData,calendarEvents";
const FUNDAMENTALS_MODULES: &str = "incomeStatementHistoryQuarterly";
const FUNDAMENTAL_QUARTERS: usize = 4;
const REFERER: &str = "https://finance.yahoo.com/";
const SESSION_TTL: Duration = Duration::from_secs(3600);
const CONTRACT_TARGET: &str = "finboard::provider_contract";

/// Cookie/crumb session required by Yahoo's query endpoints.
///
/// Cookies live in the transport's jar; only the crumb is tracked here. It is
/// reused for an hour and dropped on 401/403.
#[derive(Debug)]
pub struct YahooSession {
    state: Mutex<Option<CachedCrumb>>,
    pinned: Option<String>,
    ttl: Duration,
}

#[derive(Debug, Clone)]
struct CachedCrumb {
    value: String,
    obtained_at: Instant,
}

impl Default for YahooSession {
    fn default() -> Self {
        Self {
            state: Mutex::new(None),
            pinned: None,
            ttl: SESSION_TTL,
        }
    }
}

impl YahooSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session that never contacts the crumb endpoints.
    pub fn with_static_crumb(crumb: impl Into<String>) -> Self {
        Self {
            pinned: Some(crumb.into()),
            ..Self::default()
        }
    }

    pub async fn invalidate(&self) {
        *self.state.lock().await = None;
    }

    async fn crumb(&self, http: &dyn HttpClient, timeout: Duration) -> Result<String, ProviderError> {
        if let Some(pinned) = &self.pinned {
            return Ok(pinned.clone());
        }

        // Holding the lock across the refresh keeps concurrent callers from racing it.
        let mut state = self.state.lock().await;
        if let Some(cached) = state.as_ref() {
            if cached.obtained_at.elapsed() < self.ttl {
                return Ok(cached.value.clone());
            }
        }

        let value = refresh_crumb(http, timeout).await?;
        *state = Some(CachedCrumb {
            value: value.clone(),
            obtained_at: Instant::now(),
        });
        Ok(value)
    }
}

async fn refresh_crumb(http: &dyn HttpClient, timeout: Duration) -> Result<String, ProviderError> {
    debug!("refreshing yahoo session");

    // Only the Set-Cookie side effect matters; fc.yahoo.com usually answers 404.
    let cookie_request = HttpRequest::get("https://fc.yahoo.com")
        .with_header("referer", REFERER)
        .with_timeout(timeout);
    http.execute(cookie_request)
        .await
        .map_err(|error| transport_error("session cookie", &error))?;

    for endpoint in [
        "https://query1.finance.yahoo.com/v1/test/getcrumb",
        "https://query2.finance.yahoo.com/v1/test/getcrumb",
    ] {
        let request = HttpRequest::get(endpoint)
            .with_header("referer", REFERER)
            .with_timeout(timeout);
        let response = match http.execute(request).await {
            Ok(response) => response,
            Err(error) => {
                warn!(endpoint, error = %error, "crumb endpoint failed");
                continue;
            }
        };

        if response.status == 429 {
            return Err(ProviderError::rate_limited(
                "yahoo rate limited the session handshake",
            ));
        }

        let body = response.body.trim();
        if response.is_success()
            && !body.is_empty()
            && body.len() < 100
            && !body.contains(' ')
            && !body.contains('<')
        {
            return Ok(body.to_owned());
        }
    }

    Err(ProviderError::unavailable(
        "failed to obtain yahoo crumb from all endpoints",
    ))
}

/// Yahoo Finance provider over an injectable HTTP transport.
#[derive(Clone)]
pub struct YahooProvider {
    http: Arc<dyn HttpClient>,
    session: Arc<YahooSession>,
    request_timeout: Duration,
}

impl YahooProvider {
    pub fn new(http: Arc<dyn HttpClient>) -> Self {
        Self {
            http,
            session: Arc::new(YahooSession::new()),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_session(mut self, session: YahooSession) -> Self {
        self.session = Arc::new(session);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn get_json<T, F>(&self, symbol: &Symbol, build_url: F) -> Result<T, ProviderError>
    where
        T: DeserializeOwned,
        F: FnOnce(&str) -> String,
    {
        let crumb = self
            .session
            .crumb(self.http.as_ref(), self.request_timeout)
            .await?;
        let encoded_crumb = urlencoding::encode(&crumb);
        let url = build_url(encoded_crumb.as_ref());
        let request = HttpRequest::get(url)
            .with_header("referer", REFERER)
            .with_header("accept", "application/json")
            .with_timeout(self.request_timeout);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|error| transport_error(symbol.as_str(), &error))?;

        self.check_status(symbol, &response).await?;
        parse_body(symbol, &response.body)
    }

    async fn check_status(&self, symbol: &Symbol, response: &HttpResponse) -> Result<(), ProviderError> {
        match response.status {
            200..=299 => Ok(()),
            429 => Err(ProviderError::rate_limited(format!(
                "yahoo rate limited request for '{symbol}'"
            ))),
            401 | 403 => {
                self.session.invalidate().await;
                Err(ProviderError::unavailable(format!(
                    "yahoo rejected session (status {}); crumb invalidated",
                    response.status
                )))
            }
            400 | 404 | 422 => Err(ProviderError::invalid_ticker(symbol)),
            408 => Err(ProviderError::timeout(format!(
                "yahoo timed out serving '{symbol}'"
            ))),
            status => Err(ProviderError::unavailable(format!(
                "yahoo returned status {status} for '{symbol}'"
            ))),
        }
    }

    async fn quote(&self, symbol: &Symbol) -> Result<TickerSnapshot, ProviderError> {
        let encoded = urlencoding::encode(symbol.as_str()).into_owned();
        let response: QuoteSummaryResponse = self
            .get_json(symbol, |crumb| {
                format!(
                    "https://query2.finance.yahoo.com/v10/finance/quoteSummary/{encoded}?modules={QUOTE_MODULES}&crumb={crumb}"
                )
            })
            .await?;

        let result = response.quote_summary.into_single(symbol)?;
        normalize_quote(symbol, result)
    }

    async fn history(&self, symbol: &Symbol, period: HistoryPeriod) -> Result<PriceHistory, ProviderError> {
        let encoded = urlencoding::encode(symbol.as_str()).into_owned();
        let response: ChartResponse = self
            .get_json(symbol, |crumb| {
                format!(
                    "https://query2.finance.yahoo.com/v8/finance/chart/{encoded}?range={}&interval={}&includePrePost=false&crumb={crumb}",
                    period.as_str(),
                    period.bar_interval()
                )
            })
            .await?;

        if let Some(api_error) = response.chart.error {
            return Err(api_error.into_provider_error(symbol));
        }

        let result = response
            .chart
            .result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_ticker(symbol))?;

        Ok(PriceHistory::new(
            symbol.clone(),
            period,
            normalize_bars(symbol, result)?,
        ))
    }

    async fn fundamentals(&self, symbol: &Symbol) -> Result<Fundamentals, ProviderError> {
        let encoded = urlencoding::encode(symbol.as_str()).into_owned();
        let response: QuoteSummaryResponse = self
            .get_json(symbol, |crumb| {
                format!(
                    "https://query2.finance.yahoo.com/v10/finance/quoteSummary/{encoded}?modules={FUNDAMENTALS_MODULES}&crumb={crumb}"
                )
            })
            .await?;

        let result = response.quote_summary.into_single(symbol)?;
        normalize_fundamentals(symbol, result)
    }
}

impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn fetch_quote<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, TickerSnapshot> {
        Box::pin(self.quote(symbol))
    }

    fn fetch_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        period: HistoryPeriod,
    ) -> ProviderFuture<'a, PriceHistory> {
        Box::pin(self.history(symbol, period))
    }

    fn fetch_fundamentals<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, Fundamentals> {
        Box::pin(self.fundamentals(symbol))
    }
}

fn transport_error(context: &str, error: &HttpError) -> ProviderError {
    match error.kind() {
        HttpErrorKind::Timeout => {
            ProviderError::timeout(format!("yahoo request for '{context}' timed out: {error}"))
        }
        HttpErrorKind::Connect | HttpErrorKind::Other => ProviderError::unavailable(format!(
            "yahoo transport error for '{context}': {error}"
        )),
    }
}

fn parse_body<T: DeserializeOwned>(symbol: &Symbol, body: &str) -> Result<T, ProviderError> {
    serde_json::from_str(body).map_err(|parse_error| {
        error!(
            target: CONTRACT_TARGET,
            symbol = %symbol,
            error = %parse_error,
            body_len = body.len(),
            "yahoo response did not match the expected shape"
        );
        ProviderError::malformed(format!(
            "failed to parse yahoo response for '{symbol}': {parse_error}"
        ))
    })
}

fn malformed(symbol: &Symbol, detail: String) -> ProviderError {
    error!(target: CONTRACT_TARGET, symbol = %symbol, detail = %detail, "yahoo field violated contract");
    ProviderError::malformed(detail)
}

fn normalize_quote(symbol: &Symbol, result: QuoteSummaryResult) -> Result<TickerSnapshot, ProviderError> {
    let price = result
        .price
        .ok_or_else(|| ProviderError::invalid_ticker(symbol))?;
    let summary = result.summary_detail.unwrap_or_default();
    let stats = result.default_key_statistics.unwrap_or_default();
    let financial = result.financial_data.unwrap_or_default();

    let current_price = price
        .regular_market_price
        .raw()
        .or_else(|| financial.current_price.raw());
    let previous_close = price
        .regular_market_previous_close
        .raw()
        .or_else(|| summary.previous_close.raw());

    // Yahoo answers unknown-but-well-formed symbols with an empty price module.
    if current_price.is_none() && previous_close.is_none() && price.market_cap.raw().is_none() {
        return Err(ProviderError::invalid_ticker(symbol));
    }

    let decimal = |field: &'static str, value: Option<f64>| {
        value
            .map(|raw| decimal_from_f64(field, raw))
            .transpose()
            .map_err(|error| malformed(symbol, format!("field '{field}': {error}")))
    };

    let mut snapshot = TickerSnapshot::new(symbol.clone(), UtcDateTime::now());
    snapshot.currency = price.currency.or(summary.currency);
    snapshot.current_price = decimal("current_price", current_price)?;
    snapshot.previous_close = decimal("previous_close", previous_close)?;
    snapshot.market_cap = decimal(
        "market_cap",
        price.market_cap.raw().or_else(|| summary.market_cap.raw()),
    )?;
    snapshot.day_low = decimal(
        "day_low",
        price.regular_market_day_low.raw().or_else(|| summary.day_low.raw()),
    )?;
    snapshot.day_high = decimal(
        "day_high",
        price.regular_market_day_high.raw().or_else(|| summary.day_high.raw()),
    )?;
    snapshot.fifty_two_week_low = decimal("fifty_two_week_low", summary.fifty_two_week_low.raw())?;
    snapshot.fifty_two_week_high = decimal("fifty_two_week_high", summary.fifty_two_week_high.raw())?;
    snapshot.volume = price
        .regular_market_volume
        .count()
        .or_else(|| summary.volume.count());
    snapshot.average_volume = summary.average_volume.count();
    snapshot.pe_ratio = decimal("pe_ratio", summary.trailing_pe.raw())?;
    snapshot.forward_pe = decimal(
        "forward_pe",
        summary.forward_pe.raw().or_else(|| stats.forward_pe.raw()),
    )?;
    snapshot.eps = decimal("eps", stats.trailing_eps.raw())?;
    snapshot.profit_margin = decimal(
        "profit_margin",
        financial.profit_margins.raw().or_else(|| stats.profit_margins.raw()),
    )?;
    snapshot.dividend_yield = decimal("dividend_yield", summary.dividend_yield.raw())?;
    snapshot.next_earnings_date = result
        .calendar_events
        .and_then(|events| events.earnings)
        .and_then(|earnings| earnings.earnings_date.into_iter().find_map(|date| date.raw))
        .map(|seconds| {
            UtcDateTime::from_unix_seconds(seconds as i64)
                .map_err(|error| malformed(symbol, format!("earnings date: {error}")))
        })
        .transpose()?;

    Ok(snapshot)
}

fn normalize_fundamentals(symbol: &Symbol, result: QuoteSummaryResult) -> Result<Fundamentals, ProviderError> {
    let mut statements = result
        .income_statement_history_quarterly
        .map(|history| history.income_statement_history)
        .unwrap_or_default();
    statements.sort_by(|left, right| {
        right
            .end_date
            .raw
            .partial_cmp(&left.end_date.raw)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut revenue = Vec::new();
    let mut net_income = Vec::new();
    for statement in statements.into_iter().take(FUNDAMENTAL_QUARTERS) {
        let Some(period) = statement.end_date.period_label() else {
            continue;
        };
        if let Some(value) = statement.total_revenue.raw() {
            let value = decimal_from_f64("quarterly_revenue", value)
                .map_err(|error| malformed(symbol, error.to_string()))?;
            revenue.push(PeriodValue::new(period.clone(), value));
        }
        if let Some(value) = statement.net_income.raw() {
            let value = decimal_from_f64("net_income", value)
                .map_err(|error| malformed(symbol, error.to_string()))?;
            net_income.push(PeriodValue::new(period, value));
        }
    }

    Ok(Fundamentals {
        quarterly_revenue: (!revenue.is_empty()).then_some(revenue),
        net_income: (!net_income.is_empty()).then_some(net_income),
        as_of: UtcDateTime::now(),
    })
}

fn normalize_bars(symbol: &Symbol, result: ChartResult) -> Result<Vec<PriceBar>, ProviderError> {
    let Some(timestamps) = result.timestamp else {
        return Ok(Vec::new());
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Err(malformed(symbol, String::from("chart result has no quote block")));
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    for (index, seconds) in timestamps.into_iter().enumerate() {
        let ts = UtcDateTime::from_unix_seconds(seconds)
            .map_err(|error| malformed(symbol, format!("bar timestamp: {error}")))?;

        let (Some(Some(open)), Some(Some(high)), Some(Some(low)), Some(Some(close))) = (
            quote.open.get(index),
            quote.high.get(index),
            quote.low.get(index),
            quote.close.get(index),
        ) else {
            continue;
        };
        let volume = quote
            .volume
            .get(index)
            .copied()
            .flatten()
            .and_then(|value| u64::try_from(value).ok());

        match PriceBar::new(ts, *open, *high, *low, *close, volume) {
            Ok(bar) => bars.push(bar),
            Err(error) => debug!(symbol = %symbol, %ts, error = %error, "skipping invalid bar"),
        }
    }

    Ok(bars)
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl ApiError {
    fn into_provider_error(self, symbol: &Symbol) -> ProviderError {
        let code = self.code.unwrap_or_default();
        if code.eq_ignore_ascii_case("not found") || code.eq_ignore_ascii_case("bad request") {
            return ProviderError::invalid_ticker(symbol);
        }
        ProviderError::unavailable(format!(
            "yahoo api error '{code}': {}",
            self.description.unwrap_or_default()
        ))
    }
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryResult>>,
    #[serde(default)]
    error: Option<ApiError>,
}

impl QuoteSummary {
    fn into_single(self, symbol: &Symbol) -> Result<QuoteSummaryResult, ProviderError> {
        if let Some(api_error) = self.error {
            return Err(api_error.into_provider_error(symbol));
        }
        self.result
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::invalid_ticker(symbol))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResult {
    #[serde(default)]
    price: Option<PriceModule>,
    #[serde(default)]
    summary_detail: Option<SummaryDetailModule>,
    #[serde(default)]
    default_key_statistics: Option<KeyStatisticsModule>,
    #[serde(default)]
    financial_data: Option<FinancialDataModule>,
    #[serde(default)]
    calendar_events: Option<CalendarEventsModule>,
    #[serde(default)]
    income_statement_history_quarterly: Option<IncomeStatementHistory>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PriceModule {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    regular_market_price: RawValue,
    #[serde(default)]
    regular_market_previous_close: RawValue,
    #[serde(default)]
    regular_market_day_low: RawValue,
    #[serde(default)]
    regular_market_day_high: RawValue,
    #[serde(default)]
    regular_market_volume: RawValue,
    #[serde(default)]
    market_cap: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetailModule {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    previous_close: RawValue,
    #[serde(default)]
    day_low: RawValue,
    #[serde(default)]
    day_high: RawValue,
    #[serde(default)]
    fifty_two_week_low: RawValue,
    #[serde(default)]
    fifty_two_week_high: RawValue,
    #[serde(default)]
    volume: RawValue,
    #[serde(default)]
    average_volume: RawValue,
    #[serde(default)]
    market_cap: RawValue,
    #[serde(default, rename = "trailingPE")]
    trailing_pe: RawValue,
    #[serde(default, rename = "forwardPE")]
    forward_pe: RawValue,
    #[serde(default)]
    dividend_yield: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatisticsModule {
    #[serde(default)]
    trailing_eps: RawValue,
    #[serde(default, rename = "forwardPE")]
    forward_pe: RawValue,
    #[serde(default)]
    profit_margins: RawValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialDataModule {
    #[serde(default)]
    current_price: RawValue,
    #[serde(default)]
    profit_margins: RawValue,
}

#[derive(Debug, Deserialize)]
struct CalendarEventsModule {
    #[serde(default)]
    earnings: Option<EarningsCalendar>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EarningsCalendar {
    #[serde(default)]
    earnings_date: Vec<RawValue>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomeStatementHistory {
    #[serde(default)]
    income_statement_history: Vec<IncomeStatement>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomeStatement {
    #[serde(default)]
    end_date: RawValue,
    #[serde(default)]
    total_revenue: RawValue,
    #[serde(default)]
    net_income: RawValue,
}

/// Yahoo wraps numbers as `{"raw": 1.5, "fmt": "1.50"}`; `{}` means absent.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawValue {
    #[serde(default)]
    raw: Option<f64>,
    #[serde(default)]
    fmt: Option<String>,
}

impl RawValue {
    fn raw(&self) -> Option<f64> {
        self.raw.filter(|value| value.is_finite())
    }

    fn count(&self) -> Option<u64> {
        self.raw()
            .filter(|value| *value >= 0.0)
            .map(|value| value.round() as u64)
    }

    fn period_label(&self) -> Option<String> {
        if let Some(fmt) = self.fmt.as_ref().filter(|fmt| !fmt.is_empty()) {
            return Some(fmt.clone());
        }
        let seconds = self.raw()? as i64;
        UtcDateTime::from_unix_seconds(seconds)
            .ok()
            .map(|ts| ts.into_inner().date().to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize)]
struct ChartQuote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderErrorKind;

    fn symbol() -> Symbol {
        Symbol::parse("AAPL").expect("symbol")
    }

    #[test]
    fn empty_raw_wrapper_is_absent() {
        let value: RawValue = serde_json::from_str("{}").expect("json");
        assert!(value.raw().is_none());
        assert!(value.count().is_none());
    }

    #[test]
    fn period_label_prefers_formatted_date() {
        let value: RawValue =
            serde_json::from_str(r#"{"raw": 1719705600, "fmt": "2024-06-30"}"#).expect("json");
        assert_eq!(value.period_label().as_deref(), Some("2024-06-30"));

        let unformatted: RawValue = serde_json::from_str(r#"{"raw": 1719705600}"#).expect("json");
        assert_eq!(unformatted.period_label().as_deref(), Some("2024-06-30"));
    }

    #[test]
    fn not_found_api_error_is_invalid_ticker() {
        let error = ApiError {
            code: Some(String::from("Not Found")),
            description: Some(String::from("Quote not found for ticker symbol: AAPL")),
        };
        assert_eq!(
            error.into_provider_error(&symbol()).kind(),
            ProviderErrorKind::InvalidTicker
        );
    }

    #[test]
    fn empty_price_module_is_invalid_ticker() {
        let result: QuoteSummaryResult = serde_json::from_str(r#"{"price": {}}"#).expect("json");
        let error = normalize_quote(&symbol(), result).expect_err("must fail");
        assert_eq!(error.kind(), ProviderErrorKind::InvalidTicker);
    }

    #[test]
    fn missing_market_cap_stays_none() {
        let result: QuoteSummaryResult = serde_json::from_str(
            r#"{"price": {"currency": "USD", "regularMarketPrice": {"raw": 190.5, "fmt": "190.50"}}}"#,
        )
        .expect("json");
        let snapshot = normalize_quote(&symbol(), result).expect("snapshot");
        assert!(snapshot.market_cap.is_none());
        assert_eq!(snapshot.currency.as_deref(), Some("USD"));
        assert!(snapshot.current_price.is_some());
    }

    #[test]
    fn bars_with_null_prices_are_skipped() {
        let result: ChartResult = serde_json::from_str(
            r#"{
                "timestamp": [1704067200, 1704153600],
                "indicators": {"quote": [{
                    "open": [1.0, null], "high": [2.0, null], "low": [0.5, null],
                    "close": [1.5, null], "volume": [100, null]
                }]}
            }"#,
        )
        .expect("json");
        let bars = normalize_bars(&symbol(), result).expect("bars");
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].volume, Some(100));
    }
}
