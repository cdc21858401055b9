#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;

use finboard_core::{
    HistoryPeriod, HttpError, MarketDataProvider, ProviderErrorKind, YahooProvider, YahooSession,
};
use rust_decimal::Decimal;

use support::{symbol, ScriptedHttpClient};

const QUOTE_BODY: &str = r#"{
  "quoteSummary": {
    "result": [{
      "price": {
        "currency": "USD",
        "regularMarketPrice": {"raw": 189.5, "fmt": "189.50"},
        "regularMarketPreviousClose": {"raw": 187.25, "fmt": "187.25"},
        "regularMarketDayLow": {"raw": 186.0},
        "regularMarketDayHigh": {"raw": 190.1},
        "regularMarketVolume": {"raw": 51234567, "fmt": "51.23M"}
      },
      "summaryDetail": {
        "fiftyTwoWeekLow": {"raw": 164.08},
        "fiftyTwoWeekHigh": {"raw": 199.62},
        "averageVolume": {"raw": 58000000},
        "trailingPE": {"raw": 29.4},
        "forwardPE": {},
        "dividendYield": {"raw": 0.0051}
      },
      "defaultKeyStatistics": {
        "trailingEps": {"raw": 6.43},
        "forwardPE": {"raw": 27.8}
      },
      "financialData": {
        "profitMargins": {"raw": 0.2531}
      },
      "calendarEvents": {
        "earnings": {"earningsDate": [{"raw": 1722470400, "fmt": "2024-08-01"}]}
      }
    }],
    "error": null
  }
}"#;

const NOT_FOUND_BODY: &str = r#"{
  "quoteSummary": {
    "result": null,
    "error": {"code": "Not Found", "description": "Quote not found for ticker symbol: ZZZZZZ"}
  }
}"#;

const CHART_BODY: &str = r#"{
  "chart": {
    "result": [{
      "timestamp": [1704326400, 1704153600, 1704240000, 1704412800],
      "indicators": {"quote": [{
        "open":   [184.2, 187.1, null, 181.9],
        "high":   [185.9, 188.4, null, 182.8],
        "low":    [183.4, 183.9, null, 180.2],
        "close":  [184.3, 185.6, null, 181.2],
        "volume": [58414500, 82488700, null, 62303300]
      }]}
    }],
    "error": null
  }
}"#;

const FUNDAMENTALS_BODY: &str = r#"{
  "quoteSummary": {
    "result": [{
      "incomeStatementHistoryQuarterly": {
        "incomeStatementHistory": [
          {"endDate": {"raw": 1688083200, "fmt": "2023-06-30"}, "totalRevenue": {"raw": 81797000000}, "netIncome": {"raw": 19881000000}},
          {"endDate": {"raw": 1719705600, "fmt": "2024-06-30"}, "totalRevenue": {"raw": 85777000000}, "netIncome": {"raw": 21448000000}},
          {"endDate": {"raw": 1711843200, "fmt": "2024-03-31"}, "totalRevenue": {"raw": 90753000000}, "netIncome": {"raw": 23636000000}},
          {"endDate": {"raw": 1703980800, "fmt": "2023-12-31"}, "totalRevenue": {"raw": 119575000000}, "netIncome": {}},
          {"endDate": {"raw": 1696032000, "fmt": "2023-09-30"}, "totalRevenue": {"raw": 89498000000}, "netIncome": {"raw": 22956000000}}
        ]
      }
    }],
    "error": null
  }
}"#;

fn provider(http: Arc<ScriptedHttpClient>) -> YahooProvider {
    YahooProvider::new(http).with_session(YahooSession::with_static_crumb("crumb-123"))
}

async fn quote_error_kind(status: u16) -> ProviderErrorKind {
    let http = Arc::new(ScriptedHttpClient::new().json("quoteSummary", status, "{}"));
    provider(http)
        .fetch_quote(&symbol("AAPL"))
        .await
        .expect_err("status must fail")
        .kind()
}

#[tokio::test]
async fn test_quote_summary_is_normalized() {
    let http = Arc::new(ScriptedHttpClient::new().json("quoteSummary", 200, QUOTE_BODY));
    let snapshot = provider(http.clone())
        .fetch_quote(&symbol("aapl"))
        .await
        .expect("quote");

    assert_eq!(snapshot.symbol.as_str(), "AAPL");
    assert_eq!(snapshot.currency.as_deref(), Some("USD"));
    assert_eq!(snapshot.current_price, Some(Decimal::new(1895, 1)));
    assert_eq!(snapshot.previous_close, Some(Decimal::new(18725, 2)));
    assert_eq!(snapshot.volume, Some(51_234_567));
    assert_eq!(snapshot.average_volume, Some(58_000_000));
    assert!(snapshot.forward_pe.is_some(), "falls back to key statistics");
    assert_eq!(
        snapshot.next_earnings_date.map(|date| date.format_rfc3339()).as_deref(),
        Some("2024-08-01T00:00:00Z")
    );
    assert!(snapshot.quarterly_revenue.is_none());

    let urls = http.urls();
    assert_eq!(urls.len(), 1);
    assert!(urls[0].contains("/v10/finance/quoteSummary/AAPL?"));
    assert!(urls[0].contains("crumb=crumb-123"));
}

#[tokio::test]
async fn test_missing_market_cap_is_none_not_zero() {
    let http = Arc::new(ScriptedHttpClient::new().json("quoteSummary", 200, QUOTE_BODY));
    let snapshot = provider(http).fetch_quote(&symbol("AAPL")).await.expect("quote");

    assert!(snapshot.market_cap.is_none());
}

#[tokio::test]
async fn test_status_codes_are_classified() {
    assert_eq!(quote_error_kind(429).await, ProviderErrorKind::RateLimited);
    assert_eq!(quote_error_kind(404).await, ProviderErrorKind::InvalidTicker);
    assert_eq!(quote_error_kind(400).await, ProviderErrorKind::InvalidTicker);
    assert_eq!(quote_error_kind(408).await, ProviderErrorKind::Timeout);
    assert_eq!(quote_error_kind(503).await, ProviderErrorKind::Unavailable);
    assert_eq!(quote_error_kind(403).await, ProviderErrorKind::Unavailable);
}

#[tokio::test]
async fn test_retryable_flag_follows_kind() {
    let http = Arc::new(ScriptedHttpClient::new().json("quoteSummary", 429, ""));
    let error = provider(http)
        .fetch_quote(&symbol("AAPL"))
        .await
        .expect_err("rate limited");

    assert!(error.retryable());
    assert_eq!(error.code(), "provider.rate_limited");
}

#[tokio::test]
async fn test_transport_failures_are_classified() {
    let timeout = Arc::new(
        ScriptedHttpClient::new().route("quoteSummary", Err(HttpError::timeout("deadline elapsed"))),
    );
    let error = provider(timeout)
        .fetch_quote(&symbol("AAPL"))
        .await
        .expect_err("timeout");
    assert_eq!(error.kind(), ProviderErrorKind::Timeout);

    let refused = Arc::new(
        ScriptedHttpClient::new().route("quoteSummary", Err(HttpError::connect("connection refused"))),
    );
    let error = provider(refused)
        .fetch_quote(&symbol("AAPL"))
        .await
        .expect_err("connect");
    assert_eq!(error.kind(), ProviderErrorKind::Unavailable);
}

#[tokio::test]
async fn test_unparsable_body_is_malformed_and_not_retryable() {
    let http = Arc::new(ScriptedHttpClient::new().json("quoteSummary", 200, "<html>oops</html>"));
    let error = provider(http)
        .fetch_quote(&symbol("AAPL"))
        .await
        .expect_err("malformed");

    assert_eq!(error.kind(), ProviderErrorKind::MalformedResponse);
    assert!(!error.retryable());
}

#[tokio::test]
async fn test_not_found_payload_is_invalid_ticker() {
    let http = Arc::new(ScriptedHttpClient::new().json("quoteSummary", 200, NOT_FOUND_BODY));
    let error = provider(http)
        .fetch_quote(&symbol("ZZZZZZ"))
        .await
        .expect_err("unknown ticker");

    assert_eq!(error.kind(), ProviderErrorKind::InvalidTicker);
    assert!(!error.retryable());
}

#[tokio::test]
async fn test_empty_result_is_invalid_ticker() {
    let http = Arc::new(ScriptedHttpClient::new().json(
        "quoteSummary",
        200,
        r#"{"quoteSummary": {"result": [], "error": null}}"#,
    ));
    let error = provider(http)
        .fetch_quote(&symbol("ZZZZZZ"))
        .await
        .expect_err("unknown ticker");

    assert_eq!(error.kind(), ProviderErrorKind::InvalidTicker);
}

#[tokio::test]
async fn test_history_is_sorted_and_skips_null_bars() {
    let http = Arc::new(ScriptedHttpClient::new().json("/v8/finance/chart/", 200, CHART_BODY));
    let history = provider(http.clone())
        .fetch_history(&symbol("AAPL"), HistoryPeriod::OneYear)
        .await
        .expect("history");

    assert_eq!(history.len(), 3);
    let timestamps: Vec<_> = history.bars.iter().map(|bar| bar.ts.unix_seconds()).collect();
    assert_eq!(timestamps, vec![1704153600, 1704326400, 1704412800]);
    assert_eq!(history.bars[0].close, 185.6);

    let url = &http.urls()[0];
    assert!(url.contains("range=1y"));
    assert!(url.contains("interval=1d"));
    assert!(url.contains("includePrePost=false"));
}

#[tokio::test]
async fn test_history_period_sets_interval() {
    let http = Arc::new(ScriptedHttpClient::new().json("/v8/finance/chart/", 200, CHART_BODY));
    provider(http.clone())
        .fetch_history(&symbol("AAPL"), HistoryPeriod::FiveYears)
        .await
        .expect("history");

    let url = &http.urls()[0];
    assert!(url.contains("range=5y"));
    assert!(url.contains("interval=1wk"));
}

#[tokio::test]
async fn test_fundamentals_keep_latest_four_quarters_newest_first() {
    let http = Arc::new(ScriptedHttpClient::new().json("incomeStatementHistoryQuarterly", 200, FUNDAMENTALS_BODY));
    let fundamentals = provider(http)
        .fetch_fundamentals(&symbol("AAPL"))
        .await
        .expect("fundamentals");

    let revenue = fundamentals.quarterly_revenue.expect("revenue");
    let periods: Vec<_> = revenue.iter().map(|value| value.period.as_str()).collect();
    assert_eq!(periods, vec!["2024-06-30", "2024-03-31", "2023-12-31", "2023-09-30"]);
    assert_eq!(revenue[0].value, Decimal::new(85_777_000_000, 0));

    let net_income = fundamentals.net_income.expect("net income");
    assert_eq!(net_income.len(), 3);
}

#[tokio::test]
async fn test_symbol_is_url_encoded() {
    let http = Arc::new(ScriptedHttpClient::new().json("quoteSummary", 200, QUOTE_BODY));
    provider(http.clone())
        .fetch_quote(&symbol("^GSPC"))
        .await
        .expect("quote");

    assert!(http.urls()[0].contains("/quoteSummary/%5EGSPC?"));
}

#[tokio::test]
async fn test_session_crumb_is_fetched_once_and_reused() {
    let http = Arc::new(
        ScriptedHttpClient::new()
            .json("fc.yahoo.com", 404, "")
            .json("query1.finance.yahoo.com/v1/test/getcrumb", 200, "abc/def")
            .json("quoteSummary", 200, QUOTE_BODY),
    );
    let provider = YahooProvider::new(http.clone());

    provider.fetch_quote(&symbol("AAPL")).await.expect("first quote");
    provider.fetch_quote(&symbol("MSFT")).await.expect("second quote");

    assert_eq!(http.count("getcrumb"), 1);
    assert_eq!(http.count("fc.yahoo.com"), 1);
    assert!(http.urls().iter().any(|url| url.contains("crumb=abc%2Fdef")));
}

#[tokio::test]
async fn test_forbidden_response_invalidates_session() {
    let http = Arc::new(
        ScriptedHttpClient::new()
            .json("fc.yahoo.com", 404, "")
            .json("query1.finance.yahoo.com/v1/test/getcrumb", 200, "first")
            .json("quoteSummary", 401, "")
            .json("quoteSummary", 200, QUOTE_BODY),
    );
    let provider = YahooProvider::new(http.clone());

    let error = provider
        .fetch_quote(&symbol("AAPL"))
        .await
        .expect_err("unauthorized");
    assert_eq!(error.kind(), ProviderErrorKind::Unavailable);

    provider.fetch_quote(&symbol("AAPL")).await.expect("fresh session");
    assert_eq!(http.count("getcrumb"), 2);
}

#[tokio::test]
async fn test_crumb_falls_back_to_second_host() {
    let http = Arc::new(
        ScriptedHttpClient::new()
            .json("fc.yahoo.com", 404, "")
            .json("query1.finance.yahoo.com/v1/test/getcrumb", 500, "<html>error</html>")
            .json("query2.finance.yahoo.com/v1/test/getcrumb", 200, "second")
            .json("quoteSummary", 200, QUOTE_BODY),
    );
    let provider = YahooProvider::new(http.clone());

    provider.fetch_quote(&symbol("AAPL")).await.expect("quote");
    assert!(http.urls().iter().any(|url| url.contains("crumb=second")));
}

#[tokio::test]
async fn test_crumb_handshake_rate_limit_is_retryable() {
    let http = Arc::new(
        ScriptedHttpClient::new()
            .json("fc.yahoo.com", 404, "")
            .json("getcrumb", 429, "Too Many Requests"),
    );
    let error = YahooProvider::new(http)
        .fetch_quote(&symbol("AAPL"))
        .await
        .expect_err("handshake throttled");

    assert_eq!(error.kind(), ProviderErrorKind::RateLimited);
}
