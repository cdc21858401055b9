//! In-process doubles shared by the integration tests. No network access.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use finboard_core::{
    CacheConfig, CacheEntry, CacheError, CollectorConfig, Fundamentals, HistoryPeriod, HttpClient,
    HttpError, HttpFuture, HttpRequest, HttpResponse, MarketDataProvider, PeriodValue, PriceBar,
    PriceHistory, ProviderError, ProviderFuture, RateLimitConfig, SnapshotBackend, Symbol,
    TickerSnapshot, UtcDateTime,
};
use rust_decimal::Decimal;

pub fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

pub fn minutes_ago(minutes: u64) -> UtcDateTime {
    UtcDateTime::now()
        .checked_sub(Duration::from_secs(minutes * 60))
        .expect("timestamp in range")
}

/// Defaults with a 100µs request spacing and no jitter.
pub fn test_config() -> CollectorConfig {
    let mut config = CollectorConfig::default();
    config.rate_limit = RateLimitConfig {
        max_requests: 10_000,
        window: Duration::from_secs(1),
    };
    config.retry.jitter_ratio = 0.0;
    config
}

pub fn snapshot(raw: &str, price: i64, fetched_at: UtcDateTime) -> TickerSnapshot {
    let mut snapshot = TickerSnapshot::new(symbol(raw), fetched_at);
    snapshot.current_price = Some(Decimal::new(price, 0));
    snapshot
}

/// Cache entry whose snapshot was fetched and cached `minutes` ago.
pub fn aged_entry(raw: &str, price: i64, minutes: u64) -> CacheEntry {
    let at = minutes_ago(minutes);
    CacheEntry::new(snapshot(raw, price, at), at, CacheConfig::default().quote_ttl)
}

/// HTTP transport answering from per-URL-substring scripts.
///
/// Each route replays its responses in order and repeats the last one once the
/// script is exhausted. Unrouted URLs fail with a connect error.
#[derive(Default)]
pub struct ScriptedHttpClient {
    routes: Mutex<Vec<(String, VecDeque<Result<HttpResponse, HttpError>>)>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, pattern: &str, response: Result<HttpResponse, HttpError>) -> Self {
        {
            let mut routes = self.routes.lock().expect("routes lock");
            match routes.iter_mut().find(|(existing, _)| existing == pattern) {
                Some((_, script)) => script.push_back(response),
                None => routes.push((pattern.to_owned(), VecDeque::from([response]))),
            }
        }
        self
    }

    pub fn json(self, pattern: &str, status: u16, body: &str) -> Self {
        self.route(pattern, Ok(HttpResponse::new(status, body)))
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }

    pub fn count(&self, pattern: &str) -> usize {
        self.urls().iter().filter(|url| url.contains(pattern)).count()
    }
}

impl HttpClient for ScriptedHttpClient {
    fn execute<'a>(&'a self, request: HttpRequest) -> HttpFuture<'a> {
        Box::pin(async move {
            let url = request.url.clone();
            self.requests.lock().expect("requests lock").push(request);

            let mut routes = self.routes.lock().expect("routes lock");
            let Some((_, script)) = routes.iter_mut().find(|(pattern, _)| url.contains(pattern.as_str())) else {
                return Err(HttpError::connect(format!("no scripted route for {url}")));
            };
            if script.len() > 1 {
                script.pop_front().expect("non-empty script")
            } else {
                script.front().cloned().expect("non-empty script")
            }
        })
    }
}

/// What a scripted provider call does.
#[derive(Debug, Clone)]
pub enum Step {
    Ok,
    Fail(ProviderError),
    /// Never completes; exercises the per-attempt deadline.
    Hang,
}

/// Provider double with per-symbol quote scripts and call counters.
///
/// Unscripted quotes succeed. Each successful quote carries `100 + call number`
/// as its price so tests can tell fetches apart.
pub struct ScriptedProvider {
    quote_scripts: Mutex<HashMap<Symbol, VecDeque<Step>>>,
    quote_calls: Mutex<HashMap<Symbol, usize>>,
    fundamentals_step: Mutex<Step>,
    history_len: usize,
    history_calls: AtomicUsize,
    fundamentals_calls: AtomicUsize,
}

impl Default for ScriptedProvider {
    fn default() -> Self {
        Self {
            quote_scripts: Mutex::new(HashMap::new()),
            quote_calls: Mutex::new(HashMap::new()),
            fundamentals_step: Mutex::new(Step::Ok),
            history_len: 60,
            history_calls: AtomicUsize::new(0),
            fundamentals_calls: AtomicUsize::new(0),
        }
    }
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_quote(self, raw: &str, steps: Vec<Step>) -> Self {
        self.quote_scripts
            .lock()
            .expect("scripts lock")
            .insert(symbol(raw), steps.into());
        self
    }

    pub fn always_fail(self, raw: &str, error: ProviderError) -> Self {
        self.script_quote(raw, vec![Step::Fail(error)])
    }

    pub fn with_history_len(mut self, len: usize) -> Self {
        self.history_len = len;
        self
    }

    pub fn with_fundamentals(self, step: Step) -> Self {
        *self.fundamentals_step.lock().expect("fundamentals lock") = step;
        self
    }

    pub fn quote_calls(&self, raw: &str) -> usize {
        self.quote_calls
            .lock()
            .expect("calls lock")
            .get(&symbol(raw))
            .copied()
            .unwrap_or_default()
    }

    pub fn total_quote_calls(&self) -> usize {
        self.quote_calls.lock().expect("calls lock").values().sum()
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn fundamentals_calls(&self) -> usize {
        self.fundamentals_calls.load(Ordering::SeqCst)
    }

    fn next_quote_step(&self, symbol: &Symbol) -> (usize, Step) {
        let call = {
            let mut calls = self.quote_calls.lock().expect("calls lock");
            let count = calls.entry(symbol.clone()).or_default();
            *count += 1;
            *count
        };
        let mut scripts = self.quote_scripts.lock().expect("scripts lock");
        let step = match scripts.get_mut(symbol) {
            Some(script) if script.len() > 1 => script.pop_front().expect("non-empty script"),
            Some(script) => script.front().cloned().unwrap_or(Step::Ok),
            None => Step::Ok,
        };
        (call, step)
    }
}

async fn perform<T>(step: Step, value: impl FnOnce() -> T) -> Result<T, ProviderError> {
    match step {
        Step::Ok => Ok(value()),
        Step::Fail(error) => Err(error),
        Step::Hang => std::future::pending().await,
    }
}

impl MarketDataProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn fetch_quote<'a>(&'a self, symbol: &'a Symbol) -> ProviderFuture<'a, TickerSnapshot> {
        Box::pin(async move {
            let (call, step) = self.next_quote_step(symbol);
            perform(step, || {
                let mut snapshot = TickerSnapshot::new(symbol.clone(), UtcDateTime::now());
                snapshot.current_price = Some(Decimal::from(100 + call as i64));
                snapshot
            })
            .await
        })
    }

    fn fetch_history<'a>(
        &'a self,
        symbol: &'a Symbol,
        period: HistoryPeriod,
    ) -> ProviderFuture<'a, PriceHistory> {
        Box::pin(async move {
            self.history_calls.fetch_add(1, Ordering::SeqCst);
            Ok(PriceHistory::new(symbol.clone(), period, rising_bars(self.history_len)))
        })
    }

    fn fetch_fundamentals<'a>(&'a self, _symbol: &'a Symbol) -> ProviderFuture<'a, Fundamentals> {
        Box::pin(async move {
            self.fundamentals_calls.fetch_add(1, Ordering::SeqCst);
            let step = self.fundamentals_step.lock().expect("fundamentals lock").clone();
            perform(step, || Fundamentals {
                quarterly_revenue: Some(vec![
                    PeriodValue::new("2024-06-30", Decimal::new(85_777_000_000, 0)),
                    PeriodValue::new("2024-03-31", Decimal::new(90_753_000_000, 0)),
                ]),
                net_income: Some(vec![PeriodValue::new("2024-06-30", Decimal::new(21_448_000_000, 0))]),
                as_of: UtcDateTime::now(),
            })
            .await
        })
    }
}

/// Daily bars with a steadily rising close, oldest first.
pub fn rising_bars(len: usize) -> Vec<PriceBar> {
    let start = UtcDateTime::parse("2024-01-01T00:00:00Z")
        .expect("timestamp")
        .unix_seconds();
    (0..len)
        .map(|day| {
            let ts = UtcDateTime::from_unix_seconds(start + day as i64 * 86_400).expect("timestamp");
            let close = 100.0 + day as f64;
            PriceBar::new(ts, close - 0.5, close + 1.0, close - 1.0, close, Some(1_000_000)).expect("bar")
        })
        .collect()
}

/// Backend whose reads and/or writes (save, remove, clear) fail.
pub struct BrokenBackend {
    pub fail_reads: bool,
    pub fail_writes: bool,
    saved: Arc<Mutex<Vec<CacheEntry>>>,
}

impl BrokenBackend {
    pub fn new(fail_reads: bool, fail_writes: bool) -> Self {
        Self {
            fail_reads,
            fail_writes,
            saved: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn read(&self) -> Result<(), CacheError> {
        if self.fail_reads {
            return Err(CacheError::Unavailable("disk unreadable".to_owned()));
        }
        Ok(())
    }

    fn write(&self) -> Result<(), CacheError> {
        if self.fail_writes {
            return Err(CacheError::Unavailable("disk full".to_owned()));
        }
        Ok(())
    }
}

impl SnapshotBackend for BrokenBackend {
    fn load(&self, symbol: &Symbol) -> Result<Option<CacheEntry>, CacheError> {
        self.read()?;
        Ok(self
            .saved
            .lock()
            .expect("saved lock")
            .iter()
            .rev()
            .find(|entry| &entry.symbol == symbol)
            .cloned())
    }

    fn load_all(&self) -> Result<Vec<CacheEntry>, CacheError> {
        self.read()?;
        Ok(self.saved.lock().expect("saved lock").clone())
    }

    fn save(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.write()?;
        self.saved.lock().expect("saved lock").push(entry.clone());
        Ok(())
    }

    fn remove(&self, _symbol: &Symbol) -> Result<(), CacheError> {
        self.write()
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.write()
    }
}

/// Backend whose saves block the calling thread for `delay`.
pub struct SlowBackend {
    delay: Duration,
    save_started: AtomicBool,
    saved: Mutex<Vec<CacheEntry>>,
}

impl SlowBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            save_started: AtomicBool::new(false),
            saved: Mutex::new(Vec::new()),
        }
    }

    pub fn save_started(&self) -> bool {
        self.save_started.load(Ordering::SeqCst)
    }

    /// Price of every saved snapshot, in save order.
    pub fn saved_prices(&self) -> Vec<Option<Decimal>> {
        self.saved
            .lock()
            .expect("saved lock")
            .iter()
            .map(|entry| entry.snapshot.current_price)
            .collect()
    }
}

impl SnapshotBackend for SlowBackend {
    fn load(&self, symbol: &Symbol) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self
            .saved
            .lock()
            .expect("saved lock")
            .iter()
            .rev()
            .find(|entry| &entry.symbol == symbol)
            .cloned())
    }

    fn load_all(&self) -> Result<Vec<CacheEntry>, CacheError> {
        Ok(self.saved.lock().expect("saved lock").clone())
    }

    fn save(&self, entry: &CacheEntry) -> Result<(), CacheError> {
        self.save_started.store(true, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        self.saved.lock().expect("saved lock").push(entry.clone());
        Ok(())
    }

    fn remove(&self, _symbol: &Symbol) -> Result<(), CacheError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        Ok(())
    }
}
