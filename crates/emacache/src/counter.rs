//! Click counters: the persisted local count and the remote counter API

use emastore::KvStore;
use serde::Deserialize;
use tracing::{debug, warn};

/// Storage key of the local click count
pub const CLICK_COUNT_KEY: &str = "ema_puppy_click_count";

/// Remote endpoint that bumps the shared count
pub const DEFAULT_INCREMENT_URL: &str = "https://add.ema.mocai.fsltech.cn";

/// Remote endpoint that reports the shared count
pub const DEFAULT_READ_URL: &str = "https://fetch.ema.mocai.fsltech.cn";

/// Value `RemoteCounter::current` returns when the count could not be fetched
pub const REMOTE_UNAVAILABLE: i64 = -1;

/// Leading decimal integer of `raw`, or 0
fn parse_count(raw: &str) -> u64 {
    let digits: String = raw
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    digits.parse().unwrap_or(0)
}

/// Persisted count of completed presses
#[derive(Debug, Clone)]
pub struct ClickCounter {
    store: KvStore,
}

impl ClickCounter {
    /// Counter over the given store
    pub fn new(store: KvStore) -> Self {
        Self { store }
    }

    /// Current count; missing or unreadable values count as 0
    pub fn read(&self) -> u64 {
        self.store
            .get(CLICK_COUNT_KEY)
            .map(|raw| parse_count(&raw))
            .unwrap_or(0)
    }

    /// Add one and persist. If the write fails the stored value is returned.
    pub fn increment(&self) -> u64 {
        let next = self.read().saturating_add(1);
        match self.store.set(CLICK_COUNT_KEY, &next.to_string()) {
            Ok(()) => next,
            Err(e) => {
                warn!(error = %e, "click count not persisted");
                self.read()
            }
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct CounterResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    counter: Option<CounterBody>,
}

#[derive(Debug, Default, Deserialize)]
struct CounterBody {
    #[serde(default)]
    current_count: Option<serde_json::Value>,
}

impl CounterResponse {
    fn count(&self) -> i64 {
        if !self.success {
            return 0;
        }
        match self.counter.as_ref().and_then(|c| c.current_count.as_ref()) {
            Some(serde_json::Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(serde_json::Value::String(s)) => parse_count(s) as i64,
            _ => 0,
        }
    }
}

/// Client for the shared remote counter.
///
/// Both endpoints answer `GET` with `{"success": bool, "counter":
/// {"current_count": n}}`.
#[derive(Debug, Clone)]
pub struct RemoteCounter {
    client: reqwest::Client,
    increment_url: String,
    read_url: String,
}

impl Default for RemoteCounter {
    fn default() -> Self {
        Self::new(DEFAULT_INCREMENT_URL, DEFAULT_READ_URL)
    }
}

impl RemoteCounter {
    /// Client for the given endpoints
    pub fn new(increment_url: &str, read_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            increment_url: increment_url.to_string(),
            read_url: read_url.to_string(),
        }
    }

    async fn get(&self, url: &str) -> Result<CounterResponse, reqwest::Error> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<CounterResponse>()
            .await
    }

    /// Bump the remote count; true only if the server confirms
    pub async fn increment(&self) -> bool {
        match self.get(&self.increment_url).await {
            Ok(response) => {
                debug!(success = response.success, "remote increment answered");
                response.success
            }
            Err(e) => {
                warn!(error = %e, "remote increment failed");
                false
            }
        }
    }

    /// Remote count, or [`REMOTE_UNAVAILABLE`] when it cannot be fetched
    pub async fn current(&self) -> i64 {
        match self.get(&self.read_url).await {
            Ok(response) => response.count(),
            Err(e) => {
                warn!(error = %e, "remote count fetch failed");
                REMOTE_UNAVAILABLE
            }
        }
    }
}
