// Configuration for:
// - Ledger-indexing API endpoint and optional API key
// - Database connection string
// - File/hot cache locations and TTLs
// - Sync paging and history horizon
// - Retry/backoff and balance-refresh rate limits

use dotenv::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub api_base_url: String,
    pub api_key: Option<String>,
    pub cache_dir: PathBuf,
    pub cache_ttl: Duration,
    pub cache_hot_ttl: Duration,
    pub cache_hot_capacity: u64,
    pub page_limit: i64,
    pub max_pages: usize,
    pub history_days: i64,
    pub metric_windows: Vec<u32>,
    pub retry_max_attempts: usize,
    pub retry_min_delay: Duration,
    pub retry_max_delay: Duration,
    pub retry_hint_ceiling: Duration,
    pub http_timeout: Duration,
    pub balance_workers: usize,
    pub balance_batch_size: usize,
    pub balance_requests_per_minute: u32,
    pub balance_lookback_days: i64,
    pub funded_threshold_stx: f64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .unwrap_or_else(|_| "sqlite:data/wallet_metrics.db".to_string());
        let api_base_url =
            env::var("LEDGER_API_BASE").unwrap_or_else(|_| "https://api.hiro.so".to_string());
        let api_key = env::var("LEDGER_API_KEY").ok().filter(|key| !key.is_empty());
        let cache_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("data/raw"));
        let cache_ttl = parse_secs("CACHE_TTL", 3600);
        let cache_hot_ttl = parse_secs("CACHE_HOT_TTL", 60);
        let cache_hot_capacity = env::var("CACHE_HOT_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(1000);
        let page_limit = env::var("PAGE_LIMIT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(50);
        let max_pages = env::var("MAX_PAGES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);
        let history_days = env::var("DEFAULT_HISTORY_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(365);
        let metric_windows = env::var("METRIC_WINDOWS")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .filter_map(|part| part.trim().parse().ok())
                    .collect::<Vec<u32>>()
            })
            .filter(|windows| !windows.is_empty())
            .unwrap_or_else(|| vec![15, 30, 60, 90]);
        let retry_max_attempts = env::var("RETRY_MAX_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        let retry_min_delay = parse_millis("RETRY_MIN_DELAY_MS", 500);
        let retry_max_delay = parse_millis("RETRY_MAX_DELAY_MS", 8_000);
        let retry_hint_ceiling = parse_secs("RETRY_HINT_CEILING_SECS", 120);
        let http_timeout = parse_secs("HTTP_TIMEOUT_SECS", 30);
        let balance_workers = env::var("BALANCE_WORKERS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(num_cpus::get);
        let balance_batch_size = env::var("BALANCE_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(100);
        let balance_requests_per_minute = env::var("BALANCE_RPM")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(500);
        let balance_lookback_days = env::var("BALANCE_LOOKBACK_DAYS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(3);
        let funded_threshold_stx = env::var("FUNDED_THRESHOLD_STX")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10.0);

        Self {
            database_url,
            api_base_url,
            api_key,
            cache_dir,
            cache_ttl,
            cache_hot_ttl,
            cache_hot_capacity,
            page_limit,
            max_pages,
            history_days,
            metric_windows,
            retry_max_attempts,
            retry_min_delay,
            retry_max_delay,
            retry_hint_ceiling,
            http_timeout,
            balance_workers,
            balance_batch_size,
            balance_requests_per_minute,
            balance_lookback_days,
            funded_threshold_stx,
        }
    }

    /// Funded threshold converted to micro-STX for comparisons against stored balances.
    pub fn funded_threshold_ustx(&self) -> i64 {
        (self.funded_threshold_stx * crate::models::MICROSTX_PER_STX as f64) as i64
    }
}

fn parse_secs(key: &str, default_secs: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::from_secs(default_secs))
}

fn parse_millis(key: &str, default_millis: u64) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_millis(default_millis))
}
