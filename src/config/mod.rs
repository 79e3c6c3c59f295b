use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::query::QueryOptions;

const DEFAULT_API_BASE_URL: &str = "http://localhost:8081";
const DEFAULT_TOKEN_STORE_PATH: &str = ".habit-client/session.json";
const DEFAULT_TOKEN_STORE_KEY: &str = "habit_client:session:token";
const DEFAULT_QUERY_CACHE_CAPACITY: usize = 256;
const DEFAULT_QUERY_RETRY: u32 = 1;
const DEFAULT_QUERY_RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub token_store_path: PathBuf,
    pub redis_url: Option<String>,
    pub token_store_key: String,
    pub query_cache_capacity: usize,
    pub query_retry: u32,
    pub query_retry_delay_ms: u64,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// 从环境变量加载配置，未设置的项使用默认值
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        let api_base_url = env::var("API_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());

        Config {
            api_base_url: normalize_base_url(&api_base_url),
            token_store_path: env::var("TOKEN_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_TOKEN_STORE_PATH)),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.trim().is_empty()),
            token_store_key: env::var("TOKEN_STORE_KEY")
                .unwrap_or_else(|_| DEFAULT_TOKEN_STORE_KEY.to_string()),
            query_cache_capacity: env::var("QUERY_CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|v| *v > 0)
                .unwrap_or(DEFAULT_QUERY_CACHE_CAPACITY),
            query_retry: env::var("QUERY_RETRY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_QUERY_RETRY),
            query_retry_delay_ms: env::var("QUERY_RETRY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_QUERY_RETRY_DELAY_MS),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.trim_end_matches('s').parse().ok()),
        }
    }

    /// 指定后端地址，其余使用默认值
    pub fn with_base_url(api_base_url: &str) -> Self {
        Config {
            api_base_url: normalize_base_url(api_base_url),
            token_store_path: PathBuf::from(DEFAULT_TOKEN_STORE_PATH),
            redis_url: None,
            token_store_key: DEFAULT_TOKEN_STORE_KEY.to_string(),
            query_cache_capacity: DEFAULT_QUERY_CACHE_CAPACITY,
            query_retry: DEFAULT_QUERY_RETRY,
            query_retry_delay_ms: DEFAULT_QUERY_RETRY_DELAY_MS,
            request_timeout_secs: None,
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// 查询缓存的默认选项
    pub fn query_options(&self) -> QueryOptions {
        QueryOptions::default()
            .retry(self.query_retry)
            .retry_delay(Duration::from_millis(self.query_retry_delay_ms))
    }
}

fn normalize_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}
