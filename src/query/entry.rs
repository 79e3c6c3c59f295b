use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::key::QueryKey;
use crate::error::ClientError;

/// 条目状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Idle,
    Loading,
    Success,
    Error,
}

/// 某个查询键当前的快照
#[derive(Debug, Clone)]
pub struct QueryEntry<T> {
    pub key: QueryKey,
    pub data: Option<Arc<T>>,
    pub error: Option<ClientError>,
    pub last_fetched_at: Option<DateTime<Utc>>,
    pub state: QueryState,
    pub is_stale: bool,
    pub is_fetching: bool,
}

impl<T> QueryEntry<T> {
    pub(crate) fn idle(key: QueryKey) -> Self {
        Self {
            key,
            data: None,
            error: None,
            last_fetched_at: None,
            state: QueryState::Idle,
            is_stale: false,
            is_fetching: false,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state == QueryState::Loading
    }

    pub fn is_success(&self) -> bool {
        self.state == QueryState::Success
    }

    pub fn is_error(&self) -> bool {
        self.state == QueryState::Error
    }
}

/// 查询选项
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    /// 失败后自动重试次数
    pub retry: u32,
    pub retry_delay: Duration,
    /// 超过此时长视为过期；None 表示只能通过失效标记过期
    pub stale_time: Option<Duration>,
    /// 为 false 时不会自动发起请求
    pub enabled: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            retry: 1,
            retry_delay: Duration::from_secs(1),
            stale_time: None,
            enabled: true,
        }
    }
}

impl QueryOptions {
    pub fn retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn stale_time(mut self, stale_time: Duration) -> Self {
        self.stale_time = Some(stale_time);
        self
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
