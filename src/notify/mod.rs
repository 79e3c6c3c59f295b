//! 用户提示
//!
//! HTTP 客户端只产生 [`RequestFailure`]，由 [`NotificationDispatcher`] 订阅后转成提示

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::http::RequestFailure;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// 提示分发器
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    sender: broadcast::Sender<Notification>,
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationDispatcher {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub fn success(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Success, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(NotificationLevel::Error, message.into());
    }

    fn emit(&self, level: NotificationLevel, message: String) {
        tracing::debug!("notification ({:?}): {}", level, message);
        // 没有订阅者时发送失败，忽略即可
        let _ = self.sender.send(Notification {
            level,
            message,
            at: Utc::now(),
        });
    }

    /// 订阅请求失败事件，每个非静默失败产生一条错误提示
    pub fn attach(&self, mut failures: broadcast::Receiver<RequestFailure>) -> JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(async move {
            loop {
                match failures.recv().await {
                    Ok(failure) => {
                        if !failure.silent {
                            dispatcher.error(failure.error.user_message());
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("notification dispatcher lagged, {} failures dropped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
