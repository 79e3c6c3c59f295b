//! 写操作协调
//!
//! 写操作成功（后端确认）之后才使相关查询失效，失败时缓存保持不变。

use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::watch;

use crate::error::Result;
use crate::notify::NotificationDispatcher;
use crate::query::{QueryCache, QueryKey};

type Operation<P, T> = Arc<dyn Fn(P) -> BoxFuture<'static, Result<T>> + Send + Sync>;
type SuccessCallback<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[derive(Clone)]
pub struct MutationCoordinator {
    cache: QueryCache,
}

impl MutationCoordinator {
    pub fn new(cache: QueryCache) -> Self {
        Self { cache }
    }

    /// 创建写操作句柄
    pub fn mutation<P, T, F, Fut>(&self, name: &'static str, operation: F) -> Mutation<P, T>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        let (pending, _) = watch::channel(0usize);
        Mutation {
            name,
            cache: self.cache.clone(),
            operation: Arc::new(move |payload| operation(payload).boxed()),
            invalidates: Vec::new(),
            on_success: None,
            pending: Arc::new(pending),
        }
    }
}

/// 写操作句柄，pending 状态只属于这个句柄
pub struct Mutation<P, T> {
    name: &'static str,
    cache: QueryCache,
    operation: Operation<P, T>,
    invalidates: Vec<QueryKey>,
    on_success: Option<SuccessCallback<T>>,
    pending: Arc<watch::Sender<usize>>,
}

impl<P, T> Clone for Mutation<P, T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            cache: self.cache.clone(),
            operation: self.operation.clone(),
            invalidates: self.invalidates.clone(),
            on_success: self.on_success.clone(),
            pending: self.pending.clone(),
        }
    }
}

impl<P, T> Mutation<P, T> {
    /// 成功后需要失效的查询键（按前缀匹配）
    pub fn invalidates(mut self, key: QueryKey) -> Self {
        self.invalidates.push(key);
        self
    }

    /// 失效完成后调用
    pub fn on_success(mut self, callback: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(callback));
        self
    }

    /// 成功后发出一条提示
    pub fn notify(self, notifier: NotificationDispatcher, message: &'static str) -> Self
    where
        T: 'static,
    {
        self.on_success(move |_| notifier.success(message))
    }

    pub fn is_pending(&self) -> bool {
        *self.pending.borrow() > 0
    }

    /// 监听 pending 变化
    pub fn watch_pending(&self) -> watch::Receiver<usize> {
        self.pending.subscribe()
    }

    pub async fn mutate(&self, payload: P) -> Result<T> {
        let _pending = PendingGuard::enter(self.pending.clone());

        let value = match (self.operation)(payload).await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!("mutation {} failed: {}", self.name, e);
                return Err(e);
            }
        };

        // 后端已确认，才开始失效
        let invalidations: Vec<_> = self
            .invalidates
            .iter()
            .map(|key| self.cache.invalidate(key))
            .collect();
        for invalidation in invalidations {
            invalidation.settled().await;
        }

        tracing::debug!("mutation {} succeeded", self.name);
        if let Some(callback) = &self.on_success {
            callback(&value);
        }
        Ok(value)
    }
}

/// 离开作用域时（包括被取消）恢复 pending 计数
struct PendingGuard {
    pending: Arc<watch::Sender<usize>>,
}

impl PendingGuard {
    fn enter(pending: Arc<watch::Sender<usize>>) -> Self {
        pending.send_modify(|n| *n += 1);
        Self { pending }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.pending.send_modify(|n| *n = n.saturating_sub(1));
    }
}
