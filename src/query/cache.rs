use std::any::Any;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::watch;

use super::entry::{QueryEntry, QueryOptions, QueryState};
use super::key::QueryKey;
use crate::error::ClientError;

type AnyData = Arc<dyn Any + Send + Sync>;
type FetchResult = Result<AnyData, ClientError>;
type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;
type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;

/// 单个查询键对应的缓存槽
struct Slot {
    id: u64,
    data: Option<AnyData>,
    error: Option<ClientError>,
    last_fetched_at: Option<chrono::DateTime<Utc>>,
    state: QueryState,
    stale: bool,
    in_flight: Option<SharedFetch>,
    fetch_id: u64,
    invalidated_during_fetch: bool,
    subscribers: usize,
    fetcher: Option<Fetcher>,
    options: QueryOptions,
    version: watch::Sender<u64>,
}

impl Slot {
    fn new(id: u64, options: QueryOptions) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            id,
            data: None,
            error: None,
            last_fetched_at: None,
            state: QueryState::Idle,
            stale: false,
            in_flight: None,
            fetch_id: 0,
            invalidated_during_fetch: false,
            subscribers: 0,
            fetcher: None,
            options,
            version,
        }
    }

    fn is_stale(&self) -> bool {
        if self.stale {
            return true;
        }
        match (self.options.stale_time, self.last_fetched_at) {
            (Some(stale_time), Some(at)) => chrono::Duration::from_std(stale_time)
                .map(|d| at.checked_add_signed(d).is_some_and(|t| t <= Utc::now()))
                .unwrap_or(false),
            _ => false,
        }
    }

    /// 新订阅者注册时，失败的条目也会重新请求
    fn needs_fetch(&self, subscribing: bool) -> bool {
        self.state == QueryState::Idle
            || (subscribing && self.state == QueryState::Error)
            || self.is_stale()
    }

    /// 清空后仍被订阅的槽位回到初始状态，进行中的请求结果作废
    fn reset(&mut self) {
        self.data = None;
        self.error = None;
        self.last_fetched_at = None;
        self.state = QueryState::Idle;
        self.stale = true;
        self.in_flight = None;
        self.fetch_id = 0;
        self.invalidated_during_fetch = false;
        self.bump();
    }

    fn is_pinned(&self) -> bool {
        self.subscribers > 0 || self.in_flight.is_some()
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey) -> QueryEntry<T> {
        QueryEntry {
            key: key.clone(),
            data: self.data.clone().and_then(|d| d.downcast::<T>().ok()),
            error: self.error.clone(),
            last_fetched_at: self.last_fetched_at,
            state: self.state,
            is_stale: self.is_stale(),
            is_fetching: self.in_flight.is_some(),
        }
    }
}

struct CacheInner {
    entries: IndexMap<QueryKey, Slot>,
    capacity: usize,
    next_id: u64,
}

impl CacheInner {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// 取出或创建槽位，并移到最近使用的位置
    fn touch(&mut self, key: &QueryKey, options: QueryOptions) -> &mut Slot {
        let slot = match self.entries.shift_remove(key) {
            Some(slot) => slot,
            None => {
                let id = self.next_id();
                Slot::new(id, options)
            }
        };
        let (index, _) = self.entries.insert_full(key.clone(), slot);
        &mut self.entries[index]
    }

    /// 删除匹配的条目；仍有订阅者的条目保留并重置，返回删除数
    fn drop_where(&mut self, matches: impl Fn(&QueryKey) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, slot| {
            if !matches(key) {
                return true;
            }
            if slot.subscribers > 0 {
                slot.reset();
                return true;
            }
            false
        });
        before - self.entries.len()
    }

    /// 超出容量时淘汰最久未使用、且没有订阅者和进行中请求的条目
    fn evict(&mut self) {
        while self.entries.len() > self.capacity {
            let victim = self
                .entries
                .iter()
                .position(|(_, slot)| !slot.is_pinned());
            match victim {
                Some(index) => {
                    if let Some((key, _)) = self.entries.shift_remove_index(index) {
                        tracing::debug!("query cache evicted {}", key);
                    }
                }
                None => break,
            }
        }
    }
}

/// 查询缓存
///
/// 同一个键同时最多只有一个进行中的请求，并发调用共享该请求。
/// 锁只在同步代码段内持有，不会跨越 `.await`。
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Mutex<CacheInner>>,
    defaults: QueryOptions,
}

impl QueryCache {
    pub fn new(capacity: usize, defaults: QueryOptions) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: IndexMap::new(),
                capacity: capacity.max(1),
                next_id: 0,
            })),
            defaults,
        }
    }

    /// 配置中的默认查询选项
    pub fn default_options(&self) -> QueryOptions {
        self.defaults
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    /// 返回当前快照，必要时在后台发起请求
    pub fn use_query<T, F, Fut>(&self, key: QueryKey, fetcher: F, options: QueryOptions) -> QueryEntry<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let (entry, started) = {
            let mut inner = self.inner.lock();
            let started = self.prepare(&mut inner, &key, fetcher, options, false);
            let entry = inner.entries[&key].snapshot(&key);
            inner.evict();
            (entry, started)
        };
        drive(started);
        entry
    }

    /// 等待结果返回；缓存未过期时直接返回缓存数据
    pub async fn fetch_query<T, F, Fut>(
        &self,
        key: QueryKey,
        fetcher: F,
        options: QueryOptions,
    ) -> Result<Arc<T>, ClientError>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let (pending, started) = {
            let mut inner = self.inner.lock();
            let started = self.prepare(&mut inner, &key, fetcher, options, true);
            let slot = &inner.entries[&key];
            let pending = match (&started, &slot.in_flight) {
                (Some(fetch), _) => fetch.clone(),
                (None, Some(fetch)) => fetch.clone(),
                (None, None) => {
                    let cached = slot.data.clone().and_then(|d| d.downcast::<T>().ok());
                    match (cached, &slot.error) {
                        (Some(data), _) => return Ok(data),
                        (None, Some(err)) => return Err(err.clone()),
                        (None, None) => {
                            return Err(ClientError::Decode(format!(
                                "no data cached for {}",
                                key
                            )));
                        }
                    }
                }
            };
            inner.evict();
            (pending, started)
        };
        drive(started);

        let data = pending.await?;
        data.downcast::<T>()
            .map_err(|_| ClientError::Decode(format!("cached type mismatch for {}", key)))
    }

    /// 订阅查询键，返回的句柄被丢弃时自动取消订阅
    pub fn subscribe<T, F, Fut>(&self, key: QueryKey, fetcher: F, options: QueryOptions) -> QuerySubscription<T>
    where
        T: Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let fetcher = erase(fetcher);
        let (slot_id, rx, started) = {
            let mut inner = self.inner.lock();
            let started = self.prepare(&mut inner, &key, fetcher, options, true);
            let slot = inner
                .entries
                .get_mut(&key)
                .expect("slot created by prepare");
            slot.subscribers += 1;
            let handle = (slot.id, slot.version.subscribe());
            inner.evict();
            (handle.0, handle.1, started)
        };
        drive(started);

        QuerySubscription {
            cache: self.clone(),
            key,
            slot_id,
            version: rx,
            _marker: PhantomData,
        }
    }

    /// 只读查看，不会发起请求
    pub fn entry<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<QueryEntry<T>> {
        let inner = self.inner.lock();
        inner.entries.get(key).map(|slot| slot.snapshot(key))
    }

    pub fn get_query_data<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .and_then(|slot| slot.data.clone())
            .and_then(|d| d.downcast::<T>().ok())
    }

    /// 直接写入数据，条目变为 Success 且不过期
    pub fn set_query_data<T: Send + Sync + 'static>(&self, key: QueryKey, value: T) {
        let mut inner = self.inner.lock();
        let defaults = self.defaults;
        let slot = inner.touch(&key, defaults);
        slot.data = Some(Arc::new(value));
        slot.error = None;
        slot.last_fetched_at = Some(Utc::now());
        slot.stale = false;
        if slot.in_flight.is_none() {
            slot.state = QueryState::Success;
        } else {
            // 进行中的请求结果可能早于这次写入
            slot.invalidated_during_fetch = true;
        }
        slot.bump();
        inner.evict();
    }

    /// 将匹配前缀的条目标记为过期
    ///
    /// 有订阅者的条目立即重新请求；没有订阅者的条目等到下次订阅时再请求。
    /// 请求进行中的条目在结果返回后仍保持过期。
    pub fn invalidate(&self, prefix: &QueryKey) -> Invalidation {
        let mut matched = Vec::new();
        let mut started = Vec::new();
        {
            let mut inner = self.inner.lock();
            let keys: Vec<QueryKey> = inner
                .entries
                .keys()
                .filter(|key| key.starts_with(prefix))
                .cloned()
                .collect();

            for key in keys {
                let refetch = {
                    let slot = &mut inner.entries[&key];
                    slot.stale = true;
                    if slot.in_flight.is_some() {
                        slot.invalidated_during_fetch = true;
                    }
                    slot.bump();
                    slot.in_flight.is_none()
                        && slot.subscribers > 0
                        && slot.fetcher.is_some()
                        && slot.options.enabled
                };
                if refetch {
                    started.extend(self.start_fetch(&mut inner, &key));
                }
                matched.push(key);
            }
        }

        tracing::debug!(
            "invalidated {} ({} entries, {} refetching)",
            prefix,
            matched.len(),
            started.len()
        );
        for fetch in started {
            drive(Some(fetch));
        }

        Invalidation {
            cache: self.clone(),
            keys: matched,
        }
    }

    /// 删除匹配前缀的条目，进行中的请求结果会被丢弃
    ///
    /// 仍有订阅者的条目不会删除，而是重置为未请求且过期，等下次失效或订阅时重新请求。
    pub fn remove(&self, prefix: &QueryKey) -> usize {
        let mut inner = self.inner.lock();
        inner.drop_where(|key| key.starts_with(prefix))
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let removed = inner.drop_where(|_| true);
        tracing::debug!(
            "query cache cleared ({} removed, {} kept for subscribers)",
            removed,
            inner.entries.len()
        );
    }

    /// 有订阅者且需要请求的条目全部重新请求，用于登录后恢复仍在显示的视图
    pub fn refetch_active(&self) -> Invalidation {
        let mut matched = Vec::new();
        let mut started = Vec::new();
        {
            let mut inner = self.inner.lock();
            let keys: Vec<QueryKey> = inner
                .entries
                .iter()
                .filter(|(_, slot)| {
                    slot.subscribers > 0
                        && slot.in_flight.is_none()
                        && slot.fetcher.is_some()
                        && slot.options.enabled
                        && slot.needs_fetch(true)
                })
                .map(|(key, _)| key.clone())
                .collect();
            for key in keys {
                started.extend(self.start_fetch(&mut inner, &key));
                matched.push(key);
            }
        }

        tracing::debug!("refetching {} active queries", matched.len());
        for fetch in started {
            drive(Some(fetch));
        }

        Invalidation {
            cache: self.clone(),
            keys: matched,
        }
    }

    /// 等待某个键没有进行中的请求
    pub async fn wait_settled(&self, key: &QueryKey) {
        loop {
            let pending = {
                let inner = self.inner.lock();
                inner.entries.get(key).and_then(|slot| slot.in_flight.clone())
            };
            match pending {
                Some(fetch) => {
                    let _ = fetch.await;
                }
                None => break,
            }
        }
    }

    /// 注册请求函数并在需要时发起请求（调用方持有锁）
    fn prepare(
        &self,
        inner: &mut CacheInner,
        key: &QueryKey,
        fetcher: Fetcher,
        options: QueryOptions,
        subscribing: bool,
    ) -> Option<SharedFetch> {
        let slot = inner.touch(key, options);
        slot.fetcher = Some(fetcher);
        slot.options = options;

        if slot.in_flight.is_some() || !options.enabled {
            return None;
        }
        if slot.needs_fetch(subscribing) {
            return self.start_fetch(inner, key);
        }
        None
    }

    fn start_fetch(&self, inner: &mut CacheInner, key: &QueryKey) -> Option<SharedFetch> {
        let fetch_id = inner.next_id();
        let slot = inner.entries.get_mut(key)?;
        let fetcher = slot.fetcher.clone()?;
        let retry = slot.options.retry;
        let retry_delay = slot.options.retry_delay;

        tracing::debug!("query cache fetching {}", key);

        let fut = run_fetch(self.clone(), key.clone(), fetcher, fetch_id, retry, retry_delay)
            .boxed()
            .shared();

        slot.in_flight = Some(fut.clone());
        slot.fetch_id = fetch_id;
        slot.invalidated_during_fetch = false;
        slot.state = QueryState::Loading;
        slot.bump();

        Some(fut)
    }

    /// 写入请求结果，若期间被标记失效且仍有订阅者则再请求一次
    fn settle(&self, key: &QueryKey, fetch_id: u64, result: &FetchResult) {
        let follow_up = {
            let mut inner = self.inner.lock();
            let refetch = {
                let Some(slot) = inner.entries.get_mut(key) else {
                    tracing::debug!("discarding result for removed query {}", key);
                    return;
                };
                if slot.fetch_id != fetch_id {
                    tracing::debug!("discarding outdated result for {}", key);
                    return;
                }

                slot.in_flight = None;
                match result {
                    Ok(data) => {
                        slot.data = Some(data.clone());
                        slot.error = None;
                        slot.state = QueryState::Success;
                        slot.last_fetched_at = Some(Utc::now());
                    }
                    Err(err) => {
                        // 保留上一次成功的数据
                        slot.error = Some(err.clone());
                        slot.state = QueryState::Error;
                    }
                }
                slot.stale = slot.invalidated_during_fetch;
                slot.invalidated_during_fetch = false;
                slot.bump();

                slot.stale && slot.subscribers > 0 && slot.options.enabled
            };

            let follow_up = if refetch {
                self.start_fetch(&mut inner, key)
            } else {
                None
            };
            inner.evict();
            follow_up
        };
        drive(follow_up);
    }

    fn refetch(&self, key: &QueryKey) {
        let started = {
            let mut inner = self.inner.lock();
            match inner.entries.get(key) {
                Some(slot) if slot.in_flight.is_none() => self.start_fetch(&mut inner, key),
                _ => None,
            }
        };
        drive(started);
    }

    /// 订阅的条目已过期且没有进行中的请求时重新请求，返回是否发起了请求
    fn refresh_if_stale(&self, key: &QueryKey, slot_id: u64) -> bool {
        let started = {
            let mut inner = self.inner.lock();
            match inner.entries.get(key) {
                Some(slot)
                    if slot.id == slot_id
                        && slot.in_flight.is_none()
                        && slot.options.enabled
                        && slot.is_stale() =>
                {
                    self.start_fetch(&mut inner, key)
                }
                _ => None,
            }
        };
        let refreshing = started.is_some();
        drive(started);
        refreshing
    }

    fn unsubscribe(&self, key: &QueryKey, slot_id: u64) {
        let mut inner = self.inner.lock();
        if let Some(slot) = inner.entries.get_mut(key) {
            if slot.id == slot_id {
                slot.subscribers = slot.subscribers.saturating_sub(1);
            }
        }
        inner.evict();
    }

    fn snapshot<T: Send + Sync + 'static>(&self, key: &QueryKey, slot_id: u64) -> QueryEntry<T> {
        let inner = self.inner.lock();
        match inner.entries.get(key) {
            Some(slot) if slot.id == slot_id => slot.snapshot(key),
            _ => QueryEntry::idle(key.clone()),
        }
    }
}

fn erase<T, F, Fut>(fetcher: F) -> Fetcher
where
    T: Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
{
    Arc::new(move || {
        let fut = fetcher();
        async move { fut.await.map(|value| Arc::new(value) as AnyData) }.boxed()
    })
}

/// 在后台推动请求，保证没有调用方等待时请求也会完成
fn drive(fetch: Option<SharedFetch>) {
    if let Some(fetch) = fetch {
        tokio::spawn(fetch);
    }
}

async fn run_fetch(
    cache: QueryCache,
    key: QueryKey,
    fetcher: Fetcher,
    fetch_id: u64,
    retry: u32,
    retry_delay: std::time::Duration,
) -> FetchResult {
    let mut attempt = 0;
    let result = loop {
        match fetcher().await {
            Ok(data) => break Ok(data),
            Err(err) if attempt < retry && err.is_retryable() => {
                attempt += 1;
                tracing::debug!("query {} failed ({}), retry {}/{}", key, err, attempt, retry);
                if !retry_delay.is_zero() {
                    tokio::time::sleep(retry_delay).await;
                }
            }
            Err(err) => break Err(err),
        }
    };

    // 在共享 future 内部写入缓存，所有等待者看到的都是已写入的状态
    cache.settle(&key, fetch_id, &result);
    result
}

/// 一次失效操作，可等待其触发的重新请求全部完成
pub struct Invalidation {
    cache: QueryCache,
    keys: Vec<QueryKey>,
}

impl Invalidation {
    pub fn keys(&self) -> &[QueryKey] {
        &self.keys
    }

    pub async fn settled(self) {
        for key in &self.keys {
            self.cache.wait_settled(key).await;
        }
    }
}

/// 查询订阅句柄
pub struct QuerySubscription<T> {
    cache: QueryCache,
    key: QueryKey,
    slot_id: u64,
    version: watch::Receiver<u64>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + Sync + 'static> QuerySubscription<T> {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn snapshot(&self) -> QueryEntry<T> {
        self.cache.snapshot(&self.key, self.slot_id)
    }

    /// 等待条目下一次变化；条目被删除时返回 false
    pub async fn changed(&mut self) -> bool {
        self.version.changed().await.is_ok()
    }

    /// 等待没有进行中的请求；条目此时已过期则再请求一次并等待，返回最终快照
    ///
    /// 过期后只补请求一次，请求失败时返回带错误的快照。
    pub async fn settled(&self) -> QueryEntry<T> {
        self.cache.wait_settled(&self.key).await;
        if self.cache.refresh_if_stale(&self.key, self.slot_id) {
            self.cache.wait_settled(&self.key).await;
        }
        self.snapshot()
    }

    /// 强制重新请求
    pub fn refetch(&self) {
        self.cache.refetch(&self.key);
    }
}

impl<T> Drop for QuerySubscription<T> {
    fn drop(&mut self) {
        self.cache.unsubscribe(&self.key, self.slot_id);
    }
}
