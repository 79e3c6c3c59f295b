use std::sync::Arc;

use config::Config;
use tokio::sync::watch;
use tokio::task::JoinHandle;

pub mod api;
pub mod config;
pub mod error;
pub mod http;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod session;
pub mod stats;
pub mod utils;

use api::ApiClient;
use api::models::{
    CheckOffRequest, CreateHabitRequest, CreateOngoingHabitRequest, Habit, MessageResponse,
    OngoingHabit, ProgressData, ProgressFilters, UpdateHabitRequest, UpdateOngoingHabitRequest,
    UpdateUserRequest, User, UserPage,
};
use error::Result;
use http::HttpClient;
use mutation::{Mutation, MutationCoordinator};
use notify::NotificationDispatcher;
use query::{QueryCache, QuerySubscription, keys};
use session::{FileTokenStore, RedisTokenStore, Session, SessionStore, TokenStore};

/// 客户端上下文
///
/// 启动时创建，退出时丢弃。需要在 tokio 运行时内创建。
pub struct AppContext {
    pub config: Config,
    pub http: HttpClient,
    pub api: ApiClient,
    pub cache: QueryCache,
    pub session: SessionStore,
    pub mutations: MutationCoordinator,
    pub notifier: NotificationDispatcher,
    dispatcher_task: JoinHandle<()>,
}

impl AppContext {
    /// 根据配置选择令牌存储：设置了 REDIS_URL 时使用 Redis，否则使用文件
    pub fn new(config: Config) -> Result<Self> {
        let tokens: Arc<dyn TokenStore> = match &config.redis_url {
            Some(url) => Arc::new(RedisTokenStore::open(url, config.token_store_key.clone())?),
            None => Arc::new(FileTokenStore::new(config.token_store_path.clone())),
        };
        Self::with_token_store(config, tokens)
    }

    pub fn with_token_store(config: Config, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let (state, session_rx) = watch::channel(Session::loading());
        let http = HttpClient::new(&config, session_rx)?;
        let api = ApiClient::new(http.clone());
        let cache = QueryCache::new(config.query_cache_capacity, config.query_options());
        let notifier = NotificationDispatcher::new();
        let dispatcher_task = notifier.attach(http.subscribe_failures());
        let session = SessionStore::new(
            api.clone(),
            tokens,
            state,
            cache.clone(),
            notifier.clone(),
        );
        let mutations = MutationCoordinator::new(cache.clone());

        tracing::debug!("client context created for {}", config.api_base_url);

        Ok(Self {
            config,
            http,
            api,
            cache,
            session,
            mutations,
            notifier,
            dispatcher_task,
        })
    }

    // 查询

    pub fn current_user(&self) -> QuerySubscription<User> {
        let api = self.api.clone();
        let options = self
            .cache
            .default_options()
            .enabled(self.session.current().token.is_some());
        self.cache.subscribe(
            keys::user_key(),
            move || {
                let api = api.clone();
                async move { api.get_user().await }
            },
            options,
        )
    }

    pub fn habits(&self) -> QuerySubscription<Vec<Habit>> {
        let api = self.api.clone();
        self.cache.subscribe(
            keys::habits_key(),
            move || {
                let api = api.clone();
                async move { api.get_habits().await }
            },
            self.cache.default_options(),
        )
    }

    pub fn habit(&self, id: &str) -> QuerySubscription<Habit> {
        let api = self.api.clone();
        let id = id.to_string();
        self.cache.subscribe(
            keys::habit_key(&id),
            move || {
                let api = api.clone();
                let id = id.clone();
                async move { api.get_habit(&id).await }
            },
            self.cache.default_options(),
        )
    }

    pub fn ongoing_habits(&self) -> QuerySubscription<Vec<OngoingHabit>> {
        let api = self.api.clone();
        self.cache.subscribe(
            keys::ongoing_habits_key(),
            move || {
                let api = api.clone();
                async move { api.get_ongoing_habits().await }
            },
            self.cache.default_options(),
        )
    }

    pub fn progress(&self, filters: ProgressFilters) -> QuerySubscription<ProgressData> {
        let api = self.api.clone();
        let key = keys::progress_key(&filters);
        self.cache.subscribe(
            key,
            move || {
                let api = api.clone();
                let filters = filters.clone();
                async move { api.get_progress(&filters).await }
            },
            self.cache.default_options(),
        )
    }

    pub fn admin_users(&self, page: u32, size: u32) -> QuerySubscription<UserPage> {
        let api = self.api.clone();
        self.cache.subscribe(
            keys::admin_users_key(page, size),
            move || {
                let api = api.clone();
                async move { api.get_users(page, size).await }
            },
            self.cache.default_options(),
        )
    }

    /// 手机号为空时不发起请求
    pub fn search_users_by_phone(&self, phone: &str) -> QuerySubscription<Vec<User>> {
        let api = self.api.clone();
        let phone = phone.trim().to_string();
        let options = self.cache.default_options().enabled(!phone.is_empty());
        self.cache.subscribe(
            keys::phone_search_key(&phone),
            move || {
                let api = api.clone();
                let phone = phone.clone();
                async move { api.search_user_by_phone(&phone).await }
            },
            options,
        )
    }

    // 写操作，每次调用返回独立的句柄

    pub fn create_habit(&self) -> Mutation<CreateHabitRequest, Habit> {
        let api = self.api.clone();
        self.mutations
            .mutation("create habit", move |req: CreateHabitRequest| {
                let api = api.clone();
                async move { api.create_habit(&req).await }
            })
            .invalidates(keys::habits_key())
            .notify(self.notifier.clone(), "Habit created successfully!")
    }

    pub fn update_habit(&self) -> Mutation<(String, UpdateHabitRequest), Habit> {
        let api = self.api.clone();
        self.mutations
            .mutation("update habit", move |(id, req): (String, UpdateHabitRequest)| {
                let api = api.clone();
                async move { api.update_habit(&id, &req).await }
            })
            .invalidates(keys::habits_key())
            .notify(self.notifier.clone(), "Habit updated successfully!")
    }

    pub fn delete_habit(&self) -> Mutation<String, ()> {
        let api = self.api.clone();
        self.mutations
            .mutation("delete habit", move |id: String| {
                let api = api.clone();
                async move { api.delete_habit(&id).await }
            })
            .invalidates(keys::habits_key())
            .notify(self.notifier.clone(), "Habit deleted successfully!")
    }

    pub fn create_ongoing_habit(&self) -> Mutation<CreateOngoingHabitRequest, OngoingHabit> {
        let api = self.api.clone();
        self.mutations
            .mutation("create ongoing habit", move |req: CreateOngoingHabitRequest| {
                let api = api.clone();
                async move { api.create_ongoing_habit(&req).await }
            })
            .invalidates(keys::ongoing_habits_key())
            .notify(self.notifier.clone(), "Ongoing habit created successfully!")
    }

    pub fn update_ongoing_habit(
        &self,
    ) -> Mutation<(String, UpdateOngoingHabitRequest), OngoingHabit> {
        let api = self.api.clone();
        self.mutations
            .mutation(
                "update ongoing habit",
                move |(id, req): (String, UpdateOngoingHabitRequest)| {
                    let api = api.clone();
                    async move { api.update_ongoing_habit(&id, &req).await }
                },
            )
            .invalidates(keys::ongoing_habits_key())
            .notify(self.notifier.clone(), "Ongoing habit updated successfully!")
    }

    /// 打卡，计数以重新获取的后端数据为准
    pub fn check_off(&self) -> Mutation<(String, CheckOffRequest), OngoingHabit> {
        let api = self.api.clone();
        self.mutations
            .mutation("check off", move |(id, req): (String, CheckOffRequest)| {
                let api = api.clone();
                async move { api.check_off(&id, req).await }
            })
            .invalidates(keys::ongoing_habits_key())
            .notify(self.notifier.clone(), "Habit checked off!")
    }

    pub fn delete_ongoing_habit(&self) -> Mutation<String, ()> {
        let api = self.api.clone();
        self.mutations
            .mutation("delete ongoing habit", move |id: String| {
                let api = api.clone();
                async move { api.delete_ongoing_habit(&id).await }
            })
            .invalidates(keys::ongoing_habits_key())
            .notify(self.notifier.clone(), "Ongoing habit deleted successfully!")
    }

    pub fn update_profile(&self) -> Mutation<UpdateUserRequest, User> {
        let api = self.api.clone();
        self.mutations
            .mutation("update profile", move |req: UpdateUserRequest| {
                let api = api.clone();
                async move { api.update_user(&req).await }
            })
            .invalidates(keys::user_key())
            .notify(self.notifier.clone(), "Profile updated successfully!")
    }

    /// 删除账户，后端确认后退出登录
    pub fn delete_account(&self) -> Mutation<(), MessageResponse> {
        let api = self.api.clone();
        let session = self.session.clone();
        self.mutations
            .mutation("delete account", move |()| {
                let api = api.clone();
                let session = session.clone();
                async move {
                    let response = api.delete_user().await?;
                    tracing::info!("account deleted: {}", response.message);
                    session.logout().await;
                    Ok::<_, error::ClientError>(response)
                }
            })
            .notify(self.notifier.clone(), "Account deleted successfully")
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.dispatcher_task.abort();
    }
}
