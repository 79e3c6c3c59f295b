//! 会话
//!
//! 保存当前令牌和用户，令牌通过 [`TokenStore`] 持久化。

mod model;
mod token_store;

pub use model::{Session, SessionStatus, StoredToken};
pub use token_store::{FileTokenStore, MemoryTokenStore, RedisTokenStore, TokenStore};

use std::sync::Arc;

use tokio::sync::watch;

use crate::api::ApiClient;
use crate::api::models::user::{AuthResponse, LoginRequest, RegisterRequest, User};
use crate::error::Result;
use crate::notify::NotificationDispatcher;
use crate::query::QueryCache;
use crate::query::keys::user_key;
use crate::utils::token_expired;

/// 会话存储
#[derive(Clone)]
pub struct SessionStore {
    api: ApiClient,
    tokens: Arc<dyn TokenStore>,
    state: Arc<watch::Sender<Session>>,
    cache: QueryCache,
    notifier: NotificationDispatcher,
}

impl SessionStore {
    pub fn new(
        api: ApiClient,
        tokens: Arc<dyn TokenStore>,
        state: watch::Sender<Session>,
        cache: QueryCache,
        notifier: NotificationDispatcher,
    ) -> Self {
        Self {
            api,
            tokens,
            state: Arc::new(state),
            cache,
            notifier,
        }
    }

    /// 当前会话快照
    pub fn current(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// 读取持久化的令牌并向后端确认身份
    ///
    /// 失败时静默清除令牌，不重试，也不产生提示
    pub async fn restore(&self) -> Session {
        self.state.send_replace(Session::loading());

        let token = match self.tokens.load().await {
            Ok(Some(token)) => token,
            Ok(None) => return self.become_anonymous(),
            Err(e) => {
                tracing::warn!("failed to read persisted token: {}", e);
                return self.become_anonymous();
            }
        };

        if token_expired(&token) {
            tracing::info!("persisted token has expired, starting anonymous session");
            self.forget_token().await;
            return self.become_anonymous();
        }

        // 令牌需要先放进会话，HTTP 客户端才会带上它
        self.state.send_replace(Session {
            token: Some(token.clone()),
            user: None,
            status: SessionStatus::Loading,
        });

        match self.api.get_user_silent().await {
            Ok(user) => {
                tracing::info!("session restored for user {}", user.id);
                self.cache.set_query_data(user_key(), user.clone());
                let session = Session::authenticated(token, user);
                self.state.send_replace(session.clone());
                // 恢复前就已挂载的视图用新令牌重新请求
                self.cache.refetch_active();
                session
            }
            Err(e) => {
                tracing::info!("persisted token rejected ({}), starting anonymous session", e);
                self.forget_token().await;
                self.become_anonymous()
            }
        }
    }

    /// 登录，失败时不修改会话，错误交给调用方展示
    pub async fn login(&self, email: &str, password: &str) -> Result<User> {
        let req = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self.api.login(&req).await?;
        let user = self.establish(response).await?;
        self.notifier.success("Successfully logged in!");
        Ok(user)
    }

    /// 注册，约定同登录
    pub async fn signup(&self, name: &str, email: &str, password: &str, phone: &str) -> Result<User> {
        let req = RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            phone_number: phone.to_string(),
        };
        let response = self.api.register(&req).await?;
        let user = self.establish(response).await?;
        self.notifier.success("Account created successfully!");
        Ok(user)
    }

    /// 退出登录，不会失败
    ///
    /// 会话在第一个 await 之前就已重置；令牌清除失败只记录日志
    pub async fn logout(&self) {
        self.state.send_replace(Session::anonymous());
        self.cache.clear();
        tracing::info!("session ended");
        self.notifier.success("Logged out successfully");
        self.forget_token().await;
    }

    /// 重新获取当前用户信息
    pub async fn refresh_user(&self) -> Result<User> {
        let user = self.api.get_user().await?;
        self.cache.set_query_data(user_key(), user.clone());
        self.state.send_if_modified(|session| {
            if session.is_authenticated() {
                session.user = Some(user.clone());
                true
            } else {
                false
            }
        });
        Ok(user)
    }

    async fn establish(&self, response: AuthResponse) -> Result<User> {
        if let Err(e) = self.tokens.save(&response.token).await {
            // HTTP 层没有产生提示，这里补一条
            self.notifier.error(e.user_message());
            return Err(e);
        }
        tracing::info!("session established for user {}", response.user.id);
        // 上一个身份下的缓存（包括匿名时的 401）全部作废
        self.cache.clear();
        self.cache.set_query_data(user_key(), response.user.clone());
        self.state
            .send_replace(Session::authenticated(response.token, response.user.clone()));
        // 令牌已在会话中，仍有订阅者的条目此时重新请求
        self.cache.refetch_active();
        Ok(response.user)
    }

    async fn forget_token(&self) {
        if let Err(e) = self.tokens.clear().await {
            tracing::warn!("failed to clear persisted token: {}", e);
        }
    }

    fn become_anonymous(&self) -> Session {
        let session = Session::anonymous();
        self.state.send_replace(session.clone());
        session
    }
}
