use serde::{Deserialize, Serialize};

use crate::api::models::user::{Role, User};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Loading,
    Authenticated,
    Anonymous,
}

/// 当前会话
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<User>,
    pub status: SessionStatus,
}

impl Session {
    /// 启动时的初始状态，等待 restore 完成
    pub fn loading() -> Self {
        Self {
            token: None,
            user: None,
            status: SessionStatus::Loading,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            token: None,
            user: None,
            status: SessionStatus::Anonymous,
        }
    }

    pub fn authenticated(token: String, user: User) -> Self {
        Self {
            token: Some(token),
            user: Some(user),
            status: SessionStatus::Authenticated,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == SessionStatus::Loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == SessionStatus::Authenticated
    }

    pub fn is_admin(&self) -> bool {
        self.user.as_ref().is_some_and(|u| u.role == Role::Admin)
    }
}

/// 持久化的令牌记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub token: String,
    pub saved_at: i64, // Unix timestamp
}
