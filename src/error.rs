use reqwest::StatusCode;
use thiserror::Error;

/// 后端未返回可解析的错误信息时使用的默认提示
pub const DEFAULT_ERROR_MESSAGE: &str = "An error occurred";

/// 请求未能到达后端或未能返回时使用的提示
pub const NETWORK_ERROR_MESSAGE: &str = "Network error occurred";

/// 客户端错误
///
/// 需要 `Clone`，查询缓存会把最近一次错误保存在条目里
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ClientError {
    /// 表单校验失败，请求未发出
    #[error("validation error: {0}")]
    Validation(String),

    /// 后端返回非 2xx 状态码
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// 令牌缺失或过期（401/403）
    #[error("unauthorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },

    /// 网络不可达、超时等传输层错误
    #[error("transport error: {0}")]
    Transport(String),

    /// 响应体无法解析
    #[error("decode error: {0}")]
    Decode(String),

    /// 令牌存储读写失败
    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// 根据状态码和后端消息构造 HTTP 错误
    pub fn from_status(status: StatusCode, message: impl Into<String>) -> Self {
        let message = message.into();
        let status = status.as_u16();
        match status {
            401 | 403 => ClientError::Unauthorized { status, message },
            _ => ClientError::Http { status, message },
        }
    }

    /// 展示给用户的提示
    pub fn user_message(&self) -> &str {
        match self {
            Self::Validation(msg) => msg,
            Self::Http { message, .. } | Self::Unauthorized { message, .. } => message,
            Self::Transport(_) => NETWORK_ERROR_MESSAGE,
            Self::Decode(_) | Self::Storage(_) | Self::Config(_) => DEFAULT_ERROR_MESSAGE,
        }
    }

    /// 校验错误重试也不会成功
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::Config(_))
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, Self::Unauthorized { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::Unauthorized { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}

impl From<redis::RedisError> for ClientError {
    fn from(err: redis::RedisError) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
