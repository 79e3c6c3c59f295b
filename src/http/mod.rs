//! 后端 HTTP 客户端
//!
//! 负责附加 Bearer 令牌、序列化请求体、统一错误格式。
//! 失败时只产生类型化的错误，并在广播通道上发布一次 [`RequestFailure`]。

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

use crate::api::models::common::ErrorBody;
use crate::config::Config;
use crate::error::{ClientError, DEFAULT_ERROR_MESSAGE, Result};
use crate::session::Session;

const FAILURE_CHANNEL_CAPACITY: usize = 64;

/// 一次请求失败的记录
#[derive(Debug, Clone)]
pub struct RequestFailure {
    pub request_id: String,
    pub method: String,
    pub endpoint: String,
    pub error: ClientError,
    /// 静默请求的失败不展示给用户
    pub silent: bool,
}

/// 单个请求的描述
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    endpoint: String,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    silent: bool,
}

impl ApiRequest {
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            query: Vec::new(),
            body: None,
            silent: false,
        }
    }

    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// 失败时不产生用户提示（例如恢复会话时的身份校验）
    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[derive(Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    session: watch::Receiver<Session>,
    failures: broadcast::Sender<RequestFailure>,
}

impl HttpClient {
    pub fn new(config: &Config, session: watch::Receiver<Session>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ClientError::Config(format!("failed to create HTTP client: {e}")))?;

        let (failures, _) = broadcast::channel(FAILURE_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            session,
            failures,
        })
    }

    /// 订阅请求失败事件
    pub fn subscribe_failures(&self) -> broadcast::Receiver<RequestFailure> {
        self.failures.subscribe()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// 当前会话的令牌
    pub fn current_token(&self) -> Option<String> {
        self.session.borrow().token.clone()
    }

    /// 简单请求
    pub async fn request<T, B>(&self, method: Method, endpoint: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut req = ApiRequest::new(method, endpoint);
        if let Some(body) = body {
            req = req.json(body)?;
        }
        self.send(req).await
    }

    pub async fn send<T: DeserializeOwned>(&self, req: ApiRequest) -> Result<T> {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!(
            "request {} {} {}",
            request_id,
            req.method,
            req.endpoint
        );

        let result = self.execute(&request_id, &req).await;

        if let Err(error) = &result {
            tracing::warn!(
                "request {} {} {} failed: {}",
                request_id,
                req.method,
                req.endpoint,
                error
            );
            // 没有订阅者时发送失败，忽略即可
            let _ = self.failures.send(RequestFailure {
                request_id,
                method: req.method.to_string(),
                endpoint: req.endpoint.clone(),
                error: error.clone(),
                silent: req.silent,
            });
        }

        result
    }

    async fn execute<T: DeserializeOwned>(&self, request_id: &str, req: &ApiRequest) -> Result<T> {
        let url = format!("{}{}", self.base_url, req.endpoint);

        let mut builder = self
            .client
            .request(req.method.clone(), &url)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .header("x-request-id", request_id);

        if let Some(token) = self.current_token() {
            builder = builder.bearer_auth(token);
        }
        if !req.query.is_empty() {
            builder = builder.query(&req.query);
        }
        if let Some(body) = &req.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ClientError::from_status(
                status,
                resolve_error_message(status, &bytes),
            ));
        }

        decode_body(&bytes)
    }
}

/// 从错误响应体中提取提示信息
///
/// 响应体无法解析时使用默认提示；能解析但没有 message 时使用状态码
fn resolve_error_message(status: reqwest::StatusCode, bytes: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(bytes) {
        Ok(body) => body
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16())),
        Err(_) => DEFAULT_ERROR_MESSAGE.to_string(),
    }
}

/// 空响应体按 null 解析，`()` 和 `Option<T>` 都能接受
fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_slice(b"null")?);
    }
    Ok(serde_json::from_slice(bytes)?)
}
