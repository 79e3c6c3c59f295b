//! 令牌持久化
//!
//! 默认写入本地 JSON 文件，配置了 Redis 时写入单个 Redis 键。

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use redis::{AsyncCommands, Client as RedisClient};

use super::model::StoredToken;
use crate::error::Result;

/// 令牌存储
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self) -> Result<Option<String>>;
    async fn save(&self, token: &str) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

fn stored(token: &str) -> StoredToken {
    StoredToken {
        token: token.to_string(),
        saved_at: chrono::Utc::now().timestamp(),
    }
}

/// Redis 中保存的值：`StoredToken` 的 JSON
fn encode_stored(token: &str) -> Result<String> {
    serde_json::to_string(&stored(token))
        .map_err(|e| crate::error::ClientError::Storage(e.to_string()))
}

fn decode_stored(json: &str) -> Result<String> {
    let stored: StoredToken = serde_json::from_str(json)
        .map_err(|e| crate::error::ClientError::Storage(e.to_string()))?;
    Ok(stored.token)
}

/// 文件令牌存储，进程重启后仍然有效
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<String>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice::<StoredToken>(&bytes) {
            Ok(stored) if !stored.token.is_empty() => Ok(Some(stored.token)),
            Ok(_) => Ok(None),
            Err(e) => {
                // 文件损坏按未登录处理
                tracing::warn!("ignoring unreadable token file {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    async fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let json = serde_json::to_vec(&stored(token))
            .map_err(|e| crate::error::ClientError::Storage(e.to_string()))?;
        // 先写临时文件再改名，避免写到一半的文件
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Redis 令牌存储
pub struct RedisTokenStore {
    redis: Arc<RedisClient>,
    key: String,
}

impl RedisTokenStore {
    pub fn new(redis: Arc<RedisClient>, key: impl Into<String>) -> Self {
        Self {
            redis,
            key: key.into(),
        }
    }

    pub fn open(redis_url: &str, key: impl Into<String>) -> Result<Self> {
        let client = RedisClient::open(redis_url)?;
        Ok(Self::new(Arc::new(client), key))
    }
}

#[async_trait]
impl TokenStore for RedisTokenStore {
    async fn load(&self) -> Result<Option<String>> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let result: Option<String> = conn.get(&self.key).await?;

        result.map(|json| decode_stored(&json)).transpose()
    }

    async fn save(&self, token: &str) -> Result<()> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let json = encode_stored(token)?;
        let _: () = conn.set(&self.key, json).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        let mut conn = self.redis.get_multiplexed_async_connection().await?;
        let _: () = conn.del(&self.key).await?;
        Ok(())
    }
}

/// 内存令牌存储，进程退出即丢失
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(token.into())),
        }
    }

    pub fn peek(&self) -> Option<String> {
        self.token.lock().clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.token.lock().clone())
    }

    async fn save(&self, token: &str) -> Result<()> {
        *self.token.lock() = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.token.lock() = None;
        Ok(())
    }
}
