// 通用的数据结构定义

use serde::{Deserialize, Serialize};

/// 后端错误响应体
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

/// 只带消息的响应（例如删除账户）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// 单个对象或数组，统一读成列表
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            Self::Many(items) => items,
            Self::One(item) => vec![item],
        }
    }
}

/// 必填字段不能为空
pub(crate) fn require(field: &str, value: &str) -> crate::error::Result<()> {
    if value.trim().is_empty() {
        return Err(crate::error::ClientError::Validation(format!(
            "{} is required",
            field
        )));
    }
    Ok(())
}
