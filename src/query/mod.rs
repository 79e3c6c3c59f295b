//! 查询缓存
//!
//! 按查询键保存最近一次请求结果、加载状态和错误，支持失效与重新请求。

mod cache;
mod entry;
mod key;
pub mod keys;

pub use cache::{Invalidation, QueryCache, QuerySubscription};
pub use entry::{QueryEntry, QueryOptions, QueryState};
pub use key::{KeyPart, QueryKey};
