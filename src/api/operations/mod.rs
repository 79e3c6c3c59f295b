// 接口调用
// 每个文件为 ApiClient 增加一组端点

pub mod admin;
pub mod auth;
pub mod habit;
pub mod ongoing_habit;
pub mod progress;
pub mod user;
