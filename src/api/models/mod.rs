// 与后端交换的数据结构
// 请求体在发送前做本地校验

pub mod common;
pub mod habit;
pub mod ongoing_habit;
pub mod progress;
pub mod user;

pub use common::*;
pub use habit::*;
pub use ongoing_habit::*;
pub use progress::*;
pub use user::*;
