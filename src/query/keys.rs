/// 查询键生成函数
use super::key::QueryKey;
use crate::api::models::progress::ProgressFilters;

/// 当前用户
pub fn user_key() -> QueryKey {
    QueryKey::new("user")
}

/// 习惯列表，同时是单个习惯键的前缀
pub fn habits_key() -> QueryKey {
    QueryKey::new("habits")
}

pub fn habit_key(id: &str) -> QueryKey {
    habits_key().with(id)
}

pub fn ongoing_habits_key() -> QueryKey {
    QueryKey::new("ongoing-habits")
}

pub fn progress_key(filters: &ProgressFilters) -> QueryKey {
    QueryKey::new("progress").with(filters)
}

pub fn admin_users_key(page: u32, size: u32) -> QueryKey {
    QueryKey::new("admin-users").with(page).with(size)
}

pub fn phone_search_key(phone: &str) -> QueryKey {
    QueryKey::new("admin-search-phone").with(phone)
}
