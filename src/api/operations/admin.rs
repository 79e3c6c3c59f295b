use crate::api::ApiClient;
use crate::api::models::common::OneOrMany;
use crate::api::models::user::{User, UserPage};
use crate::error::Result;
use crate::http::ApiRequest;

pub const DEFAULT_PAGE_SIZE: u32 = 20;

impl ApiClient {
    /// 分页获取用户，页码从 0 开始
    pub async fn get_users(&self, page: u32, size: u32) -> Result<UserPage> {
        let req = ApiRequest::get("/admin/users")
            .query([("page", page.to_string()), ("size", size.to_string())]);
        self.http().send(req).await
    }

    /// 后端可能返回单个用户或用户数组
    pub async fn search_user_by_phone(&self, phone: &str) -> Result<Vec<User>> {
        let req = ApiRequest::get("/admin/search/phone").query([("phone", phone)]);
        let found: OneOrMany<User> = self.http().send(req).await?;
        Ok(found.into_vec())
    }
}
