use crate::api::ApiClient;
use crate::api::models::common::MessageResponse;
use crate::api::models::user::{UpdateUserRequest, User};
use crate::error::Result;
use crate::http::ApiRequest;

impl ApiClient {
    /// 当前用户信息
    pub async fn get_user(&self) -> Result<User> {
        self.http().send(ApiRequest::get("/user")).await
    }

    /// 校验会话令牌用的静默版本，失败不产生提示
    pub async fn get_user_silent(&self) -> Result<User> {
        self.http().send(ApiRequest::get("/user").silent()).await
    }

    pub async fn update_user(&self, req: &UpdateUserRequest) -> Result<User> {
        self.http()
            .send(ApiRequest::patch("/user").json(req)?)
            .await
    }

    pub async fn delete_user(&self) -> Result<MessageResponse> {
        self.http().send(ApiRequest::delete("/user")).await
    }
}
