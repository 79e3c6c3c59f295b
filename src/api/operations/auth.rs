use crate::api::ApiClient;
use crate::api::models::user::{AuthResponse, LoginRequest, RegisterRequest};
use crate::error::Result;
use crate::http::ApiRequest;

impl ApiClient {
    /// 登录
    pub async fn login(&self, req: &LoginRequest) -> Result<AuthResponse> {
        req.validate()?;
        self.http()
            .send(ApiRequest::post("/auth/login").json(req)?)
            .await
    }

    /// 注册
    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse> {
        req.validate()?;
        self.http()
            .send(ApiRequest::post("/auth/register").json(req)?)
            .await
    }
}
