// 后端 REST 接口
// models: 数据传输对象；operations: 各接口调用

pub mod models;
pub mod operations;

use crate::http::HttpClient;

/// 带类型的后端接口
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
}

impl ApiClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }
}
