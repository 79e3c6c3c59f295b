use crate::api::ApiClient;
use crate::api::models::progress::{ProgressData, ProgressFilters};
use crate::error::Result;
use crate::http::ApiRequest;

impl ApiClient {
    pub async fn get_progress(&self, filters: &ProgressFilters) -> Result<ProgressData> {
        let req = ApiRequest::get("/progress")
            .query(filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.http().send(req).await
    }
}
