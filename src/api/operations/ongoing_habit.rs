use crate::api::ApiClient;
use crate::api::models::ongoing_habit::{
    CheckOffRequest, CreateOngoingHabitRequest, OngoingHabit, UpdateOngoingHabitRequest,
};
use crate::error::{ClientError, Result};
use crate::http::ApiRequest;

impl ApiClient {
    pub async fn get_ongoing_habits(&self) -> Result<Vec<OngoingHabit>> {
        self.http().send(ApiRequest::get("/ongoing-habit")).await
    }

    pub async fn create_ongoing_habit(
        &self,
        req: &CreateOngoingHabitRequest,
    ) -> Result<OngoingHabit> {
        req.validate()?;
        self.http()
            .send(ApiRequest::post("/ongoing-habit").json(req)?)
            .await
    }

    pub async fn update_ongoing_habit(
        &self,
        id: &str,
        req: &UpdateOngoingHabitRequest,
    ) -> Result<OngoingHabit> {
        self.http()
            .send(ApiRequest::put(format!("/ongoing-habit/{}", id)).json(req)?)
            .await
    }

    pub async fn delete_ongoing_habit(&self, id: &str) -> Result<()> {
        self.http()
            .send(ApiRequest::delete(format!("/ongoing-habit/{}", id)))
            .await
    }

    /// 打卡，计数由后端计算
    pub async fn check_off(&self, id: &str, req: CheckOffRequest) -> Result<OngoingHabit> {
        if req.increment == 0 {
            return Err(ClientError::Validation(
                "increment must be at least 1".into(),
            ));
        }
        self.http()
            .send(ApiRequest::post(format!("/ongoing-habit/{}/check-off", id)).json(&req)?)
            .await
    }
}
