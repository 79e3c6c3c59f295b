use crate::api::ApiClient;
use crate::api::models::habit::{CreateHabitRequest, Habit, UpdateHabitRequest};
use crate::error::Result;
use crate::http::ApiRequest;

impl ApiClient {
    pub async fn get_habits(&self) -> Result<Vec<Habit>> {
        self.http().send(ApiRequest::get("/habits")).await
    }

    pub async fn get_habit(&self, id: &str) -> Result<Habit> {
        self.http()
            .send(ApiRequest::get(format!("/habits/{}", id)))
            .await
    }

    pub async fn create_habit(&self, req: &CreateHabitRequest) -> Result<Habit> {
        req.validate()?;
        self.http()
            .send(ApiRequest::post("/habits").json(req)?)
            .await
    }

    pub async fn update_habit(&self, id: &str, req: &UpdateHabitRequest) -> Result<Habit> {
        self.http()
            .send(ApiRequest::patch(format!("/habits/{}", id)).json(req)?)
            .await
    }

    pub async fn delete_habit(&self, id: &str) -> Result<()> {
        self.http()
            .send(ApiRequest::delete(format!("/habits/{}", id)))
            .await
    }
}
