use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::common::require;
use super::habit::Habit;
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OngoingStatus {
    Active,
    Completed,
    Paused,
    Started,
    InProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OngoingHabit {
    pub ongoing_habit_id: String,
    pub habit_id: String,
    pub user_id: String,
    pub counter: u32,
    pub target: u32,
    pub status: OngoingStatus,
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habit: Option<Habit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOngoingHabitRequest {
    pub habit_id: String,
    /// YYYY-MM-DD
    pub start_date: String,
}

impl CreateOngoingHabitRequest {
    pub fn validate(&self) -> Result<()> {
        require("habit", &self.habit_id)?;
        require("start date", &self.start_date)?;
        NaiveDate::parse_from_str(&self.start_date, "%Y-%m-%d").map_err(|_| {
            ClientError::Validation(format!("invalid start date: {}", self.start_date))
        })?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOngoingHabitRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counter: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<OngoingStatus>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CheckOffRequest {
    pub increment: u32,
}

impl Default for CheckOffRequest {
    fn default() -> Self {
        Self { increment: 1 }
    }
}
