use serde::{Deserialize, Serialize};

use super::common::require;
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Habit {
    pub id: String,
    pub name: String,
    pub target: u32,
    pub frequency: Frequency,
    #[serde(default)]
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateHabitRequest {
    pub name: String,
    pub frequency: Frequency,
    pub target: u32,
}

impl CreateHabitRequest {
    pub fn validate(&self) -> Result<()> {
        require("name", &self.name)?;
        if self.target == 0 {
            return Err(ClientError::Validation("target must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateHabitRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Frequency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u32>,
}

impl From<CreateHabitRequest> for UpdateHabitRequest {
    fn from(req: CreateHabitRequest) -> Self {
        Self {
            name: Some(req.name),
            frequency: Some(req.frequency),
            target: Some(req.target),
        }
    }
}
