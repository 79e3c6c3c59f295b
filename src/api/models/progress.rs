use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// 进度查询条件，键有序，保证查询键结构化比较稳定
pub type ProgressFilters = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressData {
    /// 后端返回形如 "40%" 的字符串
    pub progress_percentage: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habit_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_streak: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longest_streak: Option<u32>,
}

impl ProgressData {
    /// 解析 "40%" 形式的百分比，无法解析时为 None
    pub fn percentage(&self) -> Option<f64> {
        self.progress_percentage
            .trim()
            .trim_end_matches('%')
            .trim()
            .parse()
            .ok()
    }
}
