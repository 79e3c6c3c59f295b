//! 仪表盘统计，基于已获取的列表计算

use crate::api::models::{Habit, OngoingHabit, OngoingStatus};

/// 仪表盘汇总
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DashboardSummary {
    pub total_habits: usize,
    pub completed: usize,
    pub in_progress: usize,
    /// 0 到 100
    pub overall_progress: f64,
}

impl DashboardSummary {
    pub fn from_lists(habits: &[Habit], ongoing: &[OngoingHabit]) -> Self {
        let breakdown = StatusBreakdown::from_ongoing(ongoing);
        let total_habits = habits.len();
        let overall_progress = if total_habits == 0 {
            0.0
        } else {
            breakdown.completed as f64 / total_habits as f64 * 100.0
        };

        Self {
            total_habits,
            completed: breakdown.completed,
            in_progress: breakdown.active,
            overall_progress,
        }
    }
}

/// 按状态统计进行中的习惯
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusBreakdown {
    pub active: usize,
    pub completed: usize,
    pub paused: usize,
}

impl StatusBreakdown {
    pub fn from_ongoing(ongoing: &[OngoingHabit]) -> Self {
        ongoing
            .iter()
            .fold(Self::default(), |mut acc, habit| {
                match habit.status {
                    OngoingStatus::Active => acc.active += 1,
                    OngoingStatus::Completed => acc.completed += 1,
                    OngoingStatus::Paused => acc.paused += 1,
                    // 其余状态不计入
                    OngoingStatus::Started | OngoingStatus::InProgress => {}
                }
                acc
            })
    }

    pub fn total(&self) -> usize {
        self.active + self.completed + self.paused
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Frequency;

    fn habit(id: &str) -> Habit {
        Habit {
            id: id.into(),
            name: format!("habit {id}"),
            target: 5,
            frequency: Frequency::Daily,
            progress: 0.0,
        }
    }

    fn ongoing(id: &str, status: OngoingStatus) -> OngoingHabit {
        OngoingHabit {
            ongoing_habit_id: id.into(),
            habit_id: "h1".into(),
            user_id: "u1".into(),
            counter: 1,
            target: 5,
            status,
            start_date: "2024-01-01".into(),
            habit: None,
        }
    }

    #[test]
    fn summary_counts_completed_against_all_habits() {
        let habits = vec![habit("1"), habit("2"), habit("3"), habit("4")];
        let ongoing = vec![
            ongoing("a", OngoingStatus::Completed),
            ongoing("b", OngoingStatus::Active),
            ongoing("c", OngoingStatus::Active),
            ongoing("d", OngoingStatus::InProgress),
        ];

        let summary = DashboardSummary::from_lists(&habits, &ongoing);
        assert_eq!(summary.total_habits, 4);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.in_progress, 2);
        assert_eq!(summary.overall_progress, 25.0);
    }

    #[test]
    fn no_habits_means_zero_progress() {
        let summary = DashboardSummary::from_lists(&[], &[ongoing("a", OngoingStatus::Completed)]);
        assert_eq!(summary.overall_progress, 0.0);
    }

    #[test]
    fn breakdown_ignores_transitional_statuses() {
        let breakdown = StatusBreakdown::from_ongoing(&[
            ongoing("a", OngoingStatus::Paused),
            ongoing("b", OngoingStatus::Started),
            ongoing("c", OngoingStatus::Completed),
        ]);
        assert_eq!(breakdown.paused, 1);
        assert_eq!(breakdown.completed, 1);
        assert_eq!(breakdown.total(), 2);
    }
}
