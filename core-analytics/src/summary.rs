use core_library::{AnimeListEntry, ListStatus};
use serde::{Deserialize, Serialize};

/// Headline counts for a list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListSummary {
    pub total: u32,
    pub watching: u32,
    pub completed: u32,
    pub on_hold: u32,
    pub dropped: u32,
    pub plan_to_watch: u32,
    pub scored_count: u32,
    /// Mean of scored entries.
    pub mean_score: Option<f64>,
    pub episodes_watched: u64,
}

impl ListSummary {
    pub fn from_entries(entries: &[AnimeListEntry]) -> Self {
        let mut summary = Self::default();
        let mut score_sum = 0u32;

        for entry in entries {
            summary.total += 1;
            *summary.count_mut(entry.status) += 1;
            summary.episodes_watched += u64::from(entry.episodes_watched);
            if entry.is_scored() {
                summary.scored_count += 1;
                score_sum += u32::from(entry.score);
            }
        }

        if summary.scored_count > 0 {
            summary.mean_score = Some(f64::from(score_sum) / f64::from(summary.scored_count));
        }

        summary
    }

    pub fn count(&self, status: ListStatus) -> u32 {
        match status {
            ListStatus::Watching => self.watching,
            ListStatus::Completed => self.completed,
            ListStatus::OnHold => self.on_hold,
            ListStatus::Dropped => self.dropped,
            ListStatus::PlanToWatch => self.plan_to_watch,
        }
    }

    fn count_mut(&mut self, status: ListStatus) -> &mut u32 {
        match status {
            ListStatus::Watching => &mut self.watching,
            ListStatus::Completed => &mut self.completed,
            ListStatus::OnHold => &mut self.on_hold,
            ListStatus::Dropped => &mut self.dropped,
            ListStatus::PlanToWatch => &mut self.plan_to_watch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::entry;

    #[test]
    fn test_counts_and_mean() {
        let entries = vec![
            entry(1, ListStatus::Completed, 8).with_episodes(12, Some(12)),
            entry(2, ListStatus::Completed, 6).with_episodes(24, Some(24)),
            entry(3, ListStatus::Watching, 0).with_episodes(5, None),
            entry(4, ListStatus::PlanToWatch, 0),
            entry(5, ListStatus::Dropped, 3).with_episodes(2, Some(13)),
        ];

        let summary = ListSummary::from_entries(&entries);

        assert_eq!(summary.total, 5);
        assert_eq!(summary.count(ListStatus::Completed), 2);
        assert_eq!(summary.count(ListStatus::OnHold), 0);
        assert_eq!(summary.scored_count, 3);
        assert_eq!(summary.mean_score, Some(17.0 / 3.0));
        assert_eq!(summary.episodes_watched, 43);
        assert_eq!(
            ListStatus::ALL
                .iter()
                .map(|status| summary.count(*status))
                .sum::<u32>(),
            summary.total
        );
    }

    #[test]
    fn test_empty_list_has_no_mean() {
        let summary = ListSummary::from_entries(&[]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.mean_score, None);
    }
}
