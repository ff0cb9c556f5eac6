//! Score histogram.

use core_library::{AnimeListEntry, MAX_SCORE};
use serde::{Deserialize, Serialize};

/// Count of entries per user score, 1 through 10.
///
/// Every bucket is present; unscored entries (score 0) are not counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreDistribution {
    buckets: [u32; MAX_SCORE as usize],
}

impl ScoreDistribution {
    pub fn from_entries(entries: &[AnimeListEntry]) -> Self {
        let mut distribution = Self::default();
        for entry in entries {
            if (1..=MAX_SCORE).contains(&entry.score) {
                distribution.buckets[usize::from(entry.score - 1)] += 1;
            }
        }
        distribution
    }

    /// Entries with `score`; zero for scores outside 1-10.
    pub fn count(&self, score: u8) -> u32 {
        match score {
            1..=MAX_SCORE => self.buckets[usize::from(score - 1)],
            _ => 0,
        }
    }

    /// `(score, count)` pairs in ascending score order.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u32)> + '_ {
        (1..=MAX_SCORE).zip(self.buckets.iter().copied())
    }

    pub fn total(&self) -> u32 {
        self.buckets.iter().sum()
    }

    /// Highest score among the most frequent ones.
    pub fn mode(&self) -> Option<u8> {
        self.iter()
            .filter(|&(_, count)| count > 0)
            .max_by_key(|&(score, count)| (count, score))
            .map(|(score, _)| score)
    }
}
