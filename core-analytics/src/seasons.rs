//! Seasonal breakdown.

use core_library::{AnimeListEntry, ListStatus, Season, StartSeason};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Running totals for one group of entries.
#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    total: u32,
    completed: u32,
    scored: u32,
    score_sum: u32,
}

impl Tally {
    fn add(&mut self, entry: &AnimeListEntry) {
        self.total += 1;
        if entry.status == ListStatus::Completed {
            self.completed += 1;
        }
        if entry.is_scored() {
            self.scored += 1;
            self.score_sum += u32::from(entry.score);
        }
    }

    fn completion_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.completed) / f64::from(self.total)
        }
    }

    fn average_score(&self) -> Option<f64> {
        (self.scored > 0).then(|| f64::from(self.score_sum) / f64::from(self.scored))
    }
}

/// Statistics for a single `(year, season)` group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonStats {
    pub season: StartSeason,
    pub total: u32,
    pub completed: u32,
    /// `completed / total`, between 0.0 and 1.0.
    pub completion_rate: f64,
    pub scored_count: u32,
    /// `None` when nothing in the group is scored.
    pub average_score: Option<f64>,
}

/// Statistics for one season name across every year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonNameStats {
    pub season: Season,
    pub total: u32,
    pub completed: u32,
    pub completion_rate: f64,
    pub scored_count: u32,
    pub average_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeasonalBreakdown {
    /// Chronological, oldest first.
    pub by_season: Vec<SeasonStats>,
    /// One entry per season name that appears in the list, winter to fall.
    pub by_season_name: Vec<SeasonNameStats>,
    /// Entries without a start season.
    pub undated: u32,
}

impl SeasonalBreakdown {
    pub fn from_entries(entries: &[AnimeListEntry]) -> Self {
        let mut groups: BTreeMap<StartSeason, Tally> = BTreeMap::new();
        let mut names: HashMap<Season, Tally> = HashMap::new();
        let mut undated = 0;

        for entry in entries {
            match entry.start_season() {
                Some(start) => {
                    groups.entry(start).or_default().add(entry);
                    names.entry(start.season).or_default().add(entry);
                }
                None => undated += 1,
            }
        }

        let by_season = groups
            .into_iter()
            .map(|(season, tally)| SeasonStats {
                season,
                total: tally.total,
                completed: tally.completed,
                completion_rate: tally.completion_rate(),
                scored_count: tally.scored,
                average_score: tally.average_score(),
            })
            .collect();

        let by_season_name = Season::ALL
            .iter()
            .filter_map(|season| {
                names.get(season).map(|tally| SeasonNameStats {
                    season: *season,
                    total: tally.total,
                    completed: tally.completed,
                    completion_rate: tally.completion_rate(),
                    scored_count: tally.scored,
                    average_score: tally.average_score(),
                })
            })
            .collect();

        Self {
            by_season,
            by_season_name,
            undated,
        }
    }

    /// Season name with the highest average score across all years.
    ///
    /// Ties go to the season with more scored entries, then to the earlier
    /// season in the year.
    pub fn favorite_season(&self) -> Option<Season> {
        self.by_season_name
            .iter()
            .filter_map(|stats| stats.average_score.map(|avg| (stats, avg)))
            .max_by(|(a, a_avg), (b, b_avg)| {
                a_avg
                    .partial_cmp(b_avg)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.scored_count.cmp(&b.scored_count))
                    .then_with(|| b.season.cmp(&a.season))
            })
            .map(|(stats, _)| stats.season)
    }

    pub fn get(&self, season: StartSeason) -> Option<&SeasonStats> {
        self.by_season.iter().find(|stats| stats.season == season)
    }
}
