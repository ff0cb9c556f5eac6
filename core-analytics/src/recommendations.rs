//! Weighted compatibility scoring for plan-to-watch entries.

use crate::error::{AnalyticsError, Result};
use core_library::{AnimeId, AnimeListEntry, ListStatus, MAX_SCORE};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Upper bound of a compatibility score.
pub const MAX_COMPATIBILITY: f64 = 100.0;

/// Tunable parameters of the compatibility model.
///
/// Studio matches weigh more than genre matches by default: a studio's track
/// record with the user is taken as a stronger signal than shared genres.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationWeights {
    /// Points per matching genre, scaled by the user's average for it.
    pub genre_weight: f64,
    /// Points per matching studio, scaled by the user's average for it.
    pub studio_weight: f64,
    /// Flat bonus for a high community mean.
    pub community_bonus: f64,
    pub community_threshold: f64,
    /// Entries scored at least this much feed the preference profile.
    pub preference_min_score: u8,
    /// A genre or studio needs this many liked entries to count.
    pub preference_min_count: u32,
    /// Candidates must score strictly above this.
    pub min_compatibility: f64,
    pub max_results: usize,
}

impl Default for RecommendationWeights {
    fn default() -> Self {
        Self {
            genre_weight: 15.0,
            studio_weight: 20.0,
            community_bonus: 10.0,
            community_threshold: 8.0,
            preference_min_score: 7,
            preference_min_count: 2,
            min_compatibility: 30.0,
            max_results: 10,
        }
    }
}

impl RecommendationWeights {
    pub fn validate(&self) -> Result<()> {
        let non_negative = [
            ("genre_weight", self.genre_weight),
            ("studio_weight", self.studio_weight),
            ("community_bonus", self.community_bonus),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(AnalyticsError::InvalidWeights(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if !(0.0..=f64::from(MAX_SCORE)).contains(&self.community_threshold) {
            return Err(AnalyticsError::InvalidWeights(format!(
                "community_threshold must be between 0 and {}",
                MAX_SCORE
            )));
        }

        if self.preference_min_score == 0 || self.preference_min_score > MAX_SCORE {
            return Err(AnalyticsError::InvalidWeights(format!(
                "preference_min_score must be between 1 and {}",
                MAX_SCORE
            )));
        }

        if self.preference_min_count == 0 {
            return Err(AnalyticsError::InvalidWeights(
                "preference_min_count must be at least 1".to_string(),
            ));
        }

        if !(0.0..MAX_COMPATIBILITY).contains(&self.min_compatibility) {
            return Err(AnalyticsError::InvalidWeights(
                "min_compatibility must be in [0, 100)".to_string(),
            ));
        }

        if self.max_results == 0 {
            return Err(AnalyticsError::InvalidWeights(
                "max_results must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Preference {
    sum: u32,
    count: u32,
}

impl Preference {
    fn average(&self) -> f64 {
        f64::from(self.sum) / f64::from(self.count)
    }
}

/// Genre and studio preferences learned from well-scored entries.
#[derive(Debug, Clone, Default)]
pub struct PreferenceProfile {
    genres: HashMap<u64, Preference>,
    studios: HashMap<u64, Preference>,
    min_count: u32,
}

impl PreferenceProfile {
    pub fn from_entries(entries: &[AnimeListEntry], weights: &RecommendationWeights) -> Self {
        let mut profile = Self {
            min_count: weights.preference_min_count,
            ..Self::default()
        };

        for entry in entries
            .iter()
            .filter(|entry| entry.score >= weights.preference_min_score)
        {
            let score = u32::from(entry.score);
            for genre in entry.genres() {
                let slot = profile.genres.entry(genre.id).or_default();
                slot.sum += score;
                slot.count += 1;
            }
            for studio in entry.studios() {
                let slot = profile.studios.entry(studio.id).or_default();
                slot.sum += score;
                slot.count += 1;
            }
        }

        profile
    }

    /// Average score for a genre, if it has enough liked entries.
    pub fn genre_average(&self, genre_id: u64) -> Option<f64> {
        self.genres
            .get(&genre_id)
            .filter(|pref| pref.count >= self.min_count)
            .map(Preference::average)
    }

    pub fn studio_average(&self, studio_id: u64) -> Option<f64> {
        self.studios
            .get(&studio_id)
            .filter(|pref| pref.count >= self.min_count)
            .map(Preference::average)
    }

    pub fn is_empty(&self) -> bool {
        self.genres.is_empty() && self.studios.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub id: AnimeId,
    pub title: String,
    /// 0 to 100.
    pub compatibility: f64,
    /// Human readable signals that contributed to the score.
    pub reasons: Vec<String>,
}

/// Score a single entry against `profile`. Status is not checked here.
pub fn compatibility(
    entry: &AnimeListEntry,
    profile: &PreferenceProfile,
    weights: &RecommendationWeights,
) -> RecommendationCandidate {
    let mut total = 0.0;
    let mut reasons = Vec::new();
    let max_score = f64::from(MAX_SCORE);

    for genre in entry.genres() {
        if let Some(avg) = profile.genre_average(genre.id) {
            total += (avg / max_score) * weights.genre_weight;
            reasons.push(format!("You rate {} titles {:.1} on average", genre.name, avg));
        }
    }

    for studio in entry.studios() {
        if let Some(avg) = profile.studio_average(studio.id) {
            total += (avg / max_score) * weights.studio_weight;
            reasons.push(format!("Studio {} averages {:.1} in your list", studio.name, avg));
        }
    }

    if let Some(mean) = entry.community_mean_score() {
        if mean >= weights.community_threshold {
            total += weights.community_bonus;
            reasons.push(format!("Community score {:.2}", mean));
        }
    }

    RecommendationCandidate {
        id: entry.id,
        title: entry.title.clone(),
        compatibility: total.clamp(0.0, MAX_COMPATIBILITY),
        reasons,
    }
}

/// Rank the plan-to-watch entries of `entries`, best match first.
pub fn recommend(
    entries: &[AnimeListEntry],
    weights: &RecommendationWeights,
) -> Vec<RecommendationCandidate> {
    let profile = PreferenceProfile::from_entries(entries, weights);

    let mut candidates: Vec<RecommendationCandidate> = entries
        .iter()
        .filter(|entry| entry.status == ListStatus::PlanToWatch)
        .map(|entry| compatibility(entry, &profile, weights))
        .filter(|candidate| candidate.compatibility > weights.min_compatibility)
        .collect();

    candidates.sort_by(|a, b| {
        b.compatibility
            .partial_cmp(&a.compatibility)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates.truncate(weights.max_results);

    candidates
}
