//! One-pass analytics over a synchronized list.

use crate::distribution::ScoreDistribution;
use crate::error::Result;
use crate::franchises::{franchise_clusters, FranchiseCluster};
use crate::recommendations::{recommend, RecommendationCandidate, RecommendationWeights};
use crate::seasons::SeasonalBreakdown;
use crate::studios::{studio_affinity, StudioAffinity};
use crate::summary::ListSummary;
use core_library::AnimeListEntry;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Every analytics view for one list snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsReport {
    pub summary: ListSummary,
    pub score_distribution: ScoreDistribution,
    pub studio_affinity: Vec<StudioAffinity>,
    pub seasonal: SeasonalBreakdown,
    pub franchises: Vec<FranchiseCluster>,
    pub recommendations: Vec<RecommendationCandidate>,
    /// Entries that carried the extended projection.
    pub extended_entries: u32,
}

/// Computes analytics views with a fixed set of recommendation weights.
///
/// The engine keeps no state between calls; each report is recomputed from
/// the entries it is given.
#[derive(Debug, Clone, Default)]
pub struct AnalyticsEngine {
    weights: RecommendationWeights,
}

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(weights: RecommendationWeights) -> Result<Self> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> &RecommendationWeights {
        &self.weights
    }

    pub fn score_distribution(&self, entries: &[AnimeListEntry]) -> ScoreDistribution {
        ScoreDistribution::from_entries(entries)
    }

    pub fn studio_affinity(&self, entries: &[AnimeListEntry]) -> Vec<StudioAffinity> {
        studio_affinity(entries)
    }

    pub fn seasonal_breakdown(&self, entries: &[AnimeListEntry]) -> SeasonalBreakdown {
        SeasonalBreakdown::from_entries(entries)
    }

    pub fn franchise_clusters(&self, entries: &[AnimeListEntry]) -> Vec<FranchiseCluster> {
        franchise_clusters(entries)
    }

    pub fn recommendations(&self, entries: &[AnimeListEntry]) -> Vec<RecommendationCandidate> {
        recommend(entries, &self.weights)
    }

    pub fn summary(&self, entries: &[AnimeListEntry]) -> ListSummary {
        ListSummary::from_entries(entries)
    }

    #[instrument(skip_all, fields(entries = entries.len()))]
    pub fn report(&self, entries: &[AnimeListEntry]) -> AnalyticsReport {
        let extended_entries = entries
            .iter()
            .filter(|entry| entry.extended.is_some())
            .count() as u32;
        if extended_entries == 0 && !entries.is_empty() {
            debug!("No extended fields present; studio, season and franchise views will be empty");
        }

        let report = AnalyticsReport {
            summary: self.summary(entries),
            score_distribution: self.score_distribution(entries),
            studio_affinity: self.studio_affinity(entries),
            seasonal: self.seasonal_breakdown(entries),
            franchises: self.franchise_clusters(entries),
            recommendations: self.recommendations(entries),
            extended_entries,
        };

        debug!(
            studios = report.studio_affinity.len(),
            franchises = report.franchises.len(),
            recommendations = report.recommendations.len(),
            "Analytics report built"
        );

        report
    }
}
