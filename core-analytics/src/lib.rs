//! # Analytics Module
//!
//! Views derived from a synchronized anime list.
//!
//! ## Overview
//!
//! Every function here is pure: it takes the entries of one sync and
//! recomputes its view from scratch.
//!
//! - [`ScoreDistribution`]: histogram of user scores 1-10
//! - [`studio_affinity`]: average score per studio
//! - [`SeasonalBreakdown`]: completion and scores per airing season
//! - [`franchise_clusters`]: connected groups of related titles in the list
//! - [`recommend`]: plan-to-watch entries ranked against the user's taste
//! - [`ListSummary`]: status counts and totals
//!
//! [`AnalyticsEngine::report`] builds all of them at once. Most views need
//! entries fetched with the extended field projection.

pub mod distribution;
pub mod engine;
pub mod error;
pub mod franchises;
pub mod recommendations;
pub mod seasons;
pub mod studios;
pub mod summary;

#[cfg(test)]
mod fixtures;

pub use distribution::ScoreDistribution;
pub use engine::{AnalyticsEngine, AnalyticsReport};
pub use error::{AnalyticsError, Result};
pub use franchises::{franchise_clusters, FranchiseCluster};
pub use recommendations::{recommend, PreferenceProfile, RecommendationCandidate, RecommendationWeights};
pub use seasons::{SeasonNameStats, SeasonStats, SeasonalBreakdown};
pub use studios::{studio_affinity, StudioAffinity};
pub use summary::ListSummary;
