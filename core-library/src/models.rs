//! Domain models for the anime list
//!
//! These types are service-agnostic. Connectors translate their wire format
//! into them and analytics read nothing else.

use crate::error::LibraryError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Catalog identifier of an anime on the tracking service.
pub type AnimeId = u64;

/// Highest score a user can give.
pub const MAX_SCORE: u8 = 10;

// =============================================================================
// Enumerations
// =============================================================================

/// Where an anime sits in the user's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListStatus {
    Watching,
    Completed,
    OnHold,
    Dropped,
    PlanToWatch,
}

impl ListStatus {
    pub const ALL: [ListStatus; 5] = [
        ListStatus::Watching,
        ListStatus::Completed,
        ListStatus::OnHold,
        ListStatus::Dropped,
        ListStatus::PlanToWatch,
    ];

    /// Wire name, also used as the `status` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            ListStatus::Watching => "watching",
            ListStatus::Completed => "completed",
            ListStatus::OnHold => "on_hold",
            ListStatus::Dropped => "dropped",
            ListStatus::PlanToWatch => "plan_to_watch",
        }
    }
}

impl fmt::Display for ListStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ListStatus {
    type Err = LibraryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ListStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LibraryError::invalid_input("status", format!("unknown list status '{}'", s)))
    }
}

/// Broadcast season. Ordered chronologically within a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Season {
    Winter,
    Spring,
    Summer,
    Fall,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Winter, Season::Spring, Season::Summer, Season::Fall];

    pub fn as_str(&self) -> &'static str {
        match self {
            Season::Winter => "winter",
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
        }
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Year and season an anime started airing.
///
/// Field order gives the derived `Ord` chronological semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StartSeason {
    pub year: i32,
    pub season: Season,
}

impl StartSeason {
    pub fn new(year: i32, season: Season) -> Self {
        Self { year, season }
    }
}

impl fmt::Display for StartSeason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.season, self.year)
    }
}

/// How a related anime connects to its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationType {
    Sequel,
    Prequel,
    AlternativeSetting,
    AlternativeVersion,
    SideStory,
    ParentStory,
    Summary,
    FullStory,
    SpinOff,
    Character,
    #[serde(other)]
    Other,
}

/// Edge from one anime to another in the catalog's relation graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelatedAnime {
    pub target_id: AnimeId,
    pub relation_type: RelationType,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Studio {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Genre {
    pub id: u64,
    pub name: String,
}

// =============================================================================
// List entries
// =============================================================================

/// Which fields a list request asks the service for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProjection {
    /// Status, score and episode counts only.
    #[default]
    Narrow,
    /// Adds studios, start season, relations, genres and the community mean.
    Extended,
}

/// Fields only present when the list was fetched with [`FieldProjection::Extended`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtendedDetails {
    pub studios: Vec<Studio>,
    pub start_season: Option<StartSeason>,
    pub related_anime: Vec<RelatedAnime>,
    pub genres: Vec<Genre>,
    /// Mean score of all users on the service, 0.0 to 10.0.
    pub community_mean_score: Option<f64>,
}

/// One anime in the user's list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimeListEntry {
    pub id: AnimeId,
    pub title: String,
    pub image: Option<String>,
    pub status: ListStatus,
    /// User score 0-10, where 0 means unscored.
    pub score: u8,
    pub episodes_watched: u32,
    /// `None` while the episode count is unknown (airing shows).
    pub total_episodes: Option<u32>,
    pub updated_at: Option<DateTime<Utc>>,
    pub extended: Option<ExtendedDetails>,
}

impl AnimeListEntry {
    pub fn new(id: AnimeId, title: impl Into<String>, status: ListStatus) -> Self {
        Self {
            id,
            title: title.into(),
            image: None,
            status,
            score: 0,
            episodes_watched: 0,
            total_episodes: None,
            updated_at: None,
            extended: None,
        }
    }

    pub fn with_score(mut self, score: u8) -> Self {
        self.score = score;
        self
    }

    pub fn with_episodes(mut self, watched: u32, total: Option<u32>) -> Self {
        self.episodes_watched = watched;
        self.total_episodes = total;
        self
    }

    pub fn with_extended(mut self, extended: ExtendedDetails) -> Self {
        self.extended = Some(extended);
        self
    }

    pub fn is_scored(&self) -> bool {
        self.score > 0
    }

    pub fn studios(&self) -> &[Studio] {
        self.extended.as_ref().map_or(&[], |e| e.studios.as_slice())
    }

    pub fn genres(&self) -> &[Genre] {
        self.extended.as_ref().map_or(&[], |e| e.genres.as_slice())
    }

    pub fn related_anime(&self) -> &[RelatedAnime] {
        self.extended
            .as_ref()
            .map_or(&[], |e| e.related_anime.as_slice())
    }

    pub fn start_season(&self) -> Option<StartSeason> {
        self.extended.as_ref().and_then(|e| e.start_season)
    }

    pub fn community_mean_score(&self) -> Option<f64> {
        self.extended.as_ref().and_then(|e| e.community_mean_score)
    }

    /// Validate entry data
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err(format!("Anime {} has an empty title", self.id));
        }

        if self.score > MAX_SCORE {
            return Err(format!(
                "Score {} for anime {} exceeds {}",
                self.score, self.id, MAX_SCORE
            ));
        }

        if let Some(mean) = self.community_mean_score() {
            if !(0.0..=10.0).contains(&mean) {
                return Err(format!(
                    "Community mean {} for anime {} is out of range",
                    mean, self.id
                ));
            }
        }

        Ok(())
    }
}
