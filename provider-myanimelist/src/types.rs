//! MyAnimeList API response types
//!
//! Data structures for deserializing MyAnimeList API v2 responses.

use core_library::{Genre, ListStatus, RelationType, Season, Studio};
use serde::Deserialize;

/// `GET /users/@me/animelist` response
///
/// See: https://myanimelist.net/apiconfig/references/api/v2#operation/users_user_id_animelist_get
#[derive(Debug, Deserialize)]
pub struct AnimeListResponse {
    #[serde(default)]
    pub data: Vec<AnimeListItem>,

    #[serde(default)]
    pub paging: Paging,
}

#[derive(Debug, Default, Deserialize)]
pub struct Paging {
    /// Absolute URL of the next page
    #[serde(default)]
    pub next: Option<String>,
}

/// One list row: the catalog node plus the user's status for it
#[derive(Debug, Deserialize)]
pub struct AnimeListItem {
    pub node: AnimeNode,
    pub list_status: ListStatusPayload,
}

/// Catalog fields of an anime. Extended fields are only present when requested.
#[derive(Debug, Deserialize)]
pub struct AnimeNode {
    pub id: u64,
    pub title: String,

    #[serde(default)]
    pub main_picture: Option<Picture>,

    /// `0` while the episode count is unknown
    #[serde(default)]
    pub num_episodes: Option<u32>,

    #[serde(default)]
    pub studios: Option<Vec<Studio>>,

    #[serde(default)]
    pub start_season: Option<StartSeasonPayload>,

    #[serde(default)]
    pub related_anime: Option<Vec<RelatedAnimePayload>>,

    #[serde(default)]
    pub genres: Option<Vec<Genre>>,

    /// Community mean score
    #[serde(default)]
    pub mean: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct Picture {
    #[serde(default)]
    pub medium: Option<String>,
    #[serde(default)]
    pub large: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StartSeasonPayload {
    pub year: i32,
    pub season: Season,
}

#[derive(Debug, Deserialize)]
pub struct RelatedAnimePayload {
    pub node: RelatedNode,
    pub relation_type: RelationType,
}

#[derive(Debug, Deserialize)]
pub struct RelatedNode {
    pub id: u64,
}

#[derive(Debug, Deserialize)]
pub struct ListStatusPayload {
    pub status: ListStatus,

    #[serde(default)]
    pub score: u8,

    #[serde(default)]
    pub num_episodes_watched: u32,

    /// Last update (RFC 3339)
    #[serde(default)]
    pub updated_at: Option<String>,
}
