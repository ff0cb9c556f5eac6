//! MyAnimeList API connector implementation
//!
//! Implements the `ListProvider` trait for the MyAnimeList API v2.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core_library::error::Result;
use core_library::{
    AnimeListEntry, ExtendedDetails, FieldProjection, ListPage, ListProvider, PageQuery,
    RelatedAnime, StartSeason,
};
use core_runtime::config::MAX_PAGE_SIZE;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::error::MyAnimeListError;
use crate::gateway::RequestGateway;
use crate::types::{AnimeListItem, AnimeListResponse};

/// Fields requested for the narrow projection
const NARROW_FIELDS: &str = "list_status,num_episodes";

/// Fields requested for the extended projection
const EXTENDED_FIELDS: &str =
    "list_status,num_episodes,studios,start_season,related_anime,genres,mean";

/// MyAnimeList API connector
///
/// # Example
///
/// ```ignore
/// use core_library::{FieldProjection, ListProvider, PageQuery};
/// use provider_myanimelist::MyAnimeListConnector;
///
/// let connector = MyAnimeListConnector::new(gateway, "https://api.myanimelist.net/v2");
/// let page = connector
///     .fetch_page(&PageQuery::first(None, 100, FieldProjection::Narrow))
///     .await?;
/// ```
pub struct MyAnimeListConnector {
    gateway: RequestGateway,
    api_base_url: String,
}

impl MyAnimeListConnector {
    pub fn new(gateway: RequestGateway, api_base_url: impl Into<String>) -> Self {
        let api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        Self {
            gateway,
            api_base_url,
        }
    }

    /// URL of the first page for `query`.
    fn list_url(&self, query: &PageQuery) -> String {
        let fields = match query.projection {
            FieldProjection::Narrow => NARROW_FIELDS,
            FieldProjection::Extended => EXTENDED_FIELDS,
        };

        let mut url = format!(
            "{}/users/@me/animelist?fields={}&limit={}",
            self.api_base_url,
            fields,
            query.limit.clamp(1, MAX_PAGE_SIZE)
        );

        if let Some(status) = query.status {
            url.push_str(&format!("&status={}", urlencoding::encode(status.as_str())));
        }

        url.push_str("&nsfw=true");
        url
    }

    /// The service's `paging.next` is absolute; it must point back at the
    /// configured API.
    fn validate_cursor(&self, cursor: &str) -> std::result::Result<(), MyAnimeListError> {
        let prefix = format!("{}/", self.api_base_url);
        if cursor.starts_with(&prefix) {
            Ok(())
        } else {
            Err(MyAnimeListError::InvalidCursor(cursor.to_string()))
        }
    }

    /// URL for the page behind `cursor`, asking for at most `limit` entries.
    ///
    /// The cursor is requested verbatim unless its own `limit` is larger.
    fn cursor_url(&self, cursor: &str, limit: u32) -> std::result::Result<String, MyAnimeListError> {
        self.validate_cursor(cursor)?;
        let mut url =
            Url::parse(cursor).map_err(|_| MyAnimeListError::InvalidCursor(cursor.to_string()))?;

        let wanted = limit.clamp(1, MAX_PAGE_SIZE);
        let current = url
            .query_pairs()
            .find(|(key, _)| key == "limit")
            .and_then(|(_, value)| value.parse::<u32>().ok());
        if current.is_some_and(|current| current <= wanted) {
            return Ok(cursor.to_string());
        }

        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| key != "limit")
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("limit", &wanted.to_string());

        debug!(limit = wanted, "Shrinking page size of cursor request");
        Ok(url.into())
    }

    /// Parse RFC 3339 timestamp
    fn parse_timestamp(rfc3339: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(rfc3339)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Convert an API list row into a list entry
    fn convert_item(item: AnimeListItem, projection: FieldProjection) -> AnimeListEntry {
        let AnimeListItem { node, list_status } = item;

        let image = node
            .main_picture
            .and_then(|picture| picture.large.or(picture.medium));

        let mut entry = AnimeListEntry::new(node.id, node.title, list_status.status)
            .with_score(list_status.score)
            .with_episodes(
                list_status.num_episodes_watched,
                node.num_episodes.filter(|&n| n > 0),
            );
        entry.image = image;
        entry.updated_at = list_status
            .updated_at
            .as_deref()
            .and_then(Self::parse_timestamp);

        if projection == FieldProjection::Extended {
            entry = entry.with_extended(ExtendedDetails {
                studios: node.studios.unwrap_or_default(),
                start_season: node
                    .start_season
                    .map(|season| StartSeason::new(season.year, season.season)),
                related_anime: node
                    .related_anime
                    .unwrap_or_default()
                    .into_iter()
                    .map(|related| RelatedAnime {
                        target_id: related.node.id,
                        relation_type: related.relation_type,
                    })
                    .collect(),
                genres: node.genres.unwrap_or_default(),
                community_mean_score: node.mean,
            });
        }

        entry
    }

    async fn fetch(&self, query: &PageQuery) -> std::result::Result<ListPage, MyAnimeListError> {
        let url = match &query.cursor {
            Some(cursor) => self.cursor_url(cursor, query.limit)?,
            None => self.list_url(query),
        };

        let response = self.gateway.get(&url).await?;

        let list: AnimeListResponse = serde_json::from_slice(&response.body).map_err(|e| {
            MyAnimeListError::ParseError(format!("Failed to parse anime list response: {}", e))
        })?;

        let mut entries = Vec::with_capacity(list.data.len());
        for item in list.data {
            let entry = Self::convert_item(item, query.projection);
            match entry.validate() {
                Ok(()) => entries.push(entry),
                Err(reason) => warn!(anime_id = entry.id, reason = %reason, "Skipping invalid list entry"),
            }
        }

        debug!(
            entries = entries.len(),
            has_next = list.paging.next.is_some(),
            "Fetched list page"
        );

        Ok(ListPage {
            entries,
            next_cursor: list.paging.next,
        })
    }
}

#[async_trait]
impl ListProvider for MyAnimeListConnector {
    #[instrument(skip(self), fields(status = ?query.status, projection = ?query.projection))]
    async fn fetch_page(&self, query: &PageQuery) -> Result<ListPage> {
        let page = self.fetch(query).await?;
        info!(entries = page.entries.len(), "Listed anime from MyAnimeList");
        Ok(page)
    }

    fn provider_name(&self) -> &'static str {
        "myanimelist"
    }
}
