//! List provider seam
//!
//! A [`ListProvider`] fetches one page of the signed-in user's list. The
//! synchronizer drives it page by page and never sees the wire format.

use crate::error::Result;
use crate::models::{AnimeListEntry, FieldProjection, ListStatus};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Request for a single page of the user's list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    /// Restrict to one status; `None` fetches every status.
    pub status: Option<ListStatus>,
    /// Entries requested for this page.
    pub limit: u32,
    pub projection: FieldProjection,
    /// Opaque continuation returned by the previous page. `None` requests the first page.
    pub cursor: Option<String>,
}

impl PageQuery {
    /// Query for the first page.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_library::{FieldProjection, ListStatus, PageQuery};
    ///
    /// let query = PageQuery::first(Some(ListStatus::Completed), 100, FieldProjection::Narrow);
    /// assert!(query.cursor.is_none());
    /// ```
    pub fn first(status: Option<ListStatus>, limit: u32, projection: FieldProjection) -> Self {
        Self {
            status,
            limit,
            projection,
            cursor: None,
        }
    }

    /// Query for the page behind `cursor`, keeping filter and projection.
    pub fn next(&self, cursor: impl Into<String>, limit: u32) -> Self {
        Self {
            status: self.status,
            limit,
            projection: self.projection,
            cursor: Some(cursor.into()),
        }
    }
}

/// One page of list entries.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListPage {
    pub entries: Vec<AnimeListEntry>,
    pub next_cursor: Option<String>,
}

impl ListPage {
    pub fn has_next(&self) -> bool {
        self.next_cursor.is_some()
    }
}

/// Source of list pages, implemented per tracking service.
#[async_trait]
pub trait ListProvider: Send + Sync {
    /// Fetch the page described by `query`.
    ///
    /// # Errors
    /// - [`LibraryError::NotAuthenticated`](crate::LibraryError::NotAuthenticated) when no usable credentials exist
    /// - [`LibraryError::AuthenticationExpired`](crate::LibraryError::AuthenticationExpired) when re-authorization failed
    /// - [`LibraryError::RateLimited`](crate::LibraryError::RateLimited) once backoff is exhausted
    async fn fetch_page(&self, query: &PageQuery) -> Result<ListPage>;

    /// Short identifier used in logs and events.
    fn provider_name(&self) -> &'static str;
}
