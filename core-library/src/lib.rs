//! # Anime List Domain
//!
//! Domain models for a user's anime list and the seam through which list
//! pages are fetched from a tracking service.
//!
//! ## Overview
//!
//! - [`models`]: list entries, statuses, seasons, franchise relations and the
//!   optional extended projection used by analytics
//! - [`provider`]: the [`ListProvider`] trait implemented by service connectors
//!
//! Entries are immutable snapshots. A synchronization replaces the working
//! set wholesale rather than merging into it.

pub mod error;
pub mod models;
pub mod provider;

pub use error::{LibraryError, Result};
pub use models::{
    AnimeId, AnimeListEntry, ExtendedDetails, FieldProjection, Genre, ListStatus, RelatedAnime,
    RelationType, Season, StartSeason, Studio, MAX_SCORE,
};
pub use provider::{ListPage, ListProvider, PageQuery};
