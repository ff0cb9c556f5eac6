//! # MyAnimeList Provider
//!
//! Implements `ListProvider` for the MyAnimeList API v2.
//!
//! ## Overview
//!
//! This module provides:
//! - A request gateway that attaches bearer tokens, re-authorizes once on
//!   401 and backs off on 429 and 5xx answers
//! - Paginated list fetching with narrow or extended field projections
//! - Conversion from the service's JSON into `core-library` entries

pub mod connector;
pub mod error;
pub mod gateway;
pub mod types;

pub use connector::MyAnimeListConnector;
pub use error::{MyAnimeListError, Result};
pub use gateway::RequestGateway;
