//! # List Sync Module
//!
//! Pulls the user's anime list from a [`ListProvider`](core_library::ListProvider).
//!
//! ## Overview
//!
//! This module manages list synchronizations, including:
//! - Following page cursors strictly in order
//! - Pacing requests with a fixed inter-page delay
//! - Capping results and filtering by status
//! - Cancelling between pages
//! - Emitting progress on the event bus
//!
//! ## Components
//!
//! - **Sync Jobs** (`job`): Job ids, requests, progress counters and outcomes
//! - **List Synchronizer** (`synchronizer`): Drives the paginated fetch

pub mod error;
pub mod job;
pub mod synchronizer;

pub use error::{Result, SyncError};
pub use job::{SyncJobId, SyncOutcome, SyncProgress, SyncRequest};
pub use synchronizer::ListSynchronizer;
