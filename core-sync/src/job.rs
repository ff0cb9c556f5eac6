//! # Sync Jobs
//!
//! Identifiers, requests and results of list synchronizations.
//!
//! ## Usage
//!
//! ```rust
//! use core_library::ListStatus;
//! use core_sync::SyncRequest;
//!
//! // Everything on the plan-to-watch list, with analytics fields
//! let request = SyncRequest::all()
//!     .with_status(ListStatus::PlanToWatch)
//!     .extended();
//!
//! // At most 50 entries of any status
//! let capped = SyncRequest::all().with_max_items(50);
//! assert_eq!(capped.max_items, Some(50));
//! ```

use crate::{Result, SyncError};
use core_library::{AnimeListEntry, FieldProjection, ListStatus};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a sync job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SyncJobId(Uuid);

impl SyncJobId {
    /// Create a new random sync job ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a sync job ID from a string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self> {
        Ok(Self(
            Uuid::parse_str(s).map_err(|e| SyncError::InvalidJobId(e.to_string()))?,
        ))
    }

    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for SyncJobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SyncJobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SyncJobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Requests
// ============================================================================

/// What to pull from the user's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    /// Only entries with this status; `None` pulls every status.
    pub status: Option<ListStatus>,
    /// Stop once this many entries were collected.
    pub max_items: Option<usize>,
    pub projection: FieldProjection,
}

impl SyncRequest {
    /// Every entry, narrow projection, no cap.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: ListStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = Some(max_items);
        self
    }

    /// Request the fields analytics needs.
    pub fn extended(mut self) -> Self {
        self.projection = FieldProjection::Extended;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_items == Some(0) {
            return Err(SyncError::InvalidInput {
                field: "max_items".to_string(),
                message: "Result cap must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// Progress & Results
// ============================================================================

/// Counters updated after every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SyncProgress {
    pub items_processed: u64,
    pub pages_fetched: u32,
}

/// Entries collected by a finished synchronization.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub job_id: SyncJobId,
    pub entries: Vec<AnimeListEntry>,
    pub pages_fetched: u32,
    /// The cap stopped the sync before the list was exhausted.
    pub truncated: bool,
    pub duration: Duration,
}

impl SyncOutcome {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
