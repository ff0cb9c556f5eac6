//! # List Synchronizer
//!
//! Pulls the signed-in user's list page by page through a [`ListProvider`].
//!
//! - Pages are requested strictly in cursor order; the next request is only
//!   built from the cursor the previous page returned.
//! - A fixed delay separates consecutive requests.
//! - Every sync is a full re-fetch; nothing is cached between runs.
//! - A sync can be cancelled between pages, including during the delay.
//!
//! ## Example
//!
//! ```rust,ignore
//! use core_sync::{ListSynchronizer, SyncRequest};
//!
//! let synchronizer = ListSynchronizer::new(provider, SyncSettings::default(), event_bus);
//! let outcome = synchronizer.sync(SyncRequest::all().extended()).await?;
//! println!("{} entries in {} pages", outcome.len(), outcome.pages_fetched);
//! ```

use crate::job::{SyncJobId, SyncOutcome, SyncProgress, SyncRequest};
use crate::{Result, SyncError};
use core_library::{AnimeListEntry, FieldProjection, ListProvider, PageQuery};
use core_runtime::config::SyncSettings;
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub struct ListSynchronizer {
    provider: Arc<dyn ListProvider>,
    settings: SyncSettings,
    event_bus: EventBus,
    /// Cancellation handles of running syncs
    active_syncs: Arc<Mutex<HashMap<SyncJobId, CancellationToken>>>,
}

impl ListSynchronizer {
    pub fn new(provider: Arc<dyn ListProvider>, settings: SyncSettings, event_bus: EventBus) -> Self {
        Self {
            provider,
            settings,
            event_bus,
            active_syncs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Run a synchronization to completion.
    pub async fn sync(&self, request: SyncRequest) -> Result<SyncOutcome> {
        self.sync_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Run a synchronization that stops between pages once `cancellation`
    /// fires, or when [`cancel_sync`](Self::cancel_sync) is called with its
    /// job id.
    #[instrument(skip(self, cancellation), fields(status = ?request.status, projection = ?request.projection))]
    pub async fn sync_with_cancellation(
        &self,
        request: SyncRequest,
        cancellation: CancellationToken,
    ) -> Result<SyncOutcome> {
        request.validate()?;

        let job_id = SyncJobId::new();
        self.active_syncs
            .lock()
            .await
            .insert(job_id, cancellation.clone());

        self.event_bus
            .emit(CoreEvent::Sync(SyncEvent::Started {
                job_id: job_id.to_string(),
                status_filter: request.status.map(|status| status.as_str().to_string()),
                extended: request.projection == FieldProjection::Extended,
            }))
            .ok();

        info!(job_id = %job_id, provider = self.provider.provider_name(), "Starting list sync");

        let started = Instant::now();
        let mut progress = SyncProgress::default();
        let result = timeout(
            self.settings.sync_timeout,
            self.execute_sync(job_id, &request, &cancellation, &mut progress),
        )
        .await
        .unwrap_or_else(|_| Err(SyncError::Timeout(self.settings.sync_timeout.as_secs())));

        self.active_syncs.lock().await.remove(&job_id);

        match result {
            Ok((entries, truncated)) => {
                let duration = started.elapsed();
                info!(
                    job_id = %job_id,
                    entries = entries.len(),
                    pages = progress.pages_fetched,
                    truncated = truncated,
                    "List sync completed"
                );
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Completed {
                        job_id: job_id.to_string(),
                        items_processed: entries.len() as u64,
                        pages_fetched: progress.pages_fetched,
                        duration_ms: duration.as_millis() as u64,
                    }))
                    .ok();

                Ok(SyncOutcome {
                    job_id,
                    entries,
                    pages_fetched: progress.pages_fetched,
                    truncated,
                    duration,
                })
            }
            Err(SyncError::Cancelled) => {
                info!(job_id = %job_id, items = progress.items_processed, "List sync cancelled");
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Cancelled {
                        job_id: job_id.to_string(),
                        items_processed: progress.items_processed,
                    }))
                    .ok();
                Err(SyncError::Cancelled)
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "List sync failed");
                self.event_bus
                    .emit(CoreEvent::Sync(SyncEvent::Failed {
                        job_id: job_id.to_string(),
                        message: e.to_string(),
                        items_processed: progress.items_processed,
                        recoverable: e.is_recoverable(),
                    }))
                    .ok();
                Err(e)
            }
        }
    }

    /// Follow cursors until the list or the cap is exhausted.
    async fn execute_sync(
        &self,
        job_id: SyncJobId,
        request: &SyncRequest,
        cancellation: &CancellationToken,
        progress: &mut SyncProgress,
    ) -> Result<(Vec<AnimeListEntry>, bool)> {
        let mut entries: Vec<AnimeListEntry> = Vec::new();
        let mut query = PageQuery::first(
            request.status,
            self.page_limit(request, 0),
            request.projection,
        );

        loop {
            if progress.pages_fetched > 0 {
                if cancellation.is_cancelled() {
                    return Err(SyncError::Cancelled);
                }
                tokio::select! {
                    _ = cancellation.cancelled() => return Err(SyncError::Cancelled),
                    _ = sleep(self.settings.page_delay) => {}
                }
            }

            debug!(
                page = progress.pages_fetched + 1,
                limit = query.limit,
                "Fetching list page"
            );
            let page = self.provider.fetch_page(&query).await?;

            progress.pages_fetched += 1;
            entries.extend(page.entries);

            let capped = request
                .max_items
                .map_or(false, |max_items| entries.len() >= max_items);
            let truncated = match request.max_items {
                Some(max_items) if entries.len() > max_items => {
                    entries.truncate(max_items);
                    true
                }
                Some(_) if capped => page.next_cursor.is_some(),
                _ => false,
            };
            progress.items_processed = entries.len() as u64;

            self.event_bus
                .emit(CoreEvent::Sync(SyncEvent::Progress {
                    job_id: job_id.to_string(),
                    items_processed: progress.items_processed,
                    pages_fetched: progress.pages_fetched,
                }))
                .ok();

            if capped {
                debug!(entries = entries.len(), "Result cap reached");
                return Ok((entries, truncated));
            }

            match page.next_cursor {
                Some(cursor) if !cursor.is_empty() => {
                    let limit = self.page_limit(request, entries.len());
                    query = query.next(cursor, limit);
                }
                _ => return Ok((entries, false)),
            }
        }
    }

    /// Page size for the next request, never asking for more than the cap
    /// still allows.
    fn page_limit(&self, request: &SyncRequest, collected: usize) -> u32 {
        let page_size = self.settings.page_size.max(1);
        match request.max_items {
            Some(max_items) => {
                let remaining = max_items.saturating_sub(collected).max(1);
                u32::try_from(remaining).map_or(page_size, |remaining| remaining.min(page_size))
            }
            None => page_size,
        }
    }

    /// Cancel a running sync.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::JobNotFound`] if no sync with this id is running.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn cancel_sync(&self, job_id: SyncJobId) -> Result<()> {
        let token = self.active_syncs.lock().await.get(&job_id).cloned();

        match token {
            Some(token) => {
                token.cancel();
                info!("Cancellation requested");
                Ok(())
            }
            None => {
                warn!("No running sync with this id");
                Err(SyncError::JobNotFound {
                    job_id: job_id.to_string(),
                })
            }
        }
    }

    /// Whether any sync is running.
    pub async fn is_sync_active(&self) -> bool {
        !self.active_syncs.lock().await.is_empty()
    }

    /// Ids of the running syncs.
    pub async fn active_jobs(&self) -> Vec<SyncJobId> {
        self.active_syncs.lock().await.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_library::{LibraryError, ListPage, ListStatus};
    use mockall::mock;
    use std::time::Duration;

    mock! {
        Provider {}

        #[async_trait]
        impl ListProvider for Provider {
            async fn fetch_page(&self, query: &PageQuery) -> core_library::Result<ListPage>;
            fn provider_name(&self) -> &'static str;
        }
    }

    fn entries(ids: std::ops::Range<u64>) -> Vec<AnimeListEntry> {
        ids.map(|id| AnimeListEntry::new(id, format!("Anime {}", id), ListStatus::Completed))
            .collect()
    }

    fn page(ids: std::ops::Range<u64>, next: Option<&str>) -> ListPage {
        ListPage {
            entries: entries(ids),
            next_cursor: next.map(str::to_string),
        }
    }

    fn settings(page_size: u32) -> SyncSettings {
        SyncSettings {
            page_size,
            page_delay: Duration::from_millis(350),
            sync_timeout: Duration::from_secs(300),
        }
    }

    fn synchronizer(provider: MockProvider, page_size: u32) -> (ListSynchronizer, EventBus) {
        let bus = EventBus::new(64);
        let mut provider = provider;
        provider.expect_provider_name().return_const("mock");
        (
            ListSynchronizer::new(Arc::new(provider), settings(page_size), bus.clone()),
            bus,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_page() {
        let mut provider = MockProvider::new();
        provider
            .expect_fetch_page()
            .withf(|query| query.cursor.is_none() && query.limit == 100)
            .times(1)
            .returning(|_| Ok(page(0..3, None)));

        let (synchronizer, _bus) = synchronizer(provider, 100);
        let outcome = synchronizer.sync(SyncRequest::all()).await.unwrap();

        assert_eq!(outcome.len(), 3);
        assert_eq!(outcome.pages_fetched, 1);
        assert!(!outcome.truncated);
        assert!(!synchronizer.is_sync_active().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_between_pages() {
        let mut provider = MockProvider::new();
        provider
            .expect_fetch_page()
            .withf(|query| query.cursor.is_none())
            .times(1)
            .returning(|_| Ok(page(0..2, Some("c1"))));
        provider
            .expect_fetch_page()
            .withf(|query| query.cursor.as_deref() == Some("c1"))
            .times(1)
            .returning(|_| Ok(page(2..3, None)));

        let (synchronizer, _bus) = synchronizer(provider, 2);
        let started = tokio::time::Instant::now();
        let outcome = synchronizer.sync(SyncRequest::all()).await.unwrap();

        assert_eq!(outcome.pages_fetched, 2);
        assert!(started.elapsed() >= Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cap_truncates_and_shrinks_last_request() {
        let mut provider = MockProvider::new();
        provider
            .expect_fetch_page()
            .withf(|query| query.cursor.is_none() && query.limit == 2)
            .times(1)
            .returning(|_| Ok(page(0..2, Some("c1"))));
        provider
            .expect_fetch_page()
            .withf(|query| query.cursor.as_deref() == Some("c1") && query.limit == 1)
            .times(1)
            .returning(|_| Ok(page(2..3, Some("c2"))));

        let (synchronizer, _bus) = synchronizer(provider, 2);
        let outcome = synchronizer
            .sync(SyncRequest::all().with_max_items(3))
            .await
            .unwrap();

        assert_eq!(outcome.len(), 3);
        assert!(outcome.truncated);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_filter_and_projection_are_forwarded() {
        let mut provider = MockProvider::new();
        provider
            .expect_fetch_page()
            .withf(|query| {
                query.status == Some(ListStatus::PlanToWatch)
                    && query.projection == FieldProjection::Extended
            })
            .times(1)
            .returning(|_| Ok(page(0..1, None)));

        let (synchronizer, bus) = synchronizer(provider, 100);
        let mut events = bus.subscribe();
        synchronizer
            .sync(SyncRequest::all().with_status(ListStatus::PlanToWatch).extended())
            .await
            .unwrap();

        match events.recv().await.unwrap() {
            CoreEvent::Sync(SyncEvent::Started {
                status_filter,
                extended,
                ..
            }) => {
                assert_eq!(status_filter.as_deref(), Some("plan_to_watch"));
                assert!(extended);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_error_fails_sync() {
        let mut provider = MockProvider::new();
        provider
            .expect_fetch_page()
            .times(1)
            .returning(|_| Err(LibraryError::AuthenticationExpired));

        let (synchronizer, bus) = synchronizer(provider, 100);
        let mut events = bus.subscribe();
        let result = synchronizer.sync(SyncRequest::all()).await;

        assert!(matches!(result, Err(SyncError::AuthenticationExpired)));
        let _started = events.recv().await.unwrap();
        assert!(matches!(
            events.recv().await.unwrap(),
            CoreEvent::Sync(SyncEvent::Failed {
                recoverable: false,
                ..
            })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_stops_before_second_page() {
        let token = CancellationToken::new();
        let cancel_after_first = token.clone();

        let mut provider = MockProvider::new();
        provider.expect_fetch_page().times(1).returning(move |_| {
            cancel_after_first.cancel();
            Ok(page(0..2, Some("c1")))
        });

        let (synchronizer, bus) = synchronizer(provider, 2);
        let mut events = bus.subscribe();
        let result = synchronizer
            .sync_with_cancellation(SyncRequest::all(), token)
            .await;

        assert!(matches!(result, Err(SyncError::Cancelled)));
        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert!(matches!(
            last,
            Some(CoreEvent::Sync(SyncEvent::Cancelled {
                items_processed: 2,
                ..
            }))
        ));
    }

    #[tokio::test]
    async fn test_cancel_unknown_job() {
        let (synchronizer, _bus) = synchronizer(MockProvider::new(), 100);
        let result = synchronizer.cancel_sync(SyncJobId::new()).await;
        assert!(matches!(result, Err(SyncError::JobNotFound { .. })));
    }

    #[tokio::test]
    async fn test_zero_cap_rejected_without_requests() {
        let mut provider = MockProvider::new();
        provider.expect_fetch_page().times(0);

        let (synchronizer, _bus) = synchronizer(provider, 100);
        let result = synchronizer.sync(SyncRequest::all().with_max_items(0)).await;
        assert!(matches!(result, Err(SyncError::InvalidInput { .. })));
    }
}
