//! Core service façade and bootstrap helpers.
//!
//! This crate wires the host-provided bridges from a [`CoreConfig`] into the
//! authentication manager, the MyAnimeList connector, the list synchronizer
//! and the analytics engine, and exposes them behind one handle. Desktop apps
//! typically enable the `desktop-shims` feature so the configuration falls
//! back to the reqwest client, the OS keyring and the legacy preference file.
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use core_service::CoreService;
//! use core_sync::SyncRequest;
//!
//! let config = CoreConfig::builder().client_id("my-client-id").build()?;
//! let core = CoreService::bootstrap(config).await?;
//!
//! let url = core.auth().begin_sign_in().await?;
//! // open `url`, then feed the loopback redirect back in
//! core.auth().handle_callback_url(&redirect).await?;
//!
//! let synced = core.sync_and_analyze(SyncRequest::all()).await?;
//! println!("{} franchises", synced.report.franchises.len());
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use core_analytics::{AnalyticsEngine, AnalyticsReport, RecommendationWeights};
use core_auth::{AccessTokenSource, AuthManager};
use core_library::{AnimeListEntry, FieldProjection};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, EventStream, Receiver};
use core_sync::{ListSynchronizer, SyncJobId, SyncOutcome, SyncRequest};
use provider_myanimelist::{MyAnimeListConnector, RequestGateway};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

pub use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};

/// Result of [`CoreService::sync_and_analyze`].
#[derive(Debug, Clone, Serialize)]
pub struct SyncedAnalytics {
    pub entries: Vec<AnimeListEntry>,
    pub pages_fetched: u32,
    pub truncated: bool,
    pub report: AnalyticsReport,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    event_bus: EventBus,
    auth: Arc<AuthManager>,
    synchronizer: Arc<ListSynchronizer>,
    analytics: AnalyticsEngine,
}

impl CoreService {
    /// Validate `config`, build every component and load stored credentials.
    #[instrument(skip_all)]
    pub async fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::new(config.event_buffer_size);

        let auth = Arc::new(AuthManager::from_config(&config, event_bus.clone()));
        auth.initialize().await;

        let tokens: Arc<dyn AccessTokenSource> = auth.clone();
        let gateway = RequestGateway::new(
            config.http_client.clone(),
            tokens,
            config.rate_limit.clone(),
        );
        let connector = MyAnimeListConnector::new(gateway, config.endpoints.api_base_url.clone());

        let synchronizer = Arc::new(ListSynchronizer::new(
            Arc::new(connector),
            config.sync.clone(),
            event_bus.clone(),
        ));

        info!(
            authenticated = auth.is_authenticated().await,
            "Core service ready"
        );

        Ok(Self {
            event_bus,
            auth,
            synchronizer,
            analytics: AnalyticsEngine::new(),
        })
    }

    /// Replace the recommendation weights used by [`analyze`](Self::analyze).
    pub fn with_recommendation_weights(mut self, weights: RecommendationWeights) -> Result<Self> {
        self.analytics = AnalyticsEngine::with_weights(weights)?;
        Ok(self)
    }

    pub fn auth(&self) -> &Arc<AuthManager> {
        &self.auth
    }

    pub fn synchronizer(&self) -> &Arc<ListSynchronizer> {
        &self.synchronizer
    }

    pub fn analytics(&self) -> &AnalyticsEngine {
        &self.analytics
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Subscribe to authentication and sync events.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.event_bus.subscribe()
    }

    /// Subscribe to authentication events only.
    pub fn auth_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Auth(_)))
    }

    /// Subscribe to sync progress events only.
    pub fn sync_events(&self) -> EventStream {
        EventStream::new(self.event_bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Sync(_)))
    }

    /// Pull the user's list.
    pub async fn sync_list(&self, request: SyncRequest) -> Result<SyncOutcome> {
        Ok(self.synchronizer.sync(request).await?)
    }

    /// Pull the user's list, stopping between pages once `cancellation` fires.
    pub async fn sync_list_with_cancellation(
        &self,
        request: SyncRequest,
        cancellation: CancellationToken,
    ) -> Result<SyncOutcome> {
        Ok(self
            .synchronizer
            .sync_with_cancellation(request, cancellation)
            .await?)
    }

    pub async fn cancel_sync(&self, job_id: SyncJobId) -> Result<()> {
        Ok(self.synchronizer.cancel_sync(job_id).await?)
    }

    pub fn analyze(&self, entries: &[AnimeListEntry]) -> AnalyticsReport {
        self.analytics.report(entries)
    }

    /// Sync with the extended projection, then build every analytics view.
    #[instrument(skip(self))]
    pub async fn sync_and_analyze(&self, request: SyncRequest) -> Result<SyncedAnalytics> {
        let request = SyncRequest {
            projection: FieldProjection::Extended,
            ..request
        };

        let outcome = self.synchronizer.sync(request).await?;
        let report = self.analytics.report(&outcome.entries);

        Ok(SyncedAnalytics {
            pages_fetched: outcome.pages_fetched,
            truncated: outcome.truncated,
            entries: outcome.entries,
            report,
        })
    }
}
