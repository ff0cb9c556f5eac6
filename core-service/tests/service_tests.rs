//! End-to-end tests for the core service façade
//!
//! The service is bootstrapped against in-memory bridges and a scripted
//! MyAnimeList endpoint, then driven through its public surface:
//! - Bootstrap validation and credential loading
//! - Sign-in initiation
//! - Extended sync feeding the analytics report
//! - Error mapping when no session exists

use anyhow::Result;
use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::storage::{LegacyStore, SecureStore};
use bridge_traits::time::ManualClock;
use chrono::{TimeZone, Utc};
use core_analytics::RecommendationWeights;
use core_auth::credentials::CREDENTIALS_KEY;
use core_auth::Credentials;
use core_runtime::config::CoreConfig;
use core_runtime::events::{AuthEvent, CoreEvent, SyncEvent};
use core_service::{CoreError, CoreService};
use core_sync::{SyncError, SyncRequest};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ============================================================================
// Bridges
// ============================================================================

#[derive(Default)]
struct MemorySecureStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
struct EmptyLegacyStore;

impl LegacyStore for EmptyLegacyStore {
    fn get(&self, _key: &str) -> Option<String> {
        None
    }

    fn set(&self, _key: &str, _value: &str) -> BridgeResult<()> {
        Ok(())
    }

    fn remove(&self, _key: &str) -> BridgeResult<()> {
        Ok(())
    }
}

const FIRST_PAGE: &str = r#"{
    "data": [
        {
            "node": {
                "id": 1, "title": "Fullmetal Alchemist", "num_episodes": 51,
                "studios": [{"id": 4, "name": "Bones"}],
                "genres": [{"id": 1, "name": "Action"}],
                "start_season": {"year": 2003, "season": "fall"},
                "related_anime": [{"node": {"id": 2}, "relation_type": "alternative_version"}],
                "mean": 8.1
            },
            "list_status": {"status": "completed", "score": 9, "num_episodes_watched": 51}
        },
        {
            "node": {
                "id": 2, "title": "Fullmetal Alchemist: Brotherhood", "num_episodes": 64,
                "studios": [{"id": 4, "name": "Bones"}],
                "genres": [{"id": 1, "name": "Action"}],
                "start_season": {"year": 2009, "season": "spring"},
                "related_anime": [],
                "mean": 9.1
            },
            "list_status": {"status": "completed", "score": 10, "num_episodes_watched": 64}
        }
    ],
    "paging": {"next": "https://api.myanimelist.net/v2/users/@me/animelist?offset=2&limit=1000"}
}"#;

const SECOND_PAGE: &str = r#"{
    "data": [
        {
            "node": {
                "id": 3, "title": "Mob Psycho 100", "num_episodes": 12,
                "studios": [{"id": 4, "name": "Bones"}],
                "genres": [{"id": 1, "name": "Action"}],
                "start_season": {"year": 2016, "season": "summer"},
                "mean": 8.5
            },
            "list_status": {"status": "plan_to_watch", "score": 0, "num_episodes_watched": 0}
        },
        {
            "node": {
                "id": 4, "title": "Some Filler", "num_episodes": 0,
                "studios": [], "genres": [], "related_anime": []
            },
            "list_status": {"status": "dropped", "score": 2, "num_episodes_watched": 3}
        }
    ],
    "paging": {}
}"#;

/// Serves the two list pages and records every URL it receives.
#[derive(Default)]
struct ScriptedApi {
    urls: Mutex<Vec<String>>,
    authorizations: Mutex<Vec<Option<String>>>,
}

impl ScriptedApi {
    fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HttpClient for ScriptedApi {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        self.urls.lock().unwrap().push(request.url.clone());
        self.authorizations
            .lock()
            .unwrap()
            .push(request.headers.get("Authorization").cloned());

        let body = if request.url.contains("offset=2") {
            SECOND_PAGE
        } else if request.url.contains("/users/@me/animelist?") {
            FIRST_PAGE
        } else {
            return Ok(HttpResponse::new(404, r#"{"error":"not_found"}"#));
        };
        Ok(HttpResponse::new(200, body))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap(),
    ))
}

async fn signed_in_store() -> Result<Arc<MemorySecureStore>> {
    let store = Arc::new(MemorySecureStore::default());
    let credentials = Credentials {
        client_id: Some("client-123".to_string()),
        access_token: Some("seeded-token".to_string()),
        refresh_token: Some("seeded-refresh".to_string()),
        token_expiry: Some(Utc.with_ymd_and_hms(2024, 4, 2, 12, 0, 0).unwrap()),
        username: Some("kaori".to_string()),
        user_id: Some(42),
    };
    store
        .set_secret(CREDENTIALS_KEY, &serde_json::to_vec(&credentials)?)
        .await?;
    Ok(store)
}

fn config(http: Arc<ScriptedApi>, store: Arc<MemorySecureStore>) -> Result<CoreConfig> {
    Ok(CoreConfig::builder()
        .client_id("client-123")
        .http_client(http)
        .secure_store(store)
        .legacy_store(Arc::new(EmptyLegacyStore))
        .clock(clock())
        .build()?)
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_bootstrap_rejects_invalid_config() -> Result<()> {
    let mut config = config(Arc::default(), Arc::default())?;
    config.sync.page_size = 0;

    let result = CoreService::bootstrap(config).await;

    assert!(matches!(result, Err(CoreError::Runtime(_))));
    Ok(())
}

#[tokio::test]
async fn test_bootstrap_loads_stored_session() -> Result<()> {
    let core = CoreService::bootstrap(config(Arc::default(), signed_in_store().await?)?).await?;

    assert!(core.auth().is_authenticated().await);
    assert_eq!(
        core.auth().access_token().await.as_deref(),
        Some("seeded-token")
    );
    Ok(())
}

#[tokio::test]
async fn test_begin_sign_in_uses_configured_client_id() -> Result<()> {
    let core = CoreService::bootstrap(config(Arc::default(), Arc::default())?).await?;
    let mut auth_events = core.auth_events();
    let mut sync_events = core.sync_events();

    let url = core.auth().begin_sign_in().await?;

    assert!(url.contains("client_id=client-123"));
    assert!(url.contains("code_challenge_method=S256"));
    assert!(matches!(
        auth_events.try_recv(),
        Some(Ok(CoreEvent::Auth(AuthEvent::SigningIn)))
    ));
    assert!(sync_events.try_recv().is_none());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_sync_and_analyze_end_to_end() -> Result<()> {
    let http = Arc::new(ScriptedApi::default());
    let core = CoreService::bootstrap(config(http.clone(), signed_in_store().await?)?).await?;
    let mut events = core.subscribe();

    let synced = core.sync_and_analyze(SyncRequest::all()).await?;

    let urls = http.urls();
    assert_eq!(urls.len(), 2);
    assert!(urls[0].contains("fields=list_status,num_episodes,studios"));
    assert!(urls[1].contains("offset=2"));
    assert!(http
        .authorizations
        .lock()
        .unwrap()
        .iter()
        .all(|header| header.as_deref() == Some("Bearer seeded-token")));

    assert_eq!(synced.entries.len(), 4);
    assert_eq!(synced.pages_fetched, 2);
    assert!(!synced.truncated);

    let report = &synced.report;
    assert_eq!(report.summary.total, 4);
    assert_eq!(report.score_distribution.total(), 3);
    assert_eq!(report.studio_affinity.len(), 1);
    assert_eq!(report.studio_affinity[0].name, "Bones");
    assert_eq!(report.studio_affinity[0].average_score, 9.5);
    assert_eq!(report.franchises.len(), 1);
    assert_eq!(report.franchises[0].anime_ids, vec![1, 2]);
    assert_eq!(report.franchises[0].canonical_title, "Fullmetal Alchemist");
    assert_eq!(report.recommendations.len(), 1);
    assert_eq!(report.recommendations[0].id, 3);

    let mut last = None;
    while let Ok(event) = events.try_recv() {
        last = Some(event);
    }
    assert!(matches!(
        last,
        Some(CoreEvent::Sync(SyncEvent::Completed {
            items_processed: 4,
            pages_fetched: 2,
            ..
        }))
    ));
    Ok(())
}

#[tokio::test]
async fn test_sync_without_session_requires_sign_in() -> Result<()> {
    let http = Arc::new(ScriptedApi::default());
    let core = CoreService::bootstrap(config(http.clone(), Arc::default())?).await?;

    let error = core.sync_list(SyncRequest::all()).await.unwrap_err();

    assert!(matches!(error, CoreError::Sync(SyncError::NotAuthenticated)));
    assert!(error.requires_sign_in());
    assert!(http.urls().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_invalid_recommendation_weights_are_rejected() -> Result<()> {
    let core = CoreService::bootstrap(config(Arc::default(), Arc::default())?).await?;

    let weights = RecommendationWeights {
        max_results: 0,
        ..RecommendationWeights::default()
    };

    assert!(matches!(
        core.with_recommendation_weights(weights),
        Err(CoreError::Analytics(_))
    ));
    Ok(())
}
