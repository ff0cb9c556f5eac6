//! Integration tests for logging system

use async_trait::async_trait;
use bridge_traits::error::Result as SinkResult;
use bridge_traits::time::{LogEntry, LogLevel, LoggerSink};
use core_runtime::logging::{init_logging, redact_if_sensitive, LogFormat, LoggingConfig};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct CollectingSink {
    entries: Mutex<Vec<LogEntry>>,
}

#[async_trait]
impl LoggerSink for CollectingSink {
    async fn log(&self, entry: LogEntry) -> SinkResult<()> {
        self.entries.lock().unwrap().push(entry);
        Ok(())
    }
}

// Only one global subscriber may be installed per process, so a single test
// covers initialization and the second-call failure.
#[test]
fn test_init_logging_once_per_process() {
    let sink = Arc::new(CollectingSink::default());
    let config = LoggingConfig::default()
        .with_format(LogFormat::Compact)
        .with_level(LogLevel::Info)
        .with_logger_sink(sink.clone());

    init_logging(config).unwrap();

    tracing::info!(target: "core_auth", username = "kaori", "Signed in");
    tracing::debug!(target: "core_auth", "Filtered out at info level");
    tracing::info!(target: "reqwest", "Dependency noise");

    {
        let entries = sink.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].message, "Signed in");
        assert_eq!(entries[0].fields.get("username"), Some(&"kaori".to_string()));
    }

    let second = init_logging(LoggingConfig::default());
    assert!(matches!(second, Err(core_runtime::Error::Logging(_))));
}

#[test]
fn test_credentials_never_pass_redaction() {
    for field in [
        "access_token",
        "refresh_token",
        "client_secret",
        "code_verifier",
        "oauth_state",
        "auth_code",
        "authorization",
    ] {
        assert_eq!(redact_if_sensitive(field, "value"), "[REDACTED]", "{}", field);
    }
}

#[test]
fn test_non_sensitive_values_pass_through() {
    assert_eq!(redact_if_sensitive("anime_id", "5114"), "5114");
    assert_eq!(redact_if_sensitive("status", "watching"), "watching");
    assert_eq!(redact_if_sensitive("user_id", "42"), "42");
}

#[test]
fn test_format_selection() {
    #[cfg(debug_assertions)]
    assert_eq!(LogFormat::default(), LogFormat::Pretty);

    #[cfg(not(debug_assertions))]
    assert_eq!(LogFormat::default(), LogFormat::Json);
}
