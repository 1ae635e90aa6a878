//! Structured logging/tracing init (§6 `monitoring.logging`, ambient stack).

use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Registry};

use crate::config::LoggingConfig;
use crate::error::{CoreError, CoreResult};

/// Installs the global `tracing` subscriber. JSON formatting when
/// `config.format == "json"`, human-readable otherwise; level is an
/// `EnvFilter` seeded from `config.level` and overridable via `RUST_LOG`.
pub fn init_tracing(config: &LoggingConfig) -> CoreResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},rag_query_core={}", config.level, config.level)));

    if config.format == "json" {
        let formatting_layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(true)
            .fmt_fields(JsonFields::new());
        let subscriber = Registry::default().with(env_filter).with(formatting_layer);
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| CoreError::Processing(format!("failed to install tracing subscriber: {e}")))?;
    } else {
        let formatting_layer = fmt::layer().with_target(true);
        let subscriber = Registry::default().with(env_filter).with(formatting_layer);
        tracing::subscriber::set_global_default(subscriber)
            .map_err(|e| CoreError::Processing(format!("failed to install tracing subscriber: {e}")))?;
    }

    Ok(())
}

/// Injects a fresh `trace_id` into a query-scoped span, matching the
/// `trace_span!`/`info_span!` convention used throughout `processor`.
#[macro_export]
macro_rules! query_span {
    ($query_id:expr) => {
        tracing::info_span!("query", trace_id = %$query_id)
    };
}

/// Emits one structured completion event per finished query, independent of
/// the ambient subscriber's formatting — gives alerting consumers a single
/// stable event name (`query.completed`) to filter on.
pub fn log_query_completed(query_id: uuid::Uuid, processing_time_ms: u64, cached: bool, source_count: usize) {
    tracing::info!(
        event = "query.completed",
        query_id = %query_id,
        processing_time_ms,
        cached,
        source_count,
        "query completed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_tracing_accepts_json_format() {
        let config = LoggingConfig { level: "info".to_string(), format: "json".to_string(), file: None };
        // Installing a second global default in the same process errors;
        // this only exercises that the builder itself does not panic.
        let _ = init_tracing(&config);
    }
}
