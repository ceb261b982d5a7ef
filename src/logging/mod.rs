//! Logging and observability
//!
//! - [`structured`] - subscriber setup (console and JSON file)
//! - [`telemetry`] - the [`TelemetrySink`] business events are delivered to
//! - [`azure`] - Azure Monitor Logs Ingestion sink

pub mod azure;
pub mod structured;
pub mod telemetry;

pub use structured::{init_logging, LoggingGuard};
pub use telemetry::{
    create_telemetry_sink, MemoryTelemetrySink, NoopTelemetrySink, TelemetrySink, TrackedEvent,
};

/// Log a business event after it was handed to the sink
///
/// # Example
///
/// ```no_run
/// use courier::log_event_dispatched;
///
/// let json = r#"{"childReportId":"..."}"#;
/// log_event_dispatched!("ITEM_ROUTED", json);
/// ```
#[macro_export]
macro_rules! log_event_dispatched {
    ($name:expr, $event_json:expr) => {
        tracing::info!(
            event_name = %$name,
            event = %$event_json,
            "{} event occurred",
            $name
        );
    };
}

/// Log a lineage query that returned a partial result
///
/// # Example
///
/// ```no_run
/// use courier::log_lineage_degraded;
///
/// let error = "Lineage query timed out after 5000 ms";
/// log_lineage_degraded!("get_root_reports", "5c3c...", error);
/// ```
#[macro_export]
macro_rules! log_lineage_degraded {
    ($operation:expr, $subject:expr, $error:expr) => {
        tracing::warn!(
            operation = $operation,
            subject = %$subject,
            error = %$error,
            "Lineage unavailable, continuing with partial lineage"
        );
    };
}

/// Log an error with context
///
/// # Example
///
/// ```no_run
/// use courier::log_error_with_context;
/// use courier::domain::CourierError;
///
/// let error = CourierError::Database("connection reset".to_string());
/// log_error_with_context!(&error, "Failed to persist step outputs");
/// ```
#[macro_export]
macro_rules! log_error_with_context {
    ($error:expr, $context:expr) => {
        tracing::error!(
            error = %$error,
            context = $context,
            "Error occurred"
        );
    };
}
