//! Integration tests for logging and telemetry sink selection

use courier::config::{parse_config, LoggingConfig};
use courier::logging::{create_telemetry_sink, init_logging, TelemetrySink};
use serde_json::{json, Map};
use tempfile::TempDir;

#[test]
fn test_logging_config_default() {
    let config = LoggingConfig::default();
    assert!(config.local_enabled);
    assert_eq!(config.local_rotation, "daily");
    assert!(config.azure_client_secret.is_none());
}

#[test]
fn test_init_logging_creates_directory_once_per_process() {
    let temp_dir = TempDir::new().unwrap();
    let log_path = temp_dir.path().join("logs");

    let config = LoggingConfig {
        local_enabled: true,
        local_path: log_path.to_string_lossy().into_owned(),
        local_rotation: "hourly".to_string(),
        ..LoggingConfig::default()
    };

    let guard = init_logging("debug", &config).unwrap();
    assert!(guard.has_file_writer());
    assert!(log_path.is_dir());

    // the global subscriber can only be installed once
    assert!(init_logging("debug", &config).is_err());
}

#[test]
fn test_unknown_level_rejected() {
    let config = LoggingConfig {
        local_enabled: false,
        ..LoggingConfig::default()
    };
    assert!(init_logging("loud", &config).is_err());
}

#[tokio::test]
async fn test_log_sink_is_default() {
    let config = parse_config("database_target = \"memory\"").unwrap();
    let sink = create_telemetry_sink(&config).unwrap();
    assert_eq!(sink.sink_name(), "log");

    let mut properties = Map::new();
    properties.insert("topic".to_string(), json!("full-elr"));
    assert!(sink.track_event("REPORT_RECEIVED", &properties).await.is_ok());
}

#[test]
fn test_azure_sink_selected_by_config() {
    let config = parse_config(
        r#"
database_target = "memory"

[events]
sink = "azure"

[logging]
azure_tenant_id = "tenant"
azure_client_id = "client"
azure_client_secret = "secret"
azure_dcr_immutable_id = "dcr-1"
azure_dce_endpoint = "https://dce.monitor.azure.com"
azure_stream_name = "Custom-CourierEvents_CL"
"#,
    )
    .unwrap();

    let sink = create_telemetry_sink(&config).unwrap();
    assert_eq!(sink.sink_name(), "azure");
}
