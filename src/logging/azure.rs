//! Azure Monitor event sink
//!
//! Sends business events to a Log Analytics custom table through the Logs
//! Ingestion API: an Azure AD client-credentials token for the monitor scope,
//! then a POST to the Data Collection Endpoint for the configured Data
//! Collection Rule and stream.
//!
//! # Example
//!
//! ```no_run
//! use courier::config::LoggingConfig;
//! use courier::logging::azure::AzureTelemetrySink;
//!
//! # fn example(config: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
//! let sink = AzureTelemetrySink::new(config)?;
//! # Ok(())
//! # }
//! ```

use super::telemetry::TelemetrySink;
use crate::config::LoggingConfig;
use crate::domain::{CourierError, Result};
use async_trait::async_trait;
use azure_core::credentials::TokenCredential;
use azure_identity::ClientSecretCredential;
use chrono::Utc;
use secrecy::ExposeSecret;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

const MONITOR_SCOPE: &str = "https://monitor.azure.com/.default";
const INGESTION_API_VERSION: &str = "2023-01-01";

/// Telemetry sink backed by the Azure Monitor Logs Ingestion API
pub struct AzureTelemetrySink {
    credential: Arc<ClientSecretCredential>,
    dcr_immutable_id: String,
    dce_endpoint: String,
    stream_name: String,
    http_client: reqwest::Client,
}

fn required<'a, T>(value: &'a Option<T>, name: &str) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| {
        CourierError::Configuration(format!(
            "logging.{name} is required for the azure event sink"
        ))
    })
}

impl AzureTelemetrySink {
    /// Builds the sink from the `[logging]` Azure settings
    ///
    /// # Errors
    ///
    /// Returns an error if a required setting is missing or the credential or
    /// HTTP client cannot be created.
    pub fn new(config: &LoggingConfig) -> Result<Self> {
        let tenant_id = required(&config.azure_tenant_id, "azure_tenant_id")?;
        let client_id = required(&config.azure_client_id, "azure_client_id")?;
        let client_secret = required(&config.azure_client_secret, "azure_client_secret")?;
        let dcr_immutable_id = required(&config.azure_dcr_immutable_id, "azure_dcr_immutable_id")?;
        let dce_endpoint = required(&config.azure_dce_endpoint, "azure_dce_endpoint")?;
        let stream_name = required(&config.azure_stream_name, "azure_stream_name")?;

        let secret = azure_core::credentials::Secret::new(
            client_secret.expose_secret().as_str().to_string(),
        );
        let credential = ClientSecretCredential::new(tenant_id, client_id.clone(), secret, None)
            .map_err(|e| {
                CourierError::Telemetry(format!("Failed to create Azure AD credential: {e}"))
            })?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| CourierError::Configuration(format!("Failed to create HTTP client: {e}")))?;

        tracing::info!(
            dcr_id = %dcr_immutable_id,
            stream = %stream_name,
            "Azure event sink initialized"
        );

        Ok(Self {
            credential,
            dcr_immutable_id: dcr_immutable_id.clone(),
            dce_endpoint: dce_endpoint.clone(),
            stream_name: stream_name.clone(),
            http_client,
        })
    }

    /// Ingestion URL for the configured rule and stream
    pub fn ingestion_url(&self) -> String {
        format!(
            "{}/dataCollectionRules/{}/streams/{}?api-version={}",
            self.dce_endpoint.trim_end_matches('/'),
            self.dcr_immutable_id,
            self.stream_name,
            INGESTION_API_VERSION
        )
    }

    async fn access_token(&self) -> Result<String> {
        let token = TokenCredential::get_token(&*self.credential, &[MONITOR_SCOPE], None)
            .await
            .map_err(|e| CourierError::Telemetry(format!("Failed to acquire Azure AD token: {e}")))?;
        Ok(token.token.secret().to_string())
    }
}

/// One ingestion record for an event
pub fn event_record(name: &str, properties: &Map<String, Value>) -> Value {
    json!([{
        "TimeGenerated": Utc::now().to_rfc3339(),
        "EventName": name,
        "Properties": properties,
    }])
}

#[async_trait]
impl TelemetrySink for AzureTelemetrySink {
    fn sink_name(&self) -> &'static str {
        "azure"
    }

    async fn track_event(&self, name: &str, properties: &Map<String, Value>) -> Result<()> {
        let token = self.access_token().await?;
        let url = self.ingestion_url();

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(token)
            .json(&event_record(name, properties))
            .send()
            .await
            .map_err(|e| CourierError::Telemetry(format!("Failed to send event to Azure: {e}")))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(event = name, status = %status, "Event ingested");
            return Ok(());
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(CourierError::Telemetry(format!(
            "Logs Ingestion API returned status {status}: {body}"
        )))
    }
}
