//! Telemetry sinks for business events
//!
//! A sink receives an event name and its flat property map. Delivery is
//! best-effort: callers log a failed send and carry on.

use crate::config::{CourierConfig, EventSinkKind};
use crate::domain::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::{Arc, Mutex};

/// Destination for named events
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Short sink name for logs
    fn sink_name(&self) -> &'static str;

    /// Deliver one event
    async fn track_event(&self, name: &str, properties: &Map<String, Value>) -> Result<()>;
}

/// Creates the sink selected by `[events] sink`
///
/// # Errors
///
/// Returns an error if the Azure sink is selected but cannot be built.
pub fn create_telemetry_sink(config: &CourierConfig) -> Result<Arc<dyn TelemetrySink + Send + Sync>> {
    match config.events.sink {
        EventSinkKind::Log => Ok(Arc::new(NoopTelemetrySink)),
        EventSinkKind::Azure => Ok(Arc::new(super::azure::AzureTelemetrySink::new(
            &config.logging,
        )?)),
    }
}

/// Sink that delivers nothing; events still reach the structured log
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetrySink;

#[async_trait]
impl TelemetrySink for NoopTelemetrySink {
    fn sink_name(&self) -> &'static str {
        "log"
    }

    async fn track_event(&self, _name: &str, _properties: &Map<String, Value>) -> Result<()> {
        Ok(())
    }
}

/// One event captured by [`MemoryTelemetrySink`]
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedEvent {
    pub name: String,
    pub properties: Map<String, Value>,
}

/// Sink that keeps every event in memory, in delivery order
#[derive(Debug, Default)]
pub struct MemoryTelemetrySink {
    events: Mutex<Vec<TrackedEvent>>,
    fail_with: Option<String>,
}

impl MemoryTelemetrySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink that rejects every event with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            fail_with: Some(message.into()),
        }
    }

    pub fn events(&self) -> Vec<TrackedEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn event_names(&self) -> Vec<String> {
        self.events().into_iter().map(|event| event.name).collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|events| events.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TelemetrySink for MemoryTelemetrySink {
    fn sink_name(&self) -> &'static str {
        "memory"
    }

    async fn track_event(&self, name: &str, properties: &Map<String, Value>) -> Result<()> {
        if let Some(message) = &self.fail_with {
            return Err(crate::domain::CourierError::Telemetry(message.clone()));
        }

        let mut events = self
            .events
            .lock()
            .map_err(|_| crate::domain::CourierError::Telemetry("sink lock poisoned".to_string()))?;
        events.push(TrackedEvent {
            name: name.to_string(),
            properties: properties.clone(),
        });
        Ok(())
    }
}
