//! Lineage store factory
//!
//! This module provides the factory function that creates a lineage store
//! based on configuration.

use crate::adapters::database::traits::LineageStore;
use crate::adapters::memory::InMemoryLineageStore;
use crate::adapters::postgresql::adapter::PostgreSQLAdapter;
use crate::adapters::postgresql::client::PostgreSQLClient;
use crate::config::schema::{CourierConfig, DatabaseTarget};
use crate::domain::{CourierError, Result};
use std::sync::Arc;

/// Create a lineage store based on the configuration
///
/// Dry-run mode always uses the in-memory store so nothing is written.
///
/// # Errors
///
/// Returns an error if the PostgreSQL section is missing or the pool cannot be created
pub async fn create_lineage_store(
    config: &CourierConfig,
) -> Result<Arc<dyn LineageStore + Send + Sync>> {
    if config.application.dry_run {
        tracing::info!("DRY RUN: using in-memory lineage store");
        return Ok(Arc::new(InMemoryLineageStore::new()) as Arc<dyn LineageStore + Send + Sync>);
    }

    match config.database_target {
        DatabaseTarget::PostgreSQL => {
            let pg_config = config.postgresql.as_ref().ok_or_else(|| {
                CourierError::Configuration(
                    "postgresql configuration is required when database_target = 'postgresql'"
                        .to_string(),
                )
            })?;

            tracing::info!("Creating PostgreSQL lineage store");
            let client = PostgreSQLClient::new(pg_config.clone()).await?;
            Ok(Arc::new(PostgreSQLAdapter::new(client)) as Arc<dyn LineageStore + Send + Sync>)
        }
        DatabaseTarget::Memory => {
            tracing::info!("Creating in-memory lineage store");
            Ok(Arc::new(InMemoryLineageStore::new()) as Arc<dyn LineageStore + Send + Sync>)
        }
    }
}
