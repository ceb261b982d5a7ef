//! Validate config command implementation
//!
//! This module implements the `validate-config` command for validating
//! the Courier configuration file.

use crate::config::load_config;
use crate::config::schema::{CourierConfig, DatabaseTarget};
use clap::Args;

/// Arguments for the validate-config command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Also list every configured receiver and its filters
    #[arg(long)]
    pub receivers: bool,
}

impl ValidateArgs {
    /// Execute the validate-config command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        tracing::info!(config_path = %config_path, "Validating configuration");

        println!("🔍 Validating configuration file: {config_path}");
        println!();

        // load_config validates before returning
        let config = match load_config(config_path) {
            Ok(c) => {
                println!("✅ Configuration file loaded successfully");
                println!("✅ Configuration is valid");
                c
            }
            Err(e) => {
                println!("❌ Configuration validation failed");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        println!();
        print_summary(&config);

        if self.receivers {
            print_receivers(&config);
        }

        println!();
        Ok(0)
    }
}

fn print_summary(config: &CourierConfig) {
    println!("Configuration Summary:");
    println!("  Environment: {:?}", config.environment);
    println!("  Log Level: {}", config.application.log_level);
    println!("  Dry Run: {}", config.application.dry_run);

    match config.database_target {
        DatabaseTarget::PostgreSQL => {
            if let Some(ref pg_config) = config.postgresql {
                use secrecy::ExposeSecret;
                println!("  Database Target: PostgreSQL");
                println!(
                    "  PostgreSQL Connection: {}",
                    pg_config
                        .connection_string
                        .expose_secret()
                        .as_str()
                        .split('@')
                        .next_back()
                        .unwrap_or("***")
                );
                println!("  Max Connections: {}", pg_config.max_connections);
            }
        }
        DatabaseTarget::Memory => println!("  Database Target: Memory"),
    }

    println!("  Lineage Max Depth: {}", config.lineage.max_depth);
    println!("  Lineage Query Timeout: {} ms", config.lineage.query_timeout_ms);
    println!("  Event Sink: {:?}", config.events.sink);
    println!("  Organizations: {}", config.organizations.len());
    println!("  Receivers: {}", config.receivers().len());
}

fn print_receivers(config: &CourierConfig) {
    println!();
    println!(
        "{:<30} {:<20} {:<10} {:<8}",
        "Receiver", "Topic", "Status", "Filters"
    );
    println!("{}", "-".repeat(70));

    for receiver in config.receivers() {
        let filters = &receiver.filters;
        let count = filters.all().count();
        println!(
            "{:<30} {:<20} {:<10} {:<8}",
            receiver.full_name(),
            receiver.topic.as_str(),
            format!("{:?}", receiver.customer_status).to_lowercase(),
            count
        );
    }
}
