//! Init command implementation
//!
//! This module implements the `init` command for generating a sample
//! configuration file.

use clap::Args;
use std::fs;
use std::path::Path;

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Path where to create the configuration file
    #[arg(short, long, default_value = "courier.toml")]
    pub output: String,

    /// Include a PostgreSQL store, Azure event sink and example receivers
    #[arg(long)]
    pub with_examples: bool,

    /// Overwrite existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command
    pub async fn execute(&self) -> anyhow::Result<i32> {
        tracing::info!(output = %self.output, "Initializing configuration file");

        println!("📝 Initializing Courier configuration");
        println!();

        if Path::new(&self.output).exists() && !self.force {
            println!("❌ Configuration file already exists: {}", self.output);
            println!("   Use --force to overwrite");
            return Ok(2);
        }

        let config_content = if self.with_examples {
            EXAMPLE_CONFIG
        } else {
            MINIMAL_CONFIG
        };

        match fs::write(&self.output, config_content) {
            Ok(_) => {
                println!("✅ Configuration file created: {}", self.output);
                println!();
                println!("Next steps:");
                println!("  1. Edit {} with your receivers and filters", self.output);
                if self.with_examples {
                    println!("  2. Set COURIER_PG_CONNECTION_STRING in your environment or .env");
                    println!("  3. Set the COURIER_AZURE_* variables for the event sink");
                    println!("  4. Apply migrations/001_initial_schema.sql to the database");
                    println!("  5. Validate configuration: courier validate-config");
                } else {
                    println!("  2. Validate configuration: courier validate-config");
                    println!("  3. Try a bundle: courier filters route --bundle bundle.json --topic full-elr");
                }
                println!();
                Ok(0)
            }
            Err(e) => {
                println!("❌ Failed to write configuration file");
                println!("   Error: {e}");
                Ok(5)
            }
        }
    }
}

const MINIMAL_CONFIG: &str = r#"# Courier Configuration File

# Lineage store (postgresql | memory)
database_target = "memory"
environment = "development"

[application]
log_level = "info"
dry_run = false

[lineage]
max_depth = 64
query_timeout_ms = 5000

[events]
sink = "log"

[logging]
local_enabled = false

[[organizations]]
name = "me-phd"
description = "Maine Public Health"

[[organizations.receivers]]
name = "elr"
topic = "full-elr"
jurisdictional_filter = ["state = 'ME'"]
"#;

const EXAMPLE_CONFIG: &str = r#"# Courier Configuration File
#
# Values of the form ${VAR} are read from the environment when the file
# is loaded. Any setting can also be overridden with COURIER_<SECTION>_<KEY>.

# Lineage store (postgresql | memory)
database_target = "postgresql"
environment = "production"

[application]
log_level = "info"
dry_run = false

[postgresql]
connection_string = "${COURIER_PG_CONNECTION_STRING}"
max_connections = 10
connection_timeout_seconds = 30
statement_timeout_seconds = 60
ssl_mode = "require"

[lineage]
# Walks stop with an error past this many levels
max_depth = 64
# Read-side queries give up and degrade after this long
query_timeout_ms = 5000

[events]
# log | azure
sink = "azure"

[logging]
local_enabled = true
local_path = "/var/log/courier"
local_rotation = "daily"
azure_tenant_id = "${COURIER_AZURE_TENANT_ID}"
azure_client_id = "${COURIER_AZURE_CLIENT_ID}"
azure_client_secret = "${COURIER_AZURE_CLIENT_SECRET}"
azure_dcr_immutable_id = "${COURIER_AZURE_DCR_IMMUTABLE_ID}"
azure_dce_endpoint = "${COURIER_AZURE_DCE_ENDPOINT}"
azure_stream_name = "Custom-CourierEvents_CL"

[[organizations]]
name = "me-phd"
description = "Maine Public Health"

# Organization filters run before each receiver's own, per topic
[[organizations.filters]]
topic = "full-elr"
processing_mode_filter = ["processingMode = 'P'"]

[[organizations.receivers]]
name = "elr"
topic = "full-elr"
customer_status = "active"
jurisdictional_filter = ["patient.address.state = 'ME'"]
quality_filter = ["patient.birthDate.exists()", "specimen.collected.exists()"]
condition_filter = ["%resource.code.coding.code = '94500-6'"]

[[organizations.receivers]]
name = "elr-quarantine"
topic = "full-elr"
customer_status = "testing"
jurisdictional_filter = ["patient.address.state = 'ME'"]
quality_filter = ["patient.birthDate.exists()", "specimen.collected.exists()"]
# Receives exactly the items the quality filter would have dropped
reverse_the_quality_filter = true
"#;
