//! Configuration management for Courier.
//!
//! Courier reads a single TOML file. Values may reference environment
//! variables with `${VAR_NAME}`, and any `COURIER_<SECTION>_<KEY>` variable
//! overrides the file.
//!
//! # Example Configuration
//!
//! ```toml
//! database_target = "postgresql"
//!
//! [application]
//! log_level = "info"
//!
//! [postgresql]
//! connection_string = "${COURIER_PG_CONNECTION_STRING}"
//! ssl_mode = "require"
//!
//! [lineage]
//! max_depth = 64
//! query_timeout_ms = 5000
//!
//! [events]
//! sink = "log"
//!
//! [[organizations]]
//! name = "me-phd"
//!
//! [[organizations.filters]]
//! topic = "full-elr"
//! processing_mode_filter = ["Bundle.entry.resource.ofType(MessageHeader).meta.tag.code = 'P'"]
//!
//! [[organizations.receivers]]
//! name = "elr"
//! topic = "full-elr"
//! jurisdictional_filter = ["Bundle.entry.resource.ofType(Patient).address.state = 'ME'"]
//! ```
//!
//! ```rust,no_run
//! use courier::config::load_config;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("courier.toml")?;
//! for receiver in config.receivers() {
//!     println!("{} ({})", receiver.full_name(), receiver.topic);
//! }
//! # Ok(())
//! # }
//! ```

pub mod loader;
pub mod schema;
pub mod secret;

pub use loader::{load_config, parse_config};
pub use schema::{
    ApplicationConfig, CourierConfig, DatabaseTarget, Environment, EventSinkKind, EventsConfig,
    LineageConfig, LoggingConfig, OrganizationConfig, PostgreSQLConfig,
};
pub use secret::{secret_string, secret_string_opt, SecretString, SecretValue};
