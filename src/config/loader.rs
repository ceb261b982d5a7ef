//! Configuration loading
//!
//! Reads a TOML file, substitutes `${VAR}` placeholders, applies `COURIER_*`
//! environment overrides and validates the result.

use super::schema::{CourierConfig, DatabaseTarget, EventSinkKind};
use super::secret::secret_string;
use crate::domain::errors::CourierError;
use crate::domain::result::Result;
use regex::Regex;
use std::fs;
use std::path::Path;

/// Loads configuration from a TOML file
///
/// # Errors
///
/// Returns [`CourierError::Configuration`] if the file cannot be read, a
/// referenced environment variable is unset, the TOML is malformed, or
/// validation fails.
///
/// # Examples
///
/// ```no_run
/// use courier::config::load_config;
///
/// let config = load_config("courier.toml").expect("Failed to load config");
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<CourierConfig> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(CourierError::Configuration(format!(
            "Configuration file not found: {}",
            path.display()
        )));
    }

    let contents = fs::read_to_string(path).map_err(|e| {
        CourierError::Configuration(format!(
            "Failed to read configuration file {}: {e}",
            path.display()
        ))
    })?;

    parse_config(&contents)
}

/// Parses and validates configuration from TOML text
///
/// # Errors
///
/// Same as [`load_config`], minus file access.
pub fn parse_config(contents: &str) -> Result<CourierConfig> {
    let contents = substitute_env_vars(contents)?;

    let mut config: CourierConfig = toml::from_str(&contents)
        .map_err(|e| CourierError::Configuration(format!("Failed to parse TOML: {e}")))?;

    apply_env_overrides(&mut config)?;

    config.validate().map_err(|e| {
        CourierError::Configuration(format!("Configuration validation failed: {e}"))
    })?;

    Ok(config)
}

/// Replaces `${VAR_NAME}` with the variable's value, leaving comment lines alone
fn substitute_env_vars(input: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}")
        .map_err(|e| CourierError::Configuration(format!("Invalid placeholder pattern: {e}")))?;
    let mut missing: Vec<String> = Vec::new();

    let lines: Vec<String> = input
        .lines()
        .map(|line| {
            if line.trim_start().starts_with('#') {
                return line.to_string();
            }
            re.replace_all(line, |caps: &regex::Captures<'_>| {
                let name = &caps[1];
                std::env::var(name).unwrap_or_else(|_| {
                    if !missing.iter().any(|m| m == name) {
                        missing.push(name.to_string());
                    }
                    String::new()
                })
            })
            .into_owned()
        })
        .collect();

    if !missing.is_empty() {
        return Err(CourierError::Configuration(format!(
            "Missing required environment variables: {}",
            missing.join(", ")
        )));
    }

    Ok(lines.join("\n"))
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(value) => value.trim().parse().map(Some).map_err(|_| {
            CourierError::Configuration(format!("{name} has an invalid value '{value}'"))
        }),
        Err(_) => Ok(None),
    }
}

/// Applies `COURIER_<SECTION>_<KEY>` overrides
fn apply_env_overrides(config: &mut CourierConfig) -> Result<()> {
    if let Ok(val) = std::env::var("COURIER_APPLICATION_LOG_LEVEL") {
        config.application.log_level = val;
    }
    if let Some(dry_run) = env_parse("COURIER_APPLICATION_DRY_RUN")? {
        config.application.dry_run = dry_run;
    }

    if let Ok(val) = std::env::var("COURIER_DATABASE_TARGET") {
        config.database_target = match val.to_ascii_lowercase().as_str() {
            "postgresql" => DatabaseTarget::PostgreSQL,
            "memory" => DatabaseTarget::Memory,
            other => {
                return Err(CourierError::Configuration(format!(
                    "COURIER_DATABASE_TARGET must be postgresql or memory, got '{other}'"
                )))
            }
        };
    }

    if let Some(pg) = config.postgresql.as_mut() {
        if let Ok(val) = std::env::var("COURIER_POSTGRESQL_CONNECTION_STRING") {
            pg.connection_string = secret_string(val);
        }
        if let Some(max) = env_parse("COURIER_POSTGRESQL_MAX_CONNECTIONS")? {
            pg.max_connections = max;
        }
        if let Some(timeout) = env_parse("COURIER_POSTGRESQL_STATEMENT_TIMEOUT_SECONDS")? {
            pg.statement_timeout_seconds = timeout;
        }
        if let Ok(val) = std::env::var("COURIER_POSTGRESQL_SSL_MODE") {
            pg.ssl_mode = val;
        }
    }

    if let Some(depth) = env_parse("COURIER_LINEAGE_MAX_DEPTH")? {
        config.lineage.max_depth = depth;
    }
    if let Some(timeout) = env_parse("COURIER_LINEAGE_QUERY_TIMEOUT_MS")? {
        config.lineage.query_timeout_ms = timeout;
    }

    if let Ok(val) = std::env::var("COURIER_EVENTS_SINK") {
        config.events.sink = match val.to_ascii_lowercase().as_str() {
            "log" => EventSinkKind::Log,
            "azure" => EventSinkKind::Azure,
            other => {
                return Err(CourierError::Configuration(format!(
                    "COURIER_EVENTS_SINK must be log or azure, got '{other}'"
                )))
            }
        };
    }

    if let Some(enabled) = env_parse("COURIER_LOGGING_LOCAL_ENABLED")? {
        config.logging.local_enabled = enabled;
    }
    if let Ok(val) = std::env::var("COURIER_LOGGING_LOCAL_PATH") {
        config.logging.local_path = val;
    }
    if let Ok(val) = std::env::var("COURIER_LOGGING_AZURE_TENANT_ID") {
        config.logging.azure_tenant_id = Some(val);
    }
    if let Ok(val) = std::env::var("COURIER_LOGGING_AZURE_CLIENT_ID") {
        config.logging.azure_client_id = Some(val);
    }
    if let Ok(val) = std::env::var("COURIER_LOGGING_AZURE_CLIENT_SECRET") {
        config.logging.azure_client_secret = Some(secret_string(val));
    }
    if let Ok(val) = std::env::var("COURIER_LOGGING_AZURE_DCR_IMMUTABLE_ID") {
        config.logging.azure_dcr_immutable_id = Some(val);
    }
    if let Ok(val) = std::env::var("COURIER_LOGGING_AZURE_DCE_ENDPOINT") {
        config.logging.azure_dce_endpoint = Some(val);
    }
    if let Ok(val) = std::env::var("COURIER_LOGGING_AZURE_STREAM_NAME") {
        config.logging.azure_stream_name = Some(val);
    }

    Ok(())
}
