//! CLI interface and argument parsing
//!
//! This module provides the command-line interface for Courier using clap.

pub mod commands;

use clap::{Parser, Subcommand};

/// Courier - report lineage and receiver routing
#[derive(Parser, Debug)]
#[command(name = "courier")]
#[command(version, about, long_about = None)]
#[command(author = "Courier Contributors")]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "courier.toml", env = "COURIER_CONFIG")]
    pub config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "COURIER_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration file
    ValidateConfig(commands::validate::ValidateArgs),

    /// Query report and item lineage
    Lineage(commands::lineage::LineageArgs),

    /// Evaluate receiver filters against a bundle file
    Filters(commands::filters::FiltersArgs),

    /// Initialize a new configuration file
    Init(commands::init::InitArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PipelineStep;
    use commands::filters::FiltersCommand;
    use commands::lineage::LineageCommand;

    #[test]
    fn test_cli_parse_validate_config() {
        let cli = Cli::parse_from(["courier", "validate-config"]);
        assert_eq!(cli.config, "courier.toml");
        assert!(matches!(cli.command, Commands::ValidateConfig(_)));
    }

    #[test]
    fn test_cli_parse_with_config() {
        let cli = Cli::parse_from(["courier", "--config", "custom.toml", "validate-config"]);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_cli_parse_with_log_level() {
        let cli = Cli::parse_from(["courier", "--log-level", "debug", "init"]);
        assert_eq!(cli.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_cli_parse_lineage_roots() {
        let cli = Cli::parse_from([
            "courier",
            "lineage",
            "roots",
            "8f14e45f-ceea-4e67-a6b3-6c8d1a4f9b10",
        ]);
        match cli.command {
            Commands::Lineage(args) => assert!(matches!(args.command, LineageCommand::Roots { .. })),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_lineage_descendants_with_step() {
        let cli = Cli::parse_from([
            "courier",
            "lineage",
            "descendants",
            "8f14e45f-ceea-4e67-a6b3-6c8d1a4f9b10",
            "--step",
            "receiver-filter",
        ]);
        match cli.command {
            Commands::Lineage(args) => match args.command {
                LineageCommand::Descendants { step, .. } => {
                    assert_eq!(step, Some(PipelineStep::ReceiverFilter))
                }
                other => panic!("unexpected lineage command: {other:?}"),
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_filters() {
        let cli = Cli::parse_from([
            "courier",
            "filters",
            "check",
            "--bundle",
            "bundle.json",
            "--receiver",
            "me-phd.elr",
            "--strict",
        ]);
        match cli.command {
            Commands::Filters(args) => match args.command {
                FiltersCommand::Check(check) => {
                    assert_eq!(check.receiver, "me-phd.elr");
                    assert!(check.strict);
                }
                other => panic!("unexpected filters command: {other:?}"),
            },
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_parse_init() {
        let cli = Cli::parse_from(["courier", "init"]);
        assert!(matches!(cli.command, Commands::Init(_)));
    }
}
