//! Filters command implementation
//!
//! This module implements the `filters` command, which evaluates configured
//! receiver filters against a bundle file without touching the lineage store.

use crate::adapters::fhir::{BundleDecoder, JsonBundleDecoder, PathExpressionEvaluator};
use crate::config::load_config;
use crate::core::filter::{EvaluationMode, FilterEngine, FilterFailure};
use crate::domain::{Bundle, CourierError, FilterError, Receiver, Topic};
use clap::{Args, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Arguments for the filters command
#[derive(Args, Debug)]
pub struct FiltersArgs {
    #[command(subcommand)]
    pub command: FiltersCommand,
}

/// Filter evaluations
#[derive(Subcommand, Debug)]
pub enum FiltersCommand {
    /// Evaluate one receiver's filters
    Check(CheckArgs),

    /// Route across every receiver subscribed to a topic
    Route(RouteArgs),
}

/// Arguments for `filters check`
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to a JSON bundle
    #[arg(short, long)]
    pub bundle: PathBuf,

    /// Receiver to evaluate (`org.name`)
    #[arg(short, long)]
    pub receiver: String,

    /// Stop with a rejection error instead of listing failures
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `filters route`
#[derive(Args, Debug)]
pub struct RouteArgs {
    /// Path to a JSON bundle
    #[arg(short, long)]
    pub bundle: PathBuf,

    /// Topic of the bundle
    #[arg(short, long)]
    pub topic: String,
}

impl FiltersArgs {
    /// Execute the filters command
    pub async fn execute(&self, config_path: &str) -> anyhow::Result<i32> {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(e) => {
                println!("❌ Failed to load configuration file");
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let bundle_path = match &self.command {
            FiltersCommand::Check(args) => &args.bundle,
            FiltersCommand::Route(args) => &args.bundle,
        };
        let mut bundle = match read_bundle(bundle_path) {
            Ok(b) => b,
            Err(e) => {
                println!("❌ Failed to read bundle {}", bundle_path.display());
                println!("   Error: {e}");
                return Ok(2);
            }
        };

        let engine = FilterEngine::new(Arc::new(PathExpressionEvaluator::new()))
            .with_organizations(config.organizations());

        match &self.command {
            FiltersCommand::Check(args) => {
                let Some(receiver) = config.find_receiver(&args.receiver) else {
                    println!("❌ Unknown receiver: {}", args.receiver);
                    return Ok(2);
                };
                Ok(check(&engine, &receiver, &mut bundle, args.strict))
            }
            FiltersCommand::Route(args) => {
                let topic = match Topic::new(args.topic.as_str()) {
                    Ok(t) => t,
                    Err(e) => {
                        println!("❌ {e}");
                        return Ok(2);
                    }
                };
                Ok(route(&engine, &config.receivers(), &mut bundle, &topic))
            }
        }
    }
}

fn read_bundle(path: &Path) -> crate::domain::Result<Bundle> {
    let bytes = std::fs::read(path)?;
    Ok(JsonBundleDecoder::new().decode(&bytes)?)
}

fn check(engine: &FilterEngine, receiver: &Receiver, bundle: &mut Bundle, strict: bool) -> i32 {
    let mode = if strict {
        EvaluationMode::Strict
    } else {
        EvaluationMode::Collecting
    };

    let result = engine.evaluate_receiver_filters(receiver, bundle, mode);
    let bundle_id = bundle.identifier().unwrap_or_default().to_string();
    println!("📦 Bundle {bundle_id} for receiver {}", receiver.full_name());
    println!();

    match result {
        Ok(failures) if failures.is_empty() => {
            println!("✅ Passed every filter");
            0
        }
        Ok(failures) => {
            println!("⏭️  Not routed ({} failure(s))", failures.len());
            print_failures(&failures);
            1
        }
        Err(CourierError::Filter(FilterError::Rejected { details, .. })) => {
            println!("❌ Rejected");
            println!("   {details}");
            1
        }
        Err(CourierError::Filter(e @ FilterError::MisconfiguredConditionFilters { .. })) => {
            println!("❌ {e}");
            2
        }
        Err(e) => {
            println!("❌ Filter evaluation failed");
            println!("   Error: {e}");
            5
        }
    }
}

fn route(engine: &FilterEngine, receivers: &[Receiver], bundle: &mut Bundle, topic: &Topic) -> i32 {
    let outcome = engine.route_bundle(receivers, bundle, topic);
    println!("📦 Bundle {} on topic {topic}", outcome.bundle_id);
    println!();
    for receiver in &outcome.routed {
        println!("✅ {}", receiver.full_name());
    }
    for not_routed in &outcome.not_routed {
        println!("⏭️  {}", not_routed.receiver.full_name());
        print_failures(&not_routed.failures);
    }
    println!();

    if outcome.is_routed_anywhere() {
        println!("Routed to {} receiver(s)", outcome.routed.len());
        0
    } else {
        println!("Not routed to any receiver");
        1
    }
}

fn print_failures(failures: &[FilterFailure]) {
    for failure in failures {
        println!("   - {failure}");
    }
}
