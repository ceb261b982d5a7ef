//! Integration tests for receiver filter evaluation driven by configuration

use courier::adapters::fhir::{BundleDecoder, JsonBundleDecoder, PathExpressionEvaluator};
use courier::config::{parse_config, CourierConfig};
use courier::core::filter::{EvaluationMode, FailureKind, FilterEngine, ALLOW_NONE};
use courier::domain::{Bundle, CourierError, FilterError, FilterType, Topic};
use std::sync::Arc;
use test_case::test_case;

const CONFIG: &str = r#"
database_target = "memory"

[[organizations]]
name = "me-phd"

[[organizations.filters]]
topic = "full-elr"
processing_mode_filter = ["processingMode = 'P'"]

[[organizations.receivers]]
name = "elr"
topic = "full-elr"
jurisdictional_filter = ["patient.state = 'ME'"]
quality_filter = ["patient.birthDate.exists()"]

[[organizations.receivers]]
name = "elr-quarantine"
topic = "full-elr"
jurisdictional_filter = ["patient.state = 'ME'"]
quality_filter = ["patient.birthDate.exists()"]
reverse_the_quality_filter = true

[[organizations.receivers]]
name = "elr-retired"
topic = "full-elr"
customer_status = "inactive"
jurisdictional_filter = ["patient.state = 'ME'"]

[[organizations.receivers]]
name = "open"
topic = "etor-ti"

[[organizations]]
name = "nh-phd"

[[organizations.receivers]]
name = "elr"
topic = "full-elr"
jurisdictional_filter = ["patient.state = 'NH'"]
condition_filter = ["patient.state"]
"#;

fn config() -> CourierConfig {
    parse_config(CONFIG).unwrap()
}

fn engine(config: &CourierConfig) -> FilterEngine {
    FilterEngine::new(Arc::new(PathExpressionEvaluator::new()))
        .with_organizations(config.organizations())
}

fn bundle(json: &str) -> Bundle {
    JsonBundleDecoder::new().decode(json.as_bytes()).unwrap()
}

const COMPLETE_ME: &str = r#"{
    "resourceType": "Bundle",
    "identifier": {"value": "msg-1"},
    "processingMode": "P",
    "patient": {"state": "ME", "birthDate": "1980-02-03"},
    "entry": [
        {"resource": {"resourceType": "Observation", "code": {"coding": [{"code": "94558-4"}]}}}
    ]
}"#;

const INCOMPLETE_ME: &str = r#"{
    "resourceType": "Bundle",
    "processingMode": "P",
    "patient": {"state": "ME"}
}"#;

#[test]
fn test_complete_bundle_routes_to_primary_receiver_only() {
    let config = config();
    let mut bundle = bundle(COMPLETE_ME);

    let outcome = engine(&config).route_bundle(
        &config.receivers(),
        &mut bundle,
        &Topic::new("full-elr").unwrap(),
    );

    assert_eq!(outcome.bundle_id, "msg-1");
    assert_eq!(outcome.routed_names(), vec!["me-phd.elr"]);

    let not_routed: Vec<String> = outcome
        .not_routed
        .iter()
        .map(|n| n.receiver.full_name())
        .collect();
    // inactive receivers and other topics are never considered
    assert_eq!(not_routed, vec!["me-phd.elr-quarantine", "nh-phd.elr"]);

    let quarantine = &outcome.not_routed[0];
    assert_eq!(quarantine.first_filter_type(), Some(FilterType::QualityFilter));
    assert_eq!(
        quarantine.failures[0].expression,
        "(patient.birthDate.exists()).not()"
    );
}

#[test]
fn test_incomplete_bundle_routes_to_quarantine() {
    let config = config();
    let mut bundle = bundle(INCOMPLETE_ME);

    let outcome = engine(&config).route_bundle(
        &config.receivers(),
        &mut bundle,
        &Topic::new("full-elr").unwrap(),
    );

    assert_eq!(outcome.routed_names(), vec!["me-phd.elr-quarantine"]);
    // the identifier was assigned in place and reported
    assert_eq!(bundle.identifier(), Some(outcome.bundle_id.as_str()));
}

#[test]
fn test_every_category_is_evaluated_after_a_failure() {
    let config = config();
    let receiver = config.find_receiver("nh-phd.elr").unwrap();
    let mut bundle = bundle(COMPLETE_ME);

    let failures = engine(&config)
        .evaluate_receiver_filters(&receiver, &mut bundle, EvaluationMode::Collecting)
        .unwrap();

    let types: Vec<FilterType> = failures.iter().map(|f| f.filter_type).collect();
    assert_eq!(
        types,
        vec![FilterType::JurisdictionalFilter, FilterType::ConditionFilter]
    );
    assert_eq!(failures[0].kind, FailureKind::Failed);
    assert!(failures[1].is_invalid());
}

#[test]
fn test_organization_filters_apply_to_their_receivers() {
    let config = config();
    let receiver = config.find_receiver("me-phd.elr").unwrap();
    let mut bundle = bundle(
        r#"{"resourceType": "Bundle", "processingMode": "T", "patient": {"state": "ME", "birthDate": "1980"}}"#,
    );

    let failures = engine(&config)
        .evaluate_receiver_filters(&receiver, &mut bundle, EvaluationMode::Collecting)
        .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].filter_type, FilterType::ProcessingModeFilter);
    assert_eq!(failures[0].expression, "processingMode = 'P'");
}

#[test]
fn test_strict_mode_rejects_with_every_reason() {
    let config = config();
    let receiver = config.find_receiver("nh-phd.elr").unwrap();
    let mut bundle = bundle(COMPLETE_ME);

    let err = engine(&config)
        .evaluate_receiver_filters(&receiver, &mut bundle, EvaluationMode::Strict)
        .unwrap_err();

    match err {
        CourierError::Filter(FilterError::Rejected { receiver, details }) => {
            assert_eq!(receiver, "nh-phd.elr");
            assert!(details.contains("JURISDICTIONAL_FILTER: patient.state = 'NH'"));
            assert!(details.contains("CONDITION_FILTER: patient.state"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_receiver_without_jurisdiction_allows_nothing() {
    let config = config();
    let receiver = config.find_receiver("me-phd.open").unwrap();
    let mut bundle = bundle(COMPLETE_ME);

    let failures = engine(&config)
        .evaluate_receiver_filters(&receiver, &mut bundle, EvaluationMode::Collecting)
        .unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].expression, ALLOW_NONE);
}

const LAB_CONFIG: &str = r#"
database_target = "memory"

[[organizations]]
name = "me-phd"

[[organizations.receivers]]
name = "covid"
topic = "full-elr"
jurisdictional_filter = ["patient.state = 'ME'"]
condition_filter = ["Bundle.entry.resource.code.coding.code = '94558-4'"]

[[organizations.receivers]]
name = "flu"
topic = "full-elr"
jurisdictional_filter = ["patient.state = 'ME'"]
mapped_condition_filter = ["6142004"]
"#;

const TWO_LABS: &str = r#"{
    "resourceType": "Bundle",
    "identifier": {"value": "msg-2"},
    "patient": {"state": "ME"},
    "entry": [
        {"resource": {"resourceType": "Patient", "id": "p1"}},
        {"resource": {"resourceType": "Observation", "id": "flu", "code": {"coding": [{
            "code": "1234-5",
            "extension": [{
                "url": "https://reportstream.cdc.gov/fhir/StructureDefinition/condition-code",
                "valueCoding": {"code": "6142004"}
            }]
        }]}}},
        {"resource": {"resourceType": "Observation", "id": "covid", "code": {"coding": [{"code": "94558-4"}]}}}
    ]
}"#;

fn observation_ids(bundle: &Bundle) -> Vec<String> {
    bundle
        .resources_of_type("Observation")
        .filter_map(|o| o["id"].as_str().map(str::to_string))
        .collect()
}

#[test]
fn test_condition_filters_keep_only_matching_observations() {
    let config = parse_config(LAB_CONFIG).unwrap();
    let mut bundle = bundle(TWO_LABS);

    let outcome = engine(&config).route_bundle(
        &config.receivers(),
        &mut bundle,
        &Topic::new("full-elr").unwrap(),
    );

    assert_eq!(outcome.routed_names(), vec!["me-phd.covid", "me-phd.flu"]);
    assert_eq!(observation_ids(&outcome.routed_bundles[0]), vec!["covid"]);
    assert_eq!(observation_ids(&outcome.routed_bundles[1]), vec!["flu"]);
    assert_eq!(observation_ids(&bundle), vec!["flu", "covid"]);
}

#[test]
fn test_both_condition_filter_kinds_fail_validation() {
    let config = format!("{LAB_CONFIG}condition_filter = [\"true\"]\n");
    assert!(parse_config(&config).is_err());
}

#[test_case(r#"{"resourceType": "Patient"}"#; "not a bundle")]
#[test_case("{not json"; "malformed json")]
fn test_decoder_rejects(input: &str) {
    let result = JsonBundleDecoder::new().decode(input.as_bytes());
    assert!(matches!(result, Err(FilterError::Decode(_))));
}
