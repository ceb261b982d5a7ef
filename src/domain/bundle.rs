//! Decoded bundle model
//!
//! A bundle is the structured form of one report's clinical content, as
//! produced by the bundle decoder. It is held as JSON and navigated by
//! the filter expression evaluator.

use super::errors::CourierError;
use super::result::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Extension on a coding that carries its mapped condition code
pub const CONDITION_CODE_EXTENSION_URL: &str =
    "https://reportstream.cdc.gov/fhir/StructureDefinition/condition-code";

/// Mapped condition code of an ask-at-order-entry question
pub const AOE_CONDITION_CODE: &str = "AOE";

/// Coded summary of one observation in a bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationSummary {
    pub system: Option<String>,
    pub code: Option<String>,
    pub display: Option<String>,
}

/// A decoded bundle
#[derive(Debug, Clone, PartialEq)]
pub struct Bundle {
    value: Value,
}

impl Bundle {
    /// Wraps a decoded JSON document
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not a JSON object
    pub fn new(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(CourierError::Validation(
                "Bundle must be a JSON object".to_string(),
            ));
        }
        Ok(Self { value })
    }

    pub fn as_value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    /// The bundle's own message identifier (`identifier.value`)
    pub fn identifier(&self) -> Option<&str> {
        self.value
            .get("identifier")
            .and_then(|identifier| identifier.get("value"))
            .and_then(Value::as_str)
            .filter(|value| !value.trim().is_empty())
    }

    /// Returns the message identifier, assigning a random one first if missing
    ///
    /// This mutates the bundle in place so that every later consumer of the
    /// same bundle sees the assigned identifier.
    pub fn ensure_identifier(&mut self) -> String {
        if let Some(existing) = self.identifier() {
            return existing.to_string();
        }

        let assigned = uuid::Uuid::new_v4().to_string();
        if let Value::Object(map) = &mut self.value {
            let identifier = map
                .entry("identifier")
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if !identifier.is_object() {
                *identifier = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(identifier) = identifier {
                identifier.insert("value".to_string(), Value::String(assigned.clone()));
            }
        }

        tracing::debug!(identifier = %assigned, "Assigned missing bundle identifier");
        assigned
    }

    /// Resources from `entry[].resource` with the given `resourceType`
    pub fn resources_of_type<'a>(&'a self, resource_type: &'a str) -> impl Iterator<Item = &'a Value> {
        self.value
            .get("entry")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.get("resource"))
            .filter(move |resource| {
                resource.get("resourceType").and_then(Value::as_str) == Some(resource_type)
            })
    }

    /// Number of `Observation` resources
    pub fn observation_count(&self) -> usize {
        self.resources_of_type("Observation").count()
    }

    /// `Observation` resources in entry order
    pub fn observations(&self) -> Vec<&Value> {
        self.resources_of_type("Observation").collect()
    }

    /// A copy of this bundle whose only observation is the one at `index`
    pub fn observation_view(&self, index: usize) -> Bundle {
        let mut view = self.clone();
        let mut position = 0;
        view.retain_entries(|resource| {
            if !is_observation(resource) {
                return true;
            }
            position += 1;
            position - 1 == index
        });
        view
    }

    /// Removes every observation whose position is not listed in `keep`
    ///
    /// Returns the number of observations removed.
    pub fn retain_observations(&mut self, keep: &[usize]) -> usize {
        let mut position = 0;
        let mut removed = 0;
        self.retain_entries(|resource| {
            if !is_observation(resource) {
                return true;
            }
            let kept = keep.contains(&position);
            position += 1;
            if !kept {
                removed += 1;
            }
            kept
        });
        removed
    }

    fn retain_entries(&mut self, mut keep: impl FnMut(&Value) -> bool) {
        if let Some(Value::Array(entries)) = self.value.get_mut("entry") {
            entries.retain(|entry| entry.get("resource").map_or(true, &mut keep));
        }
    }

    /// Code summaries of every observation coding in the bundle
    pub fn observation_summaries(&self) -> Vec<ObservationSummary> {
        self.resources_of_type("Observation")
            .flat_map(|observation| {
                observation
                    .get("code")
                    .and_then(|code| code.get("coding"))
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default()
            })
            .map(|coding| ObservationSummary {
                system: string_field(&coding, "system"),
                code: string_field(&coding, "code"),
                display: string_field(&coding, "display"),
            })
            .collect()
    }

    /// Hex-encoded SHA-256 of the canonical (key-sorted, compact) serialization
    pub fn digest(&self) -> Result<String> {
        let normalized = normalize_json(&self.value);
        let data = serde_json::to_string(&normalized)?;

        let mut hasher = Sha256::new();
        hasher.update(data.as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// Mapped condition codes on an observation's `code` and `valueCodeableConcept` codings
pub fn mapped_condition_codes(observation: &Value) -> Vec<String> {
    ["code", "valueCodeableConcept"]
        .iter()
        .filter_map(|source| observation.get(source))
        .filter_map(|concept| concept.get("coding").and_then(Value::as_array))
        .flatten()
        .filter_map(|coding| coding.get("extension").and_then(Value::as_array))
        .flatten()
        .filter(|extension| {
            extension.get("url").and_then(Value::as_str) == Some(CONDITION_CODE_EXTENSION_URL)
        })
        .filter_map(|extension| {
            extension
                .get("valueCoding")
                .and_then(|coding| coding.get("code"))
                .and_then(Value::as_str)
        })
        .map(str::to_string)
        .collect()
}

/// Whether every mapped condition of an observation is an AOE question
pub fn is_aoe_only(observation: &Value) -> bool {
    let codes = mapped_condition_codes(observation);
    !codes.is_empty() && codes.iter().all(|code| code == AOE_CONDITION_CODE)
}

fn is_observation(resource: &Value) -> bool {
    resource.get("resourceType").and_then(Value::as_str) == Some("Observation")
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), normalize_json(v)))
                .collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_json).collect()),
        _ => value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "resourceType": "Bundle",
            "identifier": {"value": "msg-123"},
            "entry": [
                {"resource": {"resourceType": "Patient", "birthDate": "1990-01-01"}},
                {"resource": {
                    "resourceType": "Observation",
                    "code": {"coding": [{"system": "http://loinc.org", "code": "94558-4", "display": "SARS-CoV-2 Ag"}]}
                }}
            ]
        })
    }

    #[test]
    fn test_bundle_rejects_non_object() {
        assert!(Bundle::new(json!([1, 2])).is_err());
    }

    #[test]
    fn test_identifier_present() {
        let mut bundle = Bundle::new(sample()).unwrap();
        assert_eq!(bundle.identifier(), Some("msg-123"));
        assert_eq!(bundle.ensure_identifier(), "msg-123");
    }

    #[test]
    fn test_ensure_identifier_assigns_in_place() {
        let mut bundle = Bundle::new(json!({"resourceType": "Bundle"})).unwrap();
        assert!(bundle.identifier().is_none());

        let assigned = bundle.ensure_identifier();
        assert_eq!(bundle.identifier(), Some(assigned.as_str()));
        assert_eq!(bundle.ensure_identifier(), assigned);
    }

    #[test]
    fn test_ensure_identifier_replaces_blank() {
        let mut bundle =
            Bundle::new(json!({"resourceType": "Bundle", "identifier": {"value": " "}})).unwrap();
        let assigned = bundle.ensure_identifier();
        assert_ne!(assigned.trim(), "");
    }

    #[test]
    fn test_observation_summaries() {
        let bundle = Bundle::new(sample()).unwrap();
        assert_eq!(bundle.observation_count(), 1);

        let summaries = bundle.observation_summaries();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].code.as_deref(), Some("94558-4"));
        assert_eq!(summaries[0].system.as_deref(), Some("http://loinc.org"));
    }

    #[test]
    fn test_digest_ignores_key_order() {
        let a = Bundle::new(json!({"a": 1, "b": {"c": 2, "d": 3}})).unwrap();
        let b = Bundle::new(json!({"b": {"d": 3, "c": 2}, "a": 1})).unwrap();
        assert_eq!(a.digest().unwrap(), b.digest().unwrap());
        assert_eq!(a.digest().unwrap().len(), 64);
    }

    fn observation(code: &str, condition: &str) -> Value {
        json!({"resource": {
            "resourceType": "Observation",
            "code": {"coding": [{
                "code": code,
                "extension": [{
                    "url": CONDITION_CODE_EXTENSION_URL,
                    "valueCoding": {"code": condition}
                }]
            }]}
        }})
    }

    fn three_observations() -> Bundle {
        Bundle::new(json!({
            "resourceType": "Bundle",
            "entry": [
                {"resource": {"resourceType": "Patient"}},
                observation("94558-4", "840539006"),
                observation("95418-0", "AOE"),
                observation("1234-5", "38907003")
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_observation_view_keeps_one_observation() {
        let bundle = three_observations();
        let view = bundle.observation_view(1);

        assert_eq!(view.observation_count(), 1);
        assert_eq!(view.resources_of_type("Patient").count(), 1);
        assert_eq!(mapped_condition_codes(view.observations()[0]), vec!["AOE"]);
        assert_eq!(bundle.observation_count(), 3);
    }

    #[test]
    fn test_retain_observations_prunes_in_place() {
        let mut bundle = three_observations();
        assert_eq!(bundle.retain_observations(&[0, 2]), 1);

        let codes: Vec<Vec<String>> = bundle
            .observations()
            .into_iter()
            .map(mapped_condition_codes)
            .collect();
        assert_eq!(codes, vec![vec!["840539006"], vec!["38907003"]]);
        assert_eq!(bundle.resources_of_type("Patient").count(), 1);
    }

    #[test]
    fn test_aoe_only_observation() {
        let bundle = three_observations();
        let observations = bundle.observations();
        assert!(!is_aoe_only(observations[0]));
        assert!(is_aoe_only(observations[1]));
        assert!(!is_aoe_only(&json!({"resourceType": "Observation"})));
    }
}
