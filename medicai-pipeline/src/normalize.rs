//! Maps the backend's loosely shaped diagnosis and summary payloads onto the fixed
//! display models.
//!
//! Field extraction is driven by [`FieldRule`] tables: each logical field lists the
//! candidate keys to probe, in order, and the placeholder used when none of them
//! carries a usable value. All functions here are pure.

use serde_json::{Map, Value};

use crate::models::{DiagnosisEntry, NormalizedPayload, ResourceKind, SoapField, SoapSummary};

/// Ordered candidate keys for one logical field, plus its fallback text.
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub candidates: &'static [&'static str],
    pub placeholder: &'static str,
}

impl FieldRule {
    /// First candidate whose value is present and non-empty.
    pub fn probe<'a>(&self, object: &'a Map<String, Value>) -> Option<&'a Value> {
        self.candidates
            .iter()
            .filter_map(|key| object.get(*key))
            .find(|value| is_present(value))
    }

    fn text(&self, object: &Map<String, Value>) -> String {
        self.probe(object)
            .and_then(scalar_text)
            .unwrap_or_else(|| self.placeholder.to_string())
    }

    /// List-valued fields fall back to an empty list; the placeholder is a display item.
    fn items(&self, object: &Map<String, Value>) -> Vec<String> {
        self.probe(object).map(list_items).unwrap_or_default()
    }
}

pub const NAME: FieldRule = FieldRule {
    candidates: &["name", "diagnosis", "title"],
    placeholder: "Unknown Diagnosis",
};

pub const CONFIDENCE: FieldRule = FieldRule {
    candidates: &["confidence", "confidence_level", "probability"],
    placeholder: "Unknown",
};

pub const EXPLANATION: FieldRule = FieldRule {
    candidates: &["explanation", "rationale", "description"],
    placeholder: "No explanation provided.",
};

pub const EVIDENCE: FieldRule = FieldRule {
    candidates: &["evidence", "supporting_evidence", "supporting_evidence_list"],
    placeholder: "No specific evidence provided.",
};

pub const FOLLOW_UP: FieldRule = FieldRule {
    candidates: &[
        "follow_up",
        "follow_up_tests_or_questions",
        "follow_up_tests",
        "suggested_tests",
    ],
    placeholder: "No follow-up recommendations provided.",
};

pub const SUBJECTIVE: FieldRule = FieldRule {
    candidates: &["subjective", "Subjective", "SUBJECTIVE", "S"],
    placeholder: "No subjective information provided",
};

pub const OBJECTIVE: FieldRule = FieldRule {
    candidates: &["objective", "Objective", "OBJECTIVE", "O"],
    placeholder: "No objective information provided",
};

pub const ASSESSMENT: FieldRule = FieldRule {
    candidates: &["assessment", "Assessment", "ASSESSMENT", "A"],
    placeholder: "No assessment provided",
};

pub const PLAN: FieldRule = FieldRule {
    candidates: &["plan", "Plan", "PLAN", "P"],
    placeholder: "No plan provided",
};

const SOAP_RULES: [FieldRule; 4] = [SUBJECTIVE, OBJECTIVE, ASSESSMENT, PLAN];

/// Properties that may wrap the SOAP fields one level down.
const SOAP_WRAPPERS: [&str; 2] = ["soap", "summary"];

pub fn normalize(kind: ResourceKind, raw: &Value) -> NormalizedPayload {
    match kind {
        ResourceKind::Diagnosis => NormalizedPayload::Diagnosis(normalize_diagnosis(raw)),
        ResourceKind::Summary => NormalizedPayload::Summary(normalize_summary(raw)),
    }
}

/// Accepts a bare array, an object with a `diagnoses` array, or an object whose first
/// array-valued property holds the entries. Anything else yields an empty list.
pub fn normalize_diagnosis(raw: &Value) -> Vec<DiagnosisEntry> {
    locate_diagnoses(raw)
        .map(|entries| entries.iter().map(normalize_entry).collect())
        .unwrap_or_default()
}

fn locate_diagnoses(raw: &Value) -> Option<&Vec<Value>> {
    match raw {
        Value::Array(entries) => Some(entries),
        Value::Object(object) => object
            .get("diagnoses")
            .and_then(Value::as_array)
            .or_else(|| object.values().find_map(Value::as_array)),
        _ => None,
    }
}

fn normalize_entry(raw: &Value) -> DiagnosisEntry {
    let empty = Map::new();
    let object = raw.as_object().unwrap_or(&empty);

    DiagnosisEntry {
        name: NAME.text(object),
        confidence_label: CONFIDENCE.text(object),
        explanation: EXPLANATION.text(object),
        evidence: EVIDENCE.items(object),
        follow_up: FOLLOW_UP.items(object),
    }
}

/// Reads the four SOAP sections from the top level, or from a `soap`/`summary` wrapper
/// when the top level carries none of them.
pub fn normalize_summary(raw: &Value) -> SoapSummary {
    let empty = Map::new();
    let object = soap_object(raw).unwrap_or(&empty);

    let [subjective, objective, assessment, plan] = SOAP_RULES.map(|rule| soap_field(&rule, object));

    SoapSummary {
        subjective,
        objective,
        assessment,
        plan,
    }
}

fn soap_object(raw: &Value) -> Option<&Map<String, Value>> {
    let top = raw.as_object()?;
    if has_soap_fields(top) {
        return Some(top);
    }

    SOAP_WRAPPERS
        .iter()
        .filter_map(|key| top.get(*key).and_then(Value::as_object))
        .find(|nested| has_soap_fields(nested))
        .or(Some(top))
}

fn has_soap_fields(object: &Map<String, Value>) -> bool {
    SOAP_RULES
        .iter()
        .any(|rule| rule.candidates.iter().any(|key| object.contains_key(*key)))
}

fn soap_field(rule: &FieldRule, object: &Map<String, Value>) -> SoapField {
    match rule.probe(object) {
        Some(Value::Array(items)) => SoapField::List(items.iter().filter_map(item_text).collect()),
        Some(Value::Object(members)) => {
            let joined = members
                .values()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join("\n\n");
            if joined.is_empty() {
                SoapField::Text(Value::Object(members.clone()).to_string())
            } else {
                SoapField::Text(joined)
            }
        }
        Some(other) => scalar_text(other)
            .map(SoapField::Text)
            .unwrap_or_else(|| SoapField::text(rule.placeholder)),
        None => SoapField::text(rule.placeholder),
    }
}

/// Array of items, one item per element; a non-empty string is a single item.
fn list_items(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(item_text).collect(),
        Value::String(text) if !text.trim().is_empty() => vec![text.clone()],
        _ => Vec::new(),
    }
}

fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Array(_) | Value::Object(_) => Some(value.to_string()),
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Null, `false`, zero and empty strings count as absent.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
