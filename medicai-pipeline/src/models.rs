use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque token correlating one uploaded document batch with later retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Returns `None` for blank input.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The two backend resources the result pages display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Diagnosis,
    Summary,
}

impl ResourceKind {
    /// Path under the API base URL.
    pub fn endpoint(&self) -> &'static str {
        match self {
            ResourceKind::Diagnosis => "diagnosis",
            ResourceKind::Summary => "patient-summary",
        }
    }

    /// Envelope field holding the raw payload.
    pub fn payload_field(&self) -> &'static str {
        match self {
            ResourceKind::Diagnosis => "diagnosis",
            ResourceKind::Summary => "summary",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            ResourceKind::Diagnosis => "Failed to retrieve diagnoses",
            ResourceKind::Summary => "Failed to retrieve patient summary",
        }
    }

    pub fn page(&self) -> &'static str {
        match self {
            ResourceKind::Diagnosis => "diagnosis.html",
            ResourceKind::Summary => "summary.html",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Diagnosis => f.write_str("diagnosis"),
            ResourceKind::Summary => f.write_str("summary"),
        }
    }
}

/// One differential-diagnosis candidate, always fully populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisEntry {
    pub name: String,
    pub confidence_label: String,
    pub explanation: String,
    pub evidence: Vec<String>,
    pub follow_up: Vec<String>,
}

impl DiagnosisEntry {
    pub fn confidence_level(&self) -> Option<ConfidenceLevel> {
        ConfidenceLevel::classify(&self.confidence_label)
    }
}

/// Badge classification derived from a free-text confidence label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Case-insensitive substring match, checked high, then medium/moderate, then low.
    pub fn classify(label: &str) -> Option<Self> {
        let lower = label.to_lowercase();
        if lower.contains("high") {
            Some(ConfidenceLevel::High)
        } else if lower.contains("medium") || lower.contains("moderate") {
            Some(ConfidenceLevel::Medium)
        } else if lower.contains("low") {
            Some(ConfidenceLevel::Low)
        } else {
            None
        }
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "confidence-high",
            ConfidenceLevel::Medium => "confidence-medium",
            ConfidenceLevel::Low => "confidence-low",
        }
    }
}

/// Content of one SOAP section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SoapField {
    Text(String),
    List(Vec<String>),
}

impl SoapField {
    pub fn text(value: impl Into<String>) -> Self {
        SoapField::Text(value.into())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoapSummary {
    pub subjective: SoapField,
    pub objective: SoapField,
    pub assessment: SoapField,
    pub plan: SoapField,
}

/// A normalized payload as stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum NormalizedPayload {
    Diagnosis(Vec<DiagnosisEntry>),
    Summary(SoapSummary),
}

impl NormalizedPayload {
    pub fn kind(&self) -> ResourceKind {
        match self {
            NormalizedPayload::Diagnosis(_) => ResourceKind::Diagnosis,
            NormalizedPayload::Summary(_) => ResourceKind::Summary,
        }
    }
}
