use serde::Serialize;

use crate::evidence::DegradationSignals;
use crate::types::{Decision, ProviderKind, ResponsibilityType, UnitFloat};

/// Coarse intent classification of a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierResult {
    #[serde(rename = "type")]
    pub responsibility_type: ResponsibilityType,
    pub confidence: UnitFloat,
    pub trigger_spans: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestedAction {
    Answer,
    Handoff,
    Refuse,
}

impl From<Decision> for SuggestedAction {
    fn from(d: Decision) -> Self {
        match d {
            Decision::Allow => SuggestedAction::Answer,
            Decision::OnlySuggest | Decision::Hitl => SuggestedAction::Handoff,
            Decision::Deny => SuggestedAction::Refuse,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub summary: String,
    pub evidence_used: Vec<ProviderKind>,
    pub trigger_spans: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyInfo {
    pub matrix_version: String,
    pub matrix_digest: String,
    /// Matrix rule ids that fired; populated only in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rules_fired: Option<Vec<String>>,
}

/// The gate's final verdict for one request.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionResponse {
    pub request_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub responsibility_type: ResponsibilityType,
    pub decision: Decision,
    pub primary_reason: String,
    pub suggested_action: SuggestedAction,
    pub explanation: Explanation,
    pub policy: PolicyInfo,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation: Option<DegradationSignals>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostcheckIssue {
    pub code: String,
    pub severity: Severity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostcheckResult {
    pub passed: bool,
    pub issues: Vec<PostcheckIssue>,
}
