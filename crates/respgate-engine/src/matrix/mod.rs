//! Versioned, declarative decision matrix.

mod cache;

pub use cache::{resolve_matrix_path, MatrixCache, DEFAULT_MATRIX};

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use respgate_core::errors::GateError;
use respgate_core::schema::validate_matrix;
use respgate_core::types::{ActionType, DecisionIndex, ResponsibilityType, RiskLevel};

/// Rule predicate. Every present condition must hold; absent ones match anything.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RulePredicate {
    #[serde(default)]
    pub risk_level: Option<RiskLevel>,
    #[serde(default)]
    pub action_types: Vec<ActionType>,
    #[serde(default)]
    pub responsibility_types: Vec<ResponsibilityType>,
}

impl RulePredicate {
    pub fn matches(&self, rt: ResponsibilityType, action: ActionType, risk: RiskLevel) -> bool {
        self.risk_level.map_or(true, |r| r == risk)
            && (self.action_types.is_empty() || self.action_types.contains(&action))
            && (self.responsibility_types.is_empty() || self.responsibility_types.contains(&rt))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MatrixRule {
    pub rule_id: String,
    #[serde(rename = "match", default)]
    pub predicate: RulePredicate,
    pub decision: DecisionIndex,
    pub primary_reason: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    /// Classifier confidence below this tightens by one step.
    pub low: f64,
    /// Routing confidence at or above this, at ALLOW, tightens by one step.
    pub routing_weak: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            low: 0.6,
            routing_weak: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpgradeCondition {
    pub tool_action: ActionType,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TypeUpgradeRule {
    pub when: UpgradeCondition,
    pub upgrade_to: ResponsibilityType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingAction {
    /// Raise to HITL.
    Hitl,
    /// Advance by the configured step count.
    Tighten,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TightenSteps {
    pub permission: u8,
    pub risk: u8,
    pub knowledge: u8,
}

impl Default for TightenSteps {
    fn default() -> Self {
        Self {
            permission: 2,
            risk: 1,
            knowledge: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MissingEvidencePolicy {
    pub missing_permission: MissingAction,
    pub missing_risk: MissingAction,
    pub missing_knowledge: MissingAction,
    pub tighten_steps: TightenSteps,
}

impl Default for MissingEvidencePolicy {
    fn default() -> Self {
        Self {
            missing_permission: MissingAction::Hitl,
            missing_risk: MissingAction::Tighten,
            missing_knowledge: MissingAction::Tighten,
            tighten_steps: TightenSteps::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictAction {
    Hitl,
    Deny,
}

impl ConflictAction {
    pub fn index(self) -> DecisionIndex {
        match self {
            ConflictAction::Hitl => DecisionIndex::HITL,
            ConflictAction::Deny => DecisionIndex::DENY,
        }
    }
}

/// High risk co-occurring with a permission grant on a sensitive action.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ConflictResolution {
    pub risk_high_overrides_permission_ok: bool,
    pub r3_with_permission_action: ConflictAction,
    pub sensitive_action_types: Vec<ActionType>,
}

impl Default for ConflictResolution {
    fn default() -> Self {
        Self {
            risk_high_overrides_permission_ok: true,
            r3_with_permission_action: ConflictAction::Hitl,
            sensitive_action_types: vec![ActionType::Money, ActionType::Entitlement],
        }
    }
}

/// An immutable rule table. Shared behind `Arc` once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct Matrix {
    pub version: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rules: Vec<MatrixRule>,
    #[serde(default)]
    pub defaults: HashMap<ResponsibilityType, DecisionIndex>,
    #[serde(default)]
    pub confidence_thresholds: ConfidenceThresholds,
    #[serde(default)]
    pub type_upgrade_rules: Vec<TypeUpgradeRule>,
    #[serde(default)]
    pub missing_evidence_policy: MissingEvidencePolicy,
    #[serde(default)]
    pub conflict_resolution: ConflictResolution,
    #[serde(skip)]
    digest: String,
}

impl Matrix {
    pub fn load(path: &Path) -> Result<Self, GateError> {
        let source = path.display().to_string();
        let bytes = std::fs::read(path)
            .map_err(|e| GateError::configuration(&source, format!("cannot read matrix: {e}")))?;
        Self::from_slice(&bytes, &source)
    }

    /// Parse, schema-check and digest a matrix document.
    pub fn from_slice(bytes: &[u8], source: &str) -> Result<Self, GateError> {
        let data: Value = serde_json::from_slice(bytes)
            .map_err(|e| GateError::configuration(source, format!("invalid JSON: {e}")))?;
        validate_matrix(&data).map_err(|e| GateError::configuration(source, format!("{e:#}")))?;
        let mut matrix: Matrix = serde_json::from_value(data)
            .map_err(|e| GateError::configuration(source, e.to_string()))?;
        matrix.digest = format!("sha256:{:x}", Sha256::digest(bytes));
        Ok(matrix)
    }

    /// sha256 of the document bytes.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// First rule whose predicate holds, in declaration order.
    pub fn match_rule(
        &self,
        rt: ResponsibilityType,
        action: ActionType,
        risk: RiskLevel,
    ) -> Option<&MatrixRule> {
        self.rules.iter().find(|r| r.predicate.matches(rt, action, risk))
    }

    pub fn default_for(&self, rt: ResponsibilityType) -> Option<DecisionIndex> {
        self.defaults.get(&rt).copied()
    }

    /// Information requests are promoted when the inferred action matches an
    /// upgrade rule. Other types, and downgrades, are left alone.
    pub fn upgrade_type(&self, rt: ResponsibilityType, action: ActionType) -> ResponsibilityType {
        if rt != ResponsibilityType::Information {
            return rt;
        }
        self.type_upgrade_rules
            .iter()
            .find(|u| u.when.tool_action == action)
            .map_or(rt, |u| u.upgrade_to.max(rt))
    }
}
