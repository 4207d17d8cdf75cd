//! Matrix-driven tightening stages. Each takes and returns a [`Verdict`].

use respgate_core::evidence::EvidenceSet;
use respgate_core::reasons;
use respgate_core::response::ClassifierResult;
use respgate_core::types::{DecisionIndex, ResponsibilityType, RiskLevel};

use super::verdict::Verdict;
use crate::matrix::{Matrix, MissingAction};

/// Base decision.
///
/// Evaluation order:
/// 1. Guarantee-claim risk rule forces DENY outright
/// 2. Explicit permission denial forces HITL
/// 3. First matching matrix rule
/// 4. Matrix default for the responsibility type
/// 5. ALLOW as a last resort when the matrix has no default
///
/// Steps 1 and 2 are fixed overrides, not matrix configuration.
pub fn resolve_base(matrix: &Matrix, rt: ResponsibilityType, evidence: &EvidenceSet) -> Verdict {
    if evidence
        .rules_hit()
        .iter()
        .any(|r| r == reasons::GUARANTEE_CLAIM_RULE)
    {
        let mut v = Verdict::new(DecisionIndex::DENY);
        v.attribute(reasons::RISK_GUARANTEE_OVERRIDE);
        return v;
    }
    if evidence.permission_denied() {
        let mut v = Verdict::new(DecisionIndex::HITL);
        v.attribute(reasons::PERMISSION_DENIED);
        return v;
    }
    if let Some(rule) = matrix.match_rule(rt, evidence.action_type(), evidence.risk_level()) {
        let mut v = Verdict::new(rule.decision);
        v.attribute(&rule.primary_reason);
        v.record_rule(&rule.rule_id);
        return v;
    }
    match matrix.default_for(rt) {
        Some(index) => Verdict::new(index),
        None => {
            tracing::warn!(matrix = %matrix.version, responsibility_type = %rt, "no default decision, falling back to ALLOW");
            Verdict::new(DecisionIndex::ALLOW)
        }
    }
}

/// Missing-evidence policy.
///
/// Only the highest-priority missing kind applies:
/// permission > risk > knowledge. A DENY verdict is left untouched.
/// Missing permission never ends below HITL.
pub fn apply_missing_evidence(mut v: Verdict, matrix: &Matrix, evidence: &EvidenceSet) -> Verdict {
    if v.index().is_max() {
        return v;
    }
    let policy = &matrix.missing_evidence_policy;
    let steps = &policy.tighten_steps;
    if !evidence.permission.available {
        apply_missing(&mut v, policy.missing_permission, steps.permission, reasons::EVIDENCE_PERMISSION_MISSING);
        v.raise_to(DecisionIndex::HITL, reasons::EVIDENCE_PERMISSION_MISSING);
    } else if !evidence.risk.available {
        apply_missing(&mut v, policy.missing_risk, steps.risk, reasons::EVIDENCE_RISK_MISSING);
    } else if !evidence.knowledge.available {
        apply_missing(&mut v, policy.missing_knowledge, steps.knowledge, reasons::EVIDENCE_KNOWLEDGE_MISSING);
    }
    v
}

fn apply_missing(v: &mut Verdict, action: MissingAction, steps: u8, reason: &str) {
    match action {
        MissingAction::Hitl => v.raise_to(DecisionIndex::HITL, reason),
        MissingAction::Tighten => v.tighten(steps, reason),
    }
}

/// Conflict resolution and non-matrix overrides.
///
/// 1. R3 risk with a permission grant on a sensitive action: permission
///    alone is not trusted, raise to the configured conflict action
/// 2. Classifier confidence below `confidence_thresholds.low`: one step
/// 3. Still at ALLOW with a hinted tool at or above
///    `confidence_thresholds.routing_weak`: one step
pub fn apply_conflicts(
    mut v: Verdict,
    matrix: &Matrix,
    evidence: &EvidenceSet,
    classification: &ClassifierResult,
) -> Verdict {
    let conflict = &matrix.conflict_resolution;
    if !v.index().is_max()
        && conflict.risk_high_overrides_permission_ok
        && evidence.risk_level() == RiskLevel::R3
        && evidence.permission_ok()
        && conflict
            .sensitive_action_types
            .contains(&evidence.action_type())
    {
        v.raise_to(
            conflict.r3_with_permission_action.index(),
            reasons::RISK_WITH_PERMISSION_CONFLICT,
        );
    }

    let thresholds = &matrix.confidence_thresholds;
    if !v.index().is_max() && classification.confidence.value() < thresholds.low {
        v.tighten(1, reasons::CLASSIFIER_LOW_CONFIDENCE);
    }

    if v.index() == DecisionIndex::ALLOW
        && evidence.has_hinted_tools()
        && evidence.routing_confidence() >= thresholds.routing_weak
    {
        v.tighten(1, reasons::ROUTING_WEAK_SIGNAL_TIGHTEN);
    }
    v
}
