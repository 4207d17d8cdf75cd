//! Primary reason codes assigned by the pipeline stages.

pub const DEFAULT_DECISION: &str = "DEFAULT_DECISION";
pub const RISK_GUARANTEE_OVERRIDE: &str = "RISK_GUARANTEE_OVERRIDE";
pub const PERMISSION_DENIED: &str = "PERMISSION_DENIED";
pub const EVIDENCE_PERMISSION_MISSING: &str = "EVIDENCE_PERMISSION_MISSING";
pub const EVIDENCE_RISK_MISSING: &str = "EVIDENCE_RISK_MISSING";
pub const EVIDENCE_KNOWLEDGE_MISSING: &str = "EVIDENCE_KNOWLEDGE_MISSING";
pub const RISK_WITH_PERMISSION_CONFLICT: &str = "RISK_WITH_PERMISSION_CONFLICT";
pub const CLASSIFIER_LOW_CONFIDENCE: &str = "CLASSIFIER_LOW_CONFIDENCE";
pub const ROUTING_WEAK_SIGNAL_TIGHTEN: &str = "ROUTING_WEAK_SIGNAL_TIGHTEN";
pub const LOOP_GUARD_TIGHTEN: &str = "LOOP_GUARD_TIGHTEN";

/// Prefix for timeout-guard overlay reasons, e.g. `TIMEOUT_GUARD_HITL_SUGGESTED`.
pub const TIMEOUT_GUARD_PREFIX: &str = "TIMEOUT_GUARD_";
/// Prefix for postcheck reasons, e.g. `POSTCHECK_FAIL:GUARANTEE_KEYWORD_IN_TEXT`.
pub const POSTCHECK_FAIL_PREFIX: &str = "POSTCHECK_FAIL:";

/// Risk rule id that forces DENY outright.
pub const GUARANTEE_CLAIM_RULE: &str = "RISK_GUARANTEE_CLAIM";
