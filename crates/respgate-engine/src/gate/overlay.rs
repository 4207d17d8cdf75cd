//! Timeout-guard overlay: turns the collector's degradation labels into
//! tightening, scaled by the configured risk tier.

use std::fmt;

use respgate_core::config::GateSettings;
use respgate_core::evidence::DegradationSignals;
use respgate_core::reasons;
use respgate_core::types::{DecisionIndex, RiskLevel};

use super::verdict::Verdict;
use crate::trace::Trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayReason {
    HitlSuggested,
    DegradedOnly,
    HitlAndDegraded,
}

impl OverlayReason {
    pub fn from_signals(signals: &DegradationSignals) -> Option<Self> {
        match (signals.hitl_suggested, signals.degradation_suggested) {
            (true, true) => Some(OverlayReason::HitlAndDegraded),
            (true, false) => Some(OverlayReason::HitlSuggested),
            (false, true) => Some(OverlayReason::DegradedOnly),
            (false, false) => None,
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            OverlayReason::HitlSuggested => "HITL_SUGGESTED",
            OverlayReason::DegradedOnly => "DEGRADED_ONLY",
            OverlayReason::HitlAndDegraded => "HITL_AND_DEGRADED",
        }
    }
}

impl fmt::Display for OverlayReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Target index per tier and reason; `None` ignores the label.
///
/// | tier | HITL_SUGGESTED | DEGRADED_ONLY | HITL_AND_DEGRADED |
/// |------|----------------|---------------|-------------------|
/// | R0   | -              | -             | -                 |
/// | R1   | HITL           | -             | HITL              |
/// | R2   | HITL           | -             | DENY              |
/// | R3   | HITL           | HITL          | DENY              |
pub fn overlay_target(tier: RiskLevel, reason: OverlayReason) -> Option<DecisionIndex> {
    use OverlayReason::*;
    const HITL: Option<DecisionIndex> = Some(DecisionIndex::HITL);
    const DENY: Option<DecisionIndex> = Some(DecisionIndex::DENY);
    match (tier, reason) {
        (RiskLevel::R0, _) => None,
        (RiskLevel::R1, HitlSuggested | HitlAndDegraded) => HITL,
        (RiskLevel::R1, DegradedOnly) => None,
        (RiskLevel::R2, HitlSuggested) => HITL,
        (RiskLevel::R2, HitlAndDegraded) => DENY,
        (RiskLevel::R2, DegradedOnly) => None,
        (RiskLevel::R3, HitlSuggested | DegradedOnly) => HITL,
        (RiskLevel::R3, HitlAndDegraded) => DENY,
    }
}

/// Apply the overlay. A no-op unless the collector produced signals and the
/// HITL overlay is enabled; DENY targets are capped at HITL when the DENY
/// overlay is off.
pub fn apply_timeout_overlay(
    mut v: Verdict,
    signals: Option<&DegradationSignals>,
    settings: &GateSettings,
    trace: &mut Trace,
) -> Verdict {
    let Some(signals) = signals else {
        return v;
    };
    let tier = settings.risk_tier;
    trace.push(format!("risk_tier={tier} (source={})", settings.risk_tier_source));
    trace.push(format!(
        "timeout_guard_policy={} (risk_tier={tier})",
        settings.policy_version
    ));

    let Some(reason) = OverlayReason::from_signals(signals) else {
        return v;
    };
    trace.push(format!("timeout_guard_reason={reason}"));
    if !settings.hitl_overlay {
        trace.push("timeout_guard overlay disabled");
        return v;
    }
    let Some(mut target) = overlay_target(tier, reason) else {
        return v;
    };
    if target == DecisionIndex::DENY && !settings.deny_overlay {
        target = DecisionIndex::HITL;
    }
    if target > v.index() {
        trace.push(format!("timeout_guard raised {} -> {}", v.index(), target));
    }
    v.raise_to(target, &format!("{}{}", reasons::TIMEOUT_GUARD_PREFIX, reason.code()));
    v
}
