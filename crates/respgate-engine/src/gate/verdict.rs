use respgate_core::reasons;
use respgate_core::types::DecisionIndex;

/// Intermediate result threaded through the stages: an index into the
/// decision order plus the primary reason. The index can only go up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    index: DecisionIndex,
    primary_reason: String,
    rules_fired: Vec<String>,
}

impl Default for Verdict {
    fn default() -> Self {
        Self::new(DecisionIndex::ALLOW)
    }
}

impl Verdict {
    pub fn new(index: DecisionIndex) -> Self {
        Self {
            index,
            primary_reason: reasons::DEFAULT_DECISION.to_string(),
            rules_fired: Vec::new(),
        }
    }

    pub fn index(&self) -> DecisionIndex {
        self.index
    }

    pub fn primary_reason(&self) -> &str {
        &self.primary_reason
    }

    pub fn rules_fired(&self) -> &[String] {
        &self.rules_fired
    }

    pub fn has_default_reason(&self) -> bool {
        self.primary_reason == reasons::DEFAULT_DECISION
    }

    /// Raise to at least `target` and attribute `reason` if none is set yet.
    pub fn raise_to(&mut self, target: DecisionIndex, reason: &str) {
        self.index = self.index.max(target);
        self.attribute(reason);
    }

    /// Advance by `steps`, clamped at DENY, attributing `reason` if unset.
    pub fn tighten(&mut self, steps: u8, reason: &str) {
        self.index = self.index.tighten(steps);
        self.attribute(reason);
    }

    /// First cause wins.
    pub fn attribute(&mut self, reason: &str) {
        if self.has_default_reason() {
            self.primary_reason = reason.to_string();
        }
    }

    pub fn record_rule(&mut self, rule_id: &str) {
        self.rules_fired.push(rule_id.to_string());
    }
}
