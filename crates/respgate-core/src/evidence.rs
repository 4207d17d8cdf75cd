use serde::Serialize;

use crate::types::{ActionType, ImpactLevel, ProviderKind, RiskLevel};

/// How a provider call resolved, as labelled by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvidenceOutcome {
    Ok,
    Timeout,
    Error,
    Skipped,
}

impl EvidenceOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            EvidenceOutcome::Ok => "OK",
            EvidenceOutcome::Timeout => "TIMEOUT",
            EvidenceOutcome::Error => "ERROR",
            EvidenceOutcome::Skipped => "SKIPPED",
        }
    }
}

/// One provider's finding for one request.
#[derive(Debug, Clone, Serialize)]
pub struct Evidence {
    pub provider: ProviderKind,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<EvidencePayload>,
    /// Only set when health tracking is enabled in the collector.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<EvidenceOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_budget_exceeded: Option<bool>,
}

impl Evidence {
    pub fn available(payload: EvidencePayload) -> Self {
        Self {
            provider: payload.kind(),
            available: true,
            payload: Some(payload),
            outcome: None,
            timeout_budget_exceeded: None,
        }
    }

    pub fn unavailable(provider: ProviderKind) -> Self {
        Self {
            provider,
            available: false,
            payload: None,
            outcome: None,
            timeout_budget_exceeded: None,
        }
    }

    /// Throttled by the provider's breaker; the provider was not invoked.
    pub fn skipped(provider: ProviderKind) -> Self {
        Self {
            outcome: Some(EvidenceOutcome::Skipped),
            ..Self::unavailable(provider)
        }
    }

    pub fn tool(&self) -> Option<&ToolEvidence> {
        match &self.payload {
            Some(EvidencePayload::Tool(t)) => Some(t),
            _ => None,
        }
    }

    pub fn routing(&self) -> Option<&RoutingEvidence> {
        match &self.payload {
            Some(EvidencePayload::Routing(r)) => Some(r),
            _ => None,
        }
    }

    pub fn knowledge(&self) -> Option<&KnowledgeEvidence> {
        match &self.payload {
            Some(EvidencePayload::Knowledge(k)) => Some(k),
            _ => None,
        }
    }

    pub fn risk(&self) -> Option<&RiskEvidence> {
        match &self.payload {
            Some(EvidencePayload::Risk(r)) => Some(r),
            _ => None,
        }
    }

    pub fn permission(&self) -> Option<&PermissionEvidence> {
        match &self.payload {
            Some(EvidencePayload::Permission(p)) => Some(p),
            _ => None,
        }
    }
}

/// Typed payload, one variant per provider kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EvidencePayload {
    Tool(ToolEvidence),
    Routing(RoutingEvidence),
    Knowledge(KnowledgeEvidence),
    Risk(RiskEvidence),
    Permission(PermissionEvidence),
}

impl EvidencePayload {
    pub fn kind(&self) -> ProviderKind {
        match self {
            EvidencePayload::Tool(_) => ProviderKind::Tool,
            EvidencePayload::Routing(_) => ProviderKind::Routing,
            EvidencePayload::Knowledge(_) => ProviderKind::Knowledge,
            EvidencePayload::Risk(_) => ProviderKind::Risk,
            EvidencePayload::Permission(_) => ProviderKind::Permission,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    Context,
    RoutingHint,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolEvidence {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_id: Option<String>,
    pub action_type: ActionType,
    pub impact_level: ImpactLevel,
    pub required_role: String,
    pub source: ToolSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HintedTool {
    pub tool_id: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingEvidence {
    pub hinted_tools: Vec<HintedTool>,
    pub confidence: f64,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeEvidence {
    pub kb_id: String,
    pub kb_version: String,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskDimensions {
    pub level_source: String,
    pub rules_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskEvidence {
    pub risk_level: RiskLevel,
    pub risk_score: u32,
    pub rules_hit: Vec<String>,
    pub trigger_spans: Vec<String>,
    pub dimensions: RiskDimensions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermissionEvidence {
    pub has_access: bool,
    pub user_role: String,
    /// Raw label when the requested action is not a known action type.
    pub action_type: String,
    pub reason_code: String,
}

/// Aggregate degradation labels derived from per-provider budget flags.
/// Explain-only unless the timeout-guard overlay consumes them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DegradationSignals {
    pub providers_over_budget: usize,
    pub degradation_suggested: bool,
    pub hitl_suggested: bool,
}

impl DegradationSignals {
    pub fn from_over_budget(count: usize) -> Self {
        Self {
            providers_over_budget: count,
            degradation_suggested: count >= 1,
            hitl_suggested: count >= 2,
        }
    }
}

/// All five findings for one request.
#[derive(Debug, Clone, Serialize)]
pub struct EvidenceSet {
    pub tool: Evidence,
    pub routing: Evidence,
    pub knowledge: Evidence,
    pub risk: Evidence,
    pub permission: Evidence,
    /// Present only when health tracking is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degradation: Option<DegradationSignals>,
}

impl EvidenceSet {
    pub fn iter(&self) -> impl Iterator<Item = &Evidence> {
        [
            &self.tool,
            &self.routing,
            &self.knowledge,
            &self.risk,
            &self.permission,
        ]
        .into_iter()
    }

    pub fn get(&self, kind: ProviderKind) -> &Evidence {
        match kind {
            ProviderKind::Tool => &self.tool,
            ProviderKind::Routing => &self.routing,
            ProviderKind::Knowledge => &self.knowledge,
            ProviderKind::Risk => &self.risk,
            ProviderKind::Permission => &self.permission,
        }
    }

    pub fn providers_used(&self) -> Vec<ProviderKind> {
        self.iter().filter(|e| e.available).map(|e| e.provider).collect()
    }

    /// Action type from tool evidence, READ when unavailable.
    pub fn action_type(&self) -> ActionType {
        self.tool.tool().map(|t| t.action_type).unwrap_or_default()
    }

    /// Risk level from risk evidence, [`RiskLevel::MISSING_FALLBACK`] when
    /// unavailable so a lost risk provider never reads as "no risk".
    pub fn risk_level(&self) -> RiskLevel {
        self.risk
            .risk()
            .map_or(RiskLevel::MISSING_FALLBACK, |r| r.risk_level)
    }

    pub fn rules_hit(&self) -> &[String] {
        self.risk.risk().map(|r| r.rules_hit.as_slice()).unwrap_or(&[])
    }

    /// Fail-closed: unavailable permission evidence means no access.
    pub fn permission_ok(&self) -> bool {
        self.permission.permission().is_some_and(|p| p.has_access)
    }

    /// Permission evidence is present and explicitly says no.
    pub fn permission_denied(&self) -> bool {
        self.permission.permission().is_some_and(|p| !p.has_access)
    }

    pub fn routing_confidence(&self) -> f64 {
        self.routing.routing().map(|r| r.confidence).unwrap_or(0.0)
    }

    pub fn has_hinted_tools(&self) -> bool {
        self.routing
            .routing()
            .is_some_and(|r| !r.hinted_tools.is_empty())
    }
}
