use std::sync::Arc;

use async_trait::async_trait;

use respgate_core::errors::ProviderError;
use respgate_core::evidence::{EvidencePayload, RiskDimensions, RiskEvidence};
use respgate_core::reference::{ReferenceData, RiskRule};
use respgate_core::request::GateContext;
use respgate_core::traits::EvidenceProvider;
use respgate_core::types::{ProviderKind, RiskLevel};

/// Rule-based risk assessment.
///
/// Evaluation order:
/// 1. Start at R0
/// 2. Each risk rule in declaration order (keyword, threshold, missing fields);
///    a hit records the rule id and raises the level to the rule's level
/// 3. Structured-input signals raise the level to their configured floor
///
/// The level only ever rises.
pub struct RiskProvider {
    reference: Arc<ReferenceData>,
}

impl RiskProvider {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }

    pub fn assess(&self, ctx: &GateContext) -> RiskEvidence {
        let rules = &self.reference.risk;
        let text = ctx.text_lower();
        let mut level = RiskLevel::R0;
        let mut rules_hit = Vec::new();
        let mut spans = Vec::new();

        for rule in &rules.rules {
            let hit = match rule {
                RiskRule::Keyword { keywords, .. } => {
                    let matched: Vec<&String> = keywords
                        .iter()
                        .filter(|k| text.contains(&k.to_lowercase()))
                        .collect();
                    spans.extend(matched.iter().map(|k| k.to_string()));
                    !matched.is_empty()
                }
                RiskRule::Threshold {
                    field,
                    op,
                    value_from_default,
                    applies_when,
                    ..
                } => {
                    applies_when.matches(ctx.tool_id())
                        && match (ctx.number_field(field), rules.defaults.get(value_from_default)) {
                            (Some(actual), Some(limit)) => op.holds(actual, *limit),
                            _ => false,
                        }
                }
                RiskRule::MissingFields {
                    required_fields,
                    applies_when,
                    ..
                } => {
                    applies_when.as_ref().map_or(true, |w| w.matches(ctx.tool_id()))
                        && required_fields.iter().any(|f| !ctx.has_field(f))
                }
            };
            if hit {
                rules_hit.push(rule.rule_id().to_string());
                level = level.max(rule_level(rule));
            }
        }

        for signal in &ctx.signals {
            if let Some(floor) = rules.signal_floors.get(signal.trim()) {
                level = level.max(*floor);
            }
        }

        let rules_count = rules_hit.len();
        RiskEvidence {
            risk_level: level,
            risk_score: level.score(),
            rules_hit,
            trigger_spans: spans,
            dimensions: RiskDimensions {
                level_source: "rule_based".into(),
                rules_count,
            },
        }
    }
}

fn rule_level(rule: &RiskRule) -> RiskLevel {
    match rule {
        RiskRule::Keyword { risk_level, .. }
        | RiskRule::Threshold { risk_level, .. }
        | RiskRule::MissingFields { risk_level, .. } => *risk_level,
    }
}

#[async_trait]
impl EvidenceProvider for RiskProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Risk
    }

    async fn collect(&self, ctx: &GateContext) -> Result<EvidencePayload, ProviderError> {
        Ok(EvidencePayload::Risk(self.assess(ctx)))
    }
}
