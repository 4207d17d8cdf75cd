use std::sync::Arc;

use async_trait::async_trait;

use respgate_core::errors::ProviderError;
use respgate_core::evidence::{EvidencePayload, HintedTool, RoutingEvidence};
use respgate_core::reference::ReferenceData;
use respgate_core::request::GateContext;
use respgate_core::traits::EvidenceProvider;
use respgate_core::types::ProviderKind;

const BASE_CONFIDENCE: f64 = 0.6;
const PER_MATCH: f64 = 0.1;
const MAX_CONFIDENCE: f64 = 0.9;

/// Keyword routing hints. Confidence per tool is
/// `min(0.6 + 0.1 × matched keywords, 0.9)`.
pub struct RoutingProvider {
    reference: Arc<ReferenceData>,
}

impl RoutingProvider {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }

    pub fn route(&self, ctx: &GateContext) -> RoutingEvidence {
        let text = ctx.text_lower();
        let hinted_tools: Vec<HintedTool> = self
            .reference
            .tools
            .hint_matches(&text)
            .map(|(hint, n)| HintedTool {
                tool_id: hint.tool_id.clone(),
                confidence: (BASE_CONFIDENCE + PER_MATCH * n as f64).min(MAX_CONFIDENCE),
            })
            .collect();
        let confidence = hinted_tools
            .iter()
            .map(|h| h.confidence)
            .fold(0.0, f64::max);
        RoutingEvidence {
            hinted_tools,
            confidence,
            source: "keyword".into(),
        }
    }
}

#[async_trait]
impl EvidenceProvider for RoutingProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Routing
    }

    async fn collect(&self, ctx: &GateContext) -> Result<EvidencePayload, ProviderError> {
        Ok(EvidencePayload::Routing(self.route(ctx)))
    }
}
