use std::sync::Arc;

use async_trait::async_trait;

use respgate_core::errors::ProviderError;
use respgate_core::evidence::{EvidencePayload, ToolEvidence, ToolSource};
use respgate_core::reference::{ReferenceData, ToolSpec};
use respgate_core::request::GateContext;
use respgate_core::traits::EvidenceProvider;
use respgate_core::types::{ActionType, ImpactLevel, ProviderKind};

/// Resolves which tool the request would use.
///
/// Resolution order:
/// 1. `context.tool_id` when it names a catalog tool
/// 2. First routing hint whose keywords appear in the text
/// 3. Defaults: READ, I1, the policy's default role
pub struct ToolProvider {
    reference: Arc<ReferenceData>,
}

impl ToolProvider {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }

    pub fn resolve(&self, ctx: &GateContext) -> ToolEvidence {
        let catalog = &self.reference.tools;
        if let Some(spec) = ctx.tool_id().and_then(|id| catalog.get(id)) {
            return from_spec(spec, ToolSource::Context);
        }
        if let Some(spec) = catalog.infer_tool(&ctx.text_lower()) {
            return from_spec(spec, ToolSource::RoutingHint);
        }
        ToolEvidence {
            tool_id: None,
            action_type: ActionType::Read,
            impact_level: ImpactLevel::I1,
            required_role: self.reference.permissions.default_role.clone(),
            source: ToolSource::Default,
        }
    }
}

fn from_spec(spec: &ToolSpec, source: ToolSource) -> ToolEvidence {
    ToolEvidence {
        tool_id: Some(spec.tool_id.clone()),
        action_type: spec.action_type,
        impact_level: spec.impact_level,
        required_role: spec.required_role.clone(),
        source,
    }
}

#[async_trait]
impl EvidenceProvider for ToolProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Tool
    }

    async fn collect(&self, ctx: &GateContext) -> Result<EvidencePayload, ProviderError> {
        Ok(EvidencePayload::Tool(self.resolve(ctx)))
    }
}
