use std::sync::Arc;

use async_trait::async_trait;

use respgate_core::errors::ProviderError;
use respgate_core::evidence::{EvidencePayload, KnowledgeEvidence};
use respgate_core::reference::ReferenceData;
use respgate_core::request::GateContext;
use respgate_core::traits::EvidenceProvider;
use respgate_core::types::ProviderKind;

/// Reports which knowledge base version answers would draw on.
pub struct KnowledgeProvider {
    reference: Arc<ReferenceData>,
}

impl KnowledgeProvider {
    pub fn new(reference: Arc<ReferenceData>) -> Self {
        Self { reference }
    }
}

#[async_trait]
impl EvidenceProvider for KnowledgeProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Knowledge
    }

    async fn collect(&self, _ctx: &GateContext) -> Result<EvidencePayload, ProviderError> {
        let meta = &self.reference.knowledge;
        Ok(EvidencePayload::Knowledge(KnowledgeEvidence {
            kb_id: meta.kb_id.clone(),
            kb_version: meta.kb_version.clone(),
            expired: meta.expired,
        }))
    }
}
