//! The five evidence providers and the collector that runs them.

pub mod collector;
pub mod knowledge;
pub mod permission;
pub mod risk;
pub mod routing;
pub mod tool;

use std::sync::Arc;

use respgate_core::reference::ReferenceData;
use respgate_core::traits::EvidenceProvider;
use respgate_core::types::ProviderKind;

pub use collector::EvidenceCollector;

/// One provider per evidence kind.
#[derive(Clone)]
pub struct ProviderSet {
    pub tool: Arc<dyn EvidenceProvider>,
    pub routing: Arc<dyn EvidenceProvider>,
    pub knowledge: Arc<dyn EvidenceProvider>,
    pub risk: Arc<dyn EvidenceProvider>,
    pub permission: Arc<dyn EvidenceProvider>,
}

impl ProviderSet {
    /// Reference-data backed providers.
    pub fn builtin(reference: Arc<ReferenceData>) -> Self {
        Self {
            tool: Arc::new(tool::ToolProvider::new(reference.clone())),
            routing: Arc::new(routing::RoutingProvider::new(reference.clone())),
            knowledge: Arc::new(knowledge::KnowledgeProvider::new(reference.clone())),
            risk: Arc::new(risk::RiskProvider::new(reference.clone())),
            permission: Arc::new(permission::PermissionProvider::new(reference)),
        }
    }

    /// Swap the provider for `kind`, e.g. a stub in tests.
    pub fn replace(&mut self, kind: ProviderKind, provider: Arc<dyn EvidenceProvider>) {
        let slot = match kind {
            ProviderKind::Tool => &mut self.tool,
            ProviderKind::Routing => &mut self.routing,
            ProviderKind::Knowledge => &mut self.knowledge,
            ProviderKind::Risk => &mut self.risk,
            ProviderKind::Permission => &mut self.permission,
        };
        *slot = provider;
    }

    pub fn get(&self, kind: ProviderKind) -> &Arc<dyn EvidenceProvider> {
        match kind {
            ProviderKind::Tool => &self.tool,
            ProviderKind::Routing => &self.routing,
            ProviderKind::Knowledge => &self.knowledge,
            ProviderKind::Risk => &self.risk,
            ProviderKind::Permission => &self.permission,
        }
    }
}
