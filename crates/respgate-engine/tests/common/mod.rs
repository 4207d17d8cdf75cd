#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use respgate_core::config::{EvidenceTimeoutConfig, GateSettings};
use respgate_core::errors::ProviderError;
use respgate_core::evidence::EvidencePayload;
use respgate_core::loop_state::LoopState;
use respgate_core::reference::ReferenceData;
use respgate_core::request::GateContext;
use respgate_core::traits::{EvidenceProvider, LoopGuard};
use respgate_core::types::{DecisionIndex, ProviderKind};
use respgate_engine::{Gate, GateBuilder};

pub fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .to_path_buf()
}

pub fn builder() -> GateBuilder {
    Gate::builder(Arc::new(ReferenceData::builtin().unwrap())).root(workspace_root())
}

pub fn gate() -> Gate {
    builder().build().unwrap()
}

pub fn guarded(settings: GateSettings) -> GateSettings {
    settings.with_timeout_guard(true)
}

/// Breaker settings that keep a provider throttled for the whole test.
pub fn sticky_breakers() -> EvidenceTimeoutConfig {
    let mut cfg = EvidenceTimeoutConfig::default();
    cfg.circuit_breaker.initial_cooldown_ms = 600_000;
    cfg.circuit_breaker.max_cooldown_ms = 600_000;
    cfg
}

/// Never answers within any configured budget.
pub struct SlowProvider(pub ProviderKind);

#[async_trait]
impl EvidenceProvider for SlowProvider {
    fn kind(&self) -> ProviderKind {
        self.0
    }

    async fn collect(&self, _ctx: &GateContext) -> Result<EvidencePayload, ProviderError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Err(ProviderError::Failed("too late".into()))
    }
}

pub struct FailingProvider(pub ProviderKind);

#[async_trait]
impl EvidenceProvider for FailingProvider {
    fn kind(&self) -> ProviderKind {
        self.0
    }

    async fn collect(&self, _ctx: &GateContext) -> Result<EvidencePayload, ProviderError> {
        Err(ProviderError::Failed("backend unavailable".into()))
    }
}

/// Always tries to lower the decision by one step.
pub struct RelaxingLoopGuard;

impl LoopGuard for RelaxingLoopGuard {
    fn evaluate(&self, index: DecisionIndex, _state: Option<&LoopState>) -> DecisionIndex {
        DecisionIndex::new(index.value().saturating_sub(1)).unwrap_or(index)
    }
}
