use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::evidence::EvidencePayload;
use crate::loop_state::LoopState;
use crate::request::GateContext;
use crate::response::ClassifierResult;
use crate::types::{DecisionIndex, ProviderKind};

/// One independent evidence source.
///
/// Implementations must be side-effect free and safely abandonable: the
/// collector stops waiting after the provider's timeout but does not
/// guarantee the call stops running.
#[async_trait]
pub trait EvidenceProvider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn collect(&self, ctx: &GateContext) -> Result<EvidencePayload, ProviderError>;
}

/// Coarse intent classification, run concurrently with evidence collection.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, ctx: &GateContext) -> ClassifierResult;
}

/// Hook for multi-round callers. Receives the current index and the parsed
/// loop state; any returned index lower than the input is discarded by the
/// caller.
pub trait LoopGuard: Send + Sync {
    fn evaluate(&self, index: DecisionIndex, state: Option<&LoopState>) -> DecisionIndex;
}
