//! The decision pipeline.
//!
//! Classification and evidence collection run concurrently; every later
//! stage receives and returns a [`Verdict`] and may only raise its index.
//! [`materialize`] is the single place a [`Decision`] is created.

pub mod loop_guard;
pub mod overlay;
pub mod postcheck;
pub mod stages;
pub mod verdict;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;
use uuid::Uuid;

use respgate_core::config::{EvidenceTimeoutConfig, GateSettings};
use respgate_core::errors::GateError;
use respgate_core::evidence::EvidenceSet;
use respgate_core::reference::ReferenceData;
use respgate_core::request::{DecisionRequest, GateContext};
use respgate_core::response::{DecisionResponse, Explanation, PolicyInfo, SuggestedAction};
use respgate_core::traits::{Classifier, EvidenceProvider, LoopGuard};
use respgate_core::types::{Decision, DecisionIndex, ProviderKind};

use crate::breaker::BreakerRegistry;
use crate::classifier::KeywordClassifier;
use crate::evidence::{EvidenceCollector, ProviderSet};
use crate::matrix::{resolve_matrix_path, MatrixCache, DEFAULT_MATRIX};
use crate::trace::Trace;

pub use loop_guard::{apply_loop_guard, NoopLoopGuard};
pub use overlay::{apply_timeout_overlay, overlay_target, OverlayReason};
pub use postcheck::{apply_postcheck, Postcheck, PostcheckTarget};
pub use verdict::Verdict;

const MISSING_CONTEXT_NOTE: &str = " (incomplete context requires human review)";

fn materialize(index: DecisionIndex) -> Decision {
    match index.value() {
        0 => Decision::Allow,
        1 => Decision::OnlySuggest,
        2 => Decision::Hitl,
        _ => Decision::Deny,
    }
}

fn summary_for(decision: Decision) -> &'static str {
    match decision {
        Decision::Allow => "Request approved for direct answer",
        Decision::OnlySuggest => "Suggestion-only response with disclaimer required",
        Decision::Hitl => "Human-in-the-loop intervention required",
        Decision::Deny => "Request denied due to policy violation",
    }
}

/// The responsibility gate. Cheap to share behind an `Arc`; all per-request
/// state lives on the stack of [`Gate::decide`].
pub struct Gate {
    matrices: Arc<MatrixCache>,
    default_matrix: String,
    collector: EvidenceCollector,
    classifier: Arc<dyn Classifier>,
    loop_guard: Arc<dyn LoopGuard>,
    postcheck: Postcheck,
    settings: GateSettings,
}

impl Gate {
    pub fn builder(reference: Arc<ReferenceData>) -> GateBuilder {
        GateBuilder::new(reference)
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        self.collector.breakers()
    }

    pub fn matrices(&self) -> &Arc<MatrixCache> {
        &self.matrices
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    pub fn postcheck(&self) -> &Postcheck {
        &self.postcheck
    }

    /// Decide using the matrix selected by `context.profile`, or the
    /// default matrix.
    pub async fn decide(&self, req: DecisionRequest) -> Result<DecisionResponse, GateError> {
        let path = resolve_matrix_path(req.profile(), &self.default_matrix);
        self.decide_with_matrix(req, &path).await
    }

    /// Decide against an explicit matrix path. Relative paths resolve
    /// against the cache root.
    pub async fn decide_with_matrix(
        &self,
        req: DecisionRequest,
        matrix_path: &str,
    ) -> Result<DecisionResponse, GateError> {
        let started = Instant::now();
        req.validate()?;
        let matrix = self.matrices.load(matrix_path)?;

        let ctx = Arc::new(GateContext::new(Uuid::new_v4().to_string(), req));
        let mut trace = Trace::new(ctx.verbose);

        let (classification, evidence) = tokio::join!(
            self.classifier.classify(&ctx),
            self.collector.collect(ctx.clone(), &self.settings, &mut trace),
        );

        let rt = matrix.upgrade_type(classification.responsibility_type, evidence.action_type());
        if rt != classification.responsibility_type {
            trace.push(format!(
                "type upgraded {} -> {rt} (action_type={})",
                classification.responsibility_type,
                evidence.action_type()
            ));
        }

        let v = stages::resolve_base(&matrix, rt, &evidence);
        let v = stages::apply_missing_evidence(v, &matrix, &evidence);
        let v = stages::apply_conflicts(v, &matrix, &evidence, &classification);
        let v = apply_timeout_overlay(v, evidence.degradation.as_ref(), &self.settings, &mut trace);
        let loop_state = ctx.loop_state();
        let v = apply_loop_guard(v, self.loop_guard.as_ref(), loop_state.as_ref(), &mut trace);

        let mut decision = materialize(v.index());
        let post = self.postcheck.check(
            &ctx.text,
            decision == Decision::OnlySuggest,
            PostcheckTarget::Input,
        );
        let before = v.index();
        let v = apply_postcheck(v, &post);
        if !post.passed {
            let codes: Vec<&str> = post.issues.iter().map(|i| i.code.as_str()).collect();
            trace.push(format!("postcheck failed: {}", codes.join(", ")));
        }
        if v.index() != before {
            decision = materialize(v.index());
        }

        let explanation = explain(decision, &evidence, classification.trigger_spans);
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        info!(
            request_id = %ctx.request_id,
            decision = %decision,
            reason = v.primary_reason(),
            matrix = %matrix.version,
            latency_ms,
            "decision"
        );

        Ok(DecisionResponse {
            request_id: ctx.request_id.clone(),
            session_id: ctx.session_id.clone(),
            responsibility_type: rt,
            decision,
            primary_reason: v.primary_reason().to_string(),
            suggested_action: SuggestedAction::from(decision),
            explanation,
            policy: PolicyInfo {
                matrix_version: matrix.version.clone(),
                matrix_digest: matrix.digest().to_string(),
                rules_fired: ctx.debug.then(|| v.rules_fired().to_vec()),
            },
            latency_ms,
            degradation: evidence.degradation,
            trace: trace.into_lines(),
        })
    }
}

fn explain(decision: Decision, evidence: &EvidenceSet, mut spans: Vec<String>) -> Explanation {
    let mut summary = summary_for(decision).to_string();
    if decision == Decision::Hitl
        && evidence.permission_ok()
        && evidence.rules_hit().iter().any(|r| r.contains("MISSING"))
    {
        summary.push_str(MISSING_CONTEXT_NOTE);
    }
    if let Some(risk) = evidence.risk.risk() {
        spans.extend(risk.trigger_spans.iter().cloned());
    }
    Explanation {
        summary,
        evidence_used: evidence.providers_used(),
        trigger_spans: spans,
    }
}

/// Assembles a [`Gate`]. Everything except the reference data has a default.
pub struct GateBuilder {
    reference: Arc<ReferenceData>,
    root: PathBuf,
    default_matrix: String,
    timeouts: EvidenceTimeoutConfig,
    settings: GateSettings,
    providers: ProviderSet,
    classifier: Option<Arc<dyn Classifier>>,
    loop_guard: Arc<dyn LoopGuard>,
    breakers: Option<Arc<BreakerRegistry>>,
    matrices: Option<Arc<MatrixCache>>,
}

impl GateBuilder {
    fn new(reference: Arc<ReferenceData>) -> Self {
        Self {
            providers: ProviderSet::builtin(reference.clone()),
            reference,
            root: PathBuf::from("."),
            default_matrix: DEFAULT_MATRIX.to_string(),
            timeouts: EvidenceTimeoutConfig::default(),
            settings: GateSettings::default(),
            classifier: None,
            loop_guard: Arc::new(NoopLoopGuard),
            breakers: None,
            matrices: None,
        }
    }

    /// Directory relative matrix paths resolve against.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn default_matrix(mut self, path: impl Into<String>) -> Self {
        self.default_matrix = path.into();
        self
    }

    pub fn timeouts(mut self, timeouts: EvidenceTimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn settings(mut self, settings: GateSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn provider(mut self, kind: ProviderKind, provider: Arc<dyn EvidenceProvider>) -> Self {
        self.providers.replace(kind, provider);
        self
    }

    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn loop_guard(mut self, guard: Arc<dyn LoopGuard>) -> Self {
        self.loop_guard = guard;
        self
    }

    /// Share a breaker registry, e.g. to inspect or clear it from tests.
    pub fn breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = Some(breakers);
        self
    }

    /// Share a matrix cache across gates. Overrides [`GateBuilder::root`].
    pub fn matrix_cache(mut self, cache: Arc<MatrixCache>) -> Self {
        self.matrices = Some(cache);
        self
    }

    pub fn build(self) -> Result<Gate, GateError> {
        self.reference.validate()?;
        self.timeouts
            .validate()
            .map_err(|e| GateError::configuration("evidence timeouts", e.to_string()))?;

        let mut collector = EvidenceCollector::new(self.providers, self.timeouts);
        if let Some(breakers) = self.breakers {
            collector = collector.with_breakers(breakers);
        }
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(KeywordClassifier::from_reference(&self.reference)));

        Ok(Gate {
            matrices: self
                .matrices
                .unwrap_or_else(|| Arc::new(MatrixCache::new(self.root))),
            default_matrix: self.default_matrix,
            collector,
            classifier,
            loop_guard: self.loop_guard,
            postcheck: Postcheck::from_reference(&self.reference),
            settings: self.settings,
        })
    }
}
