use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, warn};

use respgate_core::config::{EvidenceTimeoutConfig, GateSettings};
use respgate_core::errors::ProviderError;
use respgate_core::evidence::{DegradationSignals, Evidence, EvidenceOutcome, EvidencePayload, EvidenceSet};
use respgate_core::request::GateContext;
use respgate_core::types::{ProviderKind, RiskLevel};

use super::ProviderSet;
use crate::breaker::{BreakerRegistry, BreakerState, SharedBreaker};
use crate::trace::Trace;

/// How one provider call resolved.
#[derive(Debug)]
enum CallResult {
    Ok(EvidencePayload),
    Timeout(Duration),
    Error(String),
    Skipped,
}

/// A HALF_OPEN probe slot taken for one call.
///
/// Dropped while still armed (the request was cancelled before outcomes
/// were recorded) it hands the slot back so the breaker can probe again.
struct ProbeSlot {
    breaker: SharedBreaker,
    armed: bool,
}

impl ProbeSlot {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeSlot {
    fn drop(&mut self) {
        if self.armed {
            let mut breaker = self.breaker.lock();
            breaker.release_probe();
            debug!(provider = %breaker.provider(), "abandoned probe slot released");
        }
    }
}

/// Runs the five providers concurrently, each under its own timeout.
///
/// With the timeout guard enabled:
/// 1. Each provider's breaker is consulted first; a throttled provider is
///    not called and yields SKIPPED evidence
/// 2. After every call has resolved, outcomes are recorded into the
///    breakers (timeouts and errors both count as failures)
/// 3. Evidence is labelled OK / TIMEOUT / ERROR with a budget flag, and
///    aggregate degradation signals are derived from the flags
///
/// With it disabled this is a plain concurrent gather-with-timeout and the
/// breakers are never touched.
pub struct EvidenceCollector {
    providers: ProviderSet,
    timeouts: EvidenceTimeoutConfig,
    breakers: Arc<BreakerRegistry>,
}

impl EvidenceCollector {
    pub fn new(providers: ProviderSet, timeouts: EvidenceTimeoutConfig) -> Self {
        let breakers = Arc::new(BreakerRegistry::new(timeouts.circuit_breaker.clone()));
        Self {
            providers,
            timeouts,
            breakers,
        }
    }

    pub fn with_breakers(mut self, breakers: Arc<BreakerRegistry>) -> Self {
        self.breakers = breakers;
        self
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    pub fn timeouts(&self) -> &EvidenceTimeoutConfig {
        &self.timeouts
    }

    pub async fn collect(
        &self,
        ctx: Arc<GateContext>,
        settings: &GateSettings,
        trace: &mut Trace,
    ) -> EvidenceSet {
        let guard = settings.evidence_timeout_guard;
        let tier = settings.risk_tier;

        let (tool, routing, knowledge, risk, permission) = tokio::join!(
            self.call(ProviderKind::Tool, &ctx, guard, tier),
            self.call(ProviderKind::Routing, &ctx, guard, tier),
            self.call(ProviderKind::Knowledge, &ctx, guard, tier),
            self.call(ProviderKind::Risk, &ctx, guard, tier),
            self.call(ProviderKind::Permission, &ctx, guard, tier),
        );
        let results = [
            (ProviderKind::Tool, tool),
            (ProviderKind::Routing, routing),
            (ProviderKind::Knowledge, knowledge),
            (ProviderKind::Risk, risk),
            (ProviderKind::Permission, permission),
        ];

        if guard {
            self.record_outcomes(&results);
        }

        let mut over_budget = 0usize;
        let [tool, routing, knowledge, risk, permission] = results.map(|(kind, (result, probe))| {
            if let Some(probe) = probe {
                probe.disarm();
            }
            let evidence = self.to_evidence(kind, result, guard, trace);
            if evidence.timeout_budget_exceeded == Some(true) {
                over_budget += 1;
            }
            evidence
        });

        let degradation = guard.then(|| DegradationSignals::from_over_budget(over_budget));
        if let Some(d) = degradation.filter(|d| d.degradation_suggested) {
            trace.push(format!(
                "evidence degraded: providers_over_budget={} hitl_suggested={}",
                d.providers_over_budget, d.hitl_suggested
            ));
        }

        EvidenceSet {
            tool,
            routing,
            knowledge,
            risk,
            permission,
            degradation,
        }
    }

    async fn call(
        &self,
        kind: ProviderKind,
        ctx: &Arc<GateContext>,
        guard: bool,
        tier: RiskLevel,
    ) -> (CallResult, Option<ProbeSlot>) {
        let mut probe = None;
        if guard {
            let breaker = self.breakers.get_or_create(kind);
            let (permit, probing) = {
                let mut b = breaker.lock();
                let permit = b.should_call(Utc::now());
                let probing = permit.allowed && b.state() == BreakerState::HalfOpen;
                (permit, probing)
            };
            if let Some(t) = &permit.transition {
                self.breakers.publish(t);
            }
            if !permit.allowed {
                debug!(provider = %kind, "breaker open, provider skipped");
                return (CallResult::Skipped, None);
            }
            if probing {
                probe = Some(ProbeSlot {
                    breaker,
                    armed: true,
                });
            }
        }

        let provider = self.providers.get(kind).clone();
        let task_ctx = ctx.clone();
        let limit = self.timeouts.timeout_for(kind, tier);
        // Spawned so a panicking provider is isolated; on timeout the task
        // is detached, not stopped.
        let handle = tokio::spawn(async move { provider.collect(&task_ctx).await });
        let result = match timeout(limit, handle).await {
            Ok(Ok(Ok(payload))) if payload.kind() == kind => CallResult::Ok(payload),
            Ok(Ok(Ok(payload))) => CallResult::Error(format!(
                "provider returned {} evidence",
                payload.kind()
            )),
            Ok(Ok(Err(e))) => CallResult::Error(e.to_string()),
            Ok(Err(join)) => CallResult::Error(ProviderError::Panicked(join.to_string()).to_string()),
            Err(_) => CallResult::Timeout(limit),
        };
        (result, probe)
    }

    fn record_outcomes(&self, results: &[(ProviderKind, (CallResult, Option<ProbeSlot>))]) {
        let now = Utc::now();
        for (kind, (result, _)) in results {
            let transition = match result {
                CallResult::Skipped => continue,
                CallResult::Ok(_) => self.breakers.get_or_create(*kind).lock().record_success(now),
                CallResult::Timeout(_) | CallResult::Error(_) => {
                    self.breakers.get_or_create(*kind).lock().record_timeout(now)
                }
            };
            if let Some(t) = transition {
                self.breakers.publish(&t);
            }
        }
    }

    fn to_evidence(
        &self,
        kind: ProviderKind,
        result: CallResult,
        guard: bool,
        trace: &mut Trace,
    ) -> Evidence {
        let (mut evidence, outcome) = match result {
            CallResult::Ok(payload) => (Evidence::available(payload), EvidenceOutcome::Ok),
            CallResult::Timeout(limit) => {
                warn!(provider = %kind, timeout_ms = limit.as_millis() as u64, "evidence provider timed out");
                trace.push(format!("evidence {kind}: TIMEOUT after {}ms", limit.as_millis()));
                (Evidence::unavailable(kind), EvidenceOutcome::Timeout)
            }
            CallResult::Error(msg) => {
                warn!(provider = %kind, error = %msg, "evidence provider failed");
                trace.push(format!("evidence {kind}: ERROR ({msg})"));
                (Evidence::unavailable(kind), EvidenceOutcome::Error)
            }
            CallResult::Skipped => {
                trace.push(format!("evidence {kind}: SKIPPED (circuit open)"));
                return Evidence::skipped(kind);
            }
        };
        if guard {
            evidence.outcome = Some(outcome);
            evidence.timeout_budget_exceeded = Some(outcome != EvidenceOutcome::Ok);
        }
        evidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use respgate_core::config::BreakerConfig;
    use respgate_core::evidence::KnowledgeEvidence;
    use respgate_core::reference::ReferenceData;
    use respgate_core::request::DecisionRequest;
    use respgate_core::traits::EvidenceProvider;

    use crate::breaker::BreakerState;

    enum Behaviour {
        Slow,
        Fail,
        Panic,
        WrongKind,
    }

    struct Stub(ProviderKind, Behaviour);

    #[async_trait]
    impl EvidenceProvider for Stub {
        fn kind(&self) -> ProviderKind {
            self.0
        }

        async fn collect(&self, _ctx: &GateContext) -> Result<EvidencePayload, ProviderError> {
            match self.1 {
                Behaviour::Slow => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(ProviderError::Failed("unreachable".into()))
                }
                Behaviour::Fail => Err(ProviderError::Failed("backend down".into())),
                Behaviour::Panic => panic!("provider bug"),
                Behaviour::WrongKind => Ok(EvidencePayload::Knowledge(KnowledgeEvidence {
                    kb_id: "x".into(),
                    kb_version: "1".into(),
                    expired: false,
                })),
            }
        }
    }

    fn collector(stubs: Vec<Stub>) -> EvidenceCollector {
        let mut providers = ProviderSet::builtin(Arc::new(ReferenceData::builtin().unwrap()));
        for stub in stubs {
            providers.replace(stub.0, Arc::new(stub));
        }
        EvidenceCollector::new(providers, EvidenceTimeoutConfig::default())
    }

    fn ctx() -> Arc<GateContext> {
        Arc::new(GateContext::new("t", DecisionRequest::from_text("what are your hours?")))
    }

    fn guarded() -> GateSettings {
        GateSettings::default().with_timeout_guard(true)
    }

    #[tokio::test]
    async fn healthy_providers_all_available() {
        let c = collector(vec![]);
        let set = c.collect(ctx(), &GateSettings::default(), &mut Trace::new(false)).await;
        assert_eq!(set.providers_used().len(), 5);
        assert!(set.degradation.is_none());
        assert!(set.iter().all(|e| e.outcome.is_none()));
        assert!(c.breakers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unguarded_timeout_is_unlabelled() {
        let c = collector(vec![Stub(ProviderKind::Permission, Behaviour::Slow)]);
        let set = c.collect(ctx(), &GateSettings::default(), &mut Trace::new(false)).await;
        assert!(!set.permission.available);
        assert!(set.permission.outcome.is_none());
        assert!(set.degradation.is_none());
        assert!(c.breakers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn guarded_labels_and_degradation() {
        let c = collector(vec![
            Stub(ProviderKind::Permission, Behaviour::Slow),
            Stub(ProviderKind::Knowledge, Behaviour::Fail),
        ]);
        let mut trace = Trace::new(true);
        let set = c.collect(ctx(), &guarded(), &mut trace).await;
        assert_eq!(set.permission.outcome, Some(EvidenceOutcome::Timeout));
        assert_eq!(set.knowledge.outcome, Some(EvidenceOutcome::Error));
        assert_eq!(set.risk.outcome, Some(EvidenceOutcome::Ok));
        assert_eq!(set.risk.timeout_budget_exceeded, Some(false));
        assert_eq!(set.permission.timeout_budget_exceeded, Some(true));
        let d = set.degradation.unwrap();
        assert!(d.degradation_suggested && d.hitl_suggested);
        assert_eq!(d.providers_over_budget, 2);
        assert!(trace.contains("evidence permission: TIMEOUT"));
        assert_eq!(c.breakers().len(), 5);
    }

    #[tokio::test]
    async fn panic_and_wrong_kind_are_errors() {
        let c = collector(vec![
            Stub(ProviderKind::Tool, Behaviour::Panic),
            Stub(ProviderKind::Routing, Behaviour::WrongKind),
        ]);
        let set = c.collect(ctx(), &guarded(), &mut Trace::new(false)).await;
        assert_eq!(set.tool.outcome, Some(EvidenceOutcome::Error));
        assert_eq!(set.routing.outcome, Some(EvidenceOutcome::Error));
        assert!(set.permission.available);
    }

    #[tokio::test(start_paused = true)]
    async fn breaker_opens_and_skips() {
        let c = collector(vec![Stub(ProviderKind::Permission, Behaviour::Slow)]);
        for _ in 0..3 {
            c.collect(ctx(), &guarded(), &mut Trace::new(false)).await;
        }
        let breaker = c.breakers().get(ProviderKind::Permission).unwrap();
        assert_eq!(breaker.lock().state(), BreakerState::Open);

        let mut trace = Trace::new(true);
        let set = c.collect(ctx(), &guarded(), &mut trace).await;
        assert_eq!(set.permission.outcome, Some(EvidenceOutcome::Skipped));
        assert!(set.permission.timeout_budget_exceeded.is_none());
        // Skipped providers do not count against the budget.
        assert!(!set.degradation.unwrap().degradation_suggested);
        assert!(trace.contains("SKIPPED"));
        // Skips are not recorded as failures.
        assert_eq!(breaker.lock().open_count(), 1);
    }

    #[tokio::test]
    async fn shared_registry_config_applies() {
        let registry = Arc::new(BreakerRegistry::new(BreakerConfig {
            timeout_threshold: 1,
            ..Default::default()
        }));
        let c = collector(vec![Stub(ProviderKind::Risk, Behaviour::Fail)]).with_breakers(registry.clone());
        c.collect(ctx(), &guarded(), &mut Trace::new(false)).await;
        assert_eq!(
            registry.get(ProviderKind::Risk).unwrap().lock().state(),
            BreakerState::Open
        );
        registry.clear();
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_probe_releases_its_slot() {
        let c = collector(vec![Stub(ProviderKind::Knowledge, Behaviour::Slow)]);
        let breaker = c.breakers().get_or_create(ProviderKind::Knowledge);
        {
            let mut b = breaker.lock();
            let past = Utc::now() - chrono::Duration::minutes(5);
            for _ in 0..3 {
                b.record_timeout(past);
            }
            assert_eq!(b.state(), BreakerState::Open);
        }

        let mut trace = Trace::new(false);
        let cancelled =
            tokio::time::timeout(Duration::from_millis(5), c.collect(ctx(), &guarded(), &mut trace)).await;
        assert!(cancelled.is_err());
        {
            let b = breaker.lock();
            assert_eq!(b.state(), BreakerState::HalfOpen);
            assert_eq!(b.probes_in_flight(), 0);
        }

        let set = c.collect(ctx(), &guarded(), &mut Trace::new(false)).await;
        assert_eq!(set.knowledge.outcome, Some(EvidenceOutcome::Timeout));
        assert_eq!(breaker.lock().state(), BreakerState::Open);
    }
}
