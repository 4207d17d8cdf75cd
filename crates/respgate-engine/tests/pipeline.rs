//! End-to-end pipeline properties against the shipped matrices.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use respgate_core::config::GateSettings;
use respgate_core::errors::GateError;
use respgate_core::request::DecisionRequest;
use respgate_core::types::{Decision, ProviderKind, ResponsibilityType, RiskLevel};
use respgate_engine::breaker::{BreakerRegistry, BreakerState};
use respgate_engine::gate::NoopLoopGuard;

const MATRICES: [&str; 4] = [
    "matrices/v0.1.json",
    "matrices/pr_loop_demo.json",
    "matrices/pr_loop_phase_e.json",
    "matrices/pr_loop_churn.json",
];

fn signals(list: &[&str]) -> DecisionRequest {
    DecisionRequest::default()
        .with_signals(list.iter().copied())
        .with_context("loop_state", serde_json::json!({"round_index": 0, "nit_only_streak": 0}))
}

// ── Example scenarios ───────────────────────────────────────────

#[tokio::test]
async fn benign_read_is_allowed_with_all_evidence() {
    let resp = gate()
        .decide(DecisionRequest::from_text("What are your opening hours?").with_context("role", "normal_user"))
        .await
        .unwrap();
    assert_eq!(resp.decision, Decision::Allow);
    assert_eq!(resp.primary_reason, "DEFAULT_DECISION");
    assert_eq!(resp.responsibility_type, ResponsibilityType::Information);
    assert_eq!(resp.explanation.summary, "Request approved for direct answer");
    assert_eq!(resp.explanation.evidence_used, ProviderKind::ALL.to_vec());
    assert_eq!(resp.policy.matrix_version, "v0.1");
}

#[tokio::test]
async fn guarantee_claim_is_denied_under_every_matrix() {
    let gate = builder().build().unwrap();
    for path in MATRICES {
        let req = DecisionRequest::from_text("Our fund is principal protected, sure profit!")
            .with_context("role", "admin");
        let resp = gate.decide_with_matrix(req, path).await.unwrap();
        assert_eq!(resp.decision, Decision::Deny, "{path}");
        assert_eq!(resp.primary_reason, "RISK_GUARANTEE_OVERRIDE", "{path}");
    }
}

#[tokio::test(start_paused = true)]
async fn permission_timeout_falls_back_to_missing_evidence_policy() {
    let gate = builder()
        .provider(ProviderKind::Permission, Arc::new(SlowProvider(ProviderKind::Permission)))
        .settings(GateSettings {
            hitl_overlay: false,
            ..guarded(GateSettings::default())
        })
        .build()
        .unwrap();
    let resp = gate
        .decide(DecisionRequest::from_text("What are your opening hours?"))
        .await
        .unwrap();
    assert_eq!(resp.decision, Decision::Hitl);
    assert_eq!(resp.primary_reason, "EVIDENCE_PERMISSION_MISSING");
    assert!(!resp.explanation.evidence_used.contains(&ProviderKind::Permission));
    assert_eq!(resp.degradation.map(|d| d.providers_over_budget), Some(1));
}

#[tokio::test]
async fn lost_risk_provider_is_stricter_than_low_risk() {
    let gate = builder()
        .provider(ProviderKind::Risk, Arc::new(FailingProvider(ProviderKind::Risk)))
        .build()
        .unwrap();
    let resp = gate
        .decide(DecisionRequest::from_text("What are your opening hours?").with_context("role", "normal_user"))
        .await
        .unwrap();
    assert_eq!(resp.decision, Decision::Hitl);
    assert_eq!(resp.primary_reason, "RISK_LOW_NOTICE");
    assert!(!resp.explanation.evidence_used.contains(&ProviderKind::Risk));
}

// ── Invariants ──────────────────────────────────────────────────

#[tokio::test]
async fn adding_signals_never_relaxes() {
    let gate = gate();
    let sets: [&[&str]; 4] = [
        &[],
        &["LOW_VALUE_NITS"],
        &["LOW_VALUE_NITS", "BUG_RISK"],
        &["LOW_VALUE_NITS", "BUG_RISK", "BUILD_CHAIN"],
    ];
    for path in MATRICES {
        let mut previous = Decision::Allow;
        for set in sets {
            let resp = gate.decide_with_matrix(signals(set), path).await.unwrap();
            assert!(
                resp.decision >= previous,
                "{path}: {set:?} gave {} after {previous}",
                resp.decision
            );
            previous = resp.decision;
        }
    }
}

#[tokio::test(start_paused = true)]
async fn missing_permission_is_never_below_hitl() {
    let gate = builder()
        .provider(ProviderKind::Permission, Arc::new(SlowProvider(ProviderKind::Permission)))
        .build()
        .unwrap();
    for path in MATRICES {
        for text in ["hello there", "track my order", "please upgrade me to premium"] {
            let resp = gate
                .decide_with_matrix(DecisionRequest::from_text(text), path)
                .await
                .unwrap();
            assert!(resp.decision >= Decision::Hitl, "{path}: '{text}' gave {}", resp.decision);
        }
    }
}

#[tokio::test]
async fn relaxing_loop_guard_changes_nothing() {
    let noop = builder().loop_guard(Arc::new(NoopLoopGuard)).build().unwrap();
    let relaxing = builder().loop_guard(Arc::new(RelaxingLoopGuard)).build().unwrap();
    let cases: [&[&str]; 3] = [&["LOW_VALUE_NITS"], &["BUG_RISK"], &["SECURITY_BOUNDARY"]];
    for set in cases {
        let mut req = signals(set).with_context("profile", "pr_review_loop");
        req.verbose = true;
        let a = noop.decide(req.clone()).await.unwrap();
        let b = relaxing.decide(req).await.unwrap();
        assert_eq!(a.decision, b.decision, "{set:?}");
        assert_eq!(a.primary_reason, b.primary_reason, "{set:?}");
        let trace = b.trace.unwrap_or_default();
        assert!(
            trace.iter().any(|l| l.contains("LoopGuard: attempted relax ignored")),
            "{set:?}: {trace:?}"
        );
    }
}

#[tokio::test]
async fn high_risk_stays_out_of_allow_in_default_and_converged_policies() {
    let gate = gate();
    let first = gate.matrices().load("matrices/pr_loop_demo.json").unwrap();
    let again = gate.matrices().load("matrices/pr_loop_demo.json").unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    for profile in ["pr_review_loop", "pr_review_loop_converged"] {
        for set in [&["SECURITY_BOUNDARY"][..], &["BUILD_CHAIN"][..]] {
            let resp = gate
                .decide(signals(set).with_context("profile", profile))
                .await
                .unwrap();
            assert_ne!(resp.decision, Decision::Allow, "{profile} {set:?}");
        }
    }
}

// ── Matrix profiles ─────────────────────────────────────────────

#[tokio::test]
async fn review_loop_profiles() {
    let gate = gate();
    let nits = |profile: &str| signals(&["LOW_VALUE_NITS"]).with_context("profile", profile);

    let demo = gate.decide(nits("pr_review_loop")).await.unwrap();
    assert_eq!(demo.decision, Decision::OnlySuggest);

    let converged = gate.decide(nits("pr_review_loop_converged")).await.unwrap();
    assert_eq!(converged.decision, Decision::Allow);
    assert_eq!(converged.primary_reason, "PR_LOOP_CONVERGED");

    let churn = gate.decide(nits("pr_review_loop_churn")).await.unwrap();
    assert_eq!(churn.decision, Decision::Hitl);
    assert_eq!(churn.primary_reason, "PR_LOOP_CHURN");

    let bug = gate
        .decide(signals(&["BUG_RISK"]).with_context("profile", "pr_review_loop"))
        .await
        .unwrap();
    assert_ne!(bug.decision, Decision::Allow);

    let unknown = gate.decide(nits("no_such_profile")).await.unwrap();
    assert_eq!(unknown.policy.matrix_version, "v0.1");
}

#[tokio::test]
async fn rules_fired_only_in_debug() {
    let gate = gate();
    let mut req = signals(&["BUG_RISK"]).with_context("profile", "pr_review_loop");
    assert!(gate.decide(req.clone()).await.unwrap().policy.rules_fired.is_none());
    req.debug = true;
    let resp = gate.decide(req).await.unwrap();
    assert_eq!(resp.policy.rules_fired, Some(vec!["PR_R2".to_string()]));
}

// ── Timeout guard ───────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn two_slow_providers_escalate_by_tier() {
    let build = |tier| {
        builder()
            .provider(ProviderKind::Knowledge, Arc::new(SlowProvider(ProviderKind::Knowledge)))
            .provider(ProviderKind::Routing, Arc::new(SlowProvider(ProviderKind::Routing)))
            .settings(guarded(GateSettings::default()).with_risk_tier(tier))
            .build()
            .unwrap()
    };
    let mut req = DecisionRequest::from_text("What are your opening hours?");
    req.verbose = true;

    let resp = build(RiskLevel::R2).decide(req.clone()).await.unwrap();
    assert_eq!(resp.decision, Decision::Deny);
    assert_eq!(resp.primary_reason, "EVIDENCE_KNOWLEDGE_MISSING");
    let trace = resp.trace.unwrap();
    assert!(trace.iter().any(|l| l == "timeout_guard_reason=HITL_AND_DEGRADED"));
    assert!(trace.iter().any(|l| l == "risk_tier=R2 (source=explicit)"));
    assert!(trace.iter().any(|l| l.starts_with("evidence knowledge: TIMEOUT")));

    let resp = build(RiskLevel::R0).decide(req).await.unwrap();
    assert_eq!(resp.decision, Decision::OnlySuggest);
}

#[tokio::test]
async fn failing_provider_trips_its_breaker() {
    let gate = builder()
        .provider(ProviderKind::Knowledge, Arc::new(FailingProvider(ProviderKind::Knowledge)))
        .timeouts(sticky_breakers())
        .settings(guarded(GateSettings::default()))
        .build()
        .unwrap();
    let mut req = DecisionRequest::from_text("What are your opening hours?");
    req.verbose = true;

    for _ in 0..3 {
        gate.decide(req.clone()).await.unwrap();
    }
    let breaker = gate.breakers().get(ProviderKind::Knowledge).unwrap();
    assert_eq!(breaker.lock().state(), BreakerState::Open);

    let resp = gate.decide(req).await.unwrap();
    let trace = resp.trace.unwrap();
    assert!(trace.iter().any(|l| l == "evidence knowledge: SKIPPED (circuit open)"));
    assert!(resp.decision >= Decision::OnlySuggest);

    gate.breakers().clear();
    assert!(gate.breakers().is_empty());
}

#[tokio::test(start_paused = true)]
async fn dropped_request_does_not_pin_a_probing_breaker() {
    let registry = Arc::new(BreakerRegistry::default());
    {
        let breaker = registry.get_or_create(ProviderKind::Knowledge);
        let mut b = breaker.lock();
        let long_ago = chrono::Utc::now() - chrono::Duration::minutes(10);
        for _ in 0..3 {
            b.record_timeout(long_ago);
        }
    }
    let gate = builder()
        .provider(ProviderKind::Knowledge, Arc::new(SlowProvider(ProviderKind::Knowledge)))
        .breakers(registry.clone())
        .settings(guarded(GateSettings::default()))
        .build()
        .unwrap();
    let mut req = DecisionRequest::from_text("What are your opening hours?");
    req.verbose = true;

    let dropped = tokio::time::timeout(Duration::from_millis(5), gate.decide(req.clone())).await;
    assert!(dropped.is_err());
    let breaker = registry.get(ProviderKind::Knowledge).unwrap();
    assert_eq!(breaker.lock().state(), BreakerState::HalfOpen);
    assert_eq!(breaker.lock().probes_in_flight(), 0);

    let resp = gate.decide(req).await.unwrap();
    let trace = resp.trace.unwrap();
    assert!(!trace.iter().any(|l| l.contains("SKIPPED")), "{trace:?}");
    assert!(trace.iter().any(|l| l.starts_with("evidence knowledge: TIMEOUT")));
}

#[tokio::test]
async fn guard_disabled_leaves_breakers_untouched() {
    let gate = builder()
        .provider(ProviderKind::Knowledge, Arc::new(FailingProvider(ProviderKind::Knowledge)))
        .build()
        .unwrap();
    for _ in 0..5 {
        let resp = gate
            .decide(DecisionRequest::from_text("What are your opening hours?"))
            .await
            .unwrap();
        assert!(resp.degradation.is_none());
        assert_eq!(resp.primary_reason, "EVIDENCE_KNOWLEDGE_MISSING");
    }
    assert!(gate.breakers().is_empty());
}

// ── Errors ──────────────────────────────────────────────────────

#[tokio::test]
async fn validation_and_configuration_errors_are_distinct() {
    let gate = gate();
    let err = gate.decide(DecisionRequest::from_text("   ")).await.unwrap_err();
    assert!(matches!(err, GateError::Validation(_)));

    let err = gate
        .decide_with_matrix(DecisionRequest::from_text("hi"), "matrices/missing.json")
        .await
        .unwrap_err();
    assert!(err.is_configuration());
}

#[tokio::test]
async fn malformed_loop_state_is_ignored() {
    let gate = gate();
    let req = DecisionRequest::default()
        .with_signals(["LOW_VALUE_NITS"])
        .with_context("profile", "pr_review_loop")
        .with_context("loop_state", serde_json::json!({"round_index": -3}));
    let resp = gate.decide(req).await.unwrap();
    assert_eq!(resp.decision, Decision::OnlySuggest);
}
