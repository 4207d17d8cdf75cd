//! CLI integration via the JSON interface.

use test_helpers::{decide, rgate_bin, rgate_json, rgate_stdout, rgate_with_stdin, workspace_root};

use serde_json::json;

// ── decide ──────────────────────────────────────────────────────

#[test]
fn decide_benign_question_from_stdin() {
    let v = decide(&json!({"text": "What are your opening hours?"}), &[]);
    assert_eq!(v["decision"], "ALLOW");
    assert_eq!(v["primary_reason"], "DEFAULT_DECISION");
    assert_eq!(v["suggested_action"], "answer");
    assert_eq!(v["policy"]["matrix_version"], "v0.1");
    assert_eq!(v["explanation"]["evidence_used"].as_array().unwrap().len(), 5);
    assert!(v.get("trace").is_none());
    assert!(v["request_id"].as_str().is_some_and(|s| s.len() == 36));
}

#[test]
fn decide_guarantee_claim_is_denied() {
    let v = decide(&json!({"text": "This plan is risk-free, guaranteed!"}), &[]);
    assert_eq!(v["decision"], "DENY");
    assert_eq!(v["primary_reason"], "RISK_GUARANTEE_OVERRIDE");
    assert_eq!(v["suggested_action"], "refuse");
}

#[test]
fn decide_restricted_refund_goes_to_human() {
    let v = decide(
        &json!({
            "text": "I want my money back",
            "context": {"tool_id": "refund.create", "order_id": "o-17", "amount": 20}
        }),
        &[],
    );
    assert_eq!(v["decision"], "HITL");
    assert_eq!(v["primary_reason"], "PERMISSION_DENIED");
    assert_eq!(v["responsibility_type"], "EntitlementDecision");
}

#[test]
fn decide_with_profile_and_debug() {
    let v = decide(
        &json!({
            "structured_input": {"signals": ["BUG_RISK"]},
            "context": {"profile": "pr_review_loop"},
            "debug": true,
            "verbose": true
        }),
        &["--pretty"],
    );
    assert_eq!(v["decision"], "HITL");
    assert_eq!(v["policy"]["rules_fired"], json!(["PR_R2"]));
    assert!(v["trace"].is_array());
}

#[test]
fn decide_explicit_matrix_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let req = dir.path().join("req.json");
    std::fs::write(&req, json!({"structured_input": {"signals": ["LOW_VALUE_NITS"]}}).to_string()).unwrap();
    let v = rgate_json(
        &[
            "decide",
            req.to_str().unwrap(),
            "--matrix",
            "matrices/pr_loop_phase_e.json",
        ],
        0,
    );
    assert_eq!(v["decision"], "ALLOW");
    assert_eq!(v["primary_reason"], "PR_LOOP_CONVERGED");
}

#[test]
fn decide_with_timeout_guard_env_reports_degradation() {
    let out = rgate_bin()
        .env("AI_GATE_EVIDENCE_TIMEOUT_GUARD_ENABLED", "true")
        .args(["decide", "-"])
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .spawn()
        .and_then(|mut child| {
            use std::io::Write;
            child
                .stdin
                .take()
                .unwrap()
                .write_all(br#"{"text": "hello"}"#)?;
            child.wait_with_output()
        })
        .unwrap();
    assert!(out.status.success());
    let v: serde_json::Value = serde_json::from_slice(&out.stdout).unwrap();
    assert_eq!(v["degradation"]["providers_over_budget"], 0);
    assert_eq!(v["degradation"]["hitl_suggested"], false);
}

#[test]
fn decide_rejects_invalid_request() {
    let out = rgate_with_stdin(&["decide"], r#"{"text": "   "}"#);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid request"), "{stderr}");
}

#[test]
fn decide_missing_matrix_is_configuration_error() {
    let out = rgate_with_stdin(&["decide", "--matrix", "matrices/nope.json"], r#"{"text": "hi"}"#);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("configuration error"), "{stderr}");
}

// ── check-matrix ────────────────────────────────────────────────

#[test]
fn shipped_matrices_pass() {
    for m in [
        "matrices/v0.1.json",
        "matrices/pr_loop_demo.json",
        "matrices/pr_loop_phase_e.json",
        "matrices/pr_loop_churn.json",
    ] {
        let v = rgate_json(&["check-matrix", m, "--json"], 0);
        assert_eq!(v["pass"], true, "{m}");
        assert!(v["digest"].as_str().unwrap().starts_with("sha256:"), "{m}");
    }
}

#[test]
fn broken_matrix_reports_errors() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    std::fs::write(
        &path,
        json!({
            "version": "bad",
            "rules": [
                {"rule_id": "A", "decision": "MAYBE", "primary_reason": "X"},
                {"rule_id": "A", "decision": "HITL", "primary_reason": "Y"}
            ],
            "defaults": {}
        })
        .to_string(),
    )
    .unwrap();
    let v = rgate_json(&["check-matrix", path.to_str().unwrap(), "--json"], 1);
    assert_eq!(v["pass"], false);
    let codes: Vec<&str> = v["errors"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["code"].as_str())
        .collect();
    assert!(codes.contains(&"E001"));
    assert!(codes.contains(&"E002"));
    assert!(v.get("digest").is_none());
}

// ── check-timeouts ──────────────────────────────────────────────

#[test]
fn check_timeouts_accepts_valid_and_rejects_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let ok = dir.path().join("ok.json");
    std::fs::write(&ok, json!({"provider_timeout_ms": 120, "overall_deadline_ms": 500}).to_string()).unwrap();
    let out = rgate_bin().args(["check-timeouts", ok.to_str().unwrap()]).output().unwrap();
    assert!(out.status.success());

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, json!({"provider_timeout_ms": 120, "overall_deadline_ms": 100}).to_string()).unwrap();
    let out = rgate_bin().args(["check-timeouts", bad.to_str().unwrap()]).output().unwrap();
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("overall_deadline_ms"));
}

// ── resolve-profile ─────────────────────────────────────────────

#[test]
fn resolve_profile_paths() {
    assert_eq!(rgate_stdout(&["resolve-profile"]).trim(), "matrices/v0.1.json");
    assert_eq!(
        rgate_stdout(&["resolve-profile", "pr_review_loop_churn"]).trim(),
        "matrices/pr_loop_churn.json"
    );
    assert_eq!(rgate_stdout(&["resolve-profile", "unknown"]).trim(), "matrices/v0.1.json");
    for profile in ["pr_review_loop", "pr_review_loop_converged", "pr_review_loop_churn"] {
        let path = rgate_stdout(&["resolve-profile", profile]);
        assert!(workspace_root().join(path.trim()).exists(), "{profile}");
    }
}
