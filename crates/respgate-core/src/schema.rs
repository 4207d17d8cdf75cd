use std::collections::HashSet;

use anyhow::{bail, Context, Result};
use jsonschema::Validator;
use serde_json::Value;

use crate::errors::{CheckIssue, CheckReport};

const MATRIX_SCHEMA: &str = include_str!("../schema/matrix.schema.json");

const RESPONSIBILITY_TYPES: [&str; 3] = ["Information", "RiskNotice", "EntitlementDecision"];

/// Compile the embedded matrix schema.
pub fn matrix_validator() -> Result<Validator> {
    let schema: Value =
        serde_json::from_str(MATRIX_SCHEMA).context("embedded matrix schema is invalid JSON")?;
    Validator::new(&schema).map_err(|e| anyhow::anyhow!("schema compilation failed: {e}"))
}

/// Validate a matrix document against the schema.
pub fn validate_matrix(data: &Value) -> Result<()> {
    let v = matrix_validator()?;
    if v.is_valid(data) {
        return Ok(());
    }
    let mut msgs: Vec<String> = Vec::new();
    for error in v.iter_errors(data) {
        let path = error.instance_path.to_string();
        let loc = if path.is_empty() {
            "(root)".into()
        } else {
            path
        };
        msgs.push(format!("  {loc}: {error}"));
    }
    bail!("matrix validation failed:\n{}", msgs.join("\n"));
}

/// Full check producing a structured report (for `rgate check-matrix --json`).
pub fn check_matrix(data: &Value, file: &str) -> CheckReport {
    let version = data
        .get("version")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match matrix_validator() {
        Ok(v) => {
            for error in v.iter_errors(data) {
                let path = error.instance_path.to_string();
                errors.push(issue(
                    "E001",
                    "schema",
                    error.to_string(),
                    Some(if path.is_empty() {
                        "$(root)".to_string()
                    } else {
                        format!("${path}")
                    }),
                ));
            }
        }
        Err(e) => errors.push(issue("E000", "schema", format!("{e:#}"), None)),
    }

    if let Some(rules) = data.get("rules").and_then(Value::as_array) {
        check_rules(rules, &mut errors, &mut warnings);
    }

    // Each type without a default falls back to ALLOW.
    if let Some(defaults) = data.get("defaults").and_then(Value::as_object) {
        for t in RESPONSIBILITY_TYPES {
            if !defaults.contains_key(t) {
                warnings.push(issue(
                    "W002",
                    "defaults",
                    format!("no default for {t}; unmatched requests fall back to ALLOW"),
                    Some("$/defaults".into()),
                ));
            }
        }
    }

    let pass = errors.is_empty();
    CheckReport {
        file: file.to_string(),
        version,
        digest: None,
        pass,
        errors,
        warnings,
    }
}

fn check_rules(rules: &[Value], errors: &mut Vec<CheckIssue>, warnings: &mut Vec<CheckIssue>) {
    let mut seen = HashSet::new();
    let mut catch_all: Option<String> = None;
    for (i, rule) in rules.iter().enumerate() {
        let id = rule
            .get("rule_id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        if !id.is_empty() && !seen.insert(id.clone()) {
            errors.push(issue(
                "E002",
                "rules",
                format!("duplicate rule_id '{id}'"),
                Some(format!("$/rules/{i}")),
            ));
        }
        if let Some(first) = &catch_all {
            warnings.push(issue(
                "W001",
                "rules",
                format!("rule '{id}' is unreachable after unconditional rule '{first}'"),
                Some(format!("$/rules/{i}")),
            ));
            continue;
        }
        if is_unconditional(rule) {
            catch_all = Some(id);
        }
    }
}

fn is_unconditional(rule: &Value) -> bool {
    match rule.get("match").and_then(Value::as_object) {
        None => true,
        Some(m) => m.values().all(|v| v.is_null() || v.as_array().is_some_and(Vec::is_empty)),
    }
}

fn issue(code: &str, check: &str, message: String, path: Option<String>) -> CheckIssue {
    CheckIssue {
        code: code.to_string(),
        check: check.to_string(),
        message,
        path,
    }
}
