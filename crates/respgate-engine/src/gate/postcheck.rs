use respgate_core::reasons;
use respgate_core::reference::ReferenceData;
use respgate_core::response::{PostcheckIssue, PostcheckResult, Severity};

use super::verdict::Verdict;

pub const GUARANTEE_KEYWORD_IN_TEXT: &str = "GUARANTEE_KEYWORD_IN_TEXT";
pub const MISSING_DISCLAIMER: &str = "MISSING_DISCLAIMER";

/// Which text is being checked. The disclaimer requirement only applies to
/// text the assistant would send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostcheckTarget {
    Input,
    Output,
}

/// Content scan for guarantee claims and missing disclaimers.
#[derive(Debug, Clone)]
pub struct Postcheck {
    guarantee_keywords: Vec<String>,
    disclaimer: String,
}

impl Postcheck {
    pub fn new(guarantee_keywords: Vec<String>, disclaimer: impl Into<String>) -> Self {
        Self {
            guarantee_keywords: guarantee_keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            disclaimer: disclaimer.into(),
        }
    }

    pub fn from_reference(reference: &ReferenceData) -> Self {
        Self::new(
            reference.content.guarantee_keywords.clone(),
            reference.content.disclaimer.clone(),
        )
    }

    pub fn disclaimer(&self) -> &str {
        &self.disclaimer
    }

    pub fn check(&self, text: &str, requires_disclaimer: bool, target: PostcheckTarget) -> PostcheckResult {
        let lower = text.to_lowercase();
        let mut issues = Vec::new();

        if let Some(kw) = self.guarantee_keywords.iter().find(|k| lower.contains(k.as_str())) {
            issues.push(PostcheckIssue {
                code: GUARANTEE_KEYWORD_IN_TEXT.into(),
                severity: Severity::Critical,
                description: format!("text contains guarantee wording '{kw}'"),
            });
        }
        if target == PostcheckTarget::Output && requires_disclaimer && !text.contains(&self.disclaimer) {
            issues.push(PostcheckIssue {
                code: MISSING_DISCLAIMER.into(),
                severity: Severity::Error,
                description: "suggestion-only answer lacks the mandatory disclaimer".into(),
            });
        }
        PostcheckResult {
            passed: issues.is_empty(),
            issues,
        }
    }

    /// `text` with the disclaimer appended, unless already present.
    pub fn append_disclaimer(&self, text: &str) -> String {
        if text.contains(&self.disclaimer) {
            return text.to_string();
        }
        let body = text.trim_end();
        if body.is_empty() {
            self.disclaimer.clone()
        } else {
            format!("{body}\n\n{}", self.disclaimer)
        }
    }
}

/// Critical findings advance two steps, others one, clamped at DENY.
pub fn apply_postcheck(mut v: Verdict, result: &PostcheckResult) -> Verdict {
    let Some(first) = result.issues.first() else {
        return v;
    };
    let reason = format!("{}{}", reasons::POSTCHECK_FAIL_PREFIX, first.code);
    for issue in &result.issues {
        let steps = match issue.severity {
            Severity::Critical => 2,
            Severity::Error => 1,
        };
        v.tighten(steps, &reason);
    }
    v
}
