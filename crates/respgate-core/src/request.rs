use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::GateError;
use crate::loop_state::LoopState;
use crate::types::ActionType;

pub const MAX_TEXT_CHARS: usize = 10_000;
pub const MAX_CONTEXT_KEYS: usize = 100;

/// One governance query as received from a caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DecisionRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_input: Option<StructuredInput>,
    #[serde(default)]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub verbose: bool,
}

/// Domain-agnostic pass-through input. Signals are an explicit string set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuredInput {
    #[serde(default)]
    pub signals: BTreeSet<String>,
}

impl DecisionRequest {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.context.insert(key.to_string(), value.into());
        self
    }

    pub fn with_signals<I, S>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.structured_input = Some(StructuredInput {
            signals: signals.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Matrix profile named in `context.profile`, if any.
    pub fn profile(&self) -> Option<&str> {
        self.context
            .get("profile")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Rejects malformed requests before they enter the pipeline.
    pub fn validate(&self) -> Result<(), GateError> {
        if self.text.is_none() && self.structured_input.is_none() {
            return Err(GateError::Validation(
                "either text or structured_input is required".into(),
            ));
        }
        if let Some(text) = &self.text {
            if text.trim().is_empty() {
                return Err(GateError::Validation("text must not be blank".into()));
            }
            let chars = text.chars().count();
            if chars > MAX_TEXT_CHARS {
                return Err(GateError::Validation(format!(
                    "text has {chars} characters, limit is {MAX_TEXT_CHARS}"
                )));
            }
        }
        if self.context.len() > MAX_CONTEXT_KEYS {
            return Err(GateError::Validation(format!(
                "context has {} keys, limit is {MAX_CONTEXT_KEYS}",
                self.context.len()
            )));
        }
        Ok(())
    }
}

/// Internal request envelope, derived once per request.
#[derive(Debug, Clone)]
pub struct GateContext {
    pub request_id: String,
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    /// Trimmed request text; empty for structured-only requests.
    pub text: String,
    pub signals: BTreeSet<String>,
    pub context: Map<String, Value>,
    pub debug: bool,
    pub verbose: bool,
}

impl GateContext {
    pub fn new(request_id: impl Into<String>, req: DecisionRequest) -> Self {
        Self {
            request_id: request_id.into(),
            session_id: req.session_id,
            user_id: req.user_id,
            text: req.text.map(|t| t.trim().to_string()).unwrap_or_default(),
            signals: req
                .structured_input
                .map(|s| s.signals)
                .unwrap_or_default(),
            context: req.context,
            debug: req.debug,
            verbose: req.verbose,
        }
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }

    /// Lower-cased text for keyword matching.
    pub fn text_lower(&self) -> String {
        self.text.to_lowercase()
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.context
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn number_field(&self, key: &str) -> Option<f64> {
        match self.context.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Present and not null.
    pub fn has_field(&self, key: &str) -> bool {
        self.context.get(key).is_some_and(|v| !v.is_null())
    }

    pub fn role(&self) -> Option<&str> {
        self.str_field("role")
    }

    pub fn tool_id(&self) -> Option<&str> {
        self.str_field("tool_id")
    }

    /// Explicit action type from context. `Some(Err)` when present but unknown.
    pub fn action_type(&self) -> Option<Result<ActionType, String>> {
        self.str_field("action_type").map(str::parse)
    }

    pub fn loop_state(&self) -> Option<LoopState> {
        self.context.get("loop_state").and_then(LoopState::parse)
    }
}
