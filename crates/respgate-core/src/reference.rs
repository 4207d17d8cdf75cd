//! Static reference data read by the evidence providers, the classifier
//! and the postcheck. Loaded once at startup and shared read-only.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::GateError;
use crate::types::{ActionType, ImpactLevel, RiskLevel};

const TOOL_CATALOG: &str = include_str!("../defaults/tool_catalog.json");
const PERMISSION_POLICIES: &str = include_str!("../defaults/permission_policies.json");
const RISK_RULES: &str = include_str!("../defaults/risk_rules.json");
const KB_META: &str = include_str!("../defaults/kb_meta.json");
const CONTENT_RULES: &str = include_str!("../defaults/content_rules.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub tool_id: String,
    pub action_type: ActionType,
    #[serde(default)]
    pub impact_level: ImpactLevel,
    pub required_role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingHint {
    pub tool_id: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolCatalog {
    pub tools: Vec<ToolSpec>,
    #[serde(default)]
    pub routing_hints: Vec<RoutingHint>,
}

impl ToolCatalog {
    pub fn get(&self, tool_id: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.tool_id == tool_id)
    }

    /// Hints with the number of their keywords found in `text_lower`,
    /// in declaration order, zero-match hints omitted.
    pub fn hint_matches<'a>(&'a self, text_lower: &'a str) -> impl Iterator<Item = (&'a RoutingHint, usize)> + 'a {
        self.routing_hints.iter().filter_map(move |hint| {
            let n = hint
                .keywords
                .iter()
                .filter(|k| text_lower.contains(&k.to_lowercase()))
                .count();
            (n > 0).then_some((hint, n))
        })
    }

    /// First catalog tool whose routing hint matches the text.
    pub fn infer_tool(&self, text_lower: &str) -> Option<&ToolSpec> {
        self.hint_matches(text_lower)
            .find_map(|(hint, _)| self.get(&hint.tool_id))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPermission {
    #[serde(default)]
    pub default_roles: Vec<String>,
    #[serde(default)]
    pub restricted: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionPolicies {
    #[serde(default = "default_role")]
    pub default_role: String,
    pub action_permissions: HashMap<ActionType, ActionPermission>,
}

fn default_role() -> String {
    "normal_user".into()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThresholdOp {
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "==")]
    Eq,
}

impl ThresholdOp {
    pub fn holds(self, actual: f64, limit: f64) -> bool {
        match self {
            ThresholdOp::Gte => actual >= limit,
            ThresholdOp::Gt => actual > limit,
            ThresholdOp::Lte => actual <= limit,
            ThresholdOp::Lt => actual < limit,
            ThresholdOp::Eq => (actual - limit).abs() < f64::EPSILON,
        }
    }
}

/// Restricts a rule to requests naming one of these tools in context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliesWhen {
    #[serde(default)]
    pub tool_ids: Vec<String>,
}

impl AppliesWhen {
    pub fn matches(&self, tool_id: Option<&str>) -> bool {
        tool_id.is_some_and(|id| self.tool_ids.iter().any(|t| t == id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RiskRule {
    Keyword {
        rule_id: String,
        keywords: Vec<String>,
        risk_level: RiskLevel,
    },
    Threshold {
        rule_id: String,
        field: String,
        op: ThresholdOp,
        value_from_default: String,
        applies_when: AppliesWhen,
        risk_level: RiskLevel,
    },
    MissingFields {
        rule_id: String,
        required_fields: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        applies_when: Option<AppliesWhen>,
        risk_level: RiskLevel,
    },
}

impl RiskRule {
    pub fn rule_id(&self) -> &str {
        match self {
            RiskRule::Keyword { rule_id, .. }
            | RiskRule::Threshold { rule_id, .. }
            | RiskRule::MissingFields { rule_id, .. } => rule_id,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskRuleSet {
    #[serde(default)]
    pub defaults: BTreeMap<String, f64>,
    pub rules: Vec<RiskRule>,
    /// Minimum risk level implied by a structured-input signal.
    #[serde(default)]
    pub signal_floors: BTreeMap<String, RiskLevel>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbMeta {
    pub kb_id: String,
    pub kb_version: String,
    #[serde(default)]
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRules {
    pub operation_keywords: Vec<String>,
    pub guarantee_keywords: Vec<String>,
    pub disclaimer: String,
}

/// All reference tables, loaded together.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceData {
    pub tools: ToolCatalog,
    pub permissions: PermissionPolicies,
    pub risk: RiskRuleSet,
    pub knowledge: KbMeta,
    pub content: ContentRules,
}

impl ReferenceData {
    /// The tables shipped with the crate.
    pub fn builtin() -> Result<Self, GateError> {
        let data = Self {
            tools: parse("tool_catalog.json", TOOL_CATALOG)?,
            permissions: parse("permission_policies.json", PERMISSION_POLICIES)?,
            risk: parse("risk_rules.json", RISK_RULES)?,
            knowledge: parse("kb_meta.json", KB_META)?,
            content: parse("content_rules.json", CONTENT_RULES)?,
        };
        data.validate()?;
        Ok(data)
    }

    /// Builtin tables, replaced file-by-file by those present in `dir`.
    pub fn load_dir(dir: &Path) -> Result<Self, GateError> {
        if !dir.is_dir() {
            return Err(GateError::configuration(
                dir.display().to_string(),
                "not a directory",
            ));
        }
        let data = Self {
            tools: load_or("tool_catalog.json", dir, TOOL_CATALOG)?,
            permissions: load_or("permission_policies.json", dir, PERMISSION_POLICIES)?,
            risk: load_or("risk_rules.json", dir, RISK_RULES)?,
            knowledge: load_or("kb_meta.json", dir, KB_META)?,
            content: load_or("content_rules.json", dir, CONTENT_RULES)?,
        };
        data.validate()?;
        Ok(data)
    }

    /// Cross-table consistency checks.
    pub fn validate(&self) -> Result<(), GateError> {
        let tool_ids: HashSet<&str> = self.tools.tools.iter().map(|t| t.tool_id.as_str()).collect();
        if tool_ids.len() != self.tools.tools.len() {
            return Err(GateError::configuration("tool_catalog.json", "duplicate tool_id"));
        }
        for hint in &self.tools.routing_hints {
            if !tool_ids.contains(hint.tool_id.as_str()) {
                return Err(GateError::configuration(
                    "tool_catalog.json",
                    format!("routing hint references unknown tool '{}'", hint.tool_id),
                ));
            }
        }
        for rule in &self.risk.rules {
            if let RiskRule::Threshold {
                rule_id,
                value_from_default,
                ..
            } = rule
            {
                if !self.risk.defaults.contains_key(value_from_default) {
                    return Err(GateError::configuration(
                        "risk_rules.json",
                        format!("rule {rule_id} reads missing default '{value_from_default}'"),
                    ));
                }
            }
        }
        if self.content.disclaimer.trim().is_empty() {
            return Err(GateError::configuration("content_rules.json", "empty disclaimer"));
        }
        Ok(())
    }
}

fn parse<T: DeserializeOwned>(name: &str, raw: &str) -> Result<T, GateError> {
    serde_json::from_str(raw).map_err(|e| GateError::configuration(name, e.to_string()))
}

fn load_or<T: DeserializeOwned>(name: &str, dir: &Path, builtin: &str) -> Result<T, GateError> {
    let path = dir.join(name);
    if !path.exists() {
        return parse(name, builtin);
    }
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| GateError::configuration(path.display().to_string(), e.to_string()))?;
    parse(&path.display().to_string(), &raw)
}
