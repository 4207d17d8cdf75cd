use std::sync::Arc;

use async_trait::async_trait;

use respgate_core::reference::ReferenceData;
use respgate_core::request::GateContext;
use respgate_core::response::ClassifierResult;
use respgate_core::traits::Classifier;
use respgate_core::types::{ResponsibilityType, UnitFloat};

const OPERATION_CONFIDENCE: f64 = 0.85;
const DEFAULT_CONFIDENCE: f64 = 0.75;

/// Deterministic keyword heuristic. Any operation keyword marks the request
/// as an entitlement decision; everything else is information.
pub struct KeywordClassifier {
    operation_keywords: Vec<String>,
}

impl KeywordClassifier {
    pub fn new(operation_keywords: Vec<String>) -> Self {
        Self {
            operation_keywords: operation_keywords.into_iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    pub fn from_reference(reference: &Arc<ReferenceData>) -> Self {
        Self::new(reference.content.operation_keywords.clone())
    }

    pub fn classify_text(&self, text: &str) -> ClassifierResult {
        let lower = text.to_lowercase();
        if self.operation_keywords.iter().any(|k| lower.contains(k.as_str())) {
            return ClassifierResult {
                responsibility_type: ResponsibilityType::EntitlementDecision,
                confidence: UnitFloat::saturating(OPERATION_CONFIDENCE),
                trigger_spans: vec!["operation_keyword".into()],
            };
        }
        ClassifierResult {
            responsibility_type: ResponsibilityType::Information,
            confidence: UnitFloat::saturating(DEFAULT_CONFIDENCE),
            trigger_spans: vec!["default".into()],
        }
    }
}

#[async_trait]
impl Classifier for KeywordClassifier {
    async fn classify(&self, ctx: &GateContext) -> ClassifierResult {
        self.classify_text(&ctx.text)
    }
}
