use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Caller-supplied round context for multi-round loops. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopState {
    #[serde(default)]
    pub round_index: u32,
    #[serde(default)]
    pub nit_only_streak: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_signal_fingerprint: Option<String>,
}

impl LoopState {
    /// Parse `context.loop_state`. Anything malformed yields `None`.
    pub fn parse(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Stable fingerprint of a signal set, order-insensitive.
    pub fn fingerprint_signals<I, S>(signals: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut sorted: Vec<String> = signals
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        sorted.sort();
        sorted.dedup();
        let mut hasher = Sha256::new();
        for s in &sorted {
            hasher.update(s.as_bytes());
            hasher.update(b"\n");
        }
        format!("sha256:{:x}", hasher.finalize())
    }
}
