use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::types::{ProviderKind, RiskLevel};

pub const ENV_TIMEOUT_GUARD: &str = "AI_GATE_EVIDENCE_TIMEOUT_GUARD_ENABLED";
pub const ENV_HITL_OVERLAY: &str = "AI_GATE_TIMEOUT_GUARD_HITL_OVERLAY_ENABLED";
pub const ENV_DENY_OVERLAY: &str = "AI_GATE_TIMEOUT_GUARD_DENY_OVERLAY_ENABLED";
pub const ENV_RISK_TIER: &str = "AI_GATE_RISK_TIER";
pub const ENV_POLICY_VERSION: &str = "AI_GATE_TIMEOUT_GUARD_POLICY_VERSION";

/// Circuit breaker thresholds and backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerConfig {
    pub timeout_threshold: u32,
    pub initial_cooldown_ms: u64,
    pub backoff_multiplier: f64,
    pub max_cooldown_ms: u64,
    pub half_open_max_probes: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            timeout_threshold: 3,
            initial_cooldown_ms: 1_000,
            backoff_multiplier: 2.0,
            max_cooldown_ms: 60_000,
            half_open_max_probes: 1,
        }
    }
}

impl BreakerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("circuit_breaker.timeout_threshold", self.timeout_threshold, 1, 100)?;
        check_range(
            "circuit_breaker.initial_cooldown_ms",
            self.initial_cooldown_ms,
            10,
            600_000,
        )?;
        if !(1.0..=10.0).contains(&self.backoff_multiplier) {
            return Err(ConfigError::out_of_range(
                "circuit_breaker.backoff_multiplier",
                self.backoff_multiplier,
                1.0,
                10.0,
            ));
        }
        check_range(
            "circuit_breaker.max_cooldown_ms",
            self.max_cooldown_ms,
            self.initial_cooldown_ms,
            3_600_000,
        )?;
        check_range(
            "circuit_breaker.half_open_max_probes",
            self.half_open_max_probes,
            1,
            16,
        )?;
        Ok(())
    }
}

/// Per-provider time budgets and breaker settings.
///
/// Effective timeout for a provider is
/// `min(base × risk_tier_multiplier, overall_deadline_ms)` where base is the
/// provider override or `provider_timeout_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvidenceTimeoutConfig {
    pub provider_timeout_ms: u64,
    pub provider_overrides: BTreeMap<ProviderKind, u64>,
    pub overall_deadline_ms: u64,
    pub risk_tier_multipliers: BTreeMap<RiskLevel, f64>,
    pub circuit_breaker: BreakerConfig,
}

const TIMEOUT_MIN_MS: u64 = 5;
const TIMEOUT_MAX_MS: u64 = 10_000;
const DEADLINE_MAX_MS: u64 = 60_000;

impl Default for EvidenceTimeoutConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: 80,
            provider_overrides: BTreeMap::new(),
            overall_deadline_ms: 400,
            risk_tier_multipliers: RiskLevel::ALL.iter().map(|t| (*t, 1.0)).collect(),
            circuit_breaker: BreakerConfig::default(),
        }
    }
}

impl EvidenceTimeoutConfig {
    /// Load and validate. Any bound violation fails the load.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read timeout config {}", path.display()))?;
        let cfg: Self = serde_json::from_str(&content)
            .with_context(|| format!("{}: invalid timeout config", path.display()))?;
        cfg.validate()
            .with_context(|| format!("{}: timeout config out of bounds", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "provider_timeout_ms",
            self.provider_timeout_ms,
            TIMEOUT_MIN_MS,
            TIMEOUT_MAX_MS,
        )?;
        for (kind, ms) in &self.provider_overrides {
            check_range(
                &format!("provider_overrides.{kind}"),
                *ms,
                TIMEOUT_MIN_MS,
                TIMEOUT_MAX_MS,
            )?;
        }
        let slowest = self
            .provider_overrides
            .values()
            .copied()
            .chain(std::iter::once(self.provider_timeout_ms))
            .max()
            .unwrap_or(self.provider_timeout_ms);
        check_range(
            "overall_deadline_ms",
            self.overall_deadline_ms,
            slowest,
            DEADLINE_MAX_MS,
        )?;
        for (tier, m) in &self.risk_tier_multipliers {
            if !(0.25..=4.0).contains(m) {
                return Err(ConfigError::out_of_range(
                    format!("risk_tier_multipliers.{tier}"),
                    m,
                    0.25,
                    4.0,
                ));
            }
        }
        self.circuit_breaker.validate()
    }

    pub fn timeout_for(&self, provider: ProviderKind, tier: RiskLevel) -> Duration {
        let base = self
            .provider_overrides
            .get(&provider)
            .copied()
            .unwrap_or(self.provider_timeout_ms);
        let multiplier = self.risk_tier_multipliers.get(&tier).copied().unwrap_or(1.0);
        let scaled = (base as f64 * multiplier).round() as u64;
        Duration::from_millis(scaled.clamp(1, self.overall_deadline_ms))
    }
}

fn check_range<T>(field: &str, value: T, min: T, max: T) -> Result<(), ConfigError>
where
    T: PartialOrd + fmt::Display + Copy,
{
    if value < min || value > max {
        return Err(ConfigError::out_of_range(field, value, min, max));
    }
    Ok(())
}

/// Where the risk tier came from, reported in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TierSource {
    Env,
    Default,
    Explicit,
}

impl fmt::Display for TierSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TierSource::Env => "env",
            TierSource::Default => "default",
            TierSource::Explicit => "explicit",
        })
    }
}

/// Toggles for optional subsystems. Defaults are the conservative choice.
#[derive(Debug, Clone, PartialEq)]
pub struct GateSettings {
    pub evidence_timeout_guard: bool,
    pub hitl_overlay: bool,
    pub deny_overlay: bool,
    pub risk_tier: RiskLevel,
    pub risk_tier_source: TierSource,
    pub policy_version: String,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            evidence_timeout_guard: false,
            hitl_overlay: true,
            deny_overlay: true,
            risk_tier: RiskLevel::R2,
            risk_tier_source: TierSource::Default,
            policy_version: "v1".into(),
        }
    }
}

impl GateSettings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; tests use a map instead of the process env.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let flag = |key: &str, default: bool| lookup(key).and_then(|v| parse_flag(&v)).unwrap_or(default);

        let (risk_tier, risk_tier_source) = match lookup(ENV_RISK_TIER).map(|v| v.parse::<RiskLevel>()) {
            Some(Ok(tier)) => (tier, TierSource::Env),
            _ => (defaults.risk_tier, TierSource::Default),
        };
        let policy_version = lookup(ENV_POLICY_VERSION)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or(defaults.policy_version);

        Self {
            evidence_timeout_guard: flag(ENV_TIMEOUT_GUARD, defaults.evidence_timeout_guard),
            hitl_overlay: flag(ENV_HITL_OVERLAY, defaults.hitl_overlay),
            deny_overlay: flag(ENV_DENY_OVERLAY, defaults.deny_overlay),
            risk_tier,
            risk_tier_source,
            policy_version,
        }
    }

    pub fn with_timeout_guard(mut self, enabled: bool) -> Self {
        self.evidence_timeout_guard = enabled;
        self
    }

    pub fn with_risk_tier(mut self, tier: RiskLevel) -> Self {
        self.risk_tier = tier;
        self.risk_tier_source = TierSource::Explicit;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
