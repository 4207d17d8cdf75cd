use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A floating-point value constrained to [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct UnitFloat(f64);

impl UnitFloat {
    pub const ZERO: UnitFloat = UnitFloat(0.0);

    pub fn new(v: f64) -> Option<Self> {
        if (0.0..=1.0).contains(&v) {
            Some(Self(v))
        } else {
            None
        }
    }

    /// Clamps out-of-range and NaN input into [0.0, 1.0].
    pub fn saturating(v: f64) -> Self {
        if v.is_nan() {
            return Self(0.0);
        }
        Self(v.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl fmt::Display for UnitFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl Serialize for UnitFloat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UnitFloat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = f64::deserialize(deserializer)?;
        UnitFloat::new(v).ok_or_else(|| serde::de::Error::custom(format!("{v} not in [0.0, 1.0]")))
    }
}

/// Final gate verdict, ordered by increasing strictness.
///
/// Only serialized: the pipeline works on [`DecisionIndex`] and turns the
/// final index into a `Decision` in exactly one place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Allow,
    OnlySuggest,
    Hitl,
    Deny,
}

impl Decision {
    pub fn index(self) -> DecisionIndex {
        DecisionIndex(self as u8)
    }

    pub fn as_str(self) -> &'static str {
        DECISION_LABELS[self as usize]
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DECISION_LABELS: [&str; 4] = ["ALLOW", "ONLY_SUGGEST", "HITL", "DENY"];

/// Ordinal position of a decision within ALLOW < ONLY_SUGGEST < HITL < DENY.
///
/// Configuration files spell decisions as labels; they deserialize into an
/// index so that no configuration path ever constructs a [`Decision`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DecisionIndex(u8);

impl DecisionIndex {
    pub const ALLOW: DecisionIndex = DecisionIndex(0);
    pub const ONLY_SUGGEST: DecisionIndex = DecisionIndex(1);
    pub const HITL: DecisionIndex = DecisionIndex(2);
    pub const DENY: DecisionIndex = DecisionIndex(3);
    pub const MAX: DecisionIndex = Self::DENY;

    pub fn new(v: u8) -> Option<Self> {
        (v <= Self::MAX.0).then_some(Self(v))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Advance by `steps`, clamped to the strictest index.
    pub fn tighten(self, steps: u8) -> Self {
        Self(self.0.saturating_add(steps).min(Self::MAX.0))
    }

    pub fn is_max(self) -> bool {
        self == Self::MAX
    }

    pub fn label(self) -> &'static str {
        DECISION_LABELS[self.0 as usize]
    }

    pub fn from_label(label: &str) -> Option<Self> {
        DECISION_LABELS
            .iter()
            .position(|l| *l == label)
            .map(|i| Self(i as u8))
    }
}

impl fmt::Display for DecisionIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label(), self.0)
    }
}

impl Serialize for DecisionIndex {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

impl<'de> Deserialize<'de> for DecisionIndex {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DecisionIndex::from_label(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown decision '{s}'")))
    }
}

/// Coarse intent class of a request, ordered by how much responsibility the
/// answer carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResponsibilityType {
    Information,
    RiskNotice,
    EntitlementDecision,
}

impl fmt::Display for ResponsibilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResponsibilityType::Information => "Information",
            ResponsibilityType::RiskNotice => "RiskNotice",
            ResponsibilityType::EntitlementDecision => "EntitlementDecision",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum RiskLevel {
    #[default]
    R0,
    R1,
    R2,
    R3,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [RiskLevel::R0, RiskLevel::R1, RiskLevel::R2, RiskLevel::R3];

    /// Assumed when risk evidence is unavailable.
    pub const MISSING_FALLBACK: RiskLevel = RiskLevel::R1;

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::R0 => "R0",
            RiskLevel::R1 => "R1",
            RiskLevel::R2 => "R2",
            RiskLevel::R3 => "R3",
        }
    }

    /// Numeric score reported alongside the level.
    pub fn score(self) -> u32 {
        match self {
            RiskLevel::R0 => 10,
            RiskLevel::R1 => 20,
            RiskLevel::R2 => 50,
            RiskLevel::R3 => 80,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "R0" => Ok(RiskLevel::R0),
            "R1" => Ok(RiskLevel::R1),
            "R2" => Ok(RiskLevel::R2),
            "R3" => Ok(RiskLevel::R3),
            other => Err(format!("unknown risk level '{other}'")),
        }
    }
}

/// What a tool does when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    #[default]
    Read,
    Write,
    Money,
    Entitlement,
    Policy,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::Read => "READ",
            ActionType::Write => "WRITE",
            ActionType::Money => "MONEY",
            ActionType::Entitlement => "ENTITLEMENT",
            ActionType::Policy => "POLICY",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "READ" => Ok(ActionType::Read),
            "WRITE" => Ok(ActionType::Write),
            "MONEY" => Ok(ActionType::Money),
            "ENTITLEMENT" => Ok(ActionType::Entitlement),
            "POLICY" => Ok(ActionType::Policy),
            other => Err(format!("unknown action type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum ImpactLevel {
    I0,
    #[default]
    I1,
    I2,
    I3,
}

/// The five evidence sources consulted for every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Tool,
    Routing,
    Knowledge,
    Risk,
    Permission,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::Tool,
        ProviderKind::Routing,
        ProviderKind::Knowledge,
        ProviderKind::Risk,
        ProviderKind::Permission,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Tool => "tool",
            ProviderKind::Routing => "routing",
            ProviderKind::Knowledge => "knowledge",
            ProviderKind::Risk => "risk",
            ProviderKind::Permission => "permission",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
