/// Error kinds surfaced by the gate.
///
/// `Configuration` is fatal for the request (no decision without a valid
/// matrix), `Validation` rejects the request before the pipeline runs.
/// Provider failures never reach this type; see [`ProviderError`].
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("configuration error in {source_name}: {message}")]
    Configuration {
        source_name: String,
        message: String,
    },
    #[error("invalid request: {0}")]
    Validation(String),
}

impl GateError {
    pub fn configuration(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        GateError::Configuration {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, GateError::Configuration { .. })
    }
}

/// Recoverable failure of a single evidence provider call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("provider failed: {0}")]
    Failed(String),
    #[error("provider task panicked: {0}")]
    Panicked(String),
}

/// Bound violation in the evidence-timeout configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: String,
        value: String,
        min: String,
        max: String,
    },
    #[error("{0}")]
    Inconsistent(String),
}

impl ConfigError {
    pub fn out_of_range(
        field: impl Into<String>,
        value: impl ToString,
        min: impl ToString,
        max: impl ToString,
    ) -> Self {
        ConfigError::OutOfRange {
            field: field.into(),
            value: value.to_string(),
            min: min.to_string(),
            max: max.to_string(),
        }
    }
}

/// Structured check result for `rgate check-matrix --json`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckReport {
    pub file: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub pass: bool,
    pub errors: Vec<CheckIssue>,
    pub warnings: Vec<CheckIssue>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CheckIssue {
    pub code: String,
    pub check: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}
