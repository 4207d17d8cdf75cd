use tracing::debug;

/// Human-readable decision trace, collected only for verbose requests.
///
/// Every line is also emitted at debug level so that a subscriber sees the
/// same story for non-verbose requests.
#[derive(Debug, Clone, Default)]
pub struct Trace {
    enabled: bool,
    lines: Vec<String>,
}

impl Trace {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            lines: Vec::new(),
        }
    }

    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!(target: "respgate::trace", "{line}");
        if self.enabled {
            self.lines.push(line);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.iter().any(|l| l.contains(needle))
    }

    /// `Some(lines)` for verbose requests.
    pub fn into_lines(self) -> Option<Vec<String>> {
        self.enabled.then_some(self.lines)
    }
}
