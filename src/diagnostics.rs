// ABOUTME: Diagnostics accumulator for non-fatal warnings during gathering and promotion.
// ABOUTME: Collects problems that shouldn't abort an operation but should reach the operator.

/// Collects non-fatal warnings during an operation.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A metadata type could not be listed; gathering continued without it.
    pub fn gather_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::GatherFailed,
            message: message.into(),
        }
    }

    /// A listed record was dropped (missing fields or internal component).
    pub fn record_skipped(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::RecordSkipped,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    GatherFailed,
    RecordSkipped,
}
