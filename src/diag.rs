//! Source locations and diagnostics.
//!
//! Every diagnostic carries a location into one of the source buffers owned
//! by the [`SourceMgr`](crate::asm::source::SourceMgr); line and column are
//! computed on demand when a diagnostic is rendered. The engine records
//! diagnostics in source order and mirrors them through the `log` facade.

use std::fmt;

/// Index of a buffer registered with the source manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// A position inside a source buffer, as a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLoc {
    pub buffer: BufferId,
    pub offset: u32,
}

impl SourceLoc {
    pub fn new(buffer: BufferId, offset: u32) -> Self {
        Self { buffer, offset }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Note,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Note => write!(f, "note"),
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub loc: SourceLoc,
    pub severity: Severity,
    pub message: String,
}

/// Collects diagnostics for one parse run.
#[derive(Debug, Default)]
pub struct DiagEngine {
    diags: Vec<Diagnostic>,
    errors: usize,
    warnings: usize,
}

impl DiagEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&mut self, diag: Diagnostic) {
        match diag.severity {
            Severity::Error => {
                self.errors += 1;
                log::error!("{}", diag.message);
            }
            Severity::Warning => {
                self.warnings += 1;
                log::warn!("{}", diag.message);
            }
            Severity::Note => log::debug!("{}", diag.message),
        }
        self.diags.push(diag);
    }

    pub fn error(&mut self, loc: SourceLoc, message: impl Into<String>) {
        self.report(Diagnostic {
            loc,
            severity: Severity::Error,
            message: message.into(),
        });
    }

    pub fn warning(&mut self, loc: SourceLoc, message: impl Into<String>) {
        self.report(Diagnostic {
            loc,
            severity: Severity::Warning,
            message: message.into(),
        });
    }

    pub fn note(&mut self, loc: SourceLoc, message: impl Into<String>) {
        self.report(Diagnostic {
            loc,
            severity: Severity::Note,
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.errors != 0
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn warning_count(&self) -> usize {
        self.warnings
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_by_severity() {
        let mut diags = DiagEngine::new();
        let loc = SourceLoc::new(BufferId(0), 0);
        diags.error(loc, "bad");
        diags.warning(loc, "iffy");
        diags.warning(loc, "iffy again");
        diags.note(loc, "fyi");

        assert!(diags.has_errors());
        assert_eq!(diags.error_count(), 1);
        assert_eq!(diags.warning_count(), 2);
        assert_eq!(diags.diagnostics().len(), 4);
    }
}
