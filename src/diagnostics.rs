//! Load-time diagnostics for rule files.
//!
//! Every loader (grammar, locutions, proper nouns, constraint grammar,
//! dependency rules) records what it finds into a [`LoadReport`] and keeps
//! going after the first problem, so a broken file reports all of its errors
//! at once. [`LoadReport::finish`] then turns the report into a `Result`:
//! errors reject the whole file, warnings are logged and the load succeeds.

use std::fmt;

use serde::Serialize;

use crate::errors::{LingError, Result};

// ─── Severity ───────────────────────────────────────────────────────────────

/// Whether a diagnostic is a hard error or a soft warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

// ─── Codes ──────────────────────────────────────────────────────────────────

/// Stable identifiers for load-time findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticCode {
    /// Unexpected token or malformed line.
    Syntax,
    /// Grammar has no `@START` directive.
    MissingStart,
    /// `@START` given more than once.
    DuplicateStart,
    /// Start symbol declared `@HIDDEN` or `@NOTOP`.
    InvalidStart,
    /// A directive names a terminal symbol.
    TerminalInDirective,
    /// `@HIDDEN` and `@ONLYTOP` both given for one symbol.
    HiddenOverridesOnlytop,
    /// Non-unary rule without governor mark.
    MissingGovernor,
    /// Reference to an undefined set.
    UndefinedSet,
    /// `barrier` on a fixed-position condition.
    BarrierWithoutStar,
    /// A referenced file could not be read.
    UnreadableFile,
    /// A regular expression does not compile.
    InvalidRegex,
    /// Malformed tag in a lexicon entry.
    InvalidTag,
    /// Unknown predicate, operation or parameter name.
    UnknownName,
    /// Semantic predicate used without a semantic database.
    MissingSemanticDb,
}

impl DiagnosticCode {
    /// Returns the user-facing name used in messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::MissingStart => "missing_start",
            Self::DuplicateStart => "duplicate_start",
            Self::InvalidStart => "invalid_start",
            Self::TerminalInDirective => "terminal_in_directive",
            Self::HiddenOverridesOnlytop => "hidden_overrides_onlytop",
            Self::MissingGovernor => "missing_governor",
            Self::UndefinedSet => "undefined_set",
            Self::BarrierWithoutStar => "barrier_without_star",
            Self::UnreadableFile => "unreadable_file",
            Self::InvalidRegex => "invalid_regex",
            Self::InvalidTag => "invalid_tag",
            Self::UnknownName => "unknown_name",
            Self::MissingSemanticDb => "missing_semantic_db",
        }
    }
}

// ─── Diagnostic ─────────────────────────────────────────────────────────────

/// A single finding, attached to a line of the file when one is known.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            line,
            message: message.into(),
            hint: None,
        }
    }

    pub fn warning(code: DiagnosticCode, line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            line,
            message: message.into(),
            hint: None,
        }
    }

    /// Attach a fix suggestion.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        match self.line {
            Some(line) => write!(f, "{level}[{}] line {line}: {}", self.code.as_str(), self.message)?,
            None => write!(f, "{level}[{}]: {}", self.code.as_str(), self.message)?,
        }
        if let Some(hint) = &self.hint {
            write!(f, " (hint: {hint})")?;
        }
        Ok(())
    }
}

// ─── Report ─────────────────────────────────────────────────────────────────

/// All findings collected while loading one rule file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    /// Name of the file (or `"<inline>"` for text sources).
    pub origin: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadReport {
    pub fn new(origin: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, code: DiagnosticCode, line: Option<usize>, message: impl Into<String>) {
        self.push(Diagnostic::error(code, line, message));
    }

    pub fn warning(&mut self, code: DiagnosticCode, line: Option<usize>, message: impl Into<String>) {
        self.push(Diagnostic::warning(code, line, message));
    }

    /// Iterate over error-severity diagnostics.
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
    }

    /// Iterate over warning-severity diagnostics.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// Returns `true` if any diagnostic is an error.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Returns `true` if a diagnostic with the given code was recorded.
    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.diagnostics.iter().any(|d| d.code == code)
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Log warnings and return `value`, or fail with every error found.
    pub fn finish<T>(self, value: T) -> Result<T> {
        if self.has_errors() {
            return Err(LingError::Config {
                origin: self.origin.clone(),
                report: self,
            });
        }
        for warning in self.warnings() {
            tracing::warn!(origin = %self.origin, "{warning}");
        }
        Ok(value)
    }
}

impl fmt::Display for LoadReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n_errors = self.errors().count();
        write!(f, "{n_errors} error(s)")?;
        for d in self.errors() {
            write!(f, "; {d}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_without_errors_finishes() {
        let mut report = LoadReport::new("grammar.gram");
        report.warning(DiagnosticCode::MissingGovernor, Some(3), "non-unary rule");
        assert!(!report.has_errors());
        assert_eq!(report.finish(42).unwrap(), 42);
    }

    #[test]
    fn test_report_collects_all_errors() {
        let mut report = LoadReport::new("cg.rlx");
        report.error(DiagnosticCode::Syntax, Some(1), "unexpected ')'");
        report.error(DiagnosticCode::UndefinedSet, Some(7), "set Foo");
        report.warning(DiagnosticCode::Syntax, None, "trailing text");

        assert_eq!(report.errors().count(), 2);
        assert_eq!(report.warnings().count(), 1);

        let err = report.finish(()).unwrap_err();
        let report = err.report().unwrap();
        assert!(report.has_code(DiagnosticCode::UndefinedSet));
        let message = err.to_string();
        assert!(message.starts_with("cg.rlx: 2 error(s)"));
        assert!(message.contains("line 7"));
    }

    #[test]
    fn test_diagnostic_display_with_hint() {
        let d = Diagnostic::error(DiagnosticCode::MissingStart, None, "no @START")
            .with_hint("add `@START S.`");
        assert_eq!(
            d.to_string(),
            "error[missing_start]: no @START (hint: add `@START S.`)"
        );
    }
}
